#![allow(dead_code)]

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use taskpipe::config::ConfigFile;
use taskpipe::dag::TaskGraph;
use taskpipe::fs::RealFileSystem;
use taskpipe::pipeline::{PipelineContext, build_graph};
use taskpipe_test_utils::recording::RecordingDevServer;

pub use taskpipe_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Pipeline graph over a real directory, with a recording dev server.
pub fn pipeline_graph(root: &Path, cfg: ConfigFile) -> (Arc<TaskGraph>, RecordingDevServer) {
    let server = RecordingDevServer::new();
    let ctx = Arc::new(PipelineContext::new(
        cfg,
        root,
        Arc::new(RealFileSystem),
        Arc::new(server.clone()),
    ));
    (build_graph(ctx), server)
}
