use std::str::FromStr;

use serde::Deserialize;

/// What happens to already-running sibling tasks when a task in the same
/// run fails.
///
/// In both modes no further tasks are started once a failure is seen.
///
/// - `ContinueSiblings`: tasks that were already started are allowed to run
///   to completion (default).
/// - `CancelSiblings`: tasks that were already started are aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    #[default]
    ContinueSiblings,
    CancelSiblings,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "continue_siblings" | "continue" => Ok(FailureMode::ContinueSiblings),
            "cancel_siblings" | "cancel" => Ok(FailureMode::CancelSiblings),
            other => Err(format!(
                "invalid failure_mode: {other} (expected \"continue_siblings\" or \"cancel_siblings\")"
            )),
        }
    }
}

/// Which pipeline a command is about to run.
///
/// Some configuration values are only required by one of them (e.g. the
/// compiled bundle names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Local,
    Compile,
}
