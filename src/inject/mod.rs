// src/inject/mod.rs

//! Marker-region injection into an HTML template.
//!
//! A region is delimited by a start tag such as `<!-- inject:js -->` and an
//! end tag (default `<!-- endinject -->`). Injection replaces whatever sits
//! between the two tags with one reference per input:
//!
//! ```text
//!     <!-- inject:js -->
//!     <script src="lib/a.js"></script>
//!     <script src="lib/b.js"></script>
//!     <!-- endinject -->
//! ```
//!
//! Only the text strictly between the tags changes. Output is a pure
//! function of the template and the inputs, so injecting into the same
//! original template twice yields the same result.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::errors::{PipelineError, Result};

pub const DEFAULT_END_TAG: &str = "<!-- endinject -->";

/// A start / end tag pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerRegion {
    pub start_tag: String,
    pub end_tag: String,
}

impl MarkerRegion {
    pub fn new(start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        Self {
            start_tag: start_tag.into(),
            end_tag: end_tag.into(),
        }
    }

    /// `<!-- inject:<name> -->` closed by [`DEFAULT_END_TAG`].
    pub fn named(name: &str) -> Self {
        Self::new(format!("<!-- inject:{name} -->"), DEFAULT_END_TAG)
    }
}

/// A region plus the references to emit into it, in emit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub region: MarkerRegion,
    pub references: Vec<String>,
}

impl Injection {
    pub fn new(region: MarkerRegion, references: Vec<String>) -> Self {
        Self { region, references }
    }
}

/// Rewrites marker regions of a template.
#[derive(Debug, Clone)]
pub struct Injector {
    injections: Vec<Injection>,
}

impl Injector {
    /// Build an injector; start tags must be distinct and no tag may be
    /// empty.
    pub fn new(injections: Vec<Injection>) -> Result<Self> {
        let mut seen = HashSet::new();
        for inj in &injections {
            if inj.region.start_tag.is_empty() || inj.region.end_tag.is_empty() {
                return Err(PipelineError::ConfigError(
                    "injection marker tags must not be empty".to_string(),
                ));
            }
            if inj.region.start_tag == inj.region.end_tag {
                return Err(PipelineError::ConfigError(format!(
                    "injection region '{}' uses the same tag to start and end",
                    inj.region.start_tag
                )));
            }
            if !seen.insert(inj.region.start_tag.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate injection region '{}'",
                    inj.region.start_tag
                )));
            }
        }
        Ok(Self { injections })
    }

    /// Apply every injection to `template`.
    ///
    /// Regions whose tags are absent, and regions with no references, leave
    /// the template untouched.
    pub fn inject(&self, template: &str) -> String {
        let mut text = template.to_string();
        for inj in &self.injections {
            if inj.references.is_empty() {
                debug!(region = %inj.region.start_tag, "nothing to inject");
                continue;
            }
            text = inject_region(&text, &inj.region, &inj.references);
        }
        text
    }
}

/// Replace the content of every occurrence of `region` in `text`.
fn inject_region(text: &str, region: &MarkerRegion, references: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut replaced = 0usize;

    while let Some(start) = rest.find(&region.start_tag) {
        let after_start = start + region.start_tag.len();
        let Some(end_rel) = rest[after_start..].find(&region.end_tag) else {
            break;
        };
        let end = after_start + end_rel;

        let indent = line_indent(text, text.len() - rest.len() + start);

        out.push_str(&rest[..after_start]);
        for reference in references {
            out.push('\n');
            out.push_str(indent);
            out.push_str(&render_reference(reference));
        }
        out.push('\n');
        out.push_str(indent);
        out.push_str(&region.end_tag);

        rest = &rest[end + region.end_tag.len()..];
        replaced += 1;
    }
    out.push_str(rest);

    debug!(
        region = %region.start_tag,
        occurrences = replaced,
        references = references.len(),
        "injected region"
    );
    out
}

/// Leading whitespace of the line containing byte offset `pos`.
fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..pos];
    let ws_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..ws_len]
}

/// Render one reference as the tag that loads it.
///
/// `.js` -> `<script>`, `.css` -> `<link>`, anything else is emitted as-is.
pub fn render_reference(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".js") {
        format!("<script src=\"{path}\"></script>")
    } else if lower.ends_with(".css") {
        format!("<link rel=\"stylesheet\" href=\"{path}\">")
    } else {
        path.to_string()
    }
}

/// `path` relative to `root`, with `/` separators and no leading slash.
///
/// Paths outside `root` are rendered as given.
pub fn reference_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rendered = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != "." && c != "/" && c != "\\")
        .collect::<Vec<_>>()
        .join("/");
    rendered.trim_start_matches('/').to_string()
}
