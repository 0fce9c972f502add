// src/stage/plugins.rs

//! Built-in transforms: lint, concat, and JS / CSS minifiers.
//!
//! These are deliberately small. The minifiers strip comments and
//! redundant whitespace; they do not rename or restructure code.

use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Result};
use regex::Regex;

use crate::stage::transform::{FileItem, FileTransform, MergeTransform, TransformMode};

/// Advisory style checks for JavaScript sources.
///
/// Reports trailing whitespace, `debugger` statements, loose (`==` / `!=`)
/// comparisons and overlong lines. Findings never block the stage.
#[derive(Debug, Clone)]
pub struct Lint {
    max_line_length: usize,
}

static TRAILING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+$").expect("static regex"));
static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdebugger\b").expect("static regex"));
static LOOSE_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^=!<>])(==|!=)($|[^=])").expect("static regex"));

impl Lint {
    /// `max_line_length = 0` disables the line-length rule.
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// All findings for `text`, as `line N: message` strings.
    pub fn check(&self, text: &str) -> Vec<String> {
        let mut findings = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let n = idx + 1;
            if TRAILING_WS.is_match(line) {
                findings.push(format!("line {n}: trailing whitespace"));
            }
            if DEBUGGER.is_match(line) {
                findings.push(format!("line {n}: forgotten 'debugger' statement"));
            }
            if let Some(caps) = LOOSE_EQ.captures(line) {
                let op = &caps[2];
                findings.push(format!("line {n}: expected '{op}=' and instead saw '{op}'"));
            }
            if self.max_line_length > 0 && line.chars().count() > self.max_line_length {
                findings.push(format!(
                    "line {n}: line too long ({} > {})",
                    line.chars().count(),
                    self.max_line_length
                ));
            }
        }
        findings
    }
}

impl FileTransform for Lint {
    fn name(&self) -> &str {
        "lint"
    }

    fn mode(&self) -> TransformMode {
        TransformMode::Advisory
    }

    fn apply(&self, file: FileItem) -> Result<FileItem> {
        let findings = self.check(file.text()?);
        if findings.is_empty() {
            return Ok(file);
        }
        Err(anyhow!(
            "{} issue(s):\n  {}",
            findings.len(),
            findings.join("\n  ")
        ))
    }
}

/// Concatenate all inputs into one file named `file_name`.
#[derive(Debug, Clone)]
pub struct Concat {
    file_name: String,
    separator: String,
}

impl Concat {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            separator: "\n".to_string(),
        }
    }
}

impl MergeTransform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn merge(&self, files: Vec<FileItem>) -> Result<Option<FileItem>> {
        if files.is_empty() {
            return Ok(None);
        }

        let mut contents = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&file.contents);
        }

        Ok(Some(FileItem::new(
            self.file_name.clone(),
            PathBuf::from(&self.file_name),
            contents,
        )))
    }
}

/// Strip comments and layout whitespace from JavaScript.
///
/// Line breaks between statements are kept so automatic semicolon insertion
/// behaves as in the input. Strings, template literals and regex literals
/// are copied verbatim.
#[derive(Debug, Clone, Default)]
pub struct MinifyJs;

impl FileTransform for MinifyJs {
    fn name(&self) -> &str {
        "minify-js"
    }

    fn apply(&self, file: FileItem) -> Result<FileItem> {
        let out = minify_js(file.text()?)?;
        Ok(file.with_contents(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsState {
    Code,
    Str(char),
    Template,
    Regex { in_class: bool },
    LineComment,
    BlockComment,
}

/// Comment/whitespace stripper behind [`MinifyJs`].
pub fn minify_js(src: &str) -> Result<String> {
    let mut out = String::with_capacity(src.len());
    let mut state = JsState::Code;
    let mut chars = src.chars().peekable();
    let mut line = 1usize;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match state {
            JsState::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = JsState::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = JsState::BlockComment;
                }
                '/' if regex_allowed(&out) => {
                    out.push(c);
                    state = JsState::Regex { in_class: false };
                }
                '\'' | '"' => {
                    out.push(c);
                    state = JsState::Str(c);
                }
                '`' => {
                    out.push(c);
                    state = JsState::Template;
                }
                '\n' | '\r' => end_line(&mut out),
                ' ' | '\t' => {
                    if !(out.is_empty() || out.ends_with('\n') || out.ends_with(' ')) {
                        out.push(' ');
                    }
                }
                _ => out.push(c),
            },
            JsState::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == quote {
                    state = JsState::Code;
                } else if c == '\n' {
                    bail!("unterminated string literal at line {}", line - 1);
                }
            }
            JsState::Template => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == '`' {
                    state = JsState::Code;
                }
            }
            JsState::Regex { in_class } => {
                out.push(c);
                match c {
                    '\\' => {
                        if let Some(next) = chars.next() {
                            out.push(next);
                        }
                    }
                    '[' => state = JsState::Regex { in_class: true },
                    ']' => state = JsState::Regex { in_class: false },
                    '/' if !in_class => state = JsState::Code,
                    '\n' => bail!("unterminated regex literal at line {}", line - 1),
                    _ => {}
                }
            }
            JsState::LineComment => {
                if c == '\n' {
                    end_line(&mut out);
                    state = JsState::Code;
                }
            }
            JsState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = JsState::Code;
                    // `a/* x */b` must not become `ab`.
                    if !(out.is_empty() || out.ends_with('\n') || out.ends_with(' ')) {
                        out.push(' ');
                    }
                }
            }
        }
    }

    match state {
        JsState::Str(_) => bail!("unterminated string literal at end of input"),
        JsState::Template => bail!("unterminated template literal at end of input"),
        JsState::Regex { .. } => bail!("unterminated regex literal at end of input"),
        JsState::BlockComment => bail!("unterminated block comment at end of input"),
        JsState::Code | JsState::LineComment => {}
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    Ok(out)
}

/// Close the current output line: drop trailing blanks, skip empty lines.
fn end_line(out: &mut String) {
    let trimmed_len = out.trim_end_matches([' ', '\t']).len();
    out.truncate(trimmed_len);
    if !(out.is_empty() || out.ends_with('\n')) {
        out.push('\n');
    }
}

/// Keywords after which an expression, and so a regex literal, may start.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "case", "in", "of", "throw", "new", "delete", "void",
    "yield", "await", "do", "else",
];

/// Whether a `/` at this point starts a regex literal rather than a division.
///
/// Decided by the previous token: a value (identifier, number, `)`, `]`,
/// postfix `++`/`--`) makes it a division, anything else a regex.
fn regex_allowed(out: &str) -> bool {
    let code = out.trim_end();
    let Some(prev) = code.chars().last() else {
        return true;
    };

    if is_ident_char(prev) {
        let start = code
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_ident_char(*c))
            .last()
            .map_or(code.len(), |(i, _)| i);
        let word = &code[start..];
        // `obj.return / 2` is a property access, not the keyword.
        let is_property = code[..start].trim_end().ends_with('.');
        return !is_property && REGEX_KEYWORDS.contains(&word);
    }

    match prev {
        ')' | ']' => false,
        '+' | '-' => {
            // `i++ / 2` divides; `a + /x/.source` does not.
            let mut tail = code.chars().rev();
            tail.next();
            tail.next() != Some(prev)
        }
        _ => matches!(
            prev,
            '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '*' | '%'
                | '<' | '>' | '~' | '^'
        ),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

static CSS_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static CSS_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{};,>])\s*").expect("static regex"));
static CSS_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s+").expect("static regex"));

/// Strip all comments (including `/*! ... */`) and redundant whitespace
/// from CSS.
#[derive(Debug, Clone, Default)]
pub struct MinifyCss;

impl FileTransform for MinifyCss {
    fn name(&self) -> &str {
        "minify-css"
    }

    fn apply(&self, file: FileItem) -> Result<FileItem> {
        let out = minify_css(file.text()?)?;
        Ok(file.with_contents(out))
    }
}

/// Stripper behind [`MinifyCss`].
///
/// Comments are dropped and whitespace is collapsed between tokens; quoted
/// strings are copied verbatim.
pub fn minify_css(src: &str) -> Result<String> {
    let mut out = String::with_capacity(src.len());
    for piece in split_css(src)? {
        match piece {
            CssPiece::Code(code) => {
                let collapsed = CSS_WS.replace_all(&code, " ");
                let tight = CSS_PUNCT.replace_all(&collapsed, "$1");
                let tight = CSS_COLON.replace_all(&tight, ":");
                out.push_str(&tight.replace(";}", "}"));
            }
            CssPiece::Str(literal) => out.push_str(&literal),
        }
    }
    Ok(out.trim().to_string())
}

#[derive(Debug, PartialEq, Eq)]
enum CssPiece {
    Code(String),
    /// A quoted string including its quotes.
    Str(String),
}

/// Split CSS into code and string literals, dropping comments.
///
/// A comment between two code runs becomes nothing, so `a/**/b` joins.
fn split_css(src: &str) -> Result<Vec<CssPiece>> {
    let mut pieces = Vec::new();
    let mut code = String::new();
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    bail!("unterminated comment");
                }
            }
            '"' | '\'' => {
                if !code.is_empty() {
                    pieces.push(CssPiece::Code(std::mem::take(&mut code)));
                }
                let mut literal = String::from(c);
                let mut closed = false;
                while let Some(next) = chars.next() {
                    literal.push(next);
                    if next == '\\' {
                        if let Some(escaped) = chars.next() {
                            literal.push(escaped);
                        }
                    } else if next == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    bail!("unterminated string {literal:?}");
                }
                pieces.push(CssPiece::Str(literal));
            }
            _ => code.push(c),
        }
    }

    if !code.is_empty() {
        pieces.push(CssPiece::Code(code));
    }
    Ok(pieces)
}
