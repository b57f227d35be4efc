use std::fmt;

use thiserror::Error;

/// A 1-based line/column pair in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Phase that raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Emit,
}

/// The structured error surfaced by every phase of the transpiler.
///
/// A diagnostic with a position is a syntax-phase error and can be rendered
/// with a pointer into the source line. One without a position comes from
/// emission and indicates a grammar/emitter mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Option<Position>,
    pub hint: Option<String>,
    /// Set when the input ended in the middle of a construct. The REPL
    /// treats these as a request for more input.
    pub incomplete: bool,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
            hint: None,
            incomplete: false,
        }
    }

    pub fn lexer(message: impl Into<String>, position: Position) -> Self {
        Self::new(DiagnosticKind::Lexer, message).with_position(position)
    }

    pub fn parser(message: impl Into<String>, position: Position) -> Self {
        Self::new(DiagnosticKind::Parser, message).with_position(position)
    }

    pub fn emit(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Emit, message)
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }

    pub fn line(&self) -> Option<usize> {
        self.position.map(|p| p.line)
    }

    pub fn column(&self) -> Option<usize> {
        self.position.map(|p| p.column)
    }

    pub fn is_syntax_error(&self) -> bool {
        self.position.is_some()
    }

    /// Whether a REPL should keep buffering instead of reporting this error.
    pub fn is_incomplete_input(&self) -> bool {
        self.incomplete
    }

    /// Renders the diagnostic with the offending source line and a caret
    /// under the reported column.
    pub fn render(&self, source_path: &str, source: &str) -> String {
        let title = if self.is_syntax_error() {
            "Syntax error"
        } else {
            "Emit error"
        };
        let header = format!("--- {title} ---");
        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');

        match self.position {
            Some(position) => {
                out.push_str(&format!("at {source_path}:{position}\n\n"));
                out.push_str(&format!("problem: {}\n\n", self.message));
                let line_text = source
                    .lines()
                    .nth(position.line.saturating_sub(1))
                    .unwrap_or("");
                let gutter = position.line.to_string();
                out.push_str(&format!("  {gutter} | {line_text}\n"));
                out.push_str(&format!(
                    "  {} | {}^\n",
                    " ".repeat(gutter.len()),
                    caret_padding(line_text, position.column)
                ));
                if let Some(hint) = &self.hint {
                    out.push_str(&format!("\nhint: {hint}\n"));
                }
            }
            None => {
                out.push_str(&self.message);
                out.push('\n');
            }
        }

        out.push_str(&"-".repeat(header.len()));
        out.push('\n');
        out
    }
}

/// Whitespace that lines a caret up under `column`, keeping tabs so the
/// terminal expands them the same way as in the echoed source line.
fn caret_padding(line_text: &str, column: usize) -> String {
    let width = column.saturating_sub(1);
    let mut padding: String = line_text
        .chars()
        .take(width)
        .map(|ch| if ch == '\t' { '\t' } else { ' ' })
        .collect();
    let taken = padding.chars().count();
    padding.extend(std::iter::repeat(' ').take(width - taken));
    padding
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(position) = self.position {
            write!(
                f,
                " at line {}, column {}",
                position.line, position.column
            )?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for callers that combine transpilation with I/O.
#[derive(Debug, Error)]
pub enum OpnError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OpnError>;
