use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

use crate::{
    diagnostics::{Diagnostic, OpnError, Result},
    transpiler::Transpiler,
};

const PROMPT: &str = "opn> ";
const CONTINUATION_PROMPT: &str = "  ... ";

/// Outcome of feeding one line to a [`ReplSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// The buffered input is a valid prefix; keep reading.
    NeedMore,
    Complete(String),
    Error {
        diagnostic: Diagnostic,
        source: String,
    },
}

/// Line-oriented transpilation with multi-line continuation.
pub struct ReplSession {
    transpiler: Transpiler,
    buffer: String,
}

impl ReplSession {
    pub fn new(transpiler: Transpiler) -> Self {
        Self {
            transpiler: transpiler.repl(true),
            buffer: String::new(),
        }
    }

    pub fn is_continuing(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn feed(&mut self, line: &str) -> Feed {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);

        match self.transpiler.transpile(&self.buffer) {
            Ok(text) => {
                self.buffer.clear();
                Feed::Complete(text)
            }
            Err(diagnostic) if diagnostic.is_incomplete_input() => {
                debug!(buffered = self.buffer.len(), "awaiting more input");
                Feed::NeedMore
            }
            Err(diagnostic) => Feed::Error {
                diagnostic,
                source: std::mem::take(&mut self.buffer),
            },
        }
    }

    /// Runtime support the REPL output relies on.
    pub fn preamble(&self) -> std::result::Result<String, Diagnostic> {
        self.transpiler.clone().repl(false).transpile("")
    }
}

pub struct Repl {
    session: ReplSession,
}

impl Repl {
    pub fn new(transpiler: Transpiler) -> Self {
        Self {
            session: ReplSession::new(transpiler),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        println!("OPN {} (type 'exit' to quit, ':preamble' for runtime support)", env!("CARGO_PKG_VERSION"));
        loop {
            let prompt = if self.session.is_continuing() {
                CONTINUATION_PROMPT
            } else {
                PROMPT
            };
            match editor.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if !self.session.is_continuing() {
                        match trimmed {
                            "" => continue,
                            "exit" | "exit;" | ":quit" => break,
                            ":preamble" => {
                                match self.session.preamble() {
                                    Ok(text) => print!("{text}"),
                                    Err(diag) => eprintln!("{diag}"),
                                }
                                continue;
                            }
                            _ => {}
                        }
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.session.feed(&line) {
                        Feed::NeedMore => {}
                        Feed::Complete(text) => print!("{text}"),
                        Feed::Error { diagnostic, source } => {
                            eprint!("{}", diagnostic.render("<repl>", &source));
                        }
                    }
                }
                Err(ReadlineError::Interrupted) if self.session.is_continuing() => {
                    self.session.reset();
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }
}

fn readline_error(err: ReadlineError) -> OpnError {
    OpnError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::package::PackageLoader;

    fn session() -> ReplSession {
        ReplSession::new(
            Transpiler::new().loader(Arc::new(PackageLoader::with_roots(Vec::new()))),
        )
    }

    #[test]
    fn single_line_statement_completes() {
        let mut repl = session();
        assert_eq!(
            repl.feed("let x = 2 * 3;"),
            Feed::Complete("x = (2 * 3)\n".to_string())
        );
        assert!(!repl.is_continuing());
    }

    #[test]
    fn open_block_waits_for_more_input() {
        let mut repl = session();
        assert_eq!(repl.feed("for i in 1..3 {"), Feed::NeedMore);
        assert!(repl.is_continuing());
        assert_eq!(repl.feed("    py.print(i);"), Feed::NeedMore);
        match repl.feed("}") {
            Feed::Complete(text) => {
                assert_eq!(text, "for i in range(1, 3 + 1):\n    py_print(2, i)\n");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!repl.is_continuing());
    }

    #[test]
    fn unterminated_string_continues() {
        let mut repl = session();
        assert_eq!(repl.feed("let s = \"first"), Feed::NeedMore);
        assert!(matches!(repl.feed("second\";"), Feed::Complete(_)));
    }

    #[test]
    fn hard_error_clears_buffer() {
        let mut repl = session();
        assert_eq!(repl.feed("if x {"), Feed::NeedMore);
        match repl.feed("let = 1; }") {
            Feed::Error { diagnostic, source } => {
                assert!(diagnostic.is_syntax_error());
                assert!(!diagnostic.is_incomplete_input());
                assert_eq!(source, "if x {\nlet = 1; }");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert!(!repl.is_continuing());
    }

    #[test]
    fn preamble_is_available_separately() {
        let repl = session();
        let preamble = repl.preamble().unwrap();
        assert!(preamble.contains("def profiler(func):"));
        assert!(!preamble.contains("__main__"));
    }
}
