//! OPN to Python 3 transpiler.
//!
//! Source text goes through [`lexer`], [`parser`] and [`emitter`]; the
//! [`transpiler`] module wires the phases together and resolves `import`s of
//! first-party packages through a [`PackageLoader`].

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod lexer;
pub mod logging;
pub mod package;
pub mod parser;
pub mod repl;
pub mod transpiler;

pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind, OpnError, Position};
pub use package::{ImportResolution, PackageLoader, PackageMetadata};
pub use repl::{Feed, Repl, ReplSession};
pub use transpiler::{transpile, SourceKind, Transpiler};
