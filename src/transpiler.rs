use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use crate::{
    diagnostics::{Diagnostic, OpnError},
    emitter::{uses_graphics, PythonEmitter},
    lexer::Lexer,
    package::{PackageLoader, METADATA_EXTENSION},
    parser::{Parser, DEFAULT_MAX_NESTING},
};

/// What a file on disk holds, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Code,
    /// Package metadata; never handed to the lexer.
    Data,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case(METADATA_EXTENSION) => SourceKind::Data,
            _ => SourceKind::Code,
        }
    }
}

/// Transpiles `source` with default options and the default package roots.
pub fn transpile(source: &str) -> Result<String, Diagnostic> {
    Transpiler::new().transpile(source)
}

/// Configured pipeline from OPN source to Python text.
///
/// A `Transpiler` is cheap to clone; clones share one [`PackageLoader`] and
/// with it the package lookup cache.
#[derive(Debug, Clone)]
pub struct Transpiler {
    repl: bool,
    source_path: Option<PathBuf>,
    loader: Arc<PackageLoader>,
    max_nesting: usize,
}

impl Transpiler {
    pub fn new() -> Self {
        Self {
            repl: false,
            source_path: None,
            loader: Arc::new(PackageLoader::new()),
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Accept loose statements and omit the preamble and entry guard.
    pub fn repl(mut self, repl: bool) -> Self {
        self.repl = repl;
        self
    }

    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn loader(mut self, loader: Arc<PackageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn package_loader(&self) -> &PackageLoader {
        &self.loader
    }

    pub fn transpile(&self, source: &str) -> Result<String, Diagnostic> {
        let path = self
            .source_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string());
        debug!(path = %path, repl = self.repl, bytes = source.len(), "transpiling");

        let tokens = Lexer::new(source).tokenize()?;
        let graphics = uses_graphics(&tokens);
        let program = Parser::new(tokens)
            .with_max_nesting(self.max_nesting)
            .parse_program()?;
        PythonEmitter::new(&self.loader)
            .repl(self.repl)
            .graphics(graphics)
            .max_nesting(self.max_nesting)
            .emit(&program)
    }

    /// Reads and transpiles a file. The file's path becomes the source path.
    pub fn transpile_path(&self, path: impl AsRef<Path>) -> Result<String, OpnError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let output = self.clone().source_path(path).transpile(&source)?;
        Ok(output)
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new()
    }
}
