//! Runtime configuration.
//!
//! A [`Config`] is an ordinary value: build it with `Default`, from the
//! environment with [`Config::from_env`], then let command-line flags
//! override individual fields.
//!
//! ```
//! use opn::config::{Config, LogConfig, Phase};
//! use tracing::Level;
//!
//! let cfg = Config {
//!     log: LogConfig {
//!         global: Level::WARN,
//!         parser: Some(Level::DEBUG),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! assert_eq!(cfg.log.level_for(Phase::Parser), Level::DEBUG);
//! ```

use std::{
    env,
    ffi::OsString,
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

use tracing::Level;

use crate::{
    diagnostics::OpnError,
    package::PackageLoader,
    parser::DEFAULT_MAX_NESTING,
    transpiler::Transpiler,
};

/// Log filter, e.g. `warn` or `info,parser=debug`.
pub const LOG_ENV: &str = "OPN_LOG";
/// Extra package roots in the platform's path-list syntax.
pub const PATH_ENV: &str = "OPN_PATH";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub log: LogConfig,
    pub packages: PackageConfig,
    pub limits: LimitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub global: Level,
    /// `None` falls back to `global`.
    pub lexer: Option<Level>,
    pub parser: Option<Level>,
    pub emitter: Option<Level>,
    pub package: Option<Level>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageConfig {
    /// Searched after the default roots, in order.
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitConfig {
    pub max_nesting: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Lexer,
    Parser,
    Emitter,
    Package,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Lexer, Phase::Parser, Phase::Emitter, Phase::Package];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Emitter => "emitter",
            Phase::Package => "package",
        }
    }

    /// The `tracing` target the phase logs under.
    pub fn target(&self) -> String {
        format!("opn::{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = OpnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OpnError::Config(format!("unknown log phase '{s}'")))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            lexer: None,
            parser: None,
            emitter: None,
            package: None,
        }
    }
}

impl LogConfig {
    pub fn level_for(&self, phase: Phase) -> Level {
        let specific = match phase {
            Phase::Lexer => self.lexer,
            Phase::Parser => self.parser,
            Phase::Emitter => self.emitter,
            Phase::Package => self.package,
        };
        specific.unwrap_or(self.global)
    }

    fn slot(&mut self, phase: Phase) -> &mut Option<Level> {
        match phase {
            Phase::Lexer => &mut self.lexer,
            Phase::Parser => &mut self.parser,
            Phase::Emitter => &mut self.emitter,
            Phase::Package => &mut self.package,
        }
    }

    /// Parses a comma-separated filter. A bare level sets the global level;
    /// `phase=level` overrides one phase.
    pub fn parse(filter: &str) -> Result<Self, OpnError> {
        let mut config = LogConfig::default();
        for directive in filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((phase, level)) => {
                    let phase: Phase = phase.trim().parse()?;
                    *config.slot(phase) = Some(parse_level(level.trim())?);
                }
                None => config.global = parse_level(directive)?,
            }
        }
        Ok(config)
    }
}

fn parse_level(text: &str) -> Result<Level, OpnError> {
    Level::from_str(text).map_err(|_| OpnError::Config(format!("unknown log level '{text}'")))
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

impl PackageConfig {
    pub fn loader(&self) -> PackageLoader {
        let mut loader = PackageLoader::new();
        for path in &self.search_paths {
            loader.add_search_path(path.clone());
        }
        loader
    }
}

impl Config {
    pub fn from_env() -> Result<Self, OpnError> {
        Self::from_vars(env::var(LOG_ENV).ok(), env::var_os(PATH_ENV))
    }

    /// Builds a config from raw `OPN_LOG` and `OPN_PATH` values.
    pub fn from_vars(log: Option<String>, path: Option<OsString>) -> Result<Self, OpnError> {
        let mut config = Config::default();
        if let Some(filter) = log {
            config.log = LogConfig::parse(&filter)?;
        }
        if let Some(paths) = path {
            config.packages.search_paths = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        Ok(config)
    }

    pub fn transpiler(&self) -> Transpiler {
        Transpiler::new()
            .loader(Arc::new(self.packages.loader()))
            .max_nesting(self.limits.max_nesting)
    }
}
