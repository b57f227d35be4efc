//! Subscriber setup for binaries. Library code only emits `tracing` events.
//!
//! Every phase logs under its own target (`opn::lexer`, `opn::parser`, ...),
//! so a [`LogConfig`] can raise one phase without flooding the others. Output
//! always goes to stderr; stdout carries generated code.

use std::io;

use clap::ValueEnum;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::{
    config::{LogConfig, Phase},
    diagnostics::OpnError,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

pub fn targets(log_config: &LogConfig) -> Targets {
    Phase::ALL
        .into_iter()
        .fold(Targets::new().with_default(log_config.global), |targets, phase| {
            targets.with_target(phase.target(), log_config.level_for(phase))
        })
        .with_target("opn::cli", log_config.global)
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(log_config: &LogConfig, format: LogFormat) -> Result<(), OpnError> {
    let layer = create_format_layer(format).with_filter(targets(log_config));
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|err| OpnError::Config(format!("cannot install logger: {err}")))
}

fn create_format_layer(format: LogFormat) -> impl Layer<tracing_subscriber::Registry> {
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn targets_enable_per_phase() {
        let cfg = LogConfig {
            global: Level::ERROR,
            parser: Some(Level::DEBUG),
            ..Default::default()
        };
        let targets = targets(&cfg);
        assert!(targets.would_enable("opn::parser", &Level::DEBUG));
        assert!(!targets.would_enable("opn::lexer", &Level::DEBUG));
        assert!(targets.would_enable("opn::lexer", &Level::ERROR));
    }
}
