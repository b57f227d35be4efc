use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command as Process, ExitCode, Stdio},
};

use clap::{Parser, Subcommand};
use opn::{
    config::{Config, LogConfig},
    logging::{self, LogFormat},
    OpnError, Repl, SourceKind, Transpiler,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Parser)]
#[command(author, version, about = "OPN language transpiler")]
struct Args {
    /// Extra package root, searched after the defaults (repeatable)
    #[arg(short = 'I', long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,
    /// Log filter such as `debug` or `warn,parser=trace`; overrides OPN_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Transpile a source file (`-` for stdin) to Python
    Transpile {
        source: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report syntax errors without producing output
    Check { source: PathBuf },
    /// Transpile a source file and execute it with Python
    Run {
        source: PathBuf,
        #[arg(long, default_value = "python3")]
        python: String,
    },
    /// Show where a package resolves and print its metadata
    Package { name: String },
    /// Start an interactive session
    Repl,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Opn(#[from] OpnError),
    /// Diagnostic already rendered against its source.
    #[error("{0}")]
    Rendered(String),
    #[error("{0}")]
    Usage(String),
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Opn(OpnError::Io(err))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&config.log, args.log_format) {
        eprintln!("warning: {err}");
    }

    match execute(args.command.unwrap_or(Command::Repl), &config) {
        Ok(code) => code,
        Err(CliError::Rendered(report)) => {
            eprint!("{report}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> Result<Config, OpnError> {
    let mut config = Config::from_env()?;
    if let Some(filter) = &args.log_level {
        config.log = LogConfig::parse(filter)?;
    }
    config
        .packages
        .search_paths
        .extend(args.search_paths.iter().cloned());
    Ok(config)
}

fn execute(command: Command, config: &Config) -> Result<ExitCode, CliError> {
    let transpiler = config.transpiler();
    debug!(target: "opn::cli", roots = ?transpiler.package_loader().search_roots(), "package roots");
    match command {
        Command::Transpile { source, output } => {
            let python = transpile_file(&transpiler, &source)?;
            match output {
                Some(path) => {
                    fs::write(&path, python)?;
                    println!("Transpiled to: {}", path.display());
                }
                None => io::stdout().write_all(python.as_bytes())?,
            }
        }
        Command::Check { source } => {
            transpile_file(&transpiler, &source)?;
            println!("{}: ok", label(&source));
        }
        Command::Run { source, python } => {
            let code = transpile_file(&transpiler, &source)?;
            return run_python(&python, &code);
        }
        Command::Package { name } => describe_package(config, &name)?,
        Command::Repl => Repl::new(transpiler).run()?,
    }
    Ok(ExitCode::SUCCESS)
}

fn label(path: &Path) -> String {
    if path == Path::new("-") {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

fn read_source(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        return Ok(source);
    }
    if SourceKind::from_path(path) == SourceKind::Data {
        return Err(CliError::Usage(format!(
            "'{}' is a package metadata file, not OPN source",
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|err| {
        CliError::Usage(format!("cannot read '{}': {err}", path.display()))
    })
}

fn transpile_file(transpiler: &Transpiler, path: &Path) -> Result<String, CliError> {
    let source = read_source(path)?;
    let label = label(path);
    transpiler
        .clone()
        .source_path(&label)
        .transpile(&source)
        .map_err(|diagnostic| CliError::Rendered(diagnostic.render(&label, &source)))
}

fn run_python(python: &str, code: &str) -> Result<ExitCode, CliError> {
    info!(target: "opn::cli", interpreter = python, "running generated code");
    let mut child = Process::new(python)
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|err| CliError::Usage(format!("cannot start '{python}': {err}")))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(code.as_bytes())?;
    }
    let status = child.wait()?;
    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

fn describe_package(config: &Config, name: &str) -> Result<(), CliError> {
    let loader = config.packages.loader();
    let Some(dir) = loader.find_package(name) else {
        let roots = loader
            .search_roots()
            .iter()
            .map(|root| format!("  {}", root.display()))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CliError::Usage(format!(
            "no OPN package named '{name}'; searched:\n{roots}"
        )));
    };
    println!("{name}: {}", dir.display());
    if let Some(metadata) = loader.metadata(name) {
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|err| CliError::Usage(format!("cannot display metadata: {err}")))?;
        println!("{json}");
    }
    Ok(())
}
