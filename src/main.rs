use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use streamguard::config::{ConfigError, StreamGuardConfig};
use streamguard::error::{ControlFlowClassifier, ControlFlowContext, ControlFlowGuard, Operation};
use streamguard::logging::{init_logging, LoggingConfig};
use streamguard::record::{evaluate, evaluate_line, Verdict};

/// Operation in flight when the failure surfaced
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliOperation {
    Runtime,
    Client,
    Cancel,
    Shutdown,
}

impl From<CliOperation> for Operation {
    fn from(op: CliOperation) -> Self {
        match op {
            CliOperation::Runtime => Operation::Runtime,
            CliOperation::Client => Operation::Client,
            CliOperation::Cancel => Operation::Cancel,
            CliOperation::Shutdown => Operation::Shutdown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "streamguard")]
#[command(version)]
#[command(about = "Classify stdin stream failures as expected control flow or real errors")]
struct Cli {
    /// Treat failures as raised in stdin stream mode; `--stream-mode=false`
    /// overrides a config file that enables it
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    stream_mode: Option<bool>,

    /// A cancel was requested by the user (`=false` overrides the config file)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    cancel_requested: Option<bool>,

    /// The process is shutting down (`=false` overrides the config file)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    shutting_down: Option<bool>,

    /// Operation in flight when the failure surfaced
    #[arg(long, value_enum, global = true)]
    operation: Option<CliOperation>,

    /// Path to a TOML file with extra patterns and context defaults
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Suppress all log output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet", global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Classify stdin records line by line (default behavior if no command given)
    Filter,
    /// Classify a single plain-text error message; exits 0 when it is expected
    Check {
        /// The error message to classify
        message: String,
    },
}

/// Errors that abort the binary.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode verdict: {0}")]
    Json(#[from] serde_json::Error),
}

impl Cli {
    fn load_config(&self) -> Result<StreamGuardConfig, ConfigError> {
        match &self.config {
            Some(path) => StreamGuardConfig::load(path),
            None => StreamGuardConfig::from_env(),
        }
    }

    /// Config defaults with command-line flags layered on top. A flag given
    /// on the command line replaces the config value.
    fn context(&self, config: &StreamGuardConfig) -> ControlFlowContext {
        let mut context = config.default_context();
        if let Some(enabled) = self.stream_mode {
            context.stdin_stream_mode = enabled;
        }
        if let Some(requested) = self.cancel_requested {
            context.cancel_requested = requested;
        }
        if let Some(shutting_down) = self.shutting_down {
            context.shutting_down = shutting_down;
        }
        if let Some(op) = self.operation {
            context.operation = Some(op.into());
        }
        context
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(LoggingConfig::from_verbosity(cli.verbose));
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = cli.load_config()?;
    let classifier = config.classifier();
    let context = cli.context(&config);

    if !config.uses_builtin_tables() {
        tracing::debug!("using configured pattern extensions");
    }
    tracing::debug!(?context, "resolved default context");

    match &cli.command {
        Some(Commands::Check { message }) => {
            let verdict = evaluate(&classifier, message.as_str(), &context);
            let stdout = io::stdout();
            if !write_verdict(&mut stdout.lock(), &verdict)? {
                tracing::debug!("stdout closed before verdict was written");
            }
            Ok(if verdict.expected {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(Commands::Filter) | None => filter(&classifier, context),
    }
}

/// Writes one verdict line. Returns `false` when stdout has been closed.
fn write_verdict(out: &mut impl Write, verdict: &Verdict) -> Result<bool, CliError> {
    // A closed stdout means the reader went away; we are tearing down too.
    let guard = ControlFlowGuard::new(ControlFlowContext::stream().with_shutting_down(true));

    let encoded = serde_json::to_string(verdict)?;
    let written = guard.absorb(writeln!(out, "{}", encoded).and_then(|_| out.flush()))?;
    Ok(written.is_some())
}

/// Reads records from stdin and writes one verdict per line to stdout.
fn filter(
    classifier: &ControlFlowClassifier,
    context: ControlFlowContext,
) -> Result<ExitCode, CliError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut buf = Vec::new();
    let mut line_number: usize = 0;
    let mut processed: usize = 0;
    let mut expected: usize = 0;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;

        let verdict = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match evaluate_line(classifier, line, context) {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!(line = line_number, "skipping record: {}", e);
                    Verdict::rejected(e.to_string())
                }
            },
            Err(e) => {
                tracing::warn!(line = line_number, "skipping record: invalid UTF-8: {}", e);
                Verdict::rejected(format!("invalid UTF-8: {}", e))
            }
        };

        processed += 1;
        if verdict.expected {
            expected += 1;
        }

        if !write_verdict(&mut out, &verdict)? {
            tracing::debug!("stdout closed, stopping");
            return Ok(ExitCode::SUCCESS);
        }
    }

    tracing::info!(processed, expected, "finished classifying records");
    Ok(ExitCode::SUCCESS)
}
