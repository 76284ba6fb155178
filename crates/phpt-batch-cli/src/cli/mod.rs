mod commands;
mod helpers;

use clap::Parser;
use phpt_batch_core::domain::HarnessError;
use tracing::debug;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let harness_error = error.into_harness_error();
            eprintln!("{}", harness_error.diagnostic_line());
            if let Some(summary_line) = harness_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            harness_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("phpt-batch".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_logging(cli.verbose, cli.debug);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "phpt-batch",
    version,
    about = "Batched static-analyzer fixture runner"
)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the cases of a JSON manifest through the analyzer
    Run(commands::RunArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_cases_command(args),
    }
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("logging initialized at level {}", level);
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn into_harness_error(self) -> HarnessError {
        match self {
            Self::Usage(message) => HarnessError::input_validation("INPUT.CLI_USAGE", message),
            Self::Harness(error) => error,
            Self::Internal(error) => {
                HarnessError::input_validation("INPUT.CLI_MANIFEST", format!("{error:#}"))
            }
        }
    }
}
