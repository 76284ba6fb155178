//! One analyzer process call per argument group.
//!
//! The command is an explicit argv: the argument string is split once with
//! POSIX shell-word rules and every file path is its own argv entry, so no
//! shell is involved and paths need no escaping.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub const OUTPUT_FORMAT_FLAG: &str = "--output-format=json";

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("cannot split analyzer arguments '{arguments}': {source}")]
    InvalidArguments {
        arguments: String,
        #[source]
        source: shell_words::ParseError,
    },
    #[error("failed to launch analyzer `{command_line}`: {source}")]
    Launch {
        command_line: String,
        #[source]
        source: std::io::Error,
    },
    #[error("analyzer `{command_line}` produced no output ({detail})")]
    NoOutput {
        command_line: String,
        detail: String,
    },
}

impl InvocationError {
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "RUN.ANALYZER_ARGUMENTS",
            Self::Launch { .. } => "RUN.ANALYZER_LAUNCH",
            Self::NoOutput { .. } => "RUN.ANALYZER_NO_OUTPUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationCommand {
    program: PathBuf,
    arguments: String,
    tokens: Vec<String>,
    files: Vec<PathBuf>,
}

impl InvocationCommand {
    pub fn build(
        program: impl Into<PathBuf>,
        arguments: &str,
        files: Vec<PathBuf>,
    ) -> Result<Self, InvocationError> {
        let tokens =
            shell_words::split(arguments).map_err(|source| InvocationError::InvalidArguments {
                arguments: arguments.to_string(),
                source,
            })?;
        Ok(Self {
            program: program.into(),
            arguments: arguments.to_string(),
            tokens,
            files,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The untokenized argument string this command was built from.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Everything after the program name, in spawn order.
    pub fn argv(&self) -> Vec<OsString> {
        std::iter::once(OsString::from(OUTPUT_FORMAT_FLAG))
            .chain(self.tokens.iter().map(OsString::from))
            .chain(self.files.iter().map(OsString::from))
            .collect()
    }

    /// Shell-quoted rendering for error messages and logs. The output format
    /// flag is a fixed safe word and stays unquoted.
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        let mut line = format!("{} {}", shell_words::quote(&program), OUTPUT_FORMAT_FLAG);

        let mut rest = self.tokens.clone();
        for file in &self.files {
            rest.push(file.to_string_lossy().into_owned());
        }
        if !rest.is_empty() {
            line.push(' ');
            line.push_str(&shell_words::join(rest));
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

pub trait AnalyzerInvoker {
    fn invoke(&self, command: &InvocationCommand) -> Result<InvocationOutput, InvocationError>;
}

/// Spawns the analyzer and blocks until it exits. No timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

impl AnalyzerInvoker for ProcessInvoker {
    fn invoke(&self, command: &InvocationCommand) -> Result<InvocationOutput, InvocationError> {
        debug!(command = %command.command_line(), "invoking analyzer");

        let output = Command::new(command.program())
            .args(command.argv())
            .output()
            .map_err(|source| InvocationError::Launch {
                command_line: command.command_line(),
                source,
            })?;

        let exit_code = output.status.code();
        if output.stdout.is_empty() && exit_code.is_none() {
            return Err(InvocationError::NoOutput {
                command_line: command.command_line(),
                detail: format!("terminated by signal ({})", output.status),
            });
        }

        debug!(
            exit_code = ?exit_code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "analyzer finished"
        );
        Ok(InvocationOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
