pub mod errors;

pub use errors::{ExitMapping, HarnessError, HarnessErrorCategory, HarnessResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Expected analyzer output for one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Byte-for-byte comparison.
    Exact(String),
    /// Template with `%d`, `%s`, `%a`-style placeholders.
    Format(String),
}

impl Expectation {
    pub fn exact(expected: impl Into<String>) -> Self {
        Self::Exact(expected.into())
    }

    pub fn format(template: impl Into<String>) -> Self {
        Self::Format(template.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Exact(text) | Self::Format(text) => text,
        }
    }

    pub const fn kind(&self) -> ExpectationKind {
        match self {
            Self::Exact(_) => ExpectationKind::Exact,
            Self::Format(_) => ExpectationKind::Format,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationKind {
    Exact,
    Format,
}

impl ExpectationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Format => "format",
        }
    }
}

impl Display for ExpectationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One declared test: PHP code, what the analyzer should say about it, and
/// where the code started in the file that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    code: String,
    expectation: Expectation,
    code_first_line: usize,
    arguments: Option<String>,
}

impl TestCase {
    pub fn new(
        code: impl Into<String>,
        expectation: Expectation,
        code_first_line: usize,
    ) -> HarnessResult<Self> {
        if code_first_line == 0 {
            return Err(HarnessError::input_validation(
                "INPUT.CODE_FIRST_LINE",
                "code first line must be a positive 1-based line number, got 0",
            ));
        }

        Ok(Self {
            code: code.into(),
            expectation,
            code_first_line,
            arguments: None,
        })
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub const fn code_first_line(&self) -> usize {
        self.code_first_line
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    /// Per-case override when declared, otherwise the tester default.
    pub fn effective_arguments<'a>(&'a self, default_arguments: &'a str) -> &'a str {
        self.arguments.as_deref().unwrap_or(default_arguments)
    }
}

/// One finding reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub line_from: i64,
    pub column_from: i64,
    pub message: String,
    pub file_path: String,
    /// Attributes the harness does not interpret (severity, snippet, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DiagnosticRecord {
    pub fn new(
        kind: impl Into<String>,
        line_from: i64,
        column_from: i64,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            line_from,
            column_from,
            message: message.into(),
            file_path: file_path.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn corrected_line(&self, code_first_line: usize) -> i64 {
        self.line_from + code_first_line as i64 - 1
    }
}
