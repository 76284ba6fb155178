use crate::modules::decoder::DecodeError;
use crate::modules::expectation::ExpectationMismatch;
use crate::modules::invocation::InvocationError;
use crate::modules::report::ReportError;
use crate::modules::scratch::ScratchError;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarnessErrorCategory {
    Success,
    AssertionFailure,
    InputValidationError,
    ResourceError,
    InvocationError,
    DecodeError,
}

impl HarnessErrorCategory {
    pub const fn exit_mapping(self) -> ExitMapping {
        match self {
            Self::Success => ExitMapping {
                exit_code: 0,
                rust_category: "Success",
                report_class: "PASS",
            },
            Self::AssertionFailure => ExitMapping {
                exit_code: 1,
                rust_category: "AssertionFailure",
                report_class: "FAIL",
            },
            Self::InputValidationError => ExitMapping {
                exit_code: 2,
                rust_category: "InputValidationError",
                report_class: "INPUT_FATAL",
            },
            Self::ResourceError => ExitMapping {
                exit_code: 3,
                rust_category: "ResourceError",
                report_class: "IO_FATAL",
            },
            Self::InvocationError => ExitMapping {
                exit_code: 4,
                rust_category: "InvocationError",
                report_class: "RUN_FATAL",
            },
            Self::DecodeError => ExitMapping {
                exit_code: 5,
                rust_category: "DecodeError",
                report_class: "DECODE_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_mapping().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_mapping().rust_category
    }

    pub const fn report_class(self) -> &'static str {
        self.exit_mapping().report_class
    }

    /// Assertion failures are expected test outcomes, not infrastructure faults.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success | Self::AssertionFailure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitMapping {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub report_class: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{message}")]
    InputValidation {
        placeholder: &'static str,
        message: String,
    },
    #[error(transparent)]
    Resource(#[from] ScratchError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Assertion(#[from] ExpectationMismatch),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl HarnessError {
    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::InputValidation {
            placeholder,
            message: message.into(),
        }
    }

    pub const fn category(&self) -> HarnessErrorCategory {
        match self {
            Self::InputValidation { .. } => HarnessErrorCategory::InputValidationError,
            Self::Resource(_) | Self::Report(_) => HarnessErrorCategory::ResourceError,
            Self::Invocation(_) => HarnessErrorCategory::InvocationError,
            Self::Decode(_) => HarnessErrorCategory::DecodeError,
            Self::Assertion(_) => HarnessErrorCategory::AssertionFailure,
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::InputValidation { placeholder, .. } => placeholder,
            Self::Resource(error) => error.placeholder(),
            Self::Invocation(error) => error.placeholder(),
            Self::Decode(_) => "DECODE.ANALYZER_OUTPUT",
            Self::Assertion(_) => "ASSERT.EXPECTATION",
            Self::Report(error) => error.placeholder(),
        }
    }

    pub const fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category().is_fatal() {
            "ERROR"
        } else {
            "FAIL"
        };
        format!("{}: [{}] {}", severity, self.placeholder(), self)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category()
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}
