pub mod decoder;
pub mod dispatch;
pub mod expectation;
pub mod formatter;
pub mod invocation;
pub mod report;
pub mod scratch;
pub mod tester;

pub use decoder::{DecodeError, decode_diagnostics};
pub use dispatch::{DispatchEngine, InvocationGroup, demultiplex, partition_by_arguments};
pub use expectation::{ExpectationMismatch, FormatPattern, check_expectation, matches};
pub use formatter::format_diagnostics;
pub use invocation::{
    AnalyzerInvoker, InvocationCommand, InvocationError, InvocationOutput, ProcessInvoker,
};
pub use report::{
    BatchReport, CaseReport, ReportError, evaluate_batch, render_human_summary, write_report_file,
};
pub use scratch::{CodeFile, ScratchDirectory, ScratchError};
pub use tester::{DispatchMode, Tester};
