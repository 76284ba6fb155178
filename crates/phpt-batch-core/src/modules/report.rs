use super::dispatch::partition_by_arguments;
use super::expectation::check_expectation;
use super::tester::DispatchMode;
use crate::domain::{ExpectationKind, TestCase};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub mode: DispatchMode,
    pub default_arguments: String,
    pub case_count: usize,
    pub passed_case_count: usize,
    pub failed_case_count: usize,
    /// Distinct effective argument strings among the cases.
    pub argument_group_count: usize,
    /// Processes launched: one per argument group when batched, one per case
    /// when isolated.
    pub analyzer_run_count: usize,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub id: String,
    pub passed: bool,
    pub arguments: String,
    pub expectation: ExpectationKind,
    pub expected: String,
    pub actual: Option<String>,
    pub first_mismatch_line: Option<usize>,
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory '{}': {source}", path.display())]
    ReportDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", path.display())]
    SerializeReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::ReportDirectory { .. } | Self::WriteReport { .. } => "IO.REPORT_FILESYSTEM",
            Self::SerializeReport { .. } => "IO.REPORT_SERIALIZE",
        }
    }
}

/// Applies each case's expectation to its formatted output.
pub fn evaluate_batch(
    cases: &BTreeMap<String, TestCase>,
    results: &BTreeMap<String, String>,
    default_arguments: &str,
    mode: DispatchMode,
) -> BatchReport {
    let case_reports = cases
        .iter()
        .map(|(id, case)| evaluate_case(id, case, results.get(id), default_arguments))
        .collect::<Vec<_>>();

    let case_count = case_reports.len();
    let passed_case_count = case_reports.iter().filter(|case| case.passed).count();
    let failed_case_count = case_count.saturating_sub(passed_case_count);
    let argument_group_count = partition_by_arguments(cases, default_arguments).len();
    let analyzer_run_count = match mode {
        DispatchMode::Batched => argument_group_count,
        DispatchMode::Isolated => case_count,
    };

    BatchReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: failed_case_count == 0,
        mode,
        default_arguments: default_arguments.to_string(),
        case_count,
        passed_case_count,
        failed_case_count,
        argument_group_count,
        analyzer_run_count,
        cases: case_reports,
    }
}

fn evaluate_case(
    id: &str,
    case: &TestCase,
    actual: Option<&String>,
    default_arguments: &str,
) -> CaseReport {
    let expectation = case.expectation();
    let mut report = CaseReport {
        id: id.to_string(),
        passed: false,
        arguments: case.effective_arguments(default_arguments).to_string(),
        expectation: expectation.kind(),
        expected: expectation.text().to_string(),
        actual: actual.cloned(),
        first_mismatch_line: None,
        reason: None,
    };

    let Some(actual) = actual else {
        report.reason = Some("no analyzer result was produced for this case".to_string());
        return report;
    };

    match check_expectation(actual, expectation) {
        Ok(()) => report.passed = true,
        Err(mismatch) => {
            report.first_mismatch_line = mismatch.first_mismatch_line;
            report.reason = Some(mismatch.to_string());
        }
    }
    report
}

pub fn render_human_summary(report: &BatchReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Batch status: {}", status));
    lines.push(format!(
        "Cases: {} total ({} passed, {} failed)",
        report.case_count, report.passed_case_count, report.failed_case_count
    ));
    lines.push(format!(
        "Analyzer runs: {} over {} argument group(s), {} dispatch",
        report.analyzer_run_count, report.argument_group_count, report.mode.as_str()
    ));

    for case in &report.cases {
        let case_status = if case.passed { "PASS" } else { "FAIL" };
        lines.push(format!(
            "Case {}: {} ({} expectation, arguments='{}')",
            case.id, case_status, case.expectation, case.arguments
        ));

        if !case.passed {
            let reason = case
                .reason
                .as_deref()
                .unwrap_or("expectation failed without a reason");
            lines.extend(reason.lines().map(|line| format!("  {line}")));
        }
    }

    lines.join("\n")
}

pub fn write_report_file(report_path: &Path, report: &BatchReport) -> Result<(), ReportError> {
    if let Some(parent_dir) = report_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| ReportError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| ReportError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| ReportError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
