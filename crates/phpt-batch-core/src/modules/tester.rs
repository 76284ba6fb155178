use super::dispatch::DispatchEngine;
use super::expectation::check_expectation;
use super::invocation::{AnalyzerInvoker, ProcessInvoker};
use super::report::{BatchReport, evaluate_batch};
use super::scratch::ScratchDirectory;
use crate::common::TesterConfig;
use crate::domain::{HarnessResult, TestCase};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One analyzer run per distinct argument string.
    #[default]
    Batched,
    /// One analyzer run per case.
    Isolated,
}

impl DispatchMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Batched => "batched",
            Self::Isolated => "isolated",
        }
    }
}

/// Entry point for callers: owns the resolved analyzer location, the scratch
/// directory and the process launcher.
#[derive(Debug)]
pub struct Tester<I = ProcessInvoker> {
    analyzer: PathBuf,
    default_arguments: String,
    scratch: ScratchDirectory,
    invoker: I,
}

impl Tester<ProcessInvoker> {
    pub fn new(config: &TesterConfig) -> HarnessResult<Self> {
        Self::with_invoker(config, ProcessInvoker)
    }
}

impl<I: AnalyzerInvoker> Tester<I> {
    pub fn with_invoker(config: &TesterConfig, invoker: I) -> HarnessResult<Self> {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let analyzer = config.resolved_analyzer_path(&working_dir);
        let scratch = ScratchDirectory::create(config.resolved_scratch_dir())?;
        debug!(
            analyzer = %analyzer.display(),
            scratch = %scratch.path().display(),
            "tester configured"
        );

        Ok(Self {
            analyzer,
            default_arguments: config.default_arguments.clone(),
            scratch,
            invoker,
        })
    }

    pub fn analyzer(&self) -> &Path {
        &self.analyzer
    }

    pub fn default_arguments(&self) -> &str {
        &self.default_arguments
    }

    pub fn scratch(&self) -> &ScratchDirectory {
        &self.scratch
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    fn engine(&self) -> DispatchEngine<'_, I> {
        DispatchEngine::new(
            &self.invoker,
            &self.scratch,
            &self.analyzer,
            &self.default_arguments,
        )
    }

    pub fn run_single(&self, case: &TestCase) -> HarnessResult<String> {
        self.engine().run_single(case)
    }

    /// Runs one case on its own and checks its expectation.
    pub fn test(&self, case: &TestCase) -> HarnessResult<()> {
        let actual = self.run_single(case)?;
        check_expectation(&actual, case.expectation())?;
        Ok(())
    }

    /// Formatted output per case id. Expectations are not applied.
    pub fn run_batch(
        &self,
        cases: &BTreeMap<String, TestCase>,
    ) -> HarnessResult<BTreeMap<String, String>> {
        self.engine().run_batch(cases)
    }

    /// Same result shape as [`Tester::run_batch`], one analyzer run per case.
    pub fn run_isolated(
        &self,
        cases: &BTreeMap<String, TestCase>,
    ) -> HarnessResult<BTreeMap<String, String>> {
        let engine = self.engine();
        let mut results = BTreeMap::new();
        for (id, case) in cases {
            results.insert(id.clone(), engine.run_single(case)?);
        }
        Ok(results)
    }

    pub fn check_batch(
        &self,
        cases: &BTreeMap<String, TestCase>,
        mode: DispatchMode,
    ) -> HarnessResult<BatchReport> {
        let results = match mode {
            DispatchMode::Batched => self.run_batch(cases)?,
            DispatchMode::Isolated => self.run_isolated(cases)?,
        };
        Ok(evaluate_batch(
            cases,
            &results,
            &self.default_arguments,
            mode,
        ))
    }
}
