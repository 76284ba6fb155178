//! Tester configuration: analyzer location, default analyzer arguments and the
//! scratch directory used for materialized code files.

use std::path::{Path, PathBuf};

pub const ANALYZER_ENV: &str = "PHPT_BATCH_ANALYZER";
pub const ARGUMENTS_ENV: &str = "PHPT_BATCH_ARGUMENTS";
pub const SCRATCH_DIR_ENV: &str = "PHPT_BATCH_SCRATCH_DIR";

pub const DEFAULT_ANALYZER_RELATIVE_PATH: &str = "vendor/bin/psalm";
pub const DEFAULT_SCRATCH_DIR_NAME: &str = "phpt-batch-scratch";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TesterConfig {
    pub analyzer_path: Option<PathBuf>,
    pub default_arguments: String,
    pub scratch_dir: Option<PathBuf>,
}

impl TesterConfig {
    pub fn new(default_arguments: impl Into<String>) -> Self {
        Self {
            default_arguments: default_arguments.into(),
            ..Self::default()
        }
    }

    pub fn with_analyzer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.analyzer_path = Some(path.into());
        self
    }

    pub fn with_scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(path.into());
        self
    }

    /// Defaults overridden by `PHPT_BATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup);
        config
    }

    /// Overwrites fields whose variable is set to a non-empty value.
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty(ANALYZER_ENV) {
            self.analyzer_path = Some(PathBuf::from(path));
        }
        if let Some(arguments) = non_empty(ARGUMENTS_ENV) {
            self.default_arguments = arguments;
        }
        if let Some(path) = non_empty(SCRATCH_DIR_ENV) {
            self.scratch_dir = Some(PathBuf::from(path));
        }
    }

    pub fn resolved_analyzer_path(&self, working_dir: &Path) -> PathBuf {
        match &self.analyzer_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => working_dir.join(path),
            None => working_dir.join(DEFAULT_ANALYZER_RELATIVE_PATH),
        }
    }

    pub fn resolved_scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME))
    }
}
