use super::CliError;
use anyhow::Context;
use globset::{Glob, GlobMatcher};
use phpt_batch_core::domain::{Expectation, HarnessError, TestCase};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct CaseManifest {
    #[serde(default)]
    pub(super) default_arguments: String,
    #[serde(default)]
    pub(super) analyzer: Option<PathBuf>,
    pub(super) cases: Vec<ManifestCase>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct ManifestCase {
    pub(super) id: String,
    pub(super) code: String,
    pub(super) code_first_line: usize,
    #[serde(default)]
    pub(super) arguments: Option<String>,
    #[serde(default)]
    pub(super) expect: Option<String>,
    #[serde(default)]
    pub(super) expect_format: Option<String>,
}

impl ManifestCase {
    fn expectation(&self) -> Result<Expectation, HarnessError> {
        match (&self.expect, &self.expect_format) {
            (Some(exact), None) => Ok(Expectation::exact(exact.clone())),
            (None, Some(template)) => Ok(Expectation::format(template.clone())),
            _ => Err(HarnessError::input_validation(
                "INPUT.MANIFEST_EXPECTATION",
                format!(
                    "case '{}' must declare exactly one of 'expect' or 'expectFormat'",
                    self.id
                ),
            )),
        }
    }

    fn to_test_case(&self) -> Result<TestCase, HarnessError> {
        let case = TestCase::new(self.code.clone(), self.expectation()?, self.code_first_line)
            .map_err(|error| {
                HarnessError::input_validation(
                    error.placeholder(),
                    format!("case '{}': {}", self.id, error),
                )
            })?;
        Ok(match &self.arguments {
            Some(arguments) => case.with_arguments(arguments.clone()),
            None => case,
        })
    }
}

pub(super) fn load_case_manifest(path: &Path) -> Result<CaseManifest, CliError> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read case manifest '{}'", path.display()))?;
    serde_json::from_str::<CaseManifest>(&content)
        .with_context(|| format!("failed to parse case manifest '{}'", path.display()))
        .map_err(CliError::from)
}

pub(super) fn compile_id_filter(pattern: Option<&str>) -> Result<Option<GlobMatcher>, CliError> {
    pattern
        .map(|pattern| {
            Glob::new(pattern)
                .map(|glob| glob.compile_matcher())
                .map_err(|source| {
                    CliError::Usage(format!("invalid --only pattern '{}': {}", pattern, source))
                })
        })
        .transpose()
}

/// Converts manifest cases to test cases keyed by id, keeping only ids that
/// match `filter` when one is given.
pub(super) fn select_cases(
    manifest: &CaseManifest,
    filter: Option<&GlobMatcher>,
) -> Result<BTreeMap<String, TestCase>, CliError> {
    let mut cases = BTreeMap::new();
    for entry in &manifest.cases {
        if filter.is_some_and(|matcher| !matcher.is_match(&entry.id)) {
            continue;
        }
        let case = entry.to_test_case()?;
        if cases.insert(entry.id.clone(), case).is_some() {
            return Err(CliError::Harness(HarnessError::input_validation(
                "INPUT.MANIFEST_DUPLICATE_ID",
                format!("case id '{}' appears more than once", entry.id),
            )));
        }
    }

    if cases.is_empty() {
        return Err(CliError::Harness(HarnessError::input_validation(
            "INPUT.MANIFEST_NO_CASES",
            "no manifest cases were selected",
        )));
    }
    Ok(cases)
}

/// Manifest-relative paths are resolved against the manifest's directory.
pub(super) fn resolve_manifest_path(manifest_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    manifest_path
        .parent()
        .map_or_else(|| path.to_path_buf(), |parent| parent.join(path))
}
