use super::CliError;
use super::helpers::*;
use phpt_batch_core::common::TesterConfig;
use phpt_batch_core::modules::{DispatchMode, Tester, render_human_summary, write_report_file};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// JSON case manifest path
    #[arg(long)]
    manifest: PathBuf,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Analyzer executable (overrides the manifest and PHPT_BATCH_ANALYZER)
    #[arg(long)]
    analyzer: Option<PathBuf>,

    /// Default analyzer arguments (overrides the manifest and PHPT_BATCH_ARGUMENTS)
    #[arg(long, allow_hyphen_values = true)]
    arguments: Option<String>,

    /// Directory for materialized code files
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Only run cases whose id matches this glob
    #[arg(long, value_name = "GLOB")]
    only: Option<String>,

    /// Analyze each case in its own analyzer run
    #[arg(long)]
    isolated: bool,
}

impl RunArgs {
    fn dispatch_mode(&self) -> DispatchMode {
        if self.isolated {
            DispatchMode::Isolated
        } else {
            DispatchMode::Batched
        }
    }

    /// Manifest values first, then `PHPT_BATCH_*` variables, then flags.
    fn into_config(self, manifest: &CaseManifest) -> TesterConfig {
        let mut config = TesterConfig::new(manifest.default_arguments.clone());
        if let Some(analyzer) = &manifest.analyzer {
            config = config.with_analyzer_path(resolve_manifest_path(&self.manifest, analyzer));
        }
        config.apply_lookup(|key| std::env::var(key).ok());

        if let Some(analyzer) = self.analyzer {
            config = config.with_analyzer_path(analyzer);
        }
        if let Some(arguments) = self.arguments {
            config.default_arguments = arguments;
        }
        if let Some(scratch_dir) = self.scratch_dir {
            config = config.with_scratch_dir(scratch_dir);
        }
        config
    }
}

pub(super) fn run_cases_command(args: RunArgs) -> Result<i32, CliError> {
    let manifest = load_case_manifest(&args.manifest)?;
    let filter = compile_id_filter(args.only.as_deref())?;
    let cases = select_cases(&manifest, filter.as_ref())?;

    let mode = args.dispatch_mode();
    let report_path = args.report.clone();
    let config = args.into_config(&manifest);
    let tester = Tester::new(&config)?;
    info!(
        cases = cases.len(),
        mode = mode.as_str(),
        analyzer = %tester.analyzer().display(),
        "running manifest cases"
    );

    let report = tester.check_batch(&cases, mode)?;
    println!("{}", render_human_summary(&report));
    if let Some(report_path) = report_path {
        write_report_file(&report_path, &report)
            .map_err(|error| CliError::Harness(error.into()))?;
        println!("JSON report: {}", report_path.display());
    }

    if report.passed { Ok(0) } else { Ok(1) }
}
