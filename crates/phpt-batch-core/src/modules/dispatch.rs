//! Grouping and dispatch of test cases to the analyzer.
//!
//! Cases are partitioned by effective argument string and each partition is
//! analyzed by a single analyzer process. Diagnostics come back as one flat
//! list and are routed to their case by the scratch-file path in `file_path`.
//! Diagnostics about any other file (included or referenced sources) cannot be
//! attributed to a case and are dropped.
//!
//! All files analyzed together share one analyzer run, so cases in the same
//! group must not declare colliding PHP symbols. The engine cannot detect such
//! collisions without parsing the code.

use super::decoder::decode_diagnostics;
use super::formatter::format_diagnostics;
use super::invocation::{AnalyzerInvoker, InvocationCommand};
use super::scratch::{CodeFile, ScratchDirectory};
use crate::domain::{DiagnosticRecord, HarnessResult, TestCase};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Cases sharing one effective argument string, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationGroup<'a> {
    pub arguments: &'a str,
    pub cases: Vec<(&'a str, &'a TestCase)>,
}

pub fn partition_by_arguments<'a>(
    cases: &'a BTreeMap<String, TestCase>,
    default_arguments: &'a str,
) -> Vec<InvocationGroup<'a>> {
    let mut groups: BTreeMap<&'a str, Vec<(&'a str, &'a TestCase)>> = BTreeMap::new();
    for (id, case) in cases {
        groups
            .entry(case.effective_arguments(default_arguments))
            .or_default()
            .push((id.as_str(), case));
    }

    groups
        .into_iter()
        .map(|(arguments, cases)| InvocationGroup { arguments, cases })
        .collect()
}

/// Routes each diagnostic to the file it was reported against. Every key is
/// present in the result, with an empty list when nothing was reported.
pub fn demultiplex<'d, 'k>(
    diagnostics: &'d [DiagnosticRecord],
    keys: impl IntoIterator<Item = &'k str>,
) -> HashMap<&'k str, Vec<&'d DiagnosticRecord>> {
    let mut by_file = keys
        .into_iter()
        .map(|key| (key, Vec::new()))
        .collect::<HashMap<_, _>>();

    for diagnostic in diagnostics {
        match by_file.get_mut(diagnostic.file_path.as_str()) {
            Some(attributed) => attributed.push(diagnostic),
            None => debug!(
                file_path = %diagnostic.file_path,
                kind = %diagnostic.kind,
                line = diagnostic.line_from,
                "dropping diagnostic for a file outside the group"
            ),
        }
    }

    by_file
}

struct GroupMember<'a> {
    id: &'a str,
    case: &'a TestCase,
    file: CodeFile,
}

pub struct DispatchEngine<'a, I: ?Sized> {
    invoker: &'a I,
    scratch: &'a ScratchDirectory,
    analyzer: &'a Path,
    default_arguments: &'a str,
}

impl<'a, I> DispatchEngine<'a, I>
where
    I: AnalyzerInvoker + ?Sized,
{
    pub fn new(
        invoker: &'a I,
        scratch: &'a ScratchDirectory,
        analyzer: &'a Path,
        default_arguments: &'a str,
    ) -> Self {
        Self {
            invoker,
            scratch,
            analyzer,
            default_arguments,
        }
    }

    /// Analyzes one case in its own analyzer run.
    pub fn run_single(&self, case: &TestCase) -> HarnessResult<String> {
        let arguments = case.effective_arguments(self.default_arguments);
        let file = self.scratch.create_code_file(case.code())?;

        let diagnostics = self.analyze(arguments, std::slice::from_ref(&file))?;
        let attributed = demultiplex(&diagnostics, [file.key()])
            .remove(file.key())
            .unwrap_or_default();
        let formatted = format_diagnostics(attributed, case.code_first_line());

        file.delete();
        Ok(formatted)
    }

    /// Analyzes every case with one analyzer run per distinct effective
    /// argument string. Groups run one after another; the first fatal error
    /// stops the batch after the failing group's files are removed.
    pub fn run_batch(
        &self,
        cases: &BTreeMap<String, TestCase>,
    ) -> HarnessResult<BTreeMap<String, String>> {
        let groups = partition_by_arguments(cases, self.default_arguments);
        info!(
            cases = cases.len(),
            groups = groups.len(),
            "dispatching batch"
        );

        let mut results = BTreeMap::new();
        for group in groups {
            results.extend(self.run_group(&group)?);
        }
        Ok(results)
    }

    fn run_group(&self, group: &InvocationGroup<'_>) -> HarnessResult<Vec<(String, String)>> {
        let members = group
            .cases
            .iter()
            .map(|&(id, case)| {
                self.scratch
                    .create_code_file(case.code())
                    .map(|file| GroupMember { id, case, file })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            arguments = group.arguments,
            cases = members.len(),
            "analyzing group"
        );
        let files = members
            .iter()
            .map(|member| &member.file)
            .collect::<Vec<_>>();
        let diagnostics = self.analyze(group.arguments, files)?;

        let results = {
            let mut by_file =
                demultiplex(&diagnostics, members.iter().map(|member| member.file.key()));
            members
                .iter()
                .map(|member| {
                    let attributed = by_file.remove(member.file.key()).unwrap_or_default();
                    (
                        member.id.to_string(),
                        format_diagnostics(attributed, member.case.code_first_line()),
                    )
                })
                .collect::<Vec<_>>()
        };

        for member in members {
            member.file.delete();
        }
        Ok(results)
    }

    fn analyze<'f>(
        &self,
        arguments: &str,
        files: impl IntoIterator<Item = &'f CodeFile>,
    ) -> HarnessResult<Vec<DiagnosticRecord>> {
        let command = InvocationCommand::build(
            self.analyzer,
            arguments,
            files
                .into_iter()
                .map(|file| file.path().to_path_buf())
                .collect(),
        )?;
        let output = self.invoker.invoke(&command)?;
        let diagnostics = decode_diagnostics(&output.stdout, arguments)
            .map_err(|error| error.with_stderr(&output.stderr))?;

        debug!(
            diagnostics = diagnostics.len(),
            files = command.files().len(),
            "decoded analyzer output"
        );
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchEngine, demultiplex, partition_by_arguments};
    use crate::domain::{DiagnosticRecord, Expectation, HarnessError, TestCase};
    use crate::modules::invocation::{
        AnalyzerInvoker, InvocationCommand, InvocationError, InvocationOutput,
    };
    use crate::modules::scratch::ScratchDirectory;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const TRACE_MARKER: &str = "// @trace ";
    const DEFAULT_ARGUMENTS: &str = "--no-cache";

    /// Reports one `Trace` per line carrying a `// @trace <message>` marker.
    #[derive(Default)]
    struct FakeAnalyzer {
        calls: RefCell<Vec<InvocationCommand>>,
        crash_for: Option<&'static str>,
        refuse_launch_for: Option<&'static str>,
        foreign_file: Option<&'static str>,
    }

    impl AnalyzerInvoker for FakeAnalyzer {
        fn invoke(&self, command: &InvocationCommand) -> Result<InvocationOutput, InvocationError> {
            self.calls.borrow_mut().push(command.clone());

            if self.refuse_launch_for == Some(command.arguments()) {
                return Err(InvocationError::Launch {
                    command_line: command.command_line(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no analyzer"),
                });
            }
            if self.crash_for == Some(command.arguments()) {
                return Ok(InvocationOutput {
                    stdout: "PHP Fatal error:  Allowed memory size exhausted".to_string(),
                    stderr: "Stack trace:\n#0 {main}".to_string(),
                    exit_code: Some(255),
                });
            }

            let mut records = Vec::new();
            if let Some(foreign) = self.foreign_file {
                records.push(DiagnosticRecord::new(
                    "UndefinedClass",
                    1,
                    1,
                    "Class Foo does not exist",
                    foreign,
                ));
            }
            for file in command.files() {
                let code = fs::read_to_string(file).expect("scratch file should exist");
                for (index, line) in code.lines().enumerate() {
                    if let Some(position) = line.find(TRACE_MARKER) {
                        records.push(DiagnosticRecord::new(
                            "Trace",
                            index as i64 + 1,
                            1,
                            &line[position + TRACE_MARKER.len()..],
                            file.to_string_lossy(),
                        ));
                    }
                }
            }

            Ok(InvocationOutput {
                stdout: serde_json::to_string(&records).expect("records should serialize"),
                stderr: String::new(),
                exit_code: Some(if records.is_empty() { 0 } else { 2 }),
            })
        }
    }

    fn case(code: &str, first_line: usize) -> TestCase {
        TestCase::new(code, Expectation::exact(""), first_line).expect("valid case")
    }

    fn scratch_entries(scratch: &ScratchDirectory) -> usize {
        fs::read_dir(scratch.path())
            .expect("scratch dir should be readable")
            .count()
    }

    fn fixture() -> (TempDir, ScratchDirectory) {
        let temp = TempDir::new().expect("tempdir should be created");
        let scratch =
            ScratchDirectory::create(temp.path().join("scratch")).expect("scratch should exist");
        (temp, scratch)
    }

    #[test]
    fn single_case_trace_is_reported_on_declaring_file_line() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer::default();
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);

        let formatted = engine
            .run_single(&case(
                "$_list = array_values(['a'=>1,'b'=>2]); // @trace $_list: non-empty-list<1|2>",
                9,
            ))
            .expect("single run should succeed");

        assert_eq!(formatted, "Trace on line 9: $_list: non-empty-list<1|2>");
        assert_eq!(analyzer.calls.borrow()[0].arguments(), DEFAULT_ARGUMENTS);
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[test]
    fn shared_group_attributes_diagnostics_to_their_own_case() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer::default();
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);
        let cases = BTreeMap::from([
            ("X".to_string(), case("<?php\n$a = 1; // @trace $a: 1", 3)),
            ("Y".to_string(), case("<?php\n$b = 2;", 3)),
        ]);

        let results = engine.run_batch(&cases).expect("batch should succeed");

        assert_eq!(
            results,
            BTreeMap::from([
                ("X".to_string(), "Trace on line 4: $a: 1".to_string()),
                ("Y".to_string(), String::new()),
            ])
        );
        let calls = analyzer.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].files().len(), 2);
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[test]
    fn batch_invokes_analyzer_once_per_distinct_argument_string() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer::default();
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);
        let cases = BTreeMap::from([
            ("a".to_string(), case("$a = 1; // @trace a", 1)),
            (
                "b".to_string(),
                case("$b = 1; // @trace b", 1).with_arguments("--php-version=8.1"),
            ),
            ("c".to_string(), case("$c = 1; // @trace c", 1)),
            (
                "d".to_string(),
                case("$d = 1;", 1).with_arguments(DEFAULT_ARGUMENTS),
            ),
        ]);

        let results = engine.run_batch(&cases).expect("batch should succeed");

        assert_eq!(results.len(), 4);
        assert_eq!(results["a"], "Trace on line 1: a");
        assert_eq!(results["b"], "Trace on line 1: b");
        assert_eq!(results["c"], "Trace on line 1: c");
        assert_eq!(results["d"], "");

        let calls = analyzer.calls.borrow();
        let mut observed = calls
            .iter()
            .map(|call| (call.arguments().to_string(), call.files().len()))
            .collect::<Vec<_>>();
        observed.sort();
        assert_eq!(
            observed,
            vec![
                ("--no-cache".to_string(), 3),
                ("--php-version=8.1".to_string(), 1),
            ]
        );
    }

    #[test]
    fn batch_of_one_matches_single_run_and_repeats_identically() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer {
            foreign_file: Some("/project/vendor/autoload.php"),
            ..FakeAnalyzer::default()
        };
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);
        let test = case("<?php\n\n$x = []; // @trace $x: array<never, never>", 5);
        let cases = BTreeMap::from([("only".to_string(), test.clone())]);

        let single = engine.run_single(&test).expect("single run should succeed");
        let first = engine.run_batch(&cases).expect("batch should succeed");
        let second = engine.run_batch(&cases).expect("batch should succeed");

        assert_eq!(single, "Trace on line 7: $x: array<never, never>");
        assert_eq!(first["only"], single);
        assert_eq!(first, second);
    }

    #[test]
    fn decode_failure_names_arguments_and_cleans_the_group() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer {
            crash_for: Some("--threads=1"),
            ..FakeAnalyzer::default()
        };
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);
        let cases = BTreeMap::from([
            (
                "a".to_string(),
                case("$a = 1;", 1).with_arguments("--threads=1"),
            ),
            (
                "b".to_string(),
                case("$b = 1;", 1).with_arguments("--threads=1"),
            ),
        ]);

        let error = engine
            .run_batch(&cases)
            .expect_err("crash output is not JSON");
        match &error {
            HarnessError::Decode(decode) => {
                assert_eq!(decode.arguments, "--threads=1");
                assert!(decode.raw_output.contains("Allowed memory size exhausted"));
                assert_eq!(decode.stderr.as_deref(), Some("Stack trace:\n#0 {main}"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(error.exit_code(), 5);
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[test]
    fn launch_failure_aborts_remaining_groups_without_leaking_files() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer {
            refuse_launch_for: Some("--b"),
            ..FakeAnalyzer::default()
        };
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);
        let cases = BTreeMap::from([
            ("1".to_string(), case("$a = 1;", 1).with_arguments("--a")),
            ("2".to_string(), case("$b = 1;", 1).with_arguments("--b")),
            ("3".to_string(), case("$c = 1;", 1).with_arguments("--c")),
        ]);

        let error = engine
            .run_batch(&cases)
            .expect_err("second group cannot launch");

        assert!(matches!(error, HarnessError::Invocation(_)));
        let calls = analyzer.calls.borrow();
        assert_eq!(
            calls
                .iter()
                .map(|call| call.arguments())
                .collect::<Vec<_>>(),
            vec!["--a", "--b"]
        );
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[test]
    fn invalid_argument_string_is_an_invocation_error() {
        let (_temp, scratch) = fixture();
        let analyzer = FakeAnalyzer::default();
        let engine =
            DispatchEngine::new(&analyzer, &scratch, Path::new("psalm"), DEFAULT_ARGUMENTS);

        let error = engine
            .run_single(&case("$a = 1;", 1).with_arguments("--config='unterminated"))
            .expect_err("argument string cannot be split");

        assert_eq!(error.placeholder(), "RUN.ANALYZER_ARGUMENTS");
        assert!(analyzer.calls.borrow().is_empty());
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[test]
    fn partition_is_exhaustive_and_groups_equal_arguments() {
        let cases = BTreeMap::from([
            ("p".to_string(), case("", 1)),
            ("q".to_string(), case("", 1).with_arguments("--x")),
            ("r".to_string(), case("", 1).with_arguments("--no-cache")),
            ("s".to_string(), case("", 1).with_arguments("--x")),
        ]);

        let groups = partition_by_arguments(&cases, "--no-cache");

        assert_eq!(groups.len(), 2);
        let mut ids = groups
            .iter()
            .flat_map(|group| group.cases.iter().map(|(id, _)| *id))
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, vec!["p", "q", "r", "s"]);

        let default_group = groups
            .iter()
            .find(|group| group.arguments == "--no-cache")
            .expect("default group exists");
        assert_eq!(
            default_group
                .cases
                .iter()
                .map(|(id, _)| *id)
                .collect::<Vec<_>>(),
            vec!["p", "r"]
        );
    }

    #[test]
    fn demultiplex_keeps_every_key_and_drops_unknown_paths() {
        let diagnostics = vec![
            DiagnosticRecord::new("Trace", 1, 1, "a", "/s/a.php"),
            DiagnosticRecord::new("Trace", 2, 1, "elsewhere", "/vendor/x.php"),
            DiagnosticRecord::new("Trace", 3, 1, "a2", "/s/a.php"),
        ];

        let by_file = demultiplex(&diagnostics, ["/s/a.php", "/s/b.php"]);

        assert_eq!(by_file.len(), 2);
        assert_eq!(
            by_file["/s/a.php"]
                .iter()
                .map(|diagnostic| diagnostic.message.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "a2"]
        );
        assert!(by_file["/s/b.php"].is_empty());
    }
}
