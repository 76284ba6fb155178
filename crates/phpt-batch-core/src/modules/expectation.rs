//! Exact and format-template expectations over formatted analyzer output.
//!
//! Format templates use the PHPUnit `assertStringMatchesFormat` placeholders:
//!
//! | Token | Matches |
//! |-------|---------|
//! | `%e`  | the platform directory separator |
//! | `%s`  | one or more characters up to the end of the line |
//! | `%S`  | zero or more characters up to the end of the line |
//! | `%a`  | one or more characters, newlines included |
//! | `%A`  | zero or more characters, newlines included |
//! | `%w`  | zero or more whitespace characters |
//! | `%i`  | a signed integer |
//! | `%d`  | an unsigned integer |
//! | `%x`  | one or more hexadecimal digits |
//! | `%f`  | a floating point number |
//! | `%c`  | a single character |
//! | `%%`  | a literal `%` |
//!
//! Any other `%` sequence is literal text. The whole output must match.

use crate::domain::{Expectation, ExpectationKind};
use regex::Regex;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_mismatch(self))]
pub struct ExpectationMismatch {
    pub kind: ExpectationKind,
    pub expected: String,
    pub actual: String,
    /// 1-based; `None` when every line matches on its own but the whole does not.
    pub first_mismatch_line: Option<usize>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FormatPattern {
    template: String,
    regex: Regex,
}

impl FormatPattern {
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format_to_regex(template))?;
        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_match(&self, actual: &str) -> bool {
        self.regex.is_match(&normalize_line_endings(actual))
    }
}

fn placeholder_regex(token: char) -> Option<&'static str> {
    let fragment = match token {
        'e' => {
            if cfg!(windows) {
                r"\\"
            } else {
                "/"
            }
        }
        's' => r"[^\r\n]+",
        'S' => r"[^\r\n]*",
        'a' => ".+",
        'A' => ".*",
        'w' => r"\s*",
        'i' => r"[+-]?\d+",
        'd' => r"\d+",
        'x' => "[0-9a-fA-F]+",
        'f' => r"[+-]?\.?\d+\.?\d*(?:[Ee][+-]?\d+)?",
        'c' => ".",
        _ => return None,
    };
    Some(fragment)
}

fn format_to_regex(template: &str) -> String {
    let template = normalize_line_endings(template);
    let mut pattern = String::from(r"(?s)\A");
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(current) = chars.next() {
        if current != '%' {
            literal.push(current);
            continue;
        }

        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                literal.push('%');
            }
            Some(token) => match placeholder_regex(token) {
                Some(fragment) => {
                    chars.next();
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();
                    pattern.push_str(fragment);
                }
                None => literal.push('%'),
            },
            None => literal.push('%'),
        }
    }

    pattern.push_str(&regex::escape(&literal));
    pattern.push_str(r"\z");
    pattern
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

pub fn matches(actual: &str, expectation: &Expectation) -> bool {
    check_expectation(actual, expectation).is_ok()
}

pub fn check_expectation(
    actual: &str,
    expectation: &Expectation,
) -> Result<(), ExpectationMismatch> {
    let outcome = match expectation {
        Expectation::Exact(expected) => (actual == expected).then_some(()).ok_or(None),
        Expectation::Format(template) => match FormatPattern::compile(template) {
            Ok(pattern) if pattern.is_match(actual) => Ok(()),
            Ok(_) => Err(None),
            Err(error) => Err(Some(format!("format template did not compile: {error}"))),
        },
    };

    outcome.map_err(|reason| ExpectationMismatch {
        kind: expectation.kind(),
        expected: expectation.text().to_string(),
        actual: actual.to_string(),
        first_mismatch_line: first_mismatch_line(expectation, actual),
        reason,
    })
}

fn line_matches(kind: ExpectationKind, expected: &str, actual: &str) -> bool {
    match kind {
        ExpectationKind::Exact => expected == actual,
        ExpectationKind::Format => {
            FormatPattern::compile(expected).is_ok_and(|pattern| pattern.is_match(actual))
        }
    }
}

fn first_mismatch_line(expectation: &Expectation, actual: &str) -> Option<usize> {
    let expected_text = normalize_line_endings(expectation.text());
    let actual_text = normalize_line_endings(actual);
    let expected = expected_text.split('\n').collect::<Vec<_>>();
    let actual = actual_text.split('\n').collect::<Vec<_>>();

    expected
        .iter()
        .zip(&actual)
        .position(|(expected, actual)| !line_matches(expectation.kind(), expected, actual))
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
        .map(|index| index + 1)
}

fn render_mismatch(mismatch: &ExpectationMismatch) -> String {
    let assertion = match mismatch.kind {
        ExpectationKind::Exact => "is identical to the expected output",
        ExpectationKind::Format => "matches the expected format",
    };
    let mut lines = vec![format!(
        "Failed asserting that analyzer output {}{}.",
        assertion,
        mismatch
            .first_mismatch_line
            .map(|line| format!(" (first difference on line {line})"))
            .unwrap_or_default()
    )];
    if let Some(reason) = &mismatch.reason {
        lines.push(reason.clone());
    }

    lines.push("--- Expected".to_string());
    lines.push("+++ Actual".to_string());
    let expected = mismatch.expected.lines().collect::<Vec<_>>();
    let actual = mismatch.actual.lines().collect::<Vec<_>>();
    for index in 0..expected.len().max(actual.len()) {
        match (expected.get(index), actual.get(index)) {
            (Some(left), Some(right)) if line_matches(mismatch.kind, left, right) => {
                lines.push(format!(" {right}"));
            }
            (left, right) => {
                if let Some(left) = left {
                    lines.push(format!("-{left}"));
                }
                if let Some(right) = right {
                    lines.push(format!("+{right}"));
                }
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{FormatPattern, check_expectation, matches};
    use crate::domain::{Expectation, ExpectationKind};

    const TRACE_OUTPUT: &str = "Trace on line 9: $_list: non-empty-list<1|2>";

    #[test]
    fn exact_expectation_is_byte_for_byte() {
        assert!(matches(TRACE_OUTPUT, &Expectation::exact(TRACE_OUTPUT)));
        assert!(!matches(
            TRACE_OUTPUT,
            &Expectation::exact(format!("{TRACE_OUTPUT}\n"))
        ));
        assert!(!matches(
            "Trace on line 9: a\r\nTrace on line 10: b",
            &Expectation::exact("Trace on line 9: a\nTrace on line 10: b")
        ));
    }

    #[test]
    fn trace_format_with_digit_and_string_placeholders_matches() {
        let expectation = Expectation::format("Trace on line %d: $_list: non-empty-list<%s>");
        assert!(matches(TRACE_OUTPUT, &expectation));
    }

    #[test]
    fn format_is_anchored_at_both_ends() {
        let pattern = FormatPattern::compile("Trace on line %d").expect("template compiles");
        assert!(pattern.is_match("Trace on line 12"));
        assert!(!pattern.is_match("Trace on line 12: extra"));
        assert!(!pattern.is_match("prefix Trace on line 12"));
    }

    #[test]
    fn line_bounded_and_unbounded_placeholders_differ_on_newlines() {
        let output = "InvalidReturnType on line 3: a\nInvalidReturnStatement on line 4: b";

        assert!(!matches(output, &Expectation::format("%s")));
        assert!(matches(output, &Expectation::format("%a")));
        assert!(matches(
            output,
            &Expectation::format("InvalidReturnType on line 3: %A")
        ));
        assert!(matches(output, &Expectation::format("%S\n%S")));
        assert!(!matches("", &Expectation::format("%a")));
        assert!(matches("", &Expectation::format("%A")));
    }

    #[test]
    fn numeric_and_character_placeholders() {
        assert!(matches("-42", &Expectation::format("%i")));
        assert!(!matches("-42", &Expectation::format("%d")));
        assert!(matches("0x1F", &Expectation::format("0x%x")));
        assert!(matches("1.5e-3", &Expectation::format("%f")));
        assert!(matches("a b", &Expectation::format("a%cb")));
        assert!(matches("a \t b", &Expectation::format("a%wb")));
        assert!(matches(
            std::path::MAIN_SEPARATOR_STR,
            &Expectation::format("%e")
        ));
    }

    #[test]
    fn literal_percent_and_regex_metacharacters_are_escaped() {
        assert!(matches(
            "100% (list<int>)",
            &Expectation::format("%d%% (list<%s>)")
        ));
        assert!(matches("50%z", &Expectation::format("50%z")));
        assert!(matches("a.b*c", &Expectation::format("a.b*c")));
        assert!(!matches("aXb*c", &Expectation::format("a.b*c")));
        assert!(matches("trailing %", &Expectation::format("trailing %")));
    }

    #[test]
    fn format_normalizes_crlf_on_both_sides() {
        assert!(matches(
            "Trace on line 1: a\r\nTrace on line 2: b",
            &Expectation::format("Trace on line %d: a\nTrace on line %d: b")
        ));
    }

    #[test]
    fn mismatch_reports_first_differing_line_and_listing() {
        let actual = "Trace on line 9: int\nTrace on line 11: string";
        let mismatch = check_expectation(
            actual,
            &Expectation::format("Trace on line %d: int\nTrace on line 10: string"),
        )
        .expect_err("second line differs");

        assert_eq!(mismatch.kind, ExpectationKind::Format);
        assert_eq!(mismatch.first_mismatch_line, Some(2));
        assert_eq!(mismatch.actual, actual);
        let rendered = mismatch.to_string();
        assert!(rendered.starts_with(
            "Failed asserting that analyzer output matches the expected format (first difference on line 2)."
        ));
        assert!(rendered.contains("--- Expected\n+++ Actual\n Trace on line 9: int\n"));
        assert!(rendered.contains("-Trace on line 10: string\n+Trace on line 11: string"));
    }

    #[test]
    fn missing_output_line_is_reported_after_common_prefix() {
        let mismatch = check_expectation(
            "Trace on line 3: a",
            &Expectation::exact("Trace on line 3: a\nTrace on line 4: b"),
        )
        .expect_err("actual is shorter");
        assert_eq!(mismatch.first_mismatch_line, Some(2));

        let empty = check_expectation("", &Expectation::exact("Trace on line 3: a"))
            .expect_err("no output at all");
        assert_eq!(empty.first_mismatch_line, Some(1));
    }
}
