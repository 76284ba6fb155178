use crate::domain::DiagnosticRecord;

/// Renders one `"<kind> on line <line>: <message>"` line per diagnostic,
/// ordered by line. Diagnostics sharing a line keep their decode order.
pub fn format_diagnostics<'a, I>(diagnostics: I, code_first_line: usize) -> String
where
    I: IntoIterator<Item = &'a DiagnosticRecord>,
{
    let mut ordered = diagnostics.into_iter().collect::<Vec<_>>();
    ordered.sort_by_key(|diagnostic| diagnostic.line_from);

    ordered
        .into_iter()
        .map(|diagnostic| {
            format!(
                "{} on line {}: {}",
                diagnostic.kind,
                diagnostic.corrected_line(code_first_line),
                diagnostic.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
