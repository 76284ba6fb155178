use crate::domain::DiagnosticRecord;

/// Raw output kept in a [`DecodeError`] is capped at this many bytes.
pub const RAW_OUTPUT_EXCERPT_LIMIT: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("{}", render_decode_error(self))]
pub struct DecodeError {
    pub arguments: String,
    pub raw_output: String,
    pub stderr: Option<String>,
    #[source]
    pub source: serde_json::Error,
}

impl DecodeError {
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        self.stderr = (!trimmed.is_empty()).then(|| excerpt(trimmed));
        self
    }
}

fn render_decode_error(error: &DecodeError) -> String {
    let mut message = format!(
        "analyzer output for arguments '{}' is not a JSON diagnostic list ({})",
        error.arguments, error.source
    );
    if error.raw_output.trim().is_empty() {
        message.push_str("\nraw output: <empty>");
    } else {
        message.push_str("\nraw output:\n");
        message.push_str(&error.raw_output);
    }
    if let Some(stderr) = &error.stderr {
        message.push_str("\nstderr:\n");
        message.push_str(stderr);
    }
    message
}

pub fn decode_diagnostics(
    raw_output: &str,
    arguments: &str,
) -> Result<Vec<DiagnosticRecord>, DecodeError> {
    serde_json::from_str::<Vec<DiagnosticRecord>>(raw_output).map_err(|source| DecodeError {
        arguments: arguments.to_string(),
        raw_output: excerpt(raw_output),
        stderr: None,
        source,
    })
}

fn excerpt(text: &str) -> String {
    if text.len() <= RAW_OUTPUT_EXCERPT_LIMIT {
        return text.to_string();
    }

    let mut end = RAW_OUTPUT_EXCERPT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n... ({} more bytes truncated)",
        &text[..end],
        text.len() - end
    )
}
