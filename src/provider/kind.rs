//! Wire format detection for streamed chat responses.

/// How a streamed response frames its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// One complete JSON object per line (Ollama).
    Ndjson,
    /// Server-Sent Events blocks of `data:` lines (OpenAI-compatible).
    Sse,
}

impl WireFormat {
    /// Picks the format from the first non-empty line of a response.
    pub fn detect(line: &str) -> Self {
        const SSE_PREFIXES: [&str; 5] = ["data:", "event:", "id:", "retry:", ":"];
        if SSE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            WireFormat::Sse
        } else {
            WireFormat::Ndjson
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sse_prefixes() {
        assert_eq!(WireFormat::detect("data: {}"), WireFormat::Sse);
        assert_eq!(WireFormat::detect(": keep-alive"), WireFormat::Sse);
        assert_eq!(WireFormat::detect("event: message"), WireFormat::Sse);
    }

    #[test]
    fn json_lines_are_ndjson() {
        assert_eq!(WireFormat::detect("{\"done\":false}"), WireFormat::Ndjson);
    }
}
