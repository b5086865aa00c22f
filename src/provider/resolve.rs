//! Endpoint resolution for the chat backend.
//!
//! Accepts the forms users actually type: `localhost:11434`,
//! `http://gpu-box:11434`, or a full URL such as
//! `https://api.example.com/v1/chat/completions`.

use crate::constants::DEFAULT_CHAT_PATH;

/// Turn a configured host into the URL the chat request is posted to.
///
/// A missing scheme defaults to `http://`. A host without a path gets the
/// Ollama chat path; an explicit path is used verbatim.
pub fn resolve_endpoint(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", host),
    };
    if rest.contains('/') {
        format!("{scheme}://{rest}")
    } else {
        format!("{scheme}://{rest}{DEFAULT_CHAT_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_scheme_and_path() {
        assert_eq!(resolve_endpoint("localhost:11434"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn scheme_is_kept() {
        assert_eq!(
            resolve_endpoint("https://ollama.internal/"),
            "https://ollama.internal/api/chat"
        );
    }

    #[test]
    fn explicit_path_is_verbatim() {
        assert_eq!(
            resolve_endpoint("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
