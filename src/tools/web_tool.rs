//! Web tool: fetches a URL over HTTP(S).

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Tool, ToolResult};
use crate::constants::{
    APP_NAME, APP_VERSION, WEB_MAX_BODY_BYTES, WEB_MAX_TEXT_CHARS, WEB_TIMEOUT_SECS,
};

/// Tool that fetches a web page and returns its text.
///
/// HTML is reduced to plain text with scripts and styles removed; other
/// content types are returned as-is. Both are capped.
pub struct WebTool {
    http: reqwest::Client,
}

impl WebTool {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEB_TIMEOUT_SECS))
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for WebTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct WebInput {
    url: String,
}

/// Strip tags, scripts and styles, and collapse whitespace.
fn html_to_text(html: &str) -> Result<String> {
    let scripts = Regex::new(r"(?is)<script[^>]*>.*?</script>")?;
    let styles = Regex::new(r"(?is)<style[^>]*>.*?</style>")?;
    let tags = Regex::new(r"<[^>]*>")?;
    let spaces = Regex::new(r"\s+")?;

    let text = scripts.replace_all(html, " ");
    let text = styles.replace_all(&text, " ");
    let text = tags.replace_all(&text, " ");
    Ok(spaces.replace_all(&text, " ").trim().to_string())
}

fn cap_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text,
    }
}

fn cap_bytes(text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... body truncated at {max} bytes", &text[..end])
}

#[async_trait::async_trait]
impl Tool for WebTool {
    fn name(&self) -> &str {
        "web"
    }

    fn description(&self) -> &str {
        "Fetch an http or https URL. HTML pages are returned as plain text."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: WebInput = serde_json::from_value(input)?;
        let url = match reqwest::Url::parse(&input.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return Ok(ToolResult::failure(format!(
                    "Unsupported URL scheme: {}",
                    url.scheme()
                )))
            }
            Err(err) => return Ok(ToolResult::failure(format!("Invalid URL: {err}"))),
        };

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => return Ok(ToolResult::failure(format!("Error fetching URL: {err}"))),
        };
        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failure(format!("HTTP error: {status}")));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"));
        let body = response.text().await?;

        if is_html {
            Ok(ToolResult::success(cap_chars(
                html_to_text(&body)?,
                WEB_MAX_TEXT_CHARS,
            )))
        } else {
            Ok(ToolResult::success(cap_bytes(body, WEB_MAX_BODY_BYTES)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port.
    fn serve_once(status: &str, content_type: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/page")
    }

    #[test]
    fn html_is_reduced_to_text() {
        let html = "<html><head><style>p { color: red }</style><script>alert(1)</script></head>\n<body><p>Hello,\n  <b>world</b></p></body></html>";
        assert_eq!(html_to_text(html).unwrap(), "Hello, world");
    }

    #[test]
    fn long_text_is_capped() {
        let capped = cap_chars("é".repeat(10), 4);
        assert_eq!(capped, "éééé...");
        assert_eq!(cap_chars("short".into(), 10), "short");
    }

    #[tokio::test]
    async fn fetches_html_as_text() {
        let url = serve_once("200 OK", "text/html; charset=utf-8", "<h1>Title</h1><p>Body text</p>");
        let result = WebTool::new().execute(json!({"url": url})).await.unwrap();
        assert!(result.success, "{result:?}");
        assert_eq!(result.output, "Title Body text");
    }

    #[tokio::test]
    async fn returns_plain_bodies_unchanged() {
        let url = serve_once("200 OK", "application/json", "{\"ok\":true}");
        let result = WebTool::new().execute(json!({"url": url})).await.unwrap();
        assert_eq!(result.output, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn http_error_is_a_failure() {
        let url = serve_once("404 Not Found", "text/plain", "missing");
        let result = WebTool::new().execute(json!({"url": url})).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let tool = WebTool::new();
        let result = tool.execute(json!({"url": "file:///etc/passwd"})).await.unwrap();
        assert_eq!(result.error.as_deref(), Some("Unsupported URL scheme: file"));
        let result = tool.execute(json!({"url": "not a url"})).await.unwrap();
        assert!(result.error.unwrap().starts_with("Invalid URL"));
    }
}
