//! Streaming chat client.
//!
//! Posts the conversation to the configured endpoint and exposes the response
//! body as a lazy [`DeltaStream`]. Nothing is read from the network until the
//! stream is polled.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::decoder::StreamDecoder;
use super::delta::StreamDelta;
use super::resolve::resolve_endpoint;
use super::{ChatBackend, DeltaStream};
use crate::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::error::ChatError;
use crate::message::Message;
use crate::tools::ToolDescriptor;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDescriptor],
}

fn no_tools(tools: &&[ToolDescriptor]) -> bool {
    tools.is_empty()
}

/// HTTP client for one backend endpoint and model.
pub struct StreamingChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    auth_token: Option<String>,
}

impl StreamingChatClient {
    pub fn new(host: &str, model: impl Into<String>, auth_token: Option<String>) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            endpoint: resolve_endpoint(host),
            model: model.into(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for StreamingChatClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<DeltaStream, ChatError> {
        let body = ChatRequest {
            messages,
            model: &self.model,
            stream: true,
            tools,
        };
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat request"
        );

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!(status = status.as_u16(), "Chat request rejected");
            return Err(ChatError::Protocol {
                status: Some(status.as_u16()),
                body,
            });
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamDelta>,
    failure: Option<ChatError>,
    exhausted: bool,
}

/// Decode a byte stream into deltas.
///
/// The first error ends the stream after every delta decoded before it; no
/// partial record is recovered.
pub fn delta_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
        failure: None,
        exhausted: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if let Some(err) = state.failure.take() {
                return Some((Err(err), state));
            }
            if state.exhausted {
                return None;
            }

            let mut deltas = Vec::new();
            let decoded = match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref(), &mut deltas),
                Some(Err(err)) => Err(ChatError::Transport(err.to_string())),
                None => {
                    state.exhausted = true;
                    state.decoder.finish(&mut deltas)
                }
            };
            state.pending.extend(deltas);

            match decoded {
                Ok(()) if state.decoder.is_finished() => state.exhausted = true,
                Ok(()) => {}
                Err(err) => {
                    state.exhausted = true;
                    state.failure = Some(err);
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FinishReason;

    fn body(chunks: Vec<&'static str>) -> impl Stream<Item = Result<Vec<u8>, String>> + Send {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())))
    }

    #[tokio::test]
    async fn stream_yields_deltas_in_order() {
        let deltas: Vec<_> = delta_stream(body(vec![
            "{\"message\":{\"content\":\"a\"}}\n{\"mess",
            "age\":{\"content\":\"b\"}}\n",
            "{\"done\":true}\n",
        ]))
        .collect()
        .await;
        let deltas: Vec<StreamDelta> = deltas.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::content("a"),
                StreamDelta::content("b"),
                StreamDelta::finished(FinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn parse_error_ends_stream() {
        let items: Vec<_> = delta_stream(body(vec![
            "{\"message\":{\"content\":\"a\"}}\nnot json\n{\"message\":{\"content\":\"b\"}}\n",
        ]))
        .collect()
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().ok(), Some(&StreamDelta::content("a")));
        assert!(matches!(items[1], Err(ChatError::Parse { .. })));
    }

    #[tokio::test]
    async fn parse_error_output_is_independent_of_chunking() {
        let whole: Vec<_> = delta_stream(body(vec![
            "{\"message\":{\"content\":\"a\"}}\nnot json\n",
        ]))
        .collect()
        .await;
        let split: Vec<_> = delta_stream(body(vec![
            "{\"message\":{\"content\":\"a\"}}\n",
            "not json\n",
        ]))
        .collect()
        .await;
        assert_eq!(whole.len(), 2);
        assert_eq!(split.len(), 2);
        assert_eq!(whole[0].as_ref().ok(), split[0].as_ref().ok());
        assert!(whole[1].is_err() && split[1].is_err());
    }

    #[tokio::test]
    async fn transport_error_surfaces() {
        let failing = stream::iter(vec![
            Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
            Err("connection reset".to_string()),
        ]);
        let items: Vec<_> = delta_stream(failing).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(ChatError::Transport(msg)) if msg.contains("reset")));
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![Message::new(crate::message::Role::User, "hi")];
        let body = serde_json::to_value(ChatRequest {
            messages: &messages,
            model: "gpt-oss",
            stream: true,
            tools: &[],
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": "gpt-oss",
                "stream": true
            })
        );
    }
}
