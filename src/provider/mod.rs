//! Streaming chat backend for ember.
//!
//! [`StreamingChatClient`] turns one HTTP request into a lazy sequence of
//! [`StreamDelta`]s. The turn engine only sees the [`ChatBackend`] trait, so
//! tests can drive it with scripted deltas.

mod client;
mod decoder;
mod delta;
mod kind;
mod resolve;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChatError;
use crate::message::Message;
use crate::tools::ToolDescriptor;

pub use client::StreamingChatClient;
#[cfg(test)]
pub use client::delta_stream;
pub use delta::{FinishReason, StreamDelta};

/// Finite, non-restartable sequence of deltas for one request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, ChatError>> + Send>>;

/// Anything that can answer a chat request with a delta stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<DeltaStream, ChatError>;
}
