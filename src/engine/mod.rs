//! The turn engine.
//!
//! One user submission is a turn. A turn issues one or more chat rounds: each
//! round sends the conversation to the backend and feeds the streamed deltas
//! through the [`State`] machine. Tool calls run as soon as they arrive, and
//! their output goes back to the model in the next round. The turn ends only
//! when the backend stops with nothing left for it to read.

mod state;

pub use state::State;

use futures::StreamExt;
use tracing::{debug, error, warn};

use crate::constants::DEFAULT_MAX_ROUNDS;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::message::{Role, ToolCall};
use crate::mode::CapabilityMode;
use crate::output::Renderer;
use crate::provider::{ChatBackend, FinishReason, StreamDelta};
use crate::tools::ToolRegistry;

/// How a call to [`TurnEngine::submit`] ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input; no turn was started.
    Empty,
    Finished { rounds: usize, reason: FinishReason },
    /// The round limit was hit while the model still wanted to continue.
    RoundLimit,
    /// The backend failed. Everything recorded before the failure is kept.
    Failed(ChatError),
}

pub struct TurnEngine {
    backend: Box<dyn ChatBackend>,
    tools: ToolRegistry,
    conversation: Conversation,
    mode: CapabilityMode,
    max_rounds: usize,
    state: State,
}

impl TurnEngine {
    pub fn new(
        backend: Box<dyn ChatBackend>,
        tools: ToolRegistry,
        conversation: Conversation,
        mode: CapabilityMode,
    ) -> Self {
        Self {
            backend,
            tools,
            conversation,
            mode,
            max_rounds: DEFAULT_MAX_ROUNDS,
            state: State::Idle,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn mode(&self) -> &CapabilityMode {
        &self.mode
    }

    pub fn set_mode(&mut self, mode: CapabilityMode) {
        debug!(from = %self.mode, to = %mode, "Capability mode changed");
        self.mode = mode;
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Run one turn for `input`.
    pub async fn submit(&mut self, input: &str, renderer: &mut dyn Renderer) -> TurnOutcome {
        if input.trim().is_empty() {
            return TurnOutcome::Empty;
        }
        self.conversation.add(Role::User, input);
        self.transition(State::Waiting, renderer);

        let mut rounds = 0;
        loop {
            if rounds >= self.max_rounds {
                warn!(max_rounds = self.max_rounds, "Round limit reached");
                renderer.render_notice(&format!(
                    "Stopped after {} rounds without a final answer.",
                    self.max_rounds
                ));
                self.transition(State::Idle, renderer);
                return TurnOutcome::RoundLimit;
            }
            rounds += 1;

            let finish = match self.round(renderer).await {
                Ok(finish) => finish,
                Err(err) => {
                    error!(round = rounds, error = %err, "Chat round failed");
                    renderer.render_error(&err.to_string());
                    self.transition(State::Idle, renderer);
                    return TurnOutcome::Failed(err);
                }
            };

            // Tool output is never a final answer.
            let trailing_tool = self.conversation.last_role() == Some(Role::Tool);
            if finish == FinishReason::ToolCalls || trailing_tool {
                debug!(round = rounds, finish = %finish, trailing_tool, "Continuing turn");
                continue;
            }

            match &finish {
                FinishReason::Stop => {}
                FinishReason::Length => {
                    renderer.render_notice("Response cut short: the model hit its output limit.")
                }
                FinishReason::ToolCalls => {}
                FinishReason::Other(reason) => {
                    renderer.render_notice(&format!("Model stopped early ({reason})."))
                }
            }
            renderer.render_done();
            self.transition(State::Idle, renderer);
            return TurnOutcome::Finished {
                rounds,
                reason: finish,
            };
        }
    }

    /// Abandon a turn whose [`TurnEngine::submit`] future was dropped.
    /// Everything it already appended stays in the conversation.
    pub fn cancel(&mut self, renderer: &mut dyn Renderer) {
        if self.state == State::Idle {
            return;
        }
        warn!(state = %self.state, "Turn cancelled");
        renderer.render_notice("Turn cancelled.");
        self.transition(State::Idle, renderer);
    }

    /// One chat request and its stream. Returns the finish reason; a stream
    /// that ends without one counts as `stop`.
    async fn round(&mut self, renderer: &mut dyn Renderer) -> Result<FinishReason, ChatError> {
        self.transition(State::Waiting, renderer);
        let history = self.conversation.history_for(&self.mode);
        let tools = self.tools.tools_for(&self.mode);
        let mut stream = self.backend.chat(&history, &tools).await?;

        let mut finish = None;
        while let Some(delta) = stream.next().await {
            for piece in delta?.split() {
                if let Some(reason) = &piece.finish_reason {
                    finish = Some(reason.clone());
                }
                self.step(piece, renderer).await;
            }
        }
        Ok(finish.unwrap_or(FinishReason::Stop))
    }

    /// Feed one single-facet delta through the state machine.
    async fn step(&mut self, delta: StreamDelta, renderer: &mut dyn Renderer) {
        loop {
            match self.state.clone() {
                State::Thinking => match &delta.reasoning {
                    Some(text) => {
                        renderer.render_reasoning(text);
                        return;
                    }
                    None => self.transition(State::Waiting, renderer),
                },
                State::Talking => match &delta.content {
                    Some(text) => {
                        self.conversation.add(Role::Assistant, text);
                        renderer.render_token(text);
                        return;
                    }
                    None => self.transition(State::Waiting, renderer),
                },
                State::Executing => {
                    self.execute(&delta.tool_calls, renderer).await;
                    return;
                }
                State::Waiting | State::Idle | State::Error(_) => {
                    let next = if delta.reasoning.is_some() {
                        State::Thinking
                    } else if !delta.tool_calls.is_empty() {
                        State::Executing
                    } else if delta.content.is_some() {
                        State::Talking
                    } else {
                        return;
                    };
                    self.transition(next, renderer);
                }
            }
        }
    }

    /// Record the calls on the assistant message, run them in order, and
    /// append each result as tool output.
    async fn execute(&mut self, calls: &[ToolCall], renderer: &mut dyn Renderer) {
        self.conversation.add_tool_calls(calls);

        let mut failures = Vec::new();
        for call in calls {
            renderer.render_tool_call(call);
            let result = self.tools.dispatch(&call.name, call.arguments.clone()).await;
            debug!(tool = %call.name, success = result.success, "Tool finished");
            renderer.render_tool_result(&call.name, &result);

            self.conversation
                .add_tool_result(call.id.as_deref(), &result.to_content());

            if !result.success {
                let reason = result.error.unwrap_or_else(|| "tool failed".into());
                failures.push(format!("{}: {reason}", call.name));
            }
        }

        if !failures.is_empty() {
            let reason = failures.join("; ");
            self.transition(State::Error(reason.clone()), renderer);
            renderer.render_notice(&format!("Tool execution failed: {reason}"));
        }
        self.transition(State::Waiting, renderer);
    }

    fn transition(&mut self, next: State, renderer: &mut dyn Renderer) {
        if self.state == next {
            return;
        }
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        renderer.progress(&self.state);
    }
}
