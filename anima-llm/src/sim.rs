//! Scripted completion service for tests and offline runs.
//!
//! Replies are queued per call kind and served in order.  Every call is
//! recorded so tests can assert on prompts and offered tools.  An empty
//! queue yields [`LlmError::Unavailable`], which exercises the callers'
//! fallback paths.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::CompletionService;
use crate::error::LlmError;
use crate::types::{ChatMessage, CompletionOutput, ToolSpec};

/// A queued reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Succeed with this output.
    Output(CompletionOutput),
    /// Fail with [`LlmError::Unavailable`] carrying this message.
    Fail(String),
    /// Never resolve; exercises caller timeouts.
    Stall,
}

/// Which entry point a recorded call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// [`CompletionService::call_simple`].
    Simple,
    /// [`CompletionService::call_with_tools`].
    WithTools,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Entry point used.
    pub kind: CallKind,
    /// Messages sent.
    pub messages: Vec<ChatMessage>,
    /// Names of the tools offered.
    pub tools: Vec<String>,
}

impl RecordedCall {
    /// Content of the last user message.
    #[must_use]
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::Role::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Completion service answering from queued scripts.
#[derive(Debug, Default)]
pub struct ScriptedCompletionService {
    simple: Mutex<VecDeque<ScriptedReply>>,
    tools: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompletionService {
    /// A service with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply for the next `call_simple`.
    #[must_use]
    pub fn with_simple(self, text: impl Into<String>) -> Self {
        self.push_simple(ScriptedReply::Output(CompletionOutput::text(text)));
        self
    }

    /// Queue an output for the next `call_with_tools`.
    #[must_use]
    pub fn with_tools(self, output: CompletionOutput) -> Self {
        self.push_tools(ScriptedReply::Output(output));
        self
    }

    /// Queue any reply for `call_simple`.
    pub fn push_simple(&self, reply: ScriptedReply) {
        self.simple.lock().push_back(reply);
    }

    /// Queue any reply for `call_with_tools`.
    pub fn push_tools(&self, reply: ScriptedReply) {
        self.tools.lock().push_back(reply);
    }

    /// Every call served so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls of one kind.
    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().iter().filter(|c| c.kind == kind).count()
    }

    async fn serve(
        &self,
        kind: CallKind,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<CompletionOutput, LlmError> {
        self.calls.lock().push(RecordedCall {
            kind,
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });
        let queue = match kind {
            CallKind::Simple => &self.simple,
            CallKind::WithTools => &self.tools,
        };
        let next = queue.lock().pop_front();
        match next {
            Some(ScriptedReply::Output(out)) => Ok(out),
            Some(ScriptedReply::Fail(msg)) => Err(LlmError::Unavailable(msg)),
            Some(ScriptedReply::Stall) => std::future::pending().await,
            None => Err(LlmError::Unavailable("script exhausted".into())),
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn call_simple(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        Ok(self.serve(CallKind::Simple, messages, &[]).await?.text)
    }

    async fn call_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<CompletionOutput, LlmError> {
        self.serve(CallKind::WithTools, messages, tools).await
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_are_served_in_order_then_exhaust() {
        let svc = ScriptedCompletionService::new().with_simple("one").with_simple("two");
        let msgs = [ChatMessage::user("q")];
        assert_eq!(svc.call_simple(&msgs).await.expect("one"), "one");
        assert_eq!(svc.call_simple(&msgs).await.expect("two"), "two");
        assert!(matches!(svc.call_simple(&msgs).await, Err(LlmError::Unavailable(_))));
        assert_eq!(svc.count(CallKind::Simple), 3);
        assert_eq!(svc.calls()[0].user_prompt(), "q");
    }

    #[tokio::test]
    async fn tool_queue_is_independent() {
        let svc = ScriptedCompletionService::new()
            .with_simple("text")
            .with_tools(CompletionOutput::tool_call("wait", "{}"));
        let out = svc.call_with_tools(&[ChatMessage::user("plan")], &[]).await.expect("tools");
        assert_eq!(out.tool_calls[0].name, "wait");
        assert_eq!(svc.call_simple(&[]).await.expect("simple"), "text");
    }
}
