//! # anima-llm — Completion & Embedding Services for Anima
//!
//! Every model call an NPC turn makes goes through this crate:
//!   - **Completions** via the [`CompletionService`] trait, with an
//!     OpenAI-compatible HTTP client ([`LlmClient`])
//!   - **Embeddings** via [`anima_core::EmbeddingService`], implemented by
//!     [`OpenAiEmbeddingClient`]
//!
//! The crate also owns the prompt templates, retry-with-backoff at the
//! service boundary, and Result-typed parsing of structured model output.
//! [`ScriptedCompletionService`] replays queued replies for tests.

pub mod client;
pub mod embedding;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod sim;
pub mod types;

pub use client::{CompletionService, LlmClient};
pub use embedding::OpenAiEmbeddingClient;
pub use error::LlmError;
pub use prompt::{PromptEngine, PromptId};
pub use retry::RetryPolicy;
pub use sim::{ScriptedCompletionService, ScriptedReply};
pub use types::{ChatMessage, CompletionOutput, ImportanceVerdict, ReflectionOutput, ToolCall, ToolSpec};
