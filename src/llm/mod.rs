// src/llm/mod.rs
// LLM Client: chat completions with JSON-mode helpers, retries, and streaming.

pub mod provider;

pub use provider::{
    ChatOptions, GlmProvider, LlmProvider, Message, ResponseFormat, ChatResponse,
};
