//! LLM 模块
//!
//! 提供统一的 LLM 客户端（OpenAI / Anthropic 格式）和重试策略。

mod anthropic;
mod client;
mod endpoint;
mod openai;
mod retry;
mod types;

pub use client::{CompletionBackend, LlmClient};
pub use endpoint::{ApiFormat, Endpoint};
pub use retry::{complete_with_retry, RetryPolicy};
pub use types::*;
