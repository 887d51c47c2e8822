//! 文档生成器模块
//!
//! 基于结构化提取结果调用 LLM 生成文档与图表
//!
//! # 产物
//!
//! - 项目概览（markdown）
//! - 单文件文档（markdown）
//! - 时序图、类图（Mermaid 文本，原样返回）
//!
//! # 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use codedoc_rs::llm::LlmClient;
//! use codedoc_rs::services::doc_generator::{ArtifactInput, DocSynthesizer};
//!
//! let client = LlmClient::new(api_key, &base_url, model, timeout)?;
//! let synthesizer = DocSynthesizer::from_config(Arc::new(client), &config);
//! let overview = synthesizer.synthesize(ArtifactInput::Overview(&summary)).await?;
//! ```

pub mod prompts;
mod synthesizer;

pub use synthesizer::{ArtifactInput, ArtifactKind, DocSynthesizer};
