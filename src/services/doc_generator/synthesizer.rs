//! 文档合成器
//!
//! 把结构化事实渲染成 Prompt，调用推理后端，原样返回生成的文本。
//! 不校验图表语法，交给前端渲染器处理。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::llm::{complete_with_retry, ChatMessage, ChatOptions, CompletionBackend, LlmError, RetryPolicy};
use crate::services::code_analyzer::{FileRecord, ProjectSummary};

/// 产物种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Overview,
    FileDoc,
    SequenceDiagram,
    ClassDiagram,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Overview => "overview",
            ArtifactKind::FileDoc => "file-doc",
            ArtifactKind::SequenceDiagram => "sequence-diagram",
            ArtifactKind::ClassDiagram => "class-diagram",
        };
        f.write_str(name)
    }
}

/// 合成请求的输入
#[derive(Debug, Clone, Copy)]
pub enum ArtifactInput<'a> {
    Overview(&'a ProjectSummary),
    FileDoc { record: &'a FileRecord, excerpt: &'a str },
    SequenceDiagram(&'a ProjectSummary),
    ClassDiagram(&'a ProjectSummary),
}

impl ArtifactInput<'_> {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactInput::Overview(_) => ArtifactKind::Overview,
            ArtifactInput::FileDoc { .. } => ArtifactKind::FileDoc,
            ArtifactInput::SequenceDiagram(_) => ArtifactKind::SequenceDiagram,
            ArtifactInput::ClassDiagram(_) => ArtifactKind::ClassDiagram,
        }
    }

    /// 渲染确定性的 Prompt
    pub fn render(&self) -> String {
        match self {
            ArtifactInput::Overview(summary) => prompts::format_overview_prompt(summary),
            ArtifactInput::FileDoc { record, excerpt } => prompts::format_file_doc_prompt(record, excerpt),
            ArtifactInput::SequenceDiagram(summary) => prompts::format_sequence_diagram_prompt(summary),
            ArtifactInput::ClassDiagram(summary) => prompts::format_class_diagram_prompt(summary),
        }
    }
}

/// 文档合成器
pub struct DocSynthesizer {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    options: ChatOptions,
}

impl DocSynthesizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy, options: ChatOptions) -> Self {
        Self {
            backend,
            policy,
            options,
        }
    }

    /// 按配置的重试策略和采样参数创建
    pub fn from_config(backend: Arc<dyn CompletionBackend>, config: &AppConfig) -> Self {
        Self::new(
            backend,
            RetryPolicy::new(
                config.max_retries,
                std::time::Duration::from_millis(config.retry_backoff_ms),
            ),
            ChatOptions {
                temperature: Some(config.temperature),
                top_p: None,
                max_tokens: Some(config.max_tokens),
            },
        )
    }

    /// 生成一个产物
    pub async fn synthesize(&self, input: ArtifactInput<'_>) -> Result<String, AnalysisError> {
        let kind = input.kind();
        let messages = [
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(input.render()),
        ];

        info!("Synthesizing {} with model {}", kind, self.backend.model());

        let completion = complete_with_retry(self.backend.as_ref(), &messages, &self.options, self.policy)
            .await
            .map_err(|e| {
                warn!("Inference failed for {}: {}", kind, e);
                classify_llm_error(e)
            })?;

        if completion.content.trim().is_empty() {
            warn!("Empty inference response for {}", kind);
            return Err(AnalysisError::InferenceMalformed(format!(
                "empty response for {}",
                kind
            )));
        }

        Ok(completion.content)
    }
}

fn classify_llm_error(error: LlmError) -> AnalysisError {
    if error.is_auth() {
        AnalysisError::InferenceAuth(error.to_string())
    } else if error.is_quota() {
        AnalysisError::InferenceQuota(error.to_string())
    } else if error.is_transient() {
        AnalysisError::InferenceTransient(error.to_string())
    } else if matches!(error, LlmError::Malformed(_)) {
        AnalysisError::InferenceMalformed(error.to_string())
    } else {
        AnalysisError::InferenceRequest(error.to_string())
    }
}
