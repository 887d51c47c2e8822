//! 统一 LLM 客户端

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::anthropic::complete_anthropic;
use super::endpoint::{ApiFormat, Endpoint};
use super::openai::complete_openai;
use super::types::{ChatMessage, ChatOptions, Completion, LlmError};

/// 推理后端抽象
///
/// 文档合成器只依赖这个 trait，测试中可以替换为脚本化的实现。
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// 发起一次（非流式）完成请求
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError>;

    /// 模型标识，用于日志
    fn model(&self) -> &str;
}

/// 统一 LLM 客户端
///
/// 支持 OpenAI 和 Anthropic API 格式，根据模型名称自动选择
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: Endpoint,
    model: String,
}

impl LlmClient {
    /// 创建新的 LLM 客户端，同时解析并校验端点
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::ConfigError("API Key is required".to_string()));
        }
        let model = model.into();
        let endpoint = Endpoint::resolve(base_url, &model)?;
        info!(
            "LLM endpoint resolved: {} ({:?}) for model {}",
            endpoint.url, endpoint.format, model
        );

        // 构建 HTTP 客户端
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(LlmError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
        })
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError> {
        let url = self.endpoint.url.as_str();
        debug!("LLM request: model={}, api_format={:?}", self.model, self.endpoint.format);

        match self.endpoint.format {
            ApiFormat::OpenAi => {
                complete_openai(
                    &self.client,
                    &self.api_key,
                    url,
                    messages,
                    &self.model,
                    options,
                )
                .await
            }
            ApiFormat::Anthropic => {
                complete_anthropic(
                    &self.client,
                    &self.api_key,
                    url,
                    messages,
                    &self.model,
                    options,
                )
                .await
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = LlmClient::new("", "https://api.groq.com/openai", "m", Duration::from_secs(5));
        match result {
            Err(err) => assert!(err.is_auth()),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[test]
    fn test_invalid_base_url_rejected_at_construction() {
        let result = LlmClient::new("key", "groq.com/openai", "llama", Duration::from_secs(5));
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_client_keeps_model() {
        let client =
            LlmClient::new("key", "https://api.groq.com/openai", "llama", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.model(), "llama");
    }
}
