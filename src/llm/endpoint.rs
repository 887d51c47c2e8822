//! 推理端点解析
//!
//! 客户端创建时根据模型名和 `base_url` 一次性确定协议和完整的请求地址，
//! 配置错误在启动时暴露，而不是在第一次分析时。

use reqwest::Url;
use serde::Serialize;

use super::types::LlmError;

/// 请求协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiFormat {
    /// OpenAI 兼容的 Chat Completions（Groq、OpenAI 等）
    OpenAi,
    /// Anthropic Messages
    Anthropic,
}

impl ApiFormat {
    /// Claude 系列模型走 Messages 协议，其余都按 Chat Completions
    pub fn for_model(model: &str) -> Self {
        if model.to_ascii_lowercase().contains("claude") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAi
        }
    }

    fn route(self) -> &'static [&'static str] {
        match self {
            ApiFormat::OpenAi => &["chat", "completions"],
            ApiFormat::Anthropic => &["messages"],
        }
    }
}

/// 已解析的推理端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub format: ApiFormat,
    pub url: Url,
}

impl Endpoint {
    /// `base_url` 可以是服务根地址、`/v1` 前缀或者完整的端点地址
    pub fn resolve(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let format = ApiFormat::for_model(model);
        let mut url = Url::parse(base_url.trim())
            .map_err(|e| LlmError::ConfigError(format!("invalid base_url {:?}: {}", base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(LlmError::ConfigError(format!(
                "base_url must be an http(s) URL with a host: {}",
                base_url
            )));
        }

        let mut segments: Vec<String> = url
            .path_segments()
            .map(|parts| parts.filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let route: Vec<String> = format.route().iter().map(|s| s.to_string()).collect();
        if !segments.ends_with(&route) {
            if segments.last().map(String::as_str) != Some("v1") {
                segments.push("v1".to_string());
            }
            segments.extend(route);
        }

        url.set_path(&format!("/{}", segments.join("/")));
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { format, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(base_url: &str, model: &str) -> String {
        Endpoint::resolve(base_url, model).unwrap().url.to_string()
    }

    #[test]
    fn test_format_from_model() {
        assert_eq!(ApiFormat::for_model("llama-3.1-70b-versatile"), ApiFormat::OpenAi);
        assert_eq!(ApiFormat::for_model("Claude-3-Sonnet"), ApiFormat::Anthropic);
    }

    #[test]
    fn test_default_groq_endpoint() {
        assert_eq!(
            resolved("https://api.groq.com/openai", "llama-3.1-70b-versatile"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_prefix_and_full_paths_are_kept() {
        for base in [
            "https://api.openai.com/v1",
            "https://api.openai.com/v1/",
            "https://api.openai.com//v1",
            "https://api.openai.com/v1/chat/completions",
        ] {
            assert_eq!(resolved(base, "gpt-4o"), "https://api.openai.com/v1/chat/completions", "{base}");
        }
    }

    #[test]
    fn test_anthropic_endpoint() {
        let endpoint = Endpoint::resolve("https://api.anthropic.com", "claude-3-opus").unwrap();
        assert_eq!(endpoint.format, ApiFormat::Anthropic);
        assert_eq!(endpoint.url.as_str(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        for base in ["", "api.groq.com/openai", "ftp://mirror.example.com"] {
            let err = Endpoint::resolve(base, "gpt-4o").unwrap_err();
            assert!(matches!(err, LlmError::ConfigError(_)), "{base}");
        }
    }
}
