//! LLM 类型定义

use serde::{Deserialize, Serialize};

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// 角色：system, user, assistant
    pub role: String,
    /// 消息内容
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 聊天选项
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// 温度参数
    pub temperature: Option<f64>,
    /// top_p 参数
    pub top_p: Option<f64>,
    /// 最大 token 数
    pub max_tokens: Option<u32>,
}

/// 一次完成调用的结果
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// 生成的文本
    pub content: String,
    /// 完成原因
    pub finish_reason: Option<String>,
}

/// LLM 错误类型
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 请求错误（连接失败等）
    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API 返回错误
    #[error("API 错误 ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// 鉴权失败
    #[error("鉴权失败 ({status}): {message}")]
    AuthError { status: u16, message: String },

    /// 被限流
    #[error("请求被限流: {0}")]
    RateLimited(String),

    /// 账户额度耗尽（同样可能以 429 返回，但重试无意义）
    #[error("额度已用尽: {0}")]
    QuotaExceeded(String),

    /// 超时错误
    #[error("请求超时")]
    Timeout,

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 响应格式错误或内容为空
    #[error("响应无效: {0}")]
    Malformed(String),
}

impl LlmError {
    /// 根据 HTTP 状态码分类 API 错误
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => LlmError::AuthError { status, message },
            402 => LlmError::QuotaExceeded(message),
            429 if is_quota_message(&message) => LlmError::QuotaExceeded(message),
            429 => LlmError::RateLimited(message),
            408 => LlmError::Timeout,
            _ => LlmError::ApiError { status, message },
        }
    }

    /// 鉴权 / 密钥问题，不应重试
    pub fn is_auth(&self) -> bool {
        matches!(self, LlmError::AuthError { .. } | LlmError::ConfigError(_))
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, LlmError::QuotaExceeded(_))
    }

    /// 可重试的暂时性错误
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited(_) | LlmError::Timeout => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// OpenAI 兼容接口用 `insufficient_quota` 区分额度耗尽与普通限流
fn is_quota_message(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("insufficient_quota") || body.contains("quota exceeded") || body.contains("billing")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(LlmError::from_status(401, String::new()).is_auth());
        assert!(LlmError::from_status(403, String::new()).is_auth());
        assert!(LlmError::from_status(429, String::new()).is_transient());
        assert!(LlmError::from_status(503, String::new()).is_transient());
        assert!(LlmError::from_status(408, String::new()).is_transient());

        let bad_request = LlmError::from_status(400, "bad".to_string());
        assert!(!bad_request.is_transient());
        assert!(!bad_request.is_auth());
    }

    #[test]
    fn test_quota_429_is_not_transient() {
        let body = r#"{"error":{"message":"You exceeded your current quota, please check your plan and billing details.","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = LlmError::from_status(429, body.to_string());
        assert!(err.is_quota());
        assert!(!err.is_transient());

        let err = LlmError::from_status(429, "Rate limit reached for model on tokens per minute".to_string());
        assert!(matches!(err, LlmError::RateLimited(_)));
        assert!(LlmError::from_status(402, String::new()).is_quota());
    }

    #[test]
    fn test_malformed_is_terminal() {
        let err = LlmError::Malformed("empty".to_string());
        assert!(!err.is_transient());
        assert!(!err.is_auth());
        assert!(LlmError::ConfigError("no key".to_string()).is_auth());
    }
}
