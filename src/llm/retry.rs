//! 推理调用重试策略
//!
//! 只重试暂时性错误（限流、超时、5xx、连接失败），鉴权和额度错误立即返回。

use std::time::Duration;
use tracing::warn;

use super::client::CompletionBackend;
use super::types::{ChatMessage, ChatOptions, Completion, LlmError};

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 首次调用之后最多再尝试几次
    pub max_retries: u32,
    /// 基础退避时间，每次翻倍
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// 第 `attempt` 次重试前的等待时间（从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// 带重试的完成调用
pub async fn complete_with_retry(
    backend: &dyn CompletionBackend,
    messages: &[ChatMessage],
    options: &ChatOptions,
    policy: RetryPolicy,
) -> Result<Completion, LlmError> {
    let mut attempt = 0;
    loop {
        match backend.complete(messages, options).await {
            Ok(completion) => return Ok(completion),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Transient inference error (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    policy.max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// 按顺序返回预设结果的后端
    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<Result<Completion, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<Completion, LlmError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<Completion, LlmError> {
            *self.calls.lock() += 1;
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Malformed("script exhausted".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn ok(text: &str) -> Result<Completion, LlmError> {
        Ok(Completion {
            content: text.to_string(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::RateLimited("slow down".to_string())),
            ok("done"),
        ]);

        let result = complete_with_retry(&backend, &[], &ChatOptions::default(), fast_policy(2))
            .await
            .unwrap();
        assert_eq!(result.content, "done");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_ceiling() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::RateLimited("1".to_string())),
            Err(LlmError::RateLimited("2".to_string())),
            Err(LlmError::RateLimited("3".to_string())),
            ok("never reached"),
        ]);

        let err = complete_with_retry(&backend, &[], &ChatOptions::default(), fast_policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
        // 1 次原始调用 + 2 次重试
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::AuthError {
                status: 401,
                message: "invalid key".to_string(),
            }),
            ok("never reached"),
        ]);

        let err = complete_with_retry(&backend, &[], &ChatOptions::default(), fast_policy(2))
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_quota_error_not_retried() {
        let body = r#"{"error":{"type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::from_status(429, body.to_string())),
            ok("never reached"),
        ]);

        let err = complete_with_retry(&backend, &[], &ChatOptions::default(), fast_policy(2))
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert_eq!(backend.calls(), 1);
    }
}
