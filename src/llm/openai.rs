//! OpenAI 兼容的 Chat Completions 调用（Groq、OpenAI 等）

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::types::{ChatMessage, ChatOptions, Completion, LlmError};

/// OpenAI 请求载荷
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// OpenAI 响应
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiMessage {
    content: Option<String>,
}

/// 调用 OpenAI 兼容接口并返回完整文本
pub async fn complete_openai(
    client: &Client,
    api_key: &str,
    endpoint: &str,
    messages: &[ChatMessage],
    model: &str,
    options: &ChatOptions,
) -> Result<Completion, LlmError> {
    let payload = OpenAiRequest {
        model,
        messages,
        stream: false,
        temperature: options.temperature,
        top_p: options.top_p,
        max_tokens: options.max_tokens,
    };

    debug!("OpenAI API request: endpoint={}, model={}", endpoint, model);

    let response = client
        .post(endpoint)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .map_err(map_send_error)?;

    let status = response.status();
    if !status.is_success() {
        let status_code = status.as_u16();
        let error_text = response.text().await.unwrap_or_default();
        error!(
            "OpenAI API error: status={}, body={}",
            status_code,
            truncate(&error_text, 500)
        );
        return Err(LlmError::from_status(status_code, error_text));
    }

    let body = response.text().await.map_err(map_send_error)?;
    parse_openai_response(&body)
}

/// 解析响应体，提取第一个 choice 的内容
fn parse_openai_response(body: &str) -> Result<Completion, LlmError> {
    let parsed: OpenAiResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Malformed(format!("无法解析响应 JSON: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("响应中没有 choices".to_string()))?;

    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })
}

pub(super) fn map_send_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::HttpError(e)
    }
}

pub(super) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}]}"#;
        let completion = parse_openai_response(body).unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_openai_response_without_choices() {
        let err = parse_openai_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));

        let err = parse_openai_response("<html>").unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[test]
    fn test_null_content_becomes_empty() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"length"}]}"#;
        let completion = parse_openai_response(body).unwrap();
        assert!(completion.content.is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("你好世界", 2), "你好");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
