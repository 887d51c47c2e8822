//! Anthropic Messages API 调用

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::openai::{map_send_error, truncate};
use super::types::{ChatMessage, ChatOptions, Completion, LlmError};

/// Anthropic 请求载荷
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Anthropic 响应
#[derive(Deserialize, Debug)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// 调用 Anthropic 接口并返回完整文本
pub async fn complete_anthropic(
    client: &Client,
    api_key: &str,
    endpoint: &str,
    messages: &[ChatMessage],
    model: &str,
    options: &ChatOptions,
) -> Result<Completion, LlmError> {
    // 分离系统消息
    let mut system_parts: Vec<String> = Vec::new();
    let mut anthropic_messages: Vec<AnthropicMessage> = Vec::new();
    for msg in messages {
        if msg.role == "system" {
            system_parts.push(msg.content.clone());
        } else {
            anthropic_messages.push(AnthropicMessage {
                role: msg.role.clone(),
                content: msg.content.clone(),
            });
        }
    }

    let payload = AnthropicRequest {
        model: model.to_string(),
        messages: anthropic_messages,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        max_tokens: options.max_tokens.unwrap_or(4096),
        temperature: options.temperature,
    };

    debug!("Anthropic API request: endpoint={}, model={}", endpoint, model);

    let response = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&payload)
        .send()
        .await
        .map_err(map_send_error)?;

    let status = response.status();
    if !status.is_success() {
        let status_code = status.as_u16();
        let error_text = response.text().await.unwrap_or_default();
        error!(
            "Anthropic API error: status={}, body={}",
            status_code,
            truncate(&error_text, 500)
        );
        return Err(LlmError::from_status(status_code, error_text));
    }

    let body = response.text().await.map_err(map_send_error)?;
    parse_anthropic_response(&body)
}

/// 拼接所有 text 类型的内容块
fn parse_anthropic_response(body: &str) -> Result<Completion, LlmError> {
    let parsed: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Malformed(format!("无法解析响应 JSON: {}", e)))?;

    let content = parsed
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(Completion {
        content,
        finish_reason: parsed.stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_anthropic_response() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "classDiagram\n"},
                {"type": "text", "text": "  class A"}
            ],
            "stop_reason": "end_turn"
        }"#;
        let completion = parse_anthropic_response(body).unwrap();
        assert_eq!(completion.content, "classDiagram\n  class A");
        assert_eq!(completion.finish_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn test_parse_anthropic_response_invalid() {
        assert!(matches!(
            parse_anthropic_response("{"),
            Err(LlmError::Malformed(_))
        ));
    }
}
