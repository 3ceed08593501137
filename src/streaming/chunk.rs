//! OpenAI 兼容输出构建
//!
//! - stream 模式：`chat.completion.chunk` SSE 事件（`data: {...}\n\n`），以 `data: [DONE]` 结束
//! - collect 模式：完整的 `chat.completion` 响应体

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SSE 结束标记
pub const DONE_EVENT: &str = "data: [DONE]\n\n";

/// 增量通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// 最终回复内容
    Content,
    /// 思考过程
    Reasoning,
}

impl DeltaKind {
    fn field(&self) -> &'static str {
        match self {
            DeltaKind::Content => "content",
            DeltaKind::Reasoning => "reasoning_content",
        }
    }
}

/// 非流式响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletion {
    /// 第一个选项的回复内容
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }
}

/// 非流式响应选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// 助手消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// 输出构建器
///
/// 持有一次响应内共享的元数据（ID、创建时间、模型、指纹）。
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    id: String,
    created: i64,
    model: String,
    fingerprint: Option<String>,
}

impl ChunkBuilder {
    /// 创建构建器，ID 默认为 `chatcmpl-<uuid>`
    pub fn new(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            created: Utc::now().timestamp(),
            model: model.to_string(),
            fingerprint: None,
        }
    }

    /// 响应 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 模型指纹
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// 使用上游响应 ID
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// 设置模型指纹
    pub fn set_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.fingerprint = Some(fingerprint.into());
    }

    /// 创建增量 chunk
    ///
    /// `with_role` 为 true 时附带 `role: assistant`，用于首个 chunk。
    pub fn delta_chunk(&self, kind: DeltaKind, text: &str, with_role: bool) -> String {
        let mut delta = serde_json::Map::new();
        if with_role {
            delta.insert("role".to_string(), serde_json::json!("assistant"));
        }
        delta.insert(kind.field().to_string(), serde_json::json!(text));

        self.chunk(serde_json::Value::Object(delta), None)
    }

    /// 创建结束 chunk
    pub fn finish_chunk(&self, finish_reason: &str) -> String {
        self.chunk(serde_json::json!({}), Some(finish_reason))
    }

    fn chunk(&self, delta: serde_json::Value, finish_reason: Option<&str>) -> String {
        let chunk = serde_json::json!({
            "id": self.id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
            "system_fingerprint": self.fingerprint,
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason
            }]
        });
        format!("data: {}\n\n", chunk)
    }

    /// 创建非流式响应体
    pub fn completion(&self, content: String) -> ChatCompletion {
        ChatCompletion {
            id: self.id.clone(),
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: self.fingerprint.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

/// 生成图片的 markdown
pub fn image_markdown(url: &str) -> String {
    format!("![image]({})", url)
}

/// 从 SSE 事件中提取所有 `delta.content`
pub fn extract_content_from_chunks(events: &[String]) -> String {
    extract_delta(events, DeltaKind::Content)
}

/// 从 SSE 事件中提取所有 `delta.reasoning_content`
pub fn extract_reasoning_from_chunks(events: &[String]) -> String {
    extract_delta(events, DeltaKind::Reasoning)
}

fn extract_delta(events: &[String], kind: DeltaKind) -> String {
    let mut content = String::new();

    for event in events {
        for line in event.lines() {
            let Some(json_str) = line.strip_prefix("data: ") else {
                continue;
            };
            if json_str == "[DONE]" {
                continue;
            }
            let Ok(chunk) = serde_json::from_str::<serde_json::Value>(json_str) else {
                continue;
            };
            if let Some(choices) = chunk.get("choices").and_then(|c| c.as_array()) {
                for choice in choices {
                    if let Some(text) = choice
                        .get("delta")
                        .and_then(|d| d.get(kind.field()))
                        .and_then(|t| t.as_str())
                    {
                        content.push_str(text);
                    }
                }
            }
        }
    }

    content
}

// ============================================================================
// 测试模块
// ============================================================================
