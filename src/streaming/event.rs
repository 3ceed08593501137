//! Grok 上游事件解析
//!
//! 上游以换行分隔的 JSON 返回响应，每行是一个独立的事件对象：
//!
//! ```text
//! {"result":{"response":{"token":"h","isThinking":false,"responseId":"..."}}}
//! {"result":{"response":{"modelResponse":{"message":"hello","generatedImageUrls":[]}}}}
//! {"error":{"message":"bad"}}
//! ```
//!
//! 解析规则：
//! - 错误对象优先于其他字段，只要出现 `error` 就判定为错误帧
//! - 无法解析的行、空行以及无法识别的对象都会被跳过，不视为错误

use serde::Deserialize;
use tracing::debug;

/// 解析后的上游事件
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// token 增量
    Token {
        /// 文本片段
        text: String,
        /// 是否属于思考过程
        is_thinking: bool,
    },

    /// 完整的最终回复
    ///
    /// 上游不逐 token 返回时，整段回复通过该事件一次性给出。
    ModelResponse {
        /// 回复文本
        message: String,
        /// 生成图片的路径
        image_urls: Vec<String>,
    },

    /// 上游错误帧
    Error {
        /// 错误消息
        message: String,
        /// 原始错误对象
        details: serde_json::Value,
    },

    /// 合法 JSON，但不是可识别的事件（心跳、进度等）
    Ignored,

    /// 非法 JSON 或非 UTF-8 数据
    Malformed,
}

impl UpstreamEvent {
    /// 是否应被跳过
    pub fn is_skipped(&self) -> bool {
        matches!(self, UpstreamEvent::Ignored | UpstreamEvent::Malformed)
    }
}

/// 单行解析结果
///
/// 除事件本身外，还携带响应 ID、模型指纹等元数据。
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRecord {
    /// 上游响应 ID
    pub response_id: Option<String>,
    /// 模型指纹
    pub fingerprint: Option<String>,
    /// 事件
    pub event: UpstreamEvent,
}

impl UpstreamRecord {
    fn bare(event: UpstreamEvent) -> Self {
        Self {
            response_id: None,
            fingerprint: None,
            event,
        }
    }
}

// ============================================================================
// 上游帧结构
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct Frame {
    #[serde(default)]
    result: Option<ResultFrame>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultFrame {
    #[serde(default)]
    response: Option<ResponseFrame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseFrame {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    is_thinking: Option<bool>,
    #[serde(default)]
    model_response: Option<ModelResponseFrame>,
    #[serde(default)]
    response_id: Option<String>,
    #[serde(default)]
    llm_info: Option<LlmInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponseFrame {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    generated_image_urls: Vec<String>,
    #[serde(default)]
    metadata: Option<ModelResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelResponseMetadata {
    #[serde(default)]
    llm_info: Option<LlmInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmInfo {
    #[serde(default)]
    model_hash: Option<String>,
}

// ============================================================================
// 解析函数
// ============================================================================

/// 解析一行上游数据
pub fn parse_line(line: &[u8]) -> UpstreamRecord {
    let text = match std::str::from_utf8(line) {
        Ok(s) => s.trim(),
        Err(_) => {
            debug!(len = line.len(), "跳过非 UTF-8 数据行");
            return UpstreamRecord::bare(UpstreamEvent::Malformed);
        }
    };

    if text.is_empty() {
        return UpstreamRecord::bare(UpstreamEvent::Ignored);
    }

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "跳过无法解析的数据行");
            return UpstreamRecord::bare(UpstreamEvent::Malformed);
        }
    };

    // 错误帧优先
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .map(|m| m.to_string())
            .unwrap_or_else(|| error.to_string());
        return UpstreamRecord::bare(UpstreamEvent::Error {
            message,
            details: error.clone(),
        });
    }

    let frame: Frame = match serde_json::from_value(value) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "跳过结构不符的数据行");
            return UpstreamRecord::bare(UpstreamEvent::Malformed);
        }
    };

    let Some(response) = frame.result.and_then(|r| r.response) else {
        return UpstreamRecord::bare(UpstreamEvent::Ignored);
    };

    let mut fingerprint = response.llm_info.and_then(|info| info.model_hash);

    let event = if let Some(model_response) = response.model_response {
        if fingerprint.is_none() {
            fingerprint = model_response
                .metadata
                .and_then(|m| m.llm_info)
                .and_then(|info| info.model_hash);
        }
        UpstreamEvent::ModelResponse {
            message: model_response.message.unwrap_or_default(),
            image_urls: model_response.generated_image_urls,
        }
    } else if let Some(token) = response.token {
        UpstreamEvent::Token {
            text: token,
            is_thinking: response.is_thinking.unwrap_or(false),
        }
    } else {
        UpstreamEvent::Ignored
    };

    UpstreamRecord {
        response_id: response.response_id.filter(|id| !id.is_empty()),
        fingerprint: fingerprint.filter(|f| !f.is_empty()),
        event,
    }
}

// ============================================================================
// 测试模块
// ============================================================================
