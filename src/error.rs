//! 上游错误类型
//!
//! 定义处理 Grok 上游响应时可能发生的错误。
//!
//! - `ErrorFrame`: 上游在流中显式返回了 `{"error": {...}}`
//! - `EmptyResponse`: 上游没有返回任何可用内容（仅 collect 模式抛出）
//! - `Transport`: 底层字节流读取失败
//! - `LineTooLong`: 单行数据超过缓冲区上限

use thiserror::Error;

/// 上游错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    /// 上游错误帧
    #[error("上游返回错误: {message}")]
    ErrorFrame {
        /// 上游错误消息
        message: String,
        /// 原始错误对象（用于排查）
        details: Option<serde_json::Value>,
    },

    /// 上游未返回可用内容
    #[error("上游未返回可用内容")]
    EmptyResponse,

    /// 传输错误
    #[error("上游连接错误: {0}")]
    Transport(String),

    /// 单行超出缓冲区上限
    #[error("上游单行数据超过 {limit} 字节")]
    LineTooLong {
        /// 缓冲区上限（字节）
        limit: usize,
    },
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Transport(format!("读取超时: {}", err))
        } else if err.is_connect() {
            UpstreamError::Transport(format!("连接失败: {}", err))
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for UpstreamError {
    fn from(err: std::io::Error) -> Self {
        UpstreamError::Transport(err.to_string())
    }
}

impl UpstreamError {
    /// 创建错误帧
    pub fn error_frame(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        UpstreamError::ErrorFrame {
            message: message.into(),
            details,
        }
    }

    /// 创建传输错误
    pub fn transport(msg: impl Into<String>) -> Self {
        UpstreamError::Transport(msg.into())
    }

    /// 人类可读的原因
    ///
    /// 错误帧返回上游的原始消息，其余返回 Display 文本。
    pub fn reason(&self) -> String {
        match self {
            UpstreamError::ErrorFrame { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// 判断错误是否可重试
    ///
    /// 只有传输层错误值得由调用方重试，错误帧和空响应重试通常没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Transport(_))
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        502 // Bad Gateway
    }

    /// 转换为 OpenAI 风格的 SSE 错误事件
    pub fn to_sse_error(&self) -> String {
        let error_json = serde_json::json!({
            "error": {
                "type": self.error_type_string(),
                "message": self.reason(),
            }
        });
        format!("data: {}\n\n", error_json)
    }

    /// 获取错误类型字符串
    fn error_type_string(&self) -> &'static str {
        match self {
            UpstreamError::ErrorFrame { .. } => "upstream_error",
            UpstreamError::EmptyResponse => "empty_response",
            UpstreamError::Transport(_) => "transport_error",
            UpstreamError::LineTooLong { .. } => "line_too_long",
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================
