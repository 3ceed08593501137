//! 上游流处理基础模块
//!
//! # 主要组件
//!
//! - `event`: Grok 上游事件解析
//! - `lines`: 字节流按行切分
//! - `chunk`: OpenAI 兼容输出构建
//! - `metrics`: 单次处理指标

pub mod chunk;
pub mod event;
pub mod lines;
pub mod metrics;

// 重新导出核心类型
pub use chunk::{
    extract_content_from_chunks, extract_reasoning_from_chunks, image_markdown, ChatChoice,
    ChatCompletion, ChatMessage, ChunkBuilder, DeltaKind, DONE_EVENT,
};
pub use event::{parse_line, UpstreamEvent, UpstreamRecord};
pub use lines::{from_response, split_lines, LineSplitter, LineStream};
pub use metrics::ProcessMetrics;
