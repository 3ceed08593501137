//! Grok 上游响应适配
//!
//! 将 Grok 按行分隔的 JSON 流式响应转换为 OpenAI 兼容格式：
//!
//! - [`CollectProcessor`]: 聚合为一个 `chat.completion` 响应体
//! - [`StreamProcessor`]: 逐条转发为 `chat.completion.chunk` SSE 事件
//!
//! HTTP 传输、鉴权和请求构造由调用方负责；本库只处理响应字节流。

pub mod config;
pub mod error;
pub mod processor;
pub mod streaming;
pub mod telemetry;

pub use config::{load_config, AppConfig, ConfigError, LoggingConfig, ProcessorConfig};
pub use error::UpstreamError;
pub use processor::{ChunkStream, CollectProcessor, StreamProcessor};
pub use streaming::{ChatCompletion, LineStream};
pub use telemetry::init_tracing;
