//! 非流式处理器
//!
//! 消费完整的上游流，聚合为一个 `chat.completion` 响应体。
//! 上游错误帧和空响应都会立即失败，不返回部分结果。

use crate::config::ProcessorConfig;
use crate::error::UpstreamError;
use crate::streaming::{
    image_markdown, parse_line, ChatCompletion, ChunkBuilder, ProcessMetrics, UpstreamEvent,
};
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::pin;
use tracing::{debug, warn};

/// 非流式处理器
#[derive(Clone)]
pub struct CollectProcessor {
    model: String,
    token: String,
    config: ProcessorConfig,
}

impl fmt::Debug for CollectProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectProcessor")
            .field("model", &self.model)
            .field("token", &super::redact(&self.token))
            .field("config", &self.config)
            .finish()
    }
}

impl CollectProcessor {
    /// 创建处理器
    pub fn new(model: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            token: token.into(),
            config: ProcessorConfig::default(),
        }
    }

    /// 使用自定义配置
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// 模型名称
    pub fn model(&self) -> &str {
        &self.model
    }

    /// 上游凭证
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 处理器配置
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// 聚合上游流
    ///
    /// 内容优先取所有 token 按到达顺序拼接的结果；
    /// 没有任何 token 时回退到 `modelResponse.message`。
    pub async fn process<S, L>(&self, upstream: S) -> Result<ChatCompletion, UpstreamError>
    where
        S: Stream<Item = Result<L, UpstreamError>>,
        L: AsRef<[u8]>,
    {
        let mut upstream = pin!(upstream);
        let mut builder = ChunkBuilder::new(&self.model);
        let mut metrics = ProcessMetrics::new();

        let mut tokens = String::new();
        let mut final_message: Option<String> = None;
        let mut images: Vec<String> = Vec::new();
        let mut id_locked = false;

        while let Some(line) = upstream.next().await {
            let line = line?;
            let line = line.as_ref();
            metrics.record_line(line.len());

            let record = parse_line(line);
            if !id_locked {
                if let Some(id) = record.response_id {
                    builder.set_id(id);
                    id_locked = true;
                }
            }
            if builder.fingerprint().is_none() {
                if let Some(fp) = record.fingerprint {
                    builder.set_fingerprint(fp);
                }
            }

            match record.event {
                UpstreamEvent::Token { text, .. } => {
                    if text.is_empty() {
                        continue;
                    }
                    if self.config.is_filtered(&text) {
                        metrics.record_filtered();
                        continue;
                    }
                    metrics.record_token();
                    tokens.push_str(&text);
                }
                UpstreamEvent::ModelResponse {
                    message,
                    image_urls,
                } => {
                    if final_message.is_none() && !message.is_empty() {
                        final_message = Some(message);
                    }
                    images.extend(image_urls.iter().map(|url| self.config.image_url(url)));
                }
                UpstreamEvent::Error { message, details } => {
                    warn!(model = %self.model, error = %message, "上游返回错误帧");
                    return Err(UpstreamError::error_frame(message, Some(details)));
                }
                UpstreamEvent::Ignored | UpstreamEvent::Malformed => {
                    metrics.record_skipped();
                }
            }
        }

        let mut content = if tokens.is_empty() {
            final_message.unwrap_or_default()
        } else {
            tokens
        };

        for url in &images {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&image_markdown(url));
        }

        metrics.finish();
        metrics.log_metrics(&self.model, "collect");

        if content.is_empty() {
            warn!(
                model = %self.model,
                line_count = metrics.line_count,
                "上游未返回可用内容"
            );
            return Err(UpstreamError::EmptyResponse);
        }

        debug!(model = %self.model, len = content.len(), "聚合完成");
        Ok(builder.completion(content))
    }
}

// ============================================================================
// 测试模块
// ============================================================================
