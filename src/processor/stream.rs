//! 流式处理器
//!
//! 逐行消费上游流，每条可用事件立即转换为一个 OpenAI `chat.completion.chunk`。
//!
//! 与 `CollectProcessor` 的区别：
//! - 上游没有可用内容时输出一条提示 chunk，而不是报错
//! - 上游错误帧作为流的最后一项 `Err` 输出，之后流结束

use crate::config::ProcessorConfig;
use crate::error::UpstreamError;
use crate::streaming::{
    image_markdown, parse_line, ChunkBuilder, DeltaKind, ProcessMetrics, UpstreamEvent,
    DONE_EVENT,
};
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use tracing::{debug, warn};

/// 输出 chunk 流
///
/// 每项是一个完整的 SSE 事件字符串，或终止流的上游错误。
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// 流式处理器
#[derive(Clone)]
pub struct StreamProcessor {
    model: String,
    token: String,
    think: bool,
    config: ProcessorConfig,
}

impl fmt::Debug for StreamProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProcessor")
            .field("model", &self.model)
            .field("token", &super::redact(&self.token))
            .field("think", &self.think)
            .field("config", &self.config)
            .finish()
    }
}

/// 单次调用的输出状态
struct EmitState {
    builder: ChunkBuilder,
    metrics: ProcessMetrics,
    /// 是否已发送带 role 的首个 chunk
    role_sent: bool,
    /// 是否已发送过 content 通道的内容
    content_sent: bool,
}

impl EmitState {
    fn new(model: &str) -> Self {
        Self {
            builder: ChunkBuilder::new(model),
            metrics: ProcessMetrics::new(),
            role_sent: false,
            content_sent: false,
        }
    }

    fn emit(&mut self, kind: DeltaKind, text: &str) -> String {
        let chunk = self.builder.delta_chunk(kind, text, !self.role_sent);
        self.role_sent = true;
        if kind == DeltaKind::Content {
            self.content_sent = true;
        }
        self.metrics.record_emitted();
        chunk
    }

    /// 首个 chunk 发出之前才接受上游的 ID 和指纹，保证同一响应内 ID 一致
    fn absorb_metadata(&mut self, response_id: Option<String>, fingerprint: Option<String>) {
        if self.role_sent {
            return;
        }
        if let Some(id) = response_id {
            self.builder.set_id(id);
        }
        if let Some(fp) = fingerprint {
            self.builder.set_fingerprint(fp);
        }
    }
}

impl StreamProcessor {
    /// 创建处理器
    ///
    /// `think` 为 true 时思考过程通过 `reasoning_content` 单独输出，
    /// 否则与正文一起合并到 `content`。
    pub fn new(model: impl Into<String>, token: impl Into<String>, think: bool) -> Self {
        Self {
            model: model.into(),
            token: token.into(),
            think,
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

    /// 是否单独输出思考过程
    pub fn think(&self) -> bool {
        self.think
    }

    /// 处理器配置
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// 将上游流转换为 chunk 流
    ///
    /// 返回的流只能消费一次；处理状态归属于本次调用。
    pub fn process<S, L>(&self, upstream: S) -> ChunkStream
    where
        S: Stream<Item = Result<L, UpstreamError>> + Send + 'static,
        L: AsRef<[u8]> + Send + 'static,
    {
        let model = self.model.clone();
        let think = self.think;
        let config = self.config.clone();

        let stream = async_stream::stream! {
            let mut upstream = Box::pin(upstream);
            let mut state = EmitState::new(&model);

            while let Some(line) = upstream.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(model = %model, error = %err, "上游连接中断");
                        yield Err(err);
                        return;
                    }
                };

                let bytes = line.as_ref();
                state.metrics.record_line(bytes.len());
                let record = parse_line(bytes);
                state.absorb_metadata(record.response_id, record.fingerprint);

                match record.event {
                    UpstreamEvent::Token { text, is_thinking } => {
                        if text.is_empty() {
                            continue;
                        }
                        if config.is_filtered(&text) {
                            state.metrics.record_filtered();
                            continue;
                        }
                        state.metrics.record_token();
                        let kind = if is_thinking && think {
                            DeltaKind::Reasoning
                        } else {
                            DeltaKind::Content
                        };
                        yield Ok(state.emit(kind, &text));
                    }
                    UpstreamEvent::ModelResponse { message, image_urls } => {
                        // 已经逐 token 输出过正文时，完整回复只是重复
                        if !state.content_sent && !message.is_empty() {
                            yield Ok(state.emit(DeltaKind::Content, &message));
                        }
                        for url in &image_urls {
                            let mut markdown = image_markdown(&config.image_url(url));
                            if state.content_sent {
                                markdown.insert(0, '\n');
                            }
                            yield Ok(state.emit(DeltaKind::Content, &markdown));
                        }
                    }
                    UpstreamEvent::Error { message, details } => {
                        warn!(model = %model, error = %message, "上游返回错误帧");
                        yield Err(UpstreamError::error_frame(message, Some(details)));
                        return;
                    }
                    UpstreamEvent::Ignored | UpstreamEvent::Malformed => {
                        state.metrics.record_skipped();
                    }
                }
            }

            if !state.role_sent {
                warn!(
                    model = %model,
                    line_count = state.metrics.line_count,
                    "上游未返回可用内容，输出提示"
                );
                yield Ok(state.emit(DeltaKind::Content, &config.empty_hint));
            }

            yield Ok(state.builder.finish_chunk("stop"));
            yield Ok(DONE_EVENT.to_string());

            state.metrics.finish();
            state.metrics.log_metrics(&model, "stream");
            debug!(model = %model, id = %state.builder.id(), "流式输出完成");
        };

        Box::pin(stream)
    }
}

// ============================================================================
// 测试模块
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EMPTY_HINT;
    use crate::streaming::{extract_content_from_chunks, extract_reasoning_from_chunks};
    use futures::stream;

    fn upstream(
        lines: Vec<&'static str>,
    ) -> impl Stream<Item = Result<&'static [u8], UpstreamError>> + Send + 'static {
        stream::iter(lines.into_iter().map(|l| Ok(l.as_bytes())))
    }

    async fn collect_ok(stream: ChunkStream) -> Vec<String> {
        stream
            .map(|item| item.expect("unexpected upstream error"))
            .collect()
            .await
    }

    fn payload(event: &str) -> serde_json::Value {
        let json = event.strip_prefix("data: ").unwrap().trim_end();
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_stream_tokens() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![
            "{\"result\":{\"response\":{\"token\":\"h\"}}}\n",
            "{\"result\":{\"response\":{\"token\":\"i\"}}}\n",
        ])))
        .await;

        // 两个内容 chunk + 结束 chunk + [DONE]
        assert_eq!(chunks.len(), 4);
        assert_eq!(extract_content_from_chunks(&chunks), "hi");
        assert_eq!(payload(&chunks[0])["choices"][0]["delta"]["role"], "assistant");
        assert!(payload(&chunks[1])["choices"][0]["delta"].get("role").is_none());
        assert_eq!(payload(&chunks[2])["choices"][0]["finish_reason"], "stop");
        assert_eq!(chunks[3], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_stream_model_response_without_tokens() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![
            "{\"result\":{\"response\":{\"modelResponse\":{\"message\":\"hello\"}}}}\n",
        ])))
        .await;

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].contains("hello"));
        assert_eq!(chunks[2], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_stream_model_response_after_tokens_not_repeated() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![
            "{\"result\":{\"response\":{\"token\":\"hel\"}}}",
            "{\"result\":{\"response\":{\"token\":\"lo\"}}}",
            "{\"result\":{\"response\":{\"modelResponse\":{\"message\":\"hello\"}}}}",
        ])))
        .await;

        assert_eq!(extract_content_from_chunks(&chunks), "hello");
    }

    #[tokio::test]
    async fn test_stream_empty_upstream_hint() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![]))).await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().filter(|c| c.contains(DEFAULT_EMPTY_HINT)).count(),
            1
        );
        assert_eq!(chunks[2], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_stream_only_unusable_lines_hint() {
        let proc = StreamProcessor::new("grok-3", "", false)
            .with_config(ProcessorConfig::new().with_empty_hint("nothing"));
        let chunks = collect_ok(proc.process(upstream(vec![
            "garbage",
            "{\"result\":{\"response\":{\"token\":\"<xaiartifact/>\"}}}",
            "{}",
        ])))
        .await;

        assert_eq!(extract_content_from_chunks(&chunks), "nothing");
    }

    #[tokio::test]
    async fn test_stream_think_mode_separates_reasoning() {
        let lines = vec![
            "{\"result\":{\"response\":{\"token\":\"plan\",\"isThinking\":true}}}",
            "{\"result\":{\"response\":{\"token\":\"answer\"}}}",
        ];

        let proc = StreamProcessor::new("grok-3", "", true);
        let chunks = collect_ok(proc.process(upstream(lines.clone()))).await;
        assert_eq!(extract_reasoning_from_chunks(&chunks), "plan");
        assert_eq!(extract_content_from_chunks(&chunks), "answer");

        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(lines))).await;
        assert_eq!(extract_reasoning_from_chunks(&chunks), "");
        assert_eq!(extract_content_from_chunks(&chunks), "plananswer");
    }

    #[tokio::test]
    async fn test_stream_model_response_after_reasoning_only() {
        let proc = StreamProcessor::new("grok-3", "", true);
        let chunks = collect_ok(proc.process(upstream(vec![
            "{\"result\":{\"response\":{\"token\":\"plan\",\"isThinking\":true}}}",
            "{\"result\":{\"response\":{\"modelResponse\":{\"message\":\"final\"}}}}",
        ])))
        .await;

        assert_eq!(extract_reasoning_from_chunks(&chunks), "plan");
        assert_eq!(extract_content_from_chunks(&chunks), "final");
    }

    #[tokio::test]
    async fn test_stream_generated_images() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![
            r#"{"result":{"response":{"modelResponse":{"message":"done","generatedImageUrls":["u/1.png"]}}}}"#,
        ])))
        .await;

        assert_eq!(
            extract_content_from_chunks(&chunks),
            "done\n![image](https://assets.grok.com/u/1.png)"
        );
    }

    #[tokio::test]
    async fn test_stream_uses_upstream_response_id() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let chunks = collect_ok(proc.process(upstream(vec![
            r#"{"result":{"response":{"token":"a","responseId":"resp-1","llmInfo":{"modelHash":"fp"}}}}"#,
            r#"{"result":{"response":{"token":"b","responseId":"resp-2"}}}"#,
        ])))
        .await;

        for chunk in &chunks[..3] {
            let value = payload(chunk);
            assert_eq!(value["id"], "resp-1");
            assert_eq!(value["system_fingerprint"], "fp");
            assert_eq!(value["model"], "grok-3");
        }
    }

    #[tokio::test]
    async fn test_stream_error_frame_terminates() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let items: Vec<Result<String, UpstreamError>> = proc
            .process(upstream(vec![
                "{\"result\":{\"response\":{\"token\":\"h\"}}}",
                "{\"error\":{\"message\":\"bad\"}}",
                "{\"result\":{\"response\":{\"token\":\"i\"}}}",
            ]))
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].as_ref().unwrap().contains("\"h\""));
        assert!(matches!(
            items[1],
            Err(UpstreamError::ErrorFrame { ref message, .. }) if message == "bad"
        ));
    }

    #[tokio::test]
    async fn test_stream_transport_error_terminates() {
        let proc = StreamProcessor::new("grok-3", "", false);
        let source: Vec<Result<&'static [u8], UpstreamError>> =
            vec![Err(UpstreamError::transport("reset"))];
        let items: Vec<_> = proc.process(stream::iter(source)).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(UpstreamError::Transport(_))));
    }
}
