//! 单次处理指标
//!
//! 每次 `process` 调用独立持有一份，调用结束时写入日志后丢弃。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 单次处理指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// 收到的上游行数
    pub line_count: u32,

    /// 被跳过的行数（非法 JSON 或无法识别）
    pub skipped_lines: u32,

    /// 被过滤标签丢弃的 token 数
    pub filtered_tokens: u32,

    /// 可用 token 数
    pub token_count: u32,

    /// 输出的 chunk 数（仅 stream 模式）
    pub emitted_chunks: u32,

    /// 收到的总字节数
    pub total_bytes: usize,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 首行到达时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_line_time: Option<DateTime<Utc>>,

    /// 结束时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self {
            line_count: 0,
            skipped_lines: 0,
            filtered_tokens: 0,
            token_count: 0,
            emitted_chunks: 0,
            total_bytes: 0,
            start_time: Utc::now(),
            first_line_time: None,
            end_time: None,
        }
    }
}

impl ProcessMetrics {
    /// 创建新的指标实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到一行
    pub fn record_line(&mut self, bytes: usize) {
        self.line_count += 1;
        self.total_bytes += bytes;
        if self.first_line_time.is_none() {
            self.first_line_time = Some(Utc::now());
        }
    }

    /// 记录跳过一行
    pub fn record_skipped(&mut self) {
        self.skipped_lines += 1;
    }

    /// 记录可用 token
    pub fn record_token(&mut self) {
        self.token_count += 1;
    }

    /// 记录被过滤的 token
    pub fn record_filtered(&mut self) {
        self.filtered_tokens += 1;
    }

    /// 记录输出一个 chunk
    pub fn record_emitted(&mut self) {
        self.emitted_chunks += 1;
    }

    /// 完成处理
    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// 首行延迟（毫秒）
    pub fn ttfl_ms(&self) -> Option<u64> {
        self.first_line_time
            .map(|t| (t - self.start_time).num_milliseconds().max(0) as u64)
    }

    /// 总耗时（毫秒）
    ///
    /// 未结束时返回从开始到现在的时间。
    pub fn duration_ms(&self) -> u64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds().max(0) as u64
    }

    /// 跳过率
    pub fn skip_rate(&self) -> f64 {
        if self.line_count == 0 {
            return 0.0;
        }
        self.skipped_lines as f64 / self.line_count as f64
    }

    /// 写入日志
    pub fn log_metrics(&self, model: &str, mode: &str) {
        info!(
            model,
            mode,
            line_count = self.line_count,
            skipped_lines = self.skipped_lines,
            filtered_tokens = self.filtered_tokens,
            token_count = self.token_count,
            emitted_chunks = self.emitted_chunks,
            total_bytes = self.total_bytes,
            ttfl_ms = ?self.ttfl_ms(),
            duration_ms = self.duration_ms(),
            skip_rate = format!("{:.4}", self.skip_rate()),
            "上游处理指标"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = ProcessMetrics::new();
        assert_eq!(metrics.line_count, 0);
        assert_eq!(metrics.ttfl_ms(), None);
        assert!(metrics.end_time.is_none());
        assert_eq!(metrics.skip_rate(), 0.0);
    }

    #[test]
    fn test_metrics_record() {
        let mut metrics = ProcessMetrics::new();
        metrics.record_line(10);
        metrics.record_line(20);
        metrics.record_skipped();
        metrics.record_token();
        metrics.record_filtered();
        metrics.record_emitted();
        metrics.finish();

        assert_eq!(metrics.line_count, 2);
        assert_eq!(metrics.total_bytes, 30);
        assert_eq!(metrics.skipped_lines, 1);
        assert_eq!(metrics.token_count, 1);
        assert_eq!(metrics.filtered_tokens, 1);
        assert_eq!(metrics.emitted_chunks, 1);
        assert!(metrics.ttfl_ms().is_some());
        assert!(metrics.end_time.is_some());
        assert!((metrics.skip_rate() - 0.5).abs() < f64::EPSILON);
    }
}
