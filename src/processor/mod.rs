//! 响应处理器
//!
//! 两种处理器消费同一种输入（按行分隔的上游 JSON 事件），输出不同形态：
//!
//! - `CollectProcessor`: 聚合为一个完整响应，遇到错误或空响应立即失败
//! - `StreamProcessor`: 逐条转发为 SSE chunk，空响应降级为提示内容
//!
//! 模型、凭证等参数在构造时确定，每次 `process` 调用拥有独立的处理状态。

mod collect;
mod stream;

pub use collect::CollectProcessor;
pub use stream::{ChunkStream, StreamProcessor};

/// 凭证脱敏，只保留前 4 个字符
pub(crate) fn redact(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}


// ============================================================================
// 属性测试
// ============================================================================
