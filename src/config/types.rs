//! 配置类型定义

use serde::{Deserialize, Serialize};

/// 上游无内容时 stream 模式输出的提示
pub const DEFAULT_EMPTY_HINT: &str = "上游未返回可用内容";

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 处理器配置
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 处理器配置
///
/// 构造处理器时按值捕获，每次 `process` 调用只读访问。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// 需要过滤的 token 标签
    ///
    /// token 中包含任意一个标签时整段丢弃。
    #[serde(default = "default_filter_tags")]
    pub filter_tags: Vec<String>,

    /// 生成图片的资源地址前缀
    #[serde(default = "default_asset_base_url")]
    pub asset_base_url: String,

    /// stream 模式下上游无内容时的提示文本
    #[serde(default = "default_empty_hint")]
    pub empty_hint: String,

    /// 单行最大字节数（用于行切分缓冲区）
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_filter_tags() -> Vec<String> {
    vec![
        "xaiartifact".to_string(),
        "xai:tool_usage_card".to_string(),
        "grok:render".to_string(),
    ]
}

fn default_asset_base_url() -> String {
    "https://assets.grok.com".to_string()
}

fn default_empty_hint() -> String {
    DEFAULT_EMPTY_HINT.to_string()
}

fn default_max_line_bytes() -> usize {
    1024 * 1024 // 1MB
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            filter_tags: default_filter_tags(),
            asset_base_url: default_asset_base_url(),
            empty_hint: default_empty_hint(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl ProcessorConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置过滤标签
    pub fn with_filter_tags(mut self, tags: Vec<String>) -> Self {
        self.filter_tags = tags;
        self
    }

    /// 设置资源地址前缀
    pub fn with_asset_base_url(mut self, url: impl Into<String>) -> Self {
        self.asset_base_url = url.into();
        self
    }

    /// 设置空响应提示
    pub fn with_empty_hint(mut self, hint: impl Into<String>) -> Self {
        self.empty_hint = hint.into();
        self
    }

    /// 设置单行最大字节数
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// token 是否命中过滤标签
    pub fn is_filtered(&self, token: &str) -> bool {
        self.filter_tags
            .iter()
            .any(|tag| !tag.is_empty() && token.contains(tag.as_str()))
    }

    /// 将上游图片路径转换为可访问的 URL
    ///
    /// 已经是绝对地址的原样返回。
    pub fn image_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.asset_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（trace/debug/info/warn/error），`RUST_LOG` 优先
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
