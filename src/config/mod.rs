//! 配置管理模块
//!
//! 提供处理器配置、日志配置和 YAML 配置文件加载。

mod types;
mod yaml;

pub use types::{AppConfig, LoggingConfig, ProcessorConfig, DEFAULT_EMPTY_HINT};
pub use yaml::{load_config, parse_config, ConfigError};
