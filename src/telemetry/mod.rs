//! 日志初始化
//!
//! 库代码只使用 `tracing` 宏，由宿主程序决定是否安装订阅器。

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 安装全局 tracing 订阅器
///
/// `RUST_LOG` 存在时优先使用，否则使用配置中的级别。
/// 已经安装过订阅器时返回 `false`。
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
