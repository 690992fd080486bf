//! 日志初始化
//!
//! 宿主可以自行安装 tracing 订阅器；这里提供一个按环境变量配置的默认实现。

use tracing_subscriber::EnvFilter;

use crate::env::{core, EnvVar};

/// 安装默认的 fmt 订阅器
///
/// 级别取自 `LIVE_TRANSLATE_LOG_LEVEL`（无效值退回 info），`NO_COLOR` 关闭颜色。
/// 已经安装过订阅器时返回 false。
pub fn init_logging() -> bool {
    let level = core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("{}，使用 info", e);
        "info".to_string()
    });
    let no_color = core::NoColor::get_or_default(false);

    let filter = EnvFilter::new(format!("live_translate={}", level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init()
        .is_ok()
}
