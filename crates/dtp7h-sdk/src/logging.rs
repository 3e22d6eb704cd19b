//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅器（`RUST_LOG` 优先，未设置时使用
//! 默认指令），并把 `log` 记录桥接到 `tracing`。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时使用的过滤指令
pub const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Global tracing subscriber already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("log bridge already installed: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// 安装全局日志订阅器
///
/// 每个进程只能成功调用一次，重复调用返回错误。
pub fn init_logging(default_directive: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing_log::LogTracer::init()?;
    Ok(())
}

/// 初始化日志（忽略重复初始化）
///
/// ```rust
/// dtp7h_sdk::init_logger!();
/// dtp7h_sdk::init_logger!("dtp7h_driver=debug,info");
/// ```
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger!($crate::logging::DEFAULT_DIRECTIVE)
    };
    ($directive:expr) => {{
        let _ = $crate::logging::init_logging($directive);
    }};
}
