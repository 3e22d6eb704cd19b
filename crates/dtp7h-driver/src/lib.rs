//! 驱动层模块
//!
//! 本模块把串口传输与协议层粘合起来：
//! - RX：在传输层线程上解码字节流，按键事件经有界 FIFO 交给控制侧
//! - TX：指令排队，由单一 TX 线程串行写出，每次写入后等待设备处理间隔
//! - 原子计数器指标、帧钩子
//!
//! 大多数用户应该使用 `dtp7h-sdk` 提供的 `PendantContext`。

mod builder;
mod error;
pub mod hooks;
pub mod metrics;
mod pendant;
pub mod pipeline;

pub use builder::PendantBuilder;
pub use error::DriverError;
pub use hooks::{FrameCallback, FrameDirection, FrameTapHook, HookManager, TappedFrame};
pub use metrics::{MetricsSnapshot, PendantMetrics};
pub use pendant::Pendant;
pub use pipeline::{DriverConfig, MIN_SETTLE_INTERVAL, RxPipeline, tx_loop};

// 常用类型直接从驱动层可见
pub use dtp7h_protocol::{KeyTransition, LedAddress, LedColor, LogicalKey, PendantCommand};
pub use dtp7h_serial::{SerialError, SerialSettings, SerialTransport};
