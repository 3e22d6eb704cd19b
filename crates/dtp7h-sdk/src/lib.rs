//! DTP7H SDK - DTP7H 示教器 Rust SDK
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 9 字节帧、CRC-16/MODBUS、LED/蜂鸣器指令、按键解码
//! - **串口层** (`serial`): 传输层抽象，原生串口与 Mock 后端
//! - **驱动层** (`driver`): 接收流水线、TX 线程、统计、抓包钩子
//! - **客户端层** (`client`): 点动状态机与协作式控制循环
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use dtp7h_sdk::prelude::*;
//! use std::sync::atomic::AtomicBool;
//!
//! dtp7h_sdk::init_logger!();
//!
//! let config = SdkConfig::load_or_default("dtp7h.toml")?;
//! let context = PendantContext::open(config)?;
//! context.pendant().set_led(LedAddress::Left1, LedColor::Blue)?;
//!
//! let running = AtomicBool::new(true);
//! let mut session = context.jog_session()?;
//! session.run_until(&running, |event| println!("{event:?}"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod context;
mod error;
pub mod logging;
pub mod prelude;

pub use dtp7h_client as client;
pub use dtp7h_driver as driver;
pub use dtp7h_protocol as protocol;
pub use dtp7h_serial as serial;

pub use config::{ConfigError, SdkConfig};
pub use context::PendantContext;
pub use error::SdkError;
pub use logging::{LoggingError, init_logging};

pub use client::{JogController, JogSession, JogState};
pub use driver::{DriverError, Pendant, PendantBuilder};
pub use protocol::ProtocolError;
