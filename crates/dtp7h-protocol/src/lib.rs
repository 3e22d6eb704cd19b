//! # DTP7H Protocol
//!
//! 示教器（Teach Pendant）串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `crc`: CRC-16/MODBUS 校验
//! - `frame`: 9 字节固定帧的编码/解析
//! - `codec`: 字节流重同步解码器（处理分片、噪声）
//! - `command`: LED / 蜂鸣器控制指令
//! - `keypad`: 按键上报解析（扫描码 → 逻辑按键）
//!
//! ## 帧格式
//!
//! ```text
//! STX(0x02) MOD SEL DATA1 DATA2 DATA3 CRC_HI CRC_LO ETX(0x03)
//! ```
//!
//! CRC 计算范围为 `MOD..=DATA3` 共 5 字节，高位在前（大端字节序）。

pub mod codec;
pub mod command;
pub mod crc;
pub mod frame;
pub mod keypad;

// 重新导出常用类型
pub use codec::{DecoderStats, FrameDecoder, Frames};
pub use command::*;
pub use crc::crc16_modbus;
pub use frame::*;
pub use keypad::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Missing frame delimiter: STX=0x{stx:02X}, ETX=0x{etx:02X}")]
    InvalidDelimiter { stx: u8, etx: u8 },

    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Invalid value for field {field}: 0x{value:02X}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Parse error: {0}")]
    ParseError(String),
}
