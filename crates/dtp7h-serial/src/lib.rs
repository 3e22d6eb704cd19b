//! # DTP7H Serial Transport Layer
//!
//! 串口传输抽象层：上层（驱动、编解码）只依赖 [`SerialTransport`] 与 [`ByteSink`]，
//! 不关心具体后端。
//!
//! - `serialport` feature：基于 `serialport` crate 的原生后端 [`SerialPortTransport`]
//! - `mock` feature：无硬件的 [`MockTransport`]，用于测试
//!
//! # 线程模型
//!
//! 字节由后端在**自己的线程**上、以**任意大小的块**交付给 [`ByteSink::on_bytes`]。
//! 回调必须快速返回，不能阻塞后端的读循环。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockTransport};

#[cfg(feature = "serialport")]
pub mod native;

#[cfg(feature = "serialport")]
pub use native::{SerialPortTransport, available_ports};

/// 示教器手册规定的波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 读线程的默认轮询超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Port not connected")]
    NotConnected,
    #[error("Write timeout")]
    Timeout,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 重试无意义的错误（端口不存在、无权限）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NotFound | SerialDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 串口参数
///
/// 数据格式固定为 8N1；波特率是配置输入，不是协议常量。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialSettings {
    /// 端口名（如 `/dev/ttyUSB0`、`COM3`）
    pub port: String,
    pub baud_rate: u32,
    /// 读线程单次阻塞读的超时；决定 `disconnect` 最长等待时间
    pub read_timeout: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} 8N1", self.port, self.baud_rate)
    }
}

/// 字节到达回调
///
/// 在后端的读线程上调用。实现必须非阻塞。
pub trait ByteSink: Send + Sync {
    fn on_bytes(&self, bytes: &[u8]);
}

impl<F> ByteSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn on_bytes(&self, bytes: &[u8]) {
        self(bytes)
    }
}

/// 串口传输能力
///
/// # 契约
///
/// - `connect` 成功后开始向 `sink` 交付字节
/// - `disconnect` 返回前必须保证**不会再有**对 `sink` 的调用（读线程已退出）
/// - `write` 在未连接时返回 [`SerialError::NotConnected`]
/// - 对已连接的传输再次 `connect` 会先断开旧连接
pub trait SerialTransport: Send {
    fn connect(&mut self, settings: &SerialSettings, sink: Arc<dyn ByteSink>)
    -> Result<(), SerialError>;

    /// 断开连接；未连接时为空操作
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// 写入完整字节序列
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn connect(
        &mut self,
        settings: &SerialSettings,
        sink: Arc<dyn ByteSink>,
    ) -> Result<(), SerialError> {
        (**self).connect(settings, sink)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write(bytes)
    }
}

/// 枚举到的串口
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
    pub name: String,
    /// 端口类型（`usb` / `pci` / `bluetooth` / `unknown`）
    pub kind: String,
    pub description: Option<String>,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{} [{}] {}", self.name, self.kind, desc),
            None => write!(f, "{} [{}]", self.name, self.kind),
        }
    }
}
