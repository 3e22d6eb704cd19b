//! Builder 模式实现
//!
//! 提供链式构造 `Pendant` 实例的便捷方式。

use crate::error::DriverError;
use crate::pendant::Pendant;
use crate::pipeline::DriverConfig;
use dtp7h_protocol::KeypadFilter;
use dtp7h_serial::{DEFAULT_BAUD_RATE, SerialTransport};
use std::time::Duration;

/// Pendant Builder（链式构造）
///
/// 未指定传输层时使用原生串口后端（需要 `serialport` feature）。
/// 指定了端口时 `build()` 会立即连接。
///
/// # Example
///
/// ```no_run
/// use dtp7h_driver::PendantBuilder;
/// use std::time::Duration;
///
/// let pendant = PendantBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .settle_interval(Duration::from_millis(15))
///     .build()
///     .unwrap();
/// ```
pub struct PendantBuilder {
    /// 端口名；为 `None` 时只创建驱动，不连接
    port: Option<String>,
    baud_rate: u32,
    config: DriverConfig,
    transport: Option<Box<dyn SerialTransport>>,
}

impl PendantBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            config: DriverConfig::default(),
            transport: None,
        }
    }

    /// 设置端口（如 `/dev/ttyUSB0`、`COM3`）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 设置波特率（默认 115200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// 整体替换驱动配置
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// 指令间隔（低于 10ms 时按 10ms 处理）
    pub fn settle_interval(mut self, interval: Duration) -> Self {
        self.config.settle_interval = interval;
        self
    }

    pub fn keypad_filter(mut self, filter: KeypadFilter) -> Self {
        self.config.keypad_filter = filter;
        self
    }

    pub fn key_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.key_queue_capacity = capacity;
        self
    }

    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = capacity;
        self
    }

    /// 使用自定义传输层（测试时传入 `MockTransport`）
    pub fn transport(mut self, transport: impl SerialTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// 构建 Pendant
    pub fn build(self) -> Result<Pendant, DriverError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Self::default_transport()?,
        };

        let pendant = Pendant::new(transport, self.config)?;
        if let Some(port) = self.port {
            pendant.connect(&port, self.baud_rate)?;
        }
        Ok(pendant)
    }

    #[cfg(feature = "serialport")]
    fn default_transport() -> Result<Box<dyn SerialTransport>, DriverError> {
        Ok(Box::new(dtp7h_serial::SerialPortTransport::new()))
    }

    #[cfg(not(feature = "serialport"))]
    fn default_transport() -> Result<Box<dyn SerialTransport>, DriverError> {
        Err(DriverError::InvalidConfig(
            "no transport given and the `serialport` feature is disabled".to_string(),
        ))
    }
}

impl Default for PendantBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtp7h_serial::MockTransport;

    #[test]
    fn test_builder_defaults() {
        let builder = PendantBuilder::new();
        assert_eq!(builder.baud_rate, 115_200);
        assert!(builder.port.is_none());
        assert_eq!(builder.config, DriverConfig::default());
    }

    #[test]
    fn test_builder_chain() {
        let builder = PendantBuilder::new()
            .port("COM3")
            .baud_rate(9_600)
            .settle_interval(Duration::from_millis(20))
            .keypad_filter(KeypadFilter::any())
            .key_queue_capacity(8)
            .command_queue_capacity(4);

        assert_eq!(builder.port.as_deref(), Some("COM3"));
        assert_eq!(builder.baud_rate, 9_600);
        assert_eq!(builder.config.settle_interval, Duration::from_millis(20));
        assert_eq!(builder.config.keypad_filter, KeypadFilter::any());
        assert_eq!(builder.config.key_queue_capacity, 8);
        assert_eq!(builder.config.command_queue_capacity, 4);
    }

    #[test]
    fn test_build_with_mock_connects() {
        let (transport, handle) = MockTransport::with_handle();
        let pendant = PendantBuilder::new()
            .transport(transport)
            .port("mock0")
            .build()
            .unwrap();

        assert!(pendant.is_connected());
        assert_eq!(handle.last_settings().unwrap().baud_rate, 115_200);
    }

    #[test]
    fn test_build_without_port_stays_disconnected() {
        let (transport, handle) = MockTransport::with_handle();
        let pendant = PendantBuilder::new().transport(transport).build().unwrap();
        assert!(!pendant.is_connected());
        assert_eq!(handle.connect_count(), 0);
    }
}
