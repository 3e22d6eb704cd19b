//! 示教器上下文
//!
//! 进程内唯一的入口对象：由调用方创建并显式传递，不使用全局单例。

use crate::config::SdkConfig;
use crate::error::SdkError;
use dtp7h_client::JogSession;
use dtp7h_driver::{Pendant, PendantBuilder};
use dtp7h_serial::SerialTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// 示教器上下文
///
/// 持有驱动实例；配置了端口时创建即连接。
///
/// # Example
///
/// ```rust
/// use dtp7h_sdk::{PendantContext, SdkConfig};
/// use dtp7h_sdk::serial::MockTransport;
///
/// let mut config = SdkConfig::default();
/// config.serial.port = Some("mock0".to_string());
///
/// let context = PendantContext::new(MockTransport::new(), config).unwrap();
/// assert!(context.is_ready());
///
/// let session = context.jog_session().unwrap();
/// assert!(context.jog_session().is_err());
/// # drop(session);
/// context.shutdown();
/// ```
pub struct PendantContext {
    pendant: Pendant,
    config: SdkConfig,
    session_taken: AtomicBool,
}

impl PendantContext {
    /// 使用指定传输层创建上下文
    pub fn new(
        transport: impl SerialTransport + 'static,
        config: SdkConfig,
    ) -> Result<Self, SdkError> {
        config.validate()?;

        let mut builder = PendantBuilder::new()
            .transport(transport)
            .config(config.driver_config())
            .baud_rate(config.serial.baud_rate);
        if let Some(port) = &config.serial.port {
            builder = builder.port(port.clone());
        }

        let pendant = builder.build()?;
        Ok(Self {
            pendant,
            config,
            session_taken: AtomicBool::new(false),
        })
    }

    /// 使用原生串口后端创建上下文
    #[cfg(feature = "serialport")]
    pub fn open(config: SdkConfig) -> Result<Self, SdkError> {
        Self::new(dtp7h_serial::SerialPortTransport::new(), config)
    }

    /// 端口是否已打开
    pub fn is_ready(&self) -> bool {
        self.pendant.is_connected()
    }

    pub fn pendant(&self) -> &Pendant {
        &self.pendant
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// 创建点动会话
    ///
    /// 会话是按键事件的唯一消费者，只能获取一次。
    pub fn jog_session(&self) -> Result<JogSession, SdkError> {
        let jog_config = self.config.jog_config()?;
        if self.session_taken.swap(true, Ordering::AcqRel) {
            return Err(SdkError::SessionTaken);
        }
        let session = JogSession::with_config(jog_config, self.pendant.key_events())?
            .with_release_guard(self.pendant.release_lost_flag());
        Ok(session)
    }

    /// 写完已排队的指令后停止 IO 线程并断开端口
    pub fn shutdown(self) {
        let port = self.config.serial.port.clone();
        drop(self.pendant);
        info!("Pendant context shut down ({})", port.as_deref().unwrap_or("no port"));
    }
}
