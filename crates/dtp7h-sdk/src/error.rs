//! SDK 顶层错误类型

use crate::config::ConfigError;
use dtp7h_client::ClientError;
use dtp7h_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// 按键事件只能有一个消费者
    #[error("Jog session already taken")]
    SessionTaken,
}
