//! 驱动层错误类型定义

use dtp7h_protocol::ProtocolError;
use dtp7h_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误（打开失败、写入失败）
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 未连接时发送指令
    ///
    /// 指令不会被排队，调用者可以据此区分"已发送"与"已丢弃"。
    #[error("Pendant not connected, command dropped")]
    NotConnected,

    /// 指令队列已满
    #[error("Command channel full (capacity: {capacity})")]
    ChannelFull { capacity: usize },

    /// 指令通道已关闭（TX 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 无效配置
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
