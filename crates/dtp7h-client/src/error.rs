//! 客户端层错误类型

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// 按键事件源已关闭（驱动已销毁）
    #[error("Key event source closed")]
    EventSourceClosed,

    /// 无效的点动配置
    #[error("Invalid jog configuration: {0}")]
    InvalidConfig(String),

    /// 名称解析失败
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::EventSourceClosed.to_string(),
            "Key event source closed"
        );
        assert!(
            ClientError::InvalidConfig("step must be finite".into())
                .to_string()
                .contains("step must be finite")
        );
    }
}
