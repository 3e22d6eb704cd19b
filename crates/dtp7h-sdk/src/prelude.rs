//! 常用类型
//!
//! ```rust
//! use dtp7h_sdk::prelude::*;
//! ```

pub use crate::config::SdkConfig;
pub use crate::context::PendantContext;
pub use crate::error::SdkError;

pub use dtp7h_client::{
    Axis, Direction, JogConfig, JogController, JogEvent, JogSession, JogState, PositionObserver,
    ReleasePolicy,
};
pub use dtp7h_driver::{DriverError, MetricsSnapshot, Pendant, PendantBuilder};
pub use dtp7h_protocol::{KeyTransition, LedAddress, LedColor, LogicalKey, PendantFrame};
pub use dtp7h_serial::{SerialSettings, SerialTransport};
