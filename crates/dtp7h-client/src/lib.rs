//! 客户端层：点动控制
//!
//! - [`JogController`]：单轴点动状态机（纯逻辑，无线程）
//! - [`JogSession`]：在控制线程上协作式地驱动状态机（按键 + 节拍）
//! - [`PositionObserver`]：跨线程无锁读取位置
//!
//! 控制器状态只由拥有会话的线程修改；其他线程通过观察器读取。

mod error;
pub mod jog;
pub mod session;

pub use error::ClientError;
pub use jog::{
    Axis, AxisPositions, Direction, JogBindings, JogConfig, JogController, JogState,
    PositionChanged, ReleasePolicy,
};
pub use session::{JogEvent, JogSession, PositionObserver, PositionSnapshot};
