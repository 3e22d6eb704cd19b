//! 命令定义和实现

pub mod buzzer;
pub mod jog;
pub mod led;
pub mod monitor;
pub mod ports;

pub use buzzer::BuzzerCommand;
pub use jog::JogCommand;
pub use led::LedCommand;
pub use monitor::MonitorCommand;
pub use ports::PortsCommand;
