//! LED 命令

use anyhow::Result;
use clap::Args;
use dtp7h_sdk::SdkConfig;
use dtp7h_sdk::protocol::{LedAddress, LedColor, ProtocolError};
use std::fmt;
use std::str::FromStr;

/// 单个 LED 或全部 LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedTarget {
    One(LedAddress),
    All,
}

impl FromStr for LedTarget {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(LedTarget::All)
        } else {
            s.parse().map(LedTarget::One)
        }
    }
}

impl fmt::Display for LedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedTarget::One(address) => address.fmt(f),
            LedTarget::All => f.write_str("all"),
        }
    }
}

/// LED 命令参数
#[derive(Args, Debug)]
pub struct LedCommand {
    /// LED 地址：left1..left3、right1..right3 或 all
    pub target: LedTarget,

    /// 颜色：off、blue、red、all
    pub color: LedColor,
}

impl LedCommand {
    pub fn execute(&self, config: &SdkConfig) -> Result<()> {
        let context = crate::utils::open_context(config)?;
        match self.target {
            LedTarget::One(address) => context.pendant().set_led(address, self.color)?,
            LedTarget::All => context.pendant().set_all_leds(self.color)?,
        }
        // 关闭时等待排队的指令写完
        context.shutdown();
        println!("✅ LED {} -> {}", self.target, self.color);
        Ok(())
    }
}
