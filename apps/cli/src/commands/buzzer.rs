//! 蜂鸣器命令

use anyhow::Result;
use clap::{Args, ValueEnum};
use dtp7h_sdk::SdkConfig;
use std::thread;
use std::time::Duration;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerState {
    On,
    Off,
}

/// 蜂鸣器命令参数
#[derive(Args, Debug)]
pub struct BuzzerCommand {
    pub state: BuzzerState,

    /// 鸣叫指定毫秒数后自动关闭（仅对 on 有效）
    #[arg(long)]
    pub beep_ms: Option<u64>,
}

impl BuzzerCommand {
    pub fn execute(&self, config: &SdkConfig) -> Result<()> {
        let context = crate::utils::open_context(config)?;
        let on = self.state == BuzzerState::On;
        context.pendant().set_buzzer(on)?;

        if on && let Some(ms) = self.beep_ms {
            thread::sleep(Duration::from_millis(ms));
            context.pendant().set_buzzer(false)?;
        }

        context.shutdown();
        println!("✅ Buzzer {:?}", self.state);
        Ok(())
    }
}
