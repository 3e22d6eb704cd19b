//! 点动命令
//!
//! 按住绑定的按键点动对应轴，松开停止；位置打印到终端。

use anyhow::Result;
use clap::Args;
use dtp7h_sdk::SdkConfig;
use dtp7h_sdk::client::{JogEvent, JogState, ReleasePolicy};
use dtp7h_sdk::protocol::{LedAddress, LedColor};

/// 点动命令参数
#[derive(Args, Debug)]
pub struct JogCommand {
    /// 每个节拍的位移（覆盖配置）
    #[arg(short, long)]
    pub step: Option<f64>,

    /// 节拍周期（毫秒，覆盖配置）
    #[arg(short, long)]
    pub tick_ms: Option<u64>,

    /// 松键策略：any-key 或 active-key（覆盖配置）
    #[arg(long)]
    pub release_policy: Option<ReleasePolicy>,

    /// 运动时点亮 LEFT1（蓝色）
    #[arg(long)]
    pub led_feedback: bool,
}

impl JogCommand {
    /// 把命令行参数合并进配置
    pub fn apply(&self, config: &SdkConfig) -> SdkConfig {
        let mut config = config.clone();
        if let Some(step) = self.step {
            config.jog.step = step;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.jog.tick_period_ms = tick_ms;
        }
        if let Some(policy) = self.release_policy {
            config.jog.release_policy = match policy {
                ReleasePolicy::AnyKey => "any-key",
                ReleasePolicy::ActiveKey => "active-key",
            }
            .to_string();
        }
        config
    }

    pub fn execute(&self, config: &SdkConfig) -> Result<()> {
        let config = self.apply(config);
        config.validate()?;

        let running = crate::utils::install_interrupt()?;
        let context = crate::utils::open_context(&config)?;
        let mut session = context.jog_session()?;

        println!("🕹️  点动模式（Ctrl-C 退出）");
        for (key, axis, direction) in session.controller().config().bindings.iter() {
            println!("  {key} -> {axis}{direction}");
        }

        let pendant = context.pendant();
        let led_feedback = self.led_feedback;
        session.run_until(&running, |event| match event {
            JogEvent::StateChanged(state) => {
                println!("{state}");
                if led_feedback {
                    let color = match state {
                        JogState::Idle => LedColor::Off,
                        JogState::Jogging { .. } => LedColor::Blue,
                    };
                    if let Err(e) = pendant.set_led(LedAddress::Left1, color) {
                        tracing::warn!("LED feedback failed: {e}");
                    }
                }
            },
            JogEvent::Position(_) => {},
        })?;

        println!("📍 {}", session.observer().positions());
        context.shutdown();
        Ok(())
    }
}
