//! 按键监控命令

use anyhow::Result;
use clap::Args;
use dtp7h_sdk::SdkConfig;
use dtp7h_sdk::driver::{FrameTapHook, MetricsSnapshot};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 同时打印收发的原始帧
    #[arg(short, long)]
    pub raw: bool,
}

impl MonitorCommand {
    pub fn execute(&self, config: &SdkConfig) -> Result<()> {
        let running = crate::utils::install_interrupt()?;
        let context = crate::utils::open_context(config)?;
        let pendant = context.pendant();
        let keys = pendant.key_events();

        let tap = if self.raw {
            let (hook, frames) = FrameTapHook::new(1024);
            let dropped = hook.dropped_frames().clone();
            pendant.hooks().write().add_callback(Arc::new(hook));
            Some((frames, dropped))
        } else {
            None
        };

        println!("📡 监控按键（Ctrl-C 退出）");
        while running.load(Ordering::Acquire) {
            if let Ok(transition) = keys.recv_timeout(POLL_INTERVAL) {
                println!("{transition}");
            }
            if let Some((frames, _)) = &tap {
                for frame in frames.try_iter() {
                    println!("  {frame}");
                }
            }
            if !context.is_ready() {
                println!("⚠️  串口已断开");
                break;
            }
        }

        if let Some((_, dropped)) = &tap {
            let dropped = dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                println!("⚠️  {dropped} 帧未能打印（缓冲区满）");
            }
        }
        print_summary(&pendant.metrics());
        context.shutdown();
        Ok(())
    }
}

fn print_summary(metrics: &MetricsSnapshot) {
    println!("📊 统计");
    println!("  接收字节:     {}", metrics.rx_bytes_total);
    println!("  有效帧:       {}", metrics.rx_frames_valid);
    println!("  CRC 错误:     {}", metrics.rx_crc_errors);
    println!("  帧格式错误:   {}", metrics.rx_framing_errors);
    println!("  按键事件:     {}", metrics.key_events);
    println!("  未知扫描码:   {}", metrics.unmapped_keys);
    println!("  丢弃按键事件: {}", metrics.key_events_dropped);
    println!("  丢弃松开事件: {}", metrics.key_releases_dropped);
    println!("  错误帧比例:   {:.2}%", metrics.corrupt_frame_rate());
}
