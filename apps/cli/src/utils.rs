//! 公共工具

use anyhow::{Context, Result};
use dtp7h_sdk::{PendantContext, SdkConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 打开示教器（必须已配置端口）
pub fn open_context(config: &SdkConfig) -> Result<PendantContext> {
    let port = crate::settings::require_port(config)?.to_string();
    println!("🔌 连接 {} @ {} ...", port, config.serial.baud_rate);
    let context = PendantContext::open(config.clone())
        .with_context(|| format!("打开串口失败: {port}"))?;
    println!("✅ 已连接");
    Ok(context)
}

/// 安装 Ctrl-C 处理器，返回运行标志
pub fn install_interrupt() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        flag.store(false, Ordering::Release);
    })
    .context("安装 Ctrl-C 处理器失败")?;
    Ok(running)
}
