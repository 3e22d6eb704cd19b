//! 串口枚举命令

use anyhow::{Context, Result};
use clap::Args;
use dtp7h_sdk::serial::available_ports;

/// 串口枚举参数
#[derive(Args, Debug)]
pub struct PortsCommand {
    /// 只列出 USB 串口
    #[arg(long)]
    pub usb_only: bool,
}

impl PortsCommand {
    pub fn execute(&self) -> Result<()> {
        let ports = available_ports().context("枚举串口失败")?;
        let ports: Vec<_> = ports
            .into_iter()
            .filter(|p| !self.usb_only || p.kind == "usb")
            .collect();

        if ports.is_empty() {
            println!("未发现串口");
            return Ok(());
        }
        for port in &ports {
            println!("{port}");
        }
        Ok(())
    }
}
