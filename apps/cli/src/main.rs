//! # DTP7H CLI
//!
//! Command-line interface for the DTP7H teach pendant.
//!
//! ```bash
//! # 列出串口
//! dtp7h-cli ports
//!
//! # LED / 蜂鸣器
//! dtp7h-cli --port /dev/ttyUSB0 led left1 blue
//! dtp7h-cli --port /dev/ttyUSB0 buzzer on
//!
//! # 打印按键（--raw 同时打印原始帧），Ctrl-C 退出
//! dtp7h-cli --port /dev/ttyUSB0 monitor --raw
//!
//! # 点动演示
//! dtp7h-cli --port /dev/ttyUSB0 jog
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod settings;
mod utils;

use commands::{BuzzerCommand, JogCommand, LedCommand, MonitorCommand, PortsCommand};
use settings::Overrides;

/// DTP7H CLI - 示教器命令行工具
#[derive(Parser, Debug)]
#[command(name = "dtp7h-cli")]
#[command(about = "Command-line interface for the DTP7H teach pendant", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 <config_dir>/dtp7h/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 串口（覆盖配置）
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出可用串口
    Ports(PortsCommand),

    /// 设置 LED
    Led(LedCommand),

    /// 打开或关闭蜂鸣器
    Buzzer(BuzzerCommand),

    /// 打印按键事件
    Monitor(MonitorCommand),

    /// 用按键点动五个轴
    Jog(JogCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "dtp7h_cli=debug,dtp7h_driver=debug,dtp7h_client=debug,info"
    } else {
        "dtp7h_cli=info,info"
    };
    dtp7h_sdk::init_logging(directive)?;

    let overrides = Overrides {
        config: cli.config,
        port: cli.port,
        baud: cli.baud,
    };

    match cli.command {
        Commands::Ports(cmd) => cmd.execute(),
        Commands::Led(cmd) => cmd.execute(&overrides.load()?),
        Commands::Buzzer(cmd) => cmd.execute(&overrides.load()?),
        Commands::Monitor(cmd) => cmd.execute(&overrides.load()?),
        Commands::Jog(cmd) => cmd.execute(&overrides.load()?),
    }
}
