//! 配置加载
//!
//! 优先级：命令行参数 > 配置文件 > 默认值

use anyhow::{Context, Result, bail};
use dtp7h_sdk::SdkConfig;
use std::path::PathBuf;

/// 默认配置文件路径
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dtp7h").join("config.toml"))
}

/// 命令行覆盖项
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub port: Option<String>,
    pub baud: Option<u32>,
}

impl Overrides {
    /// 加载配置并应用覆盖项
    ///
    /// 显式指定的配置文件必须存在；默认路径不存在时使用默认配置。
    pub fn load(&self) -> Result<SdkConfig> {
        let mut config = match &self.config {
            Some(path) => SdkConfig::load(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?,
            None => match default_config_file() {
                Some(path) => SdkConfig::load_or_default(&path)
                    .with_context(|| format!("读取配置文件失败: {}", path.display()))?,
                None => SdkConfig::default(),
            },
        };

        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            if baud == 0 {
                bail!("波特率必须大于 0");
            }
            config.serial.baud_rate = baud;
        }
        Ok(config)
    }
}

/// 要求已配置端口
pub fn require_port(config: &SdkConfig) -> Result<&str> {
    match config.serial.port.as_deref() {
        Some(port) => Ok(port),
        None => bail!("未指定串口：使用 --port 或在配置文件 [serial] 中设置 port"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serial]\nport = \"COM1\"\nbaud_rate = 9600\n").unwrap();

        let overrides = Overrides {
            config: Some(path.clone()),
            port: Some("COM7".to_string()),
            baud: None,
        };
        let config = overrides.load().unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("COM7"));
        assert_eq!(config.serial.baud_rate, 9600);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(overrides.load().is_err());
    }

    #[test]
    fn test_zero_baud_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let overrides = Overrides {
            config: Some(path),
            baud: Some(0),
            ..Default::default()
        };
        assert!(overrides.load().is_err());
    }

    #[test]
    fn test_require_port() {
        let mut config = SdkConfig::default();
        assert!(require_port(&config).is_err());
        config.serial.port = Some("/dev/ttyUSB0".to_string());
        assert_eq!(require_port(&config).unwrap(), "/dev/ttyUSB0");
    }
}
