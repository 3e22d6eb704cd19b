//! TOML 配置
//!
//! 所有字段都有默认值，空文件即默认配置：
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [driver]
//! settle_interval_ms = 10
//! key_queue_capacity = 256
//! command_queue_capacity = 32
//!
//! [keypad]
//! module = 0x10
//! select = 0x3D
//! accept_any = false
//!
//! [jog]
//! tick_period_ms = 50
//! step = 1.0
//! release_policy = "any-key"
//! ```

use dtp7h_client::{JogConfig, ReleasePolicy};
use dtp7h_driver::DriverConfig;
use dtp7h_protocol::{KeypadFilter, MOD_GET, SEL_KEYPAD};
use dtp7h_serial::{DEFAULT_BAUD_RATE, SerialSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Serialize(err.to_string())
    }
}

/// SDK 配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub serial: SerialSection,
    pub driver: DriverSection,
    pub keypad: KeypadSection,
    pub jog: JogSection,
}

/// `[serial]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// 为空时不自动连接
    pub port: Option<String>,
    pub baud_rate: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// `[driver]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    pub settle_interval_ms: u64,
    pub key_queue_capacity: usize,
    pub command_queue_capacity: usize,
}

impl Default for DriverSection {
    fn default() -> Self {
        let defaults = DriverConfig::default();
        Self {
            settle_interval_ms: defaults.settle_interval.as_millis() as u64,
            key_queue_capacity: defaults.key_queue_capacity,
            command_queue_capacity: defaults.command_queue_capacity,
        }
    }
}

/// `[keypad]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadSection {
    pub module: u8,
    pub select: u8,
    /// 为 `true` 时忽略 MOD/SEL，接受所有有效帧
    pub accept_any: bool,
}

impl Default for KeypadSection {
    fn default() -> Self {
        Self {
            module: MOD_GET,
            select: SEL_KEYPAD,
            accept_any: false,
        }
    }
}

/// `[jog]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogSection {
    pub tick_period_ms: u64,
    pub step: f64,
    /// `any-key` 或 `active-key`
    pub release_policy: String,
}

impl Default for JogSection {
    fn default() -> Self {
        Self {
            tick_period_ms: 50,
            step: 1.0,
            release_policy: "any-key".to_string(),
        }
    }
}

impl SdkConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SdkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 文件存在时加载，否则返回默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::InvalidValue(
                "serial.baud_rate must be > 0".to_string(),
            ));
        }
        if self.driver.key_queue_capacity == 0 || self.driver.command_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "driver queue capacities must be > 0".to_string(),
            ));
        }
        self.jog_config().map(|_| ())
    }

    /// 串口参数（未配置端口时返回 `None`）
    pub fn serial_settings(&self) -> Option<SerialSettings> {
        self.serial
            .port
            .as_ref()
            .map(|port| SerialSettings::new(port.clone(), self.serial.baud_rate))
    }

    pub fn keypad_filter(&self) -> KeypadFilter {
        if self.keypad.accept_any {
            KeypadFilter::any()
        } else {
            KeypadFilter {
                module: Some(self.keypad.module),
                select: Some(self.keypad.select),
            }
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            settle_interval: Duration::from_millis(self.driver.settle_interval_ms),
            key_queue_capacity: self.driver.key_queue_capacity,
            command_queue_capacity: self.driver.command_queue_capacity,
            keypad_filter: self.keypad_filter(),
            ..DriverConfig::default()
        }
    }

    pub fn jog_config(&self) -> Result<JogConfig, ConfigError> {
        let release_policy: ReleasePolicy = self
            .jog
            .release_policy
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("jog.release_policy: {e}")))?;
        let config = JogConfig {
            tick_period: Duration::from_millis(self.jog.tick_period_ms),
            step: self.jog.step,
            release_policy,
            ..JogConfig::default()
        };
        config
            .validate()
            .map_err(|e| ConfigError::InvalidValue(format!("jog: {e}")))?;
        Ok(config)
    }
}
