//! 控制指令（下行）
//!
//! LED 与蜂鸣器指令都属于 `MOD = 0x11`（设置）命令族。

use crate::ProtocolError;
use crate::frame::{FRAME_LEN, PendantFrame};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// MOD：读取命令族（按键上报等）
pub const MOD_GET: u8 = 0x10;
/// MOD：设置命令族（LED、蜂鸣器）
pub const MOD_SET: u8 = 0x11;

/// SEL：LED 控制
pub const SEL_LED: u8 = 0x3A;
/// SEL：蜂鸣器控制
pub const SEL_BUZZER: u8 = 0x3B;
/// SEL：按键上报
pub const SEL_KEYPAD: u8 = 0x3D;

/// 未使用的数据字节填充值（ASCII 空格）
pub const DATA_FILLER: u8 = 0x20;

/// 开关量：开 / 按下
pub const STATE_ON: u8 = 0x31;
/// 开关量：关 / 松开
pub const STATE_OFF: u8 = 0x30;

/// LED 地址
///
/// 左侧 3 个地址递增，右侧 3 个地址递减（与面板丝印顺序一致）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum LedAddress {
    Left1 = 0x41,
    Left2 = 0x42,
    Left3 = 0x43,
    Right1 = 0x63,
    Right2 = 0x62,
    Right3 = 0x61,
}

impl LedAddress {
    /// 全部 LED 地址（左侧在前）
    pub const ALL: [LedAddress; 6] = [
        LedAddress::Left1,
        LedAddress::Left2,
        LedAddress::Left3,
        LedAddress::Right1,
        LedAddress::Right2,
        LedAddress::Right3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LedAddress::Left1 => "left1",
            LedAddress::Left2 => "left2",
            LedAddress::Left3 => "left3",
            LedAddress::Right1 => "right1",
            LedAddress::Right2 => "right2",
            LedAddress::Right3 => "right3",
        }
    }
}

impl fmt::Display for LedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LedAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        LedAddress::ALL
            .into_iter()
            .find(|addr| addr.name() == lower)
            .ok_or_else(|| ProtocolError::ParseError(format!("unknown LED address: {s}")))
    }
}

/// LED 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum LedColor {
    Off = 0x30,
    Blue = 0x31,
    Red = 0x32,
    /// 蓝红同时点亮
    All = 0x33,
}

impl LedColor {
    pub const ALL: [LedColor; 4] = [LedColor::Off, LedColor::Blue, LedColor::Red, LedColor::All];

    pub fn name(self) -> &'static str {
        match self {
            LedColor::Off => "off",
            LedColor::Blue => "blue",
            LedColor::Red => "red",
            LedColor::All => "all",
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LedColor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        LedColor::ALL
            .into_iter()
            .find(|color| color.name() == lower)
            .ok_or_else(|| ProtocolError::ParseError(format!("unknown LED color: {s}")))
    }
}

/// 下行指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendantCommand {
    /// 设置 LED（MOD=0x11, SEL=0x3A, DATA1=地址, DATA2=颜色）
    SetLed { address: LedAddress, color: LedColor },
    /// 设置蜂鸣器（MOD=0x11, SEL=0x3B, DATA1=0x31/0x30）
    SetBuzzer { on: bool },
}

impl PendantCommand {
    pub fn set_led(address: LedAddress, color: LedColor) -> Self {
        PendantCommand::SetLed { address, color }
    }

    pub fn set_buzzer(on: bool) -> Self {
        PendantCommand::SetBuzzer { on }
    }

    /// 转换为帧
    pub fn to_frame(self) -> PendantFrame {
        match self {
            PendantCommand::SetLed { address, color } => PendantFrame::new(
                MOD_SET,
                SEL_LED,
                [address.into(), color.into(), DATA_FILLER],
            ),
            PendantCommand::SetBuzzer { on } => PendantFrame::new(
                MOD_SET,
                SEL_BUZZER,
                [
                    if on { STATE_ON } else { STATE_OFF },
                    DATA_FILLER,
                    DATA_FILLER,
                ],
            ),
        }
    }

    /// 转换为线上字节
    pub fn to_bytes(self) -> [u8; FRAME_LEN] {
        self.to_frame().to_bytes()
    }
}

impl fmt::Display for PendantCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendantCommand::SetLed { address, color } => write!(f, "SetLed({address}, {color})"),
            PendantCommand::SetBuzzer { on } => {
                write!(f, "SetBuzzer({})", if *on { "on" } else { "off" })
            },
        }
    }
}

/// 反向解析指令帧（用于回显诊断、测试检查写出的字节）
impl TryFrom<PendantFrame> for PendantCommand {
    type Error = ProtocolError;

    fn try_from(frame: PendantFrame) -> Result<Self, Self::Error> {
        if frame.module != MOD_SET {
            return Err(ProtocolError::InvalidValue {
                field: "module",
                value: frame.module,
            });
        }

        match frame.select {
            SEL_LED => {
                let address =
                    LedAddress::try_from(frame.data[0]).map_err(|e| ProtocolError::InvalidValue {
                        field: "led_address",
                        value: e.number,
                    })?;
                let color =
                    LedColor::try_from(frame.data[1]).map_err(|e| ProtocolError::InvalidValue {
                        field: "led_color",
                        value: e.number,
                    })?;
                Ok(PendantCommand::SetLed { address, color })
            },
            SEL_BUZZER => match frame.data[0] {
                STATE_ON => Ok(PendantCommand::SetBuzzer { on: true }),
                STATE_OFF => Ok(PendantCommand::SetBuzzer { on: false }),
                other => Err(ProtocolError::InvalidValue {
                    field: "buzzer_state",
                    value: other,
                }),
            },
            other => Err(ProtocolError::InvalidValue {
                field: "select",
                value: other,
            }),
        }
    }
}

/// 构建 LED 指令帧字节
pub fn set_led_frame(address: LedAddress, color: LedColor) -> [u8; FRAME_LEN] {
    PendantCommand::set_led(address, color).to_bytes()
}

/// 构建蜂鸣器指令帧字节
pub fn set_buzzer_frame(on: bool) -> [u8; FRAME_LEN] {
    PendantCommand::set_buzzer(on).to_bytes()
}
