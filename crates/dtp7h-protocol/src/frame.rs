//! 9 字节固定帧
//!
//! 所有上下行报文都使用同一种帧结构：
//!
//! | 偏移 | 字段 | 说明 |
//! |------|------|------|
//! | 0 | STX | 固定 0x02 |
//! | 1 | MOD | 命令族 |
//! | 2 | SEL | 子命令 |
//! | 3-5 | DATA1-3 | 负载 |
//! | 6-7 | CRC_HI, CRC_LO | CRC-16/MODBUS（覆盖偏移 1-5），高位在前 |
//! | 8 | ETX | 固定 0x03 |

use crate::ProtocolError;
use crate::crc::crc16_modbus;

/// 帧起始标记
pub const STX: u8 = 0x02;

/// 帧结束标记
pub const ETX: u8 = 0x03;

/// 帧总长度（字节）
pub const FRAME_LEN: usize = 9;

/// 参与 CRC 计算的字节数（MOD, SEL, DATA1, DATA2, DATA3）
pub const CRC_PAYLOAD_LEN: usize = 5;

/// 帧内偏移
pub(crate) const CRC_HI_OFFSET: usize = 6;
pub(crate) const CRC_LO_OFFSET: usize = 7;
pub(crate) const ETX_OFFSET: usize = 8;

/// 示教器帧的语义视图
///
/// 只保存 5 个语义字节；STX/ETX/CRC 在 [`to_bytes`](Self::to_bytes) 时生成，
/// 在 [`TryFrom<&[u8]>`] 时校验。
///
/// # 设计特性
///
/// - **Copy trait**：5 字节，零成本复制
/// - **无生命周期**：解码后与接收缓冲区解耦
///
/// # Example
///
/// ```
/// use dtp7h_protocol::{PendantFrame, FRAME_LEN};
///
/// let frame = PendantFrame::new(0x11, 0x3A, [0x41, 0x31, 0x20]);
/// let bytes = frame.to_bytes();
/// assert_eq!(bytes.len(), FRAME_LEN);
///
/// let decoded = PendantFrame::try_from(&bytes[..]).unwrap();
/// assert_eq!(decoded, frame);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendantFrame {
    /// MOD：命令族（0x10 读取 / 0x11 设置）
    pub module: u8,
    /// SEL：子命令（0x3A LED / 0x3B 蜂鸣器 / 0x3D 按键）
    pub select: u8,
    /// DATA1-DATA3
    pub data: [u8; 3],
}

impl PendantFrame {
    /// 创建帧
    pub const fn new(module: u8, select: u8, data: [u8; 3]) -> Self {
        Self {
            module,
            select,
            data,
        }
    }

    /// 参与 CRC 计算的 5 个语义字节
    pub fn payload(&self) -> [u8; CRC_PAYLOAD_LEN] {
        [
            self.module,
            self.select,
            self.data[0],
            self.data[1],
            self.data[2],
        ]
    }

    /// 计算本帧的 CRC
    pub fn checksum(&self) -> u16 {
        crc16_modbus(&self.payload())
    }

    /// 序列化为线上字节
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let [crc_hi, crc_lo] = self.checksum().to_be_bytes();
        [
            STX,
            self.module,
            self.select,
            self.data[0],
            self.data[1],
            self.data[2],
            crc_hi,
            crc_lo,
            ETX,
        ]
    }
}

/// 编码 9 字节帧
///
/// 纯函数，总是成功。
pub fn encode(module: u8, select: u8, d1: u8, d2: u8, d3: u8) -> [u8; FRAME_LEN] {
    PendantFrame::new(module, select, [d1, d2, d3]).to_bytes()
}

impl TryFrom<&[u8]> for PendantFrame {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        // 验证长度
        if bytes.len() != FRAME_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }

        // 验证起止标记
        if bytes[0] != STX || bytes[ETX_OFFSET] != ETX {
            return Err(ProtocolError::InvalidDelimiter {
                stx: bytes[0],
                etx: bytes[ETX_OFFSET],
            });
        }

        let frame = PendantFrame::new(bytes[1], bytes[2], [bytes[3], bytes[4], bytes[5]]);

        // 验证 CRC（高位在前）
        let received = u16::from_be_bytes([bytes[CRC_HI_OFFSET], bytes[CRC_LO_OFFSET]]);
        let expected = frame.checksum();
        if received != expected {
            return Err(ProtocolError::CrcMismatch {
                expected,
                actual: received,
            });
        }

        Ok(frame)
    }
}
