//! 字节流重同步解码器
//!
//! 串口驱动按任意大小的块交付字节：一帧可能被拆成多次交付，
//! 链路上也可能出现噪声。`FrameDecoder` 累积字节并从中扫描出校验通过的帧。
//!
//! # 扫描算法
//!
//! 1. 追加新字节到接收缓冲区
//! 2. 缓冲区 ≥ 9 字节时查找 STX；找不到则清空缓冲区；STX 之前的字节全部丢弃
//! 3. 不足 9 字节则等待更多数据
//! 4. 偏移 8 不是 ETX：视为伪 STX，只丢弃 1 字节后重新扫描
//! 5. 取出 9 字节并校验 CRC；不匹配则静默丢弃（计入统计）并继续扫描
//!
//! 扫描结束后缓冲区总是少于 9 字节，内存占用不会无限增长。

use crate::ProtocolError;
use crate::frame::{ETX, ETX_OFFSET, FRAME_LEN, PendantFrame, STX};
use bytes::{Buf, BytesMut};

/// 解码统计
///
/// 坏帧不会产出，只在这里计数。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    /// 校验通过的帧数
    pub frames_decoded: u64,
    /// CRC 不匹配而丢弃的帧数
    pub crc_errors: u64,
    /// 伪 STX（偏移 8 不是 ETX）次数
    pub framing_errors: u64,
    /// STX 之前被丢弃的噪声字节数
    pub discarded_bytes: u64,
}

impl DecoderStats {
    /// 累加另一份统计
    pub fn merge(&mut self, other: &DecoderStats) {
        self.frames_decoded += other.frames_decoded;
        self.crc_errors += other.crc_errors;
        self.framing_errors += other.framing_errors;
        self.discarded_bytes += other.discarded_bytes;
    }
}

/// 有状态的帧解码器
///
/// # Example
///
/// ```
/// use dtp7h_protocol::{FrameDecoder, encode};
///
/// let bytes = encode(0x10, 0x3D, 0x31, 0x1E, 0x20);
/// let mut decoder = FrameDecoder::new();
///
/// // 前半帧：还不能产出
/// assert_eq!(decoder.feed(&bytes[..4]).count(), 0);
/// // 后半帧：产出一帧
/// let frames: Vec<_> = decoder.feed(&bytes[4..]).collect();
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].data, [0x31, 0x1E, 0x20]);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// 创建空解码器
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(FRAME_LEN * 8),
            stats: DecoderStats::default(),
        }
    }

    /// 追加字节并返回惰性帧迭代器
    ///
    /// 迭代器提前丢弃也不会丢帧：剩余数据留在缓冲区，下次 `feed`/`next_frame` 继续产出。
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.push(bytes);
        Frames { decoder: self }
    }

    /// 只追加字节，不扫描
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// 从缓冲区中取出下一个校验通过的帧
    pub fn next_frame(&mut self) -> Option<PendantFrame> {
        while self.buffer.len() >= FRAME_LEN {
            match self.buffer.iter().position(|&b| b == STX) {
                None => {
                    self.stats.discarded_bytes += self.buffer.len() as u64;
                    self.buffer.clear();
                    return None;
                },
                Some(0) => {},
                Some(offset) => {
                    self.stats.discarded_bytes += offset as u64;
                    self.buffer.advance(offset);
                },
            }

            if self.buffer.len() < FRAME_LEN {
                return None;
            }

            if self.buffer[ETX_OFFSET] != ETX {
                // 伪 STX：只丢 1 字节，真正的 STX 可能就在后面
                self.stats.framing_errors += 1;
                self.buffer.advance(1);
                continue;
            }

            let mut raw = [0u8; FRAME_LEN];
            raw.copy_from_slice(&self.buffer[..FRAME_LEN]);
            self.buffer.advance(FRAME_LEN);

            match PendantFrame::try_from(&raw[..]) {
                Ok(frame) => {
                    self.stats.frames_decoded += 1;
                    return Some(frame);
                },
                Err(ProtocolError::CrcMismatch { .. }) => {
                    self.stats.crc_errors += 1;
                },
                Err(_) => {
                    self.stats.framing_errors += 1;
                },
            }
        }
        None
    }

    /// 清空接收缓冲区（重连时调用，半帧不会被带到新连接）
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// 缓冲区中尚未消费的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 当前统计（不清零）
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// 取出统计并清零
    pub fn take_stats(&mut self) -> DecoderStats {
        std::mem::take(&mut self.stats)
    }
}

/// `FrameDecoder::feed` 返回的惰性迭代器
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = PendantFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }
}
