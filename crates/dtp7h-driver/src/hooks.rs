//! 钩子系统（Hook System）
//!
//! 在帧接收/发送时触发自定义回调，用于抓包、诊断。
//!
//! - **非阻塞**: 回调运行在 RX（传输层）线程或 TX 线程上，必须立即返回
//! - **Channel 模式**: 需要处理的数据通过 `try_send` 交给其他线程
//!
//! # 使用示例
//!
//! ```rust
//! use dtp7h_driver::hooks::{FrameCallback, FrameTapHook, HookManager};
//! use dtp7h_protocol::PendantFrame;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (tap, rx) = FrameTapHook::new(64);
//! hooks.add_callback(Arc::new(tap) as Arc<dyn FrameCallback>);
//!
//! let frame = PendantFrame::new(0x10, 0x3D, [0x31, 0x1E, 0x20]);
//! hooks.trigger_all(&frame);
//!
//! let tapped = rx.try_recv().unwrap();
//! assert_eq!(tapped.to_hex(), "02103d311e20d8b103");
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use dtp7h_protocol::{FRAME_LEN, PendantFrame};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 帧回调 Trait
///
/// 实现禁止阻塞（Mutex 争用、I/O）；推荐 `try_send` 到 Channel。
pub trait FrameCallback: Send + Sync {
    /// 收到校验通过的帧时调用（RX 线程）
    fn on_frame_received(&self, frame: &PendantFrame);

    /// 指令帧成功写出后调用（TX 线程）
    ///
    /// 默认为空操作。写入失败的帧不会触发。
    fn on_frame_sent(&self, frame: &PendantFrame) {
        let _ = frame;
    }
}

/// 钩子管理器
///
/// 回调列表本身不做同步，由驱动包在 `RwLock` 中共享。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn FrameCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn FrameCallback>) {
        self.callbacks.push(callback);
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有 RX 回调
    pub fn trigger_all(&self, frame: &PendantFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_received(frame);
        }
    }

    /// 触发所有 TX 回调（仅在写入成功后调用）
    pub fn trigger_all_sent(&self, frame: &PendantFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_sent(frame);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// 帧方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Rx,
    Tx,
}

impl fmt::Display for FrameDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDirection::Rx => f.write_str("RX"),
            FrameDirection::Tx => f.write_str("TX"),
        }
    }
}

/// 抓到的帧
#[derive(Debug, Clone, Copy)]
pub struct TappedFrame {
    pub direction: FrameDirection,
    pub frame: PendantFrame,
    /// 回调触发时刻
    pub at: Instant,
}

impl TappedFrame {
    /// 线上字节
    pub fn bytes(&self) -> [u8; FRAME_LEN] {
        self.frame.to_bytes()
    }

    /// 小写十六进制串（无分隔符）
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes())
    }
}

impl fmt::Display for TappedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode_upper(self.bytes());
        write!(f, "{} ", self.direction)?;
        // 两两分组，便于对照帧格式
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(std::str::from_utf8(pair).map_err(|_| fmt::Error)?)?;
        }
        Ok(())
    }
}

/// 抓包钩子（有界队列）
///
/// 队列满时丢帧并计数，不阻塞 IO 线程。
pub struct FrameTapHook {
    tx: Sender<TappedFrame>,
    dropped_frames: Arc<AtomicU64>,
}

impl FrameTapHook {
    /// 创建钩子，返回钩子与接收端
    pub fn new(capacity: usize) -> (Self, Receiver<TappedFrame>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_frames: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// 丢帧计数器
    pub fn dropped_frames(&self) -> &Arc<AtomicU64> {
        &self.dropped_frames
    }

    fn push(&self, direction: FrameDirection, frame: &PendantFrame) {
        let tapped = TappedFrame {
            direction,
            frame: *frame,
            at: Instant::now(),
        };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(tapped) {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl FrameCallback for FrameTapHook {
    fn on_frame_received(&self, frame: &PendantFrame) {
        self.push(FrameDirection::Rx, frame);
    }

    fn on_frame_sent(&self, frame: &PendantFrame) {
        self.push(FrameDirection::Tx, frame);
    }
}
