//! 驱动性能指标模块
//!
//! 原子计数器，任何线程都可以无锁读取。坏帧、未映射按键、被丢弃的事件
//! 都在这里留下痕迹，而不是悄无声息地消失。

use dtp7h_protocol::DecoderStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// 示教器驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use dtp7h_driver::PendantMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = PendantMetrics::new();
/// metrics.rx_bytes_total.fetch_add(9, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_bytes_total, 9);
/// ```
#[derive(Debug, Default)]
pub struct PendantMetrics {
    /// 传输层交付的总字节数
    pub rx_bytes_total: AtomicU64,
    /// 校验通过的帧数
    pub rx_frames_valid: AtomicU64,
    /// CRC 不匹配的帧数
    pub rx_crc_errors: AtomicU64,
    /// 伪 STX / 缺少 ETX 次数
    pub rx_framing_errors: AtomicU64,
    /// 作为噪声丢弃的字节数
    pub rx_discarded_bytes: AtomicU64,
    /// 解码出的按键事件数
    pub key_events: AtomicU64,
    /// 扫描码不在表中的按键帧
    pub unmapped_keys: AtomicU64,
    /// 不是按键帧（MOD/SEL 不匹配）
    pub ignored_frames: AtomicU64,
    /// 按键队列满而丢弃的事件
    ///
    /// 非零说明控制侧消费不及时，可能出现按下/松开不成对。
    pub key_events_dropped: AtomicU64,
    /// 其中被丢弃的松开事件（每次都会触发控制侧强制停止）
    pub key_releases_dropped: AtomicU64,

    /// 成功写出的指令帧
    pub tx_frames_total: AtomicU64,
    /// 未连接时被拒绝的指令
    pub tx_rejected_disconnected: AtomicU64,
    /// 写入失败次数
    pub tx_write_failures: AtomicU64,
    /// 指令队列满次数
    pub tx_queue_full: AtomicU64,
}

impl PendantMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一批解码统计
    pub fn record_decoder(&self, stats: &DecoderStats) {
        if stats.frames_decoded > 0 {
            self.rx_frames_valid
                .fetch_add(stats.frames_decoded, Ordering::Relaxed);
        }
        if stats.crc_errors > 0 {
            self.rx_crc_errors
                .fetch_add(stats.crc_errors, Ordering::Relaxed);
        }
        if stats.framing_errors > 0 {
            self.rx_framing_errors
                .fetch_add(stats.framing_errors, Ordering::Relaxed);
        }
        if stats.discarded_bytes > 0 {
            self.rx_discarded_bytes
                .fetch_add(stats.discarded_bytes, Ordering::Relaxed);
        }
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes_total: self.rx_bytes_total.load(Ordering::Relaxed),
            rx_frames_valid: self.rx_frames_valid.load(Ordering::Relaxed),
            rx_crc_errors: self.rx_crc_errors.load(Ordering::Relaxed),
            rx_framing_errors: self.rx_framing_errors.load(Ordering::Relaxed),
            rx_discarded_bytes: self.rx_discarded_bytes.load(Ordering::Relaxed),
            key_events: self.key_events.load(Ordering::Relaxed),
            unmapped_keys: self.unmapped_keys.load(Ordering::Relaxed),
            ignored_frames: self.ignored_frames.load(Ordering::Relaxed),
            key_events_dropped: self.key_events_dropped.load(Ordering::Relaxed),
            key_releases_dropped: self.key_releases_dropped.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_rejected_disconnected: self.tx_rejected_disconnected.load(Ordering::Relaxed),
            tx_write_failures: self.tx_write_failures.load(Ordering::Relaxed),
            tx_queue_full: self.tx_queue_full.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.rx_bytes_total,
            &self.rx_frames_valid,
            &self.rx_crc_errors,
            &self.rx_framing_errors,
            &self.rx_discarded_bytes,
            &self.key_events,
            &self.unmapped_keys,
            &self.ignored_frames,
            &self.key_events_dropped,
            &self.key_releases_dropped,
            &self.tx_frames_total,
            &self.tx_rejected_disconnected,
            &self.tx_write_failures,
            &self.tx_queue_full,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_bytes_total: u64,
    pub rx_frames_valid: u64,
    pub rx_crc_errors: u64,
    pub rx_framing_errors: u64,
    pub rx_discarded_bytes: u64,
    pub key_events: u64,
    pub unmapped_keys: u64,
    pub ignored_frames: u64,
    pub key_events_dropped: u64,
    pub key_releases_dropped: u64,
    pub tx_frames_total: u64,
    pub tx_rejected_disconnected: u64,
    pub tx_write_failures: u64,
    pub tx_queue_full: u64,
}

impl MetricsSnapshot {
    /// 坏帧（CRC + 帧格式）占全部帧的百分比
    ///
    /// 返回 0.0 到 100.0 之间的值；没有任何帧时返回 0.0。
    pub fn corrupt_frame_rate(&self) -> f64 {
        let bad = self.rx_crc_errors + self.rx_framing_errors;
        let total = self.rx_frames_valid + bad;
        if total == 0 {
            return 0.0;
        }
        (bad as f64 / total as f64) * 100.0
    }

    /// 链路是否有任何异常记录
    pub fn has_errors(&self) -> bool {
        self.rx_crc_errors > 0
            || self.rx_framing_errors > 0
            || self.key_events_dropped > 0
            || self.tx_write_failures > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = PendantMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert!(!snapshot.has_errors());
    }

    #[test]
    fn test_record_decoder() {
        let metrics = PendantMetrics::new();
        metrics.record_decoder(&DecoderStats {
            frames_decoded: 8,
            crc_errors: 1,
            framing_errors: 1,
            discarded_bytes: 5,
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_frames_valid, 8);
        assert_eq!(snapshot.rx_crc_errors, 1);
        assert_eq!(snapshot.rx_discarded_bytes, 5);
        assert!((snapshot.corrupt_frame_rate() - 20.0).abs() < 1e-9);
        assert!(snapshot.has_errors());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = PendantMetrics::new();
        metrics.tx_frames_total.fetch_add(3, Ordering::Relaxed);
        metrics.key_events_dropped.fetch_add(1, Ordering::Relaxed);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_access() {
        let metrics = Arc::new(PendantMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.key_events.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().key_events, 4000);
    }
}
