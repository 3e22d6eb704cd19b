//! Pipeline IO 模块
//!
//! - [`RxPipeline`]：实现 [`ByteSink`]，运行在传输层的读线程上
//! - [`tx_loop`]：TX 线程主循环，串行写出指令并保证指令间隔

use crate::hooks::HookManager;
use crate::metrics::PendantMetrics;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use dtp7h_protocol::{
    FrameDecoder, KeyTransition, KeypadDecoder, KeypadFilter, KeypadReport, PendantCommand,
};
use dtp7h_serial::{ByteSink, SerialError, SerialTransport};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, trace, warn};

/// 设备处理两条指令之间所需的最小间隔
pub const MIN_SETTLE_INTERVAL: Duration = Duration::from_millis(10);

/// TX 线程等待指令的超时（用于周期性检查运行标志）
const TX_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// 共享的传输层句柄
pub(crate) type SharedTransport = Arc<Mutex<Box<dyn SerialTransport>>>;

/// 驱动配置
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// 每次写入后的等待间隔（低于 [`MIN_SETTLE_INTERVAL`] 时按最小值处理）
    pub settle_interval: Duration,
    /// 按键事件队列容量
    pub key_queue_capacity: usize,
    /// 指令队列容量
    pub command_queue_capacity: usize,
    /// 按键帧 MOD/SEL 过滤
    pub keypad_filter: KeypadFilter,
    /// 传输层读超时
    pub read_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            settle_interval: MIN_SETTLE_INTERVAL,
            key_queue_capacity: 256,
            command_queue_capacity: 32,
            keypad_filter: KeypadFilter::default(),
            read_timeout: dtp7h_serial::DEFAULT_READ_TIMEOUT,
        }
    }
}

impl DriverConfig {
    /// 实际使用的指令间隔
    pub fn effective_settle_interval(&self) -> Duration {
        self.settle_interval.max(MIN_SETTLE_INTERVAL)
    }
}

/// 接收流水线
///
/// 字节 → [`FrameDecoder`] → [`KeypadDecoder`] → 有界按键队列。
/// 队列满时**不阻塞**：丢弃新事件并计数。被丢弃的是松开事件时置位
/// `release_lost`，控制侧取空队列后据此强制停止运动，
/// 不会因为丢了松开而一直点动。
pub struct RxPipeline {
    decoder: Mutex<FrameDecoder>,
    keypad: KeypadDecoder,
    key_tx: Sender<KeyTransition>,
    release_lost: Arc<AtomicBool>,
    metrics: Arc<PendantMetrics>,
    hooks: Arc<RwLock<HookManager>>,
}

impl RxPipeline {
    pub fn new(
        keypad: KeypadDecoder,
        key_tx: Sender<KeyTransition>,
        release_lost: Arc<AtomicBool>,
        metrics: Arc<PendantMetrics>,
        hooks: Arc<RwLock<HookManager>>,
    ) -> Self {
        Self {
            decoder: Mutex::new(FrameDecoder::new()),
            keypad,
            key_tx,
            release_lost,
            metrics,
            hooks,
        }
    }

    /// 丢弃接收缓冲区中的残留字节
    ///
    /// 必须在传输层停止交付之后调用，否则半帧可能在重置后继续拼接。
    pub fn reset(&self) {
        let mut decoder = self.decoder.lock();
        let residual = decoder.buffered_len();
        decoder.reset();
        self.metrics.record_decoder(&decoder.take_stats());
        if residual > 0 {
            trace!("RX pipeline reset, {} residual bytes dropped", residual);
        }
    }

    /// 当前缓冲的字节数
    pub fn buffered_len(&self) -> usize {
        self.decoder.lock().buffered_len()
    }

    fn dispatch(&self, report: KeypadReport) {
        match report {
            KeypadReport::Key(transition) => {
                self.metrics.key_events.fetch_add(1, Ordering::Relaxed);
                trace!("key {}", transition);
                match self.key_tx.try_send(transition) {
                    Ok(()) => {},
                    Err(TrySendError::Full(dropped)) => {
                        self.metrics
                            .key_events_dropped
                            .fetch_add(1, Ordering::Relaxed);
                        if !dropped.is_down {
                            self.metrics
                                .key_releases_dropped
                                .fetch_add(1, Ordering::Relaxed);
                            self.release_lost.store(true, Ordering::Release);
                        }
                        error!("Key event queue full, dropped {}", dropped);
                    },
                    Err(TrySendError::Disconnected(_)) => {
                        trace!("Key event receiver gone, event discarded");
                    },
                }
            },
            KeypadReport::Unmapped { scan_code, is_down } => {
                self.metrics.unmapped_keys.fetch_add(1, Ordering::Relaxed);
                trace!("unmapped scan code 0x{:02X} (down={})", scan_code, is_down);
            },
            KeypadReport::Ignored => {
                self.metrics.ignored_frames.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

impl ByteSink for RxPipeline {
    fn on_bytes(&self, bytes: &[u8]) {
        self.metrics
            .rx_bytes_total
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        let mut decoder = self.decoder.lock();
        for frame in decoder.feed(bytes) {
            self.hooks.read().trigger_all(&frame);
            self.dispatch(self.keypad.classify(&frame));
        }

        let stats = decoder.take_stats();
        if stats.crc_errors > 0 || stats.framing_errors > 0 {
            warn!(
                "Dropped malformed frames: crc_errors={}, framing_errors={}",
                stats.crc_errors, stats.framing_errors
            );
        }
        self.metrics.record_decoder(&stats);
    }
}

/// TX 线程主循环
///
/// 逐条取出指令写入传输层；写入成功后等待 `settle_interval` 再处理下一条，
/// 调用者线程从不阻塞。通道关闭或运行标志清除时退出。
pub fn tx_loop(
    transport: SharedTransport,
    cmd_rx: Receiver<PendantCommand>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<PendantMetrics>,
    hooks: Arc<RwLock<HookManager>>,
    settle_interval: Duration,
) {
    let settle_interval = settle_interval.max(MIN_SETTLE_INTERVAL);

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        let command = match cmd_rx.recv_timeout(TX_POLL_TIMEOUT) {
            Ok(cmd) => cmd,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                trace!("TX thread: command channel disconnected");
                break;
            },
        };

        let frame = command.to_frame();
        // 锁只覆盖写入本身，等待间隔期间不占用传输层
        let result = transport.lock().write(&frame.to_bytes());

        match result {
            Ok(()) => {
                metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                hooks.read().trigger_all_sent(&frame);
                trace!("TX {}", command);
                spin_sleep::sleep(settle_interval);
            },
            Err(SerialError::NotConnected) => {
                metrics
                    .tx_rejected_disconnected
                    .fetch_add(1, Ordering::Relaxed);
                warn!("TX thread: {} dropped, port disconnected", command);
            },
            Err(e) => {
                metrics.tx_write_failures.fetch_add(1, Ordering::Relaxed);
                error!("TX thread: failed to write {}: {}", command, e);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FrameTapHook;
    use crossbeam_channel::bounded;
    use dtp7h_protocol::{LedAddress, LedColor, LogicalKey, encode};
    use dtp7h_serial::{MockTransport, SerialSettings};
    use std::thread;
    use std::time::Instant;

    fn pipeline(
        capacity: usize,
    ) -> (Arc<RxPipeline>, Receiver<KeyTransition>, Arc<PendantMetrics>) {
        let (rx, key_rx, metrics, _) = pipeline_with_flag(capacity);
        (rx, key_rx, metrics)
    }

    fn pipeline_with_flag(
        capacity: usize,
    ) -> (
        Arc<RxPipeline>,
        Receiver<KeyTransition>,
        Arc<PendantMetrics>,
        Arc<AtomicBool>,
    ) {
        let (key_tx, key_rx) = bounded(capacity);
        let metrics = Arc::new(PendantMetrics::new());
        let release_lost = Arc::new(AtomicBool::new(false));
        let rx = Arc::new(RxPipeline::new(
            KeypadDecoder::default(),
            key_tx,
            release_lost.clone(),
            metrics.clone(),
            Arc::new(RwLock::new(HookManager::new())),
        ));
        (rx, key_rx, metrics, release_lost)
    }

    fn key_bytes(state: u8, scan: u8) -> [u8; 9] {
        encode(0x10, 0x3D, state, scan, 0x20)
    }

    #[test]
    fn test_rx_pipeline_preserves_order() {
        let (rx, key_rx, metrics) = pipeline(16);
        let mut stream = key_bytes(0x31, 0x1E).to_vec();
        stream.extend_from_slice(&key_bytes(0x30, 0x1E));
        stream.extend_from_slice(&key_bytes(0x31, 0x30));

        // 任意切块交付
        for chunk in stream.chunks(4) {
            rx.on_bytes(chunk);
        }

        let events: Vec<_> = key_rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                KeyTransition::down(LogicalKey::A),
                KeyTransition::up(LogicalKey::A),
                KeyTransition::down(LogicalKey::B),
            ]
        );
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_bytes_total, 27);
        assert_eq!(snapshot.rx_frames_valid, 3);
        assert_eq!(snapshot.key_events, 3);
    }

    #[test]
    fn test_rx_pipeline_counts_malformed_and_unmapped() {
        let (rx, key_rx, metrics) = pipeline(16);
        let mut bad = key_bytes(0x31, 0x1E);
        bad[7] ^= 0x01;

        rx.on_bytes(&[0xFF, 0xFE]);
        rx.on_bytes(&bad);
        rx.on_bytes(&key_bytes(0x31, 0x99));
        rx.on_bytes(&encode(0x11, 0x3A, 0x41, 0x31, 0x20));

        assert!(key_rx.try_recv().is_err());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_crc_errors, 1);
        assert_eq!(snapshot.rx_discarded_bytes, 2);
        assert_eq!(snapshot.unmapped_keys, 1);
        assert_eq!(snapshot.ignored_frames, 1);
    }

    #[test]
    fn test_rx_pipeline_drops_when_queue_full() {
        let (rx, key_rx, metrics, release_lost) = pipeline_with_flag(1);
        rx.on_bytes(&key_bytes(0x31, 0x1E));
        rx.on_bytes(&key_bytes(0x31, 0x30));

        assert_eq!(key_rx.try_recv().unwrap(), KeyTransition::down(LogicalKey::A));
        assert!(key_rx.try_recv().is_err());
        assert_eq!(metrics.snapshot().key_events_dropped, 1);
        // 丢弃的是按下，不需要强制停止
        assert!(!release_lost.load(Ordering::Acquire));
    }

    #[test]
    fn test_rx_pipeline_flags_dropped_release() {
        let (rx, key_rx, metrics, release_lost) = pipeline_with_flag(1);
        rx.on_bytes(&key_bytes(0x31, 0x1E));
        rx.on_bytes(&key_bytes(0x30, 0x1E));

        assert!(release_lost.load(Ordering::Acquire));
        assert_eq!(key_rx.try_recv().unwrap(), KeyTransition::down(LogicalKey::A));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.key_events_dropped, 1);
        assert_eq!(snapshot.key_releases_dropped, 1);
    }

    #[test]
    fn test_rx_tap_waits_for_hook_registration() {
        let (key_tx, _key_rx) = bounded(4);
        let hooks = Arc::new(RwLock::new(HookManager::new()));
        let rx = Arc::new(RxPipeline::new(
            KeypadDecoder::default(),
            key_tx,
            Arc::new(AtomicBool::new(false)),
            Arc::new(PendantMetrics::new()),
            hooks.clone(),
        ));
        let (tap, tap_rx) = FrameTapHook::new(4);

        // 注册期间到达的帧不会被跳过
        let mut guard = hooks.write();
        let reader = {
            let rx = rx.clone();
            thread::spawn(move || rx.on_bytes(&key_bytes(0x31, 0x1E)))
        };
        thread::sleep(Duration::from_millis(20));
        guard.add_callback(Arc::new(tap));
        drop(guard);
        reader.join().unwrap();

        assert_eq!(tap_rx.try_iter().count(), 1);
    }

    #[test]
    fn test_rx_pipeline_reset_discards_half_frame() {
        let (rx, key_rx, _) = pipeline(4);
        let frame = key_bytes(0x31, 0x1E);
        rx.on_bytes(&frame[..5]);
        assert_eq!(rx.buffered_len(), 5);

        rx.reset();
        assert_eq!(rx.buffered_len(), 0);
        rx.on_bytes(&frame[5..]);
        assert!(key_rx.try_recv().is_err());
    }

    #[test]
    fn test_tx_loop_serializes_with_settle_interval() {
        let (mut mock, handle) = MockTransport::with_handle();
        let (rx, _key_rx, metrics) = pipeline(4);
        mock.connect(&SerialSettings::new("mock", 115_200), rx)
            .unwrap();

        let boxed: Box<dyn SerialTransport> = Box::new(mock);
        let transport: SharedTransport = Arc::new(Mutex::new(boxed));
        let (cmd_tx, cmd_rx) = bounded(8);
        let is_running = Arc::new(AtomicBool::new(true));
        let hooks = Arc::new(RwLock::new(HookManager::new()));
        let (tap, tap_rx) = FrameTapHook::new(8);
        hooks.write().add_callback(Arc::new(tap));

        let tx_thread = {
            let transport = transport.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            let hooks = hooks.clone();
            thread::spawn(move || {
                tx_loop(
                    transport,
                    cmd_rx,
                    is_running,
                    metrics,
                    hooks,
                    Duration::from_millis(1),
                )
            })
        };

        let start = Instant::now();
        cmd_tx
            .send(PendantCommand::set_led(LedAddress::Left1, LedColor::Blue))
            .unwrap();
        cmd_tx.send(PendantCommand::set_buzzer(true)).unwrap();
        cmd_tx.send(PendantCommand::set_buzzer(false)).unwrap();
        drop(cmd_tx);
        tx_thread.join().unwrap();

        let written = handle.written_with_time();
        assert_eq!(written.len(), 3);
        assert_eq!(
            written[0].1,
            PendantCommand::set_led(LedAddress::Left1, LedColor::Blue).to_bytes()
        );
        // 低于最小值的间隔被提升到 10ms
        for pair in written.windows(2) {
            assert!(pair[1].0.duration_since(pair[0].0) >= MIN_SETTLE_INTERVAL);
        }
        assert!(start.elapsed() >= MIN_SETTLE_INTERVAL * 2);
        assert_eq!(metrics.snapshot().tx_frames_total, 3);
        assert_eq!(tap_rx.try_iter().count(), 3);
    }

    #[test]
    fn test_tx_loop_counts_disconnected_writes() {
        let (mock, handle) = MockTransport::with_handle();
        let boxed: Box<dyn SerialTransport> = Box::new(mock);
        let transport: SharedTransport = Arc::new(Mutex::new(boxed));
        let (cmd_tx, cmd_rx) = bounded(4);
        let metrics = Arc::new(PendantMetrics::new());

        cmd_tx.send(PendantCommand::set_buzzer(true)).unwrap();
        drop(cmd_tx);
        tx_loop(
            transport,
            cmd_rx,
            Arc::new(AtomicBool::new(true)),
            metrics.clone(),
            Arc::new(RwLock::new(HookManager::new())),
            MIN_SETTLE_INTERVAL,
        );

        assert!(handle.written().is_empty());
        assert_eq!(metrics.snapshot().tx_rejected_disconnected, 1);
    }
}
