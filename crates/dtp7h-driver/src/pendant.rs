//! 示教器 API 模块
//!
//! 提供对外的 `Pendant` 结构体，封装传输层、RX 流水线和 TX 线程。

use crate::error::DriverError;
use crate::hooks::HookManager;
use crate::metrics::{MetricsSnapshot, PendantMetrics};
use crate::pipeline::{DriverConfig, RxPipeline, SharedTransport, tx_loop};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use dtp7h_protocol::{KeyTransition, KeypadDecoder, LedAddress, LedColor, PendantCommand};
use dtp7h_serial::{SerialSettings, SerialTransport};
use parking_lot::{Mutex, RwLock};
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info, warn};

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责真正的 join；超时后它继续在后台等待
        spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
        }
    }
}

/// 示教器驱动（对外 API）
///
/// - 按键事件：[`key_events`](Self::key_events) 返回有界 FIFO 的接收端
/// - 指令：[`set_led`](Self::set_led) / [`set_buzzer`](Self::set_buzzer) 只负责入队，
///   由 TX 线程串行写出
///
/// # Example
///
/// ```rust
/// use dtp7h_driver::{DriverConfig, LedAddress, LedColor, Pendant};
/// use dtp7h_serial::MockTransport;
///
/// let (transport, device) = MockTransport::with_handle();
/// let pendant = Pendant::new(Box::new(transport), DriverConfig::default()).unwrap();
///
/// // 未连接时指令被明确拒绝
/// assert!(pendant.set_led(LedAddress::Left1, LedColor::Blue).is_err());
///
/// pendant.connect("mock", 115_200).unwrap();
/// pendant.set_led(LedAddress::Left1, LedColor::Blue).unwrap();
/// # drop(pendant);
/// # assert_eq!(device.written().len(), 1);
/// ```
pub struct Pendant {
    /// 指令发送端
    ///
    /// Drop 时必须先于 join TX 线程关闭，否则 `tx_loop` 收不到 `Disconnected`。
    cmd_tx: ManuallyDrop<Sender<PendantCommand>>,
    key_rx: Receiver<KeyTransition>,
    release_lost: Arc<AtomicBool>,
    transport: SharedTransport,
    rx_pipeline: Arc<RxPipeline>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<PendantMetrics>,
    hooks: Arc<RwLock<HookManager>>,
    config: DriverConfig,
    /// 最近一次成功连接的参数
    settings: Mutex<Option<SerialSettings>>,
}

impl Pendant {
    /// 创建驱动并启动 TX 线程（不打开端口）
    pub fn new(
        transport: Box<dyn SerialTransport>,
        config: DriverConfig,
    ) -> Result<Self, DriverError> {
        if config.key_queue_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "key_queue_capacity must be > 0".to_string(),
            ));
        }
        if config.command_queue_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "command_queue_capacity must be > 0".to_string(),
            ));
        }
        if config.settle_interval < crate::MIN_SETTLE_INTERVAL {
            warn!(
                "settle_interval {:?} is below the device minimum, using {:?}",
                config.settle_interval,
                crate::MIN_SETTLE_INTERVAL
            );
        }

        let (key_tx, key_rx) = bounded(config.key_queue_capacity);
        let (cmd_tx, cmd_rx) = bounded(config.command_queue_capacity);

        let metrics = Arc::new(PendantMetrics::new());
        let hooks = Arc::new(RwLock::new(HookManager::new()));
        let is_running = Arc::new(AtomicBool::new(true));
        let release_lost = Arc::new(AtomicBool::new(false));
        let transport: SharedTransport = Arc::new(Mutex::new(transport));

        let rx_pipeline = Arc::new(RxPipeline::new(
            KeypadDecoder::new(config.keypad_filter),
            key_tx,
            release_lost.clone(),
            metrics.clone(),
            hooks.clone(),
        ));

        let tx_thread = {
            let transport = transport.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            let hooks = hooks.clone();
            let settle_interval = config.effective_settle_interval();
            std::thread::Builder::new()
                .name("dtp7h-tx".into())
                .spawn(move || {
                    tx_loop(
                        transport,
                        cmd_rx,
                        is_running,
                        metrics,
                        hooks,
                        settle_interval,
                    )
                })
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        Ok(Self {
            cmd_tx: ManuallyDrop::new(cmd_tx),
            key_rx,
            release_lost,
            transport,
            rx_pipeline,
            tx_thread: Some(tx_thread),
            is_running,
            metrics,
            hooks,
            config,
            settings: Mutex::new(None),
        })
    }

    /// 打开端口
    ///
    /// 已连接时先断开。接收缓冲区在字节交付开始之前清空，
    /// 上一次连接残留的半帧不会被拼接到新数据上。
    pub fn connect(&self, port: &str, baud_rate: u32) -> Result<(), DriverError> {
        let settings =
            SerialSettings::new(port, baud_rate).with_read_timeout(self.config.read_timeout);
        self.connect_with(settings)
    }

    /// 使用完整串口参数打开端口
    pub fn connect_with(&self, settings: SerialSettings) -> Result<(), DriverError> {
        let mut transport = self.transport.lock();
        if transport.is_connected() {
            transport.disconnect();
        }
        self.rx_pipeline.reset();

        if let Err(e) = transport.connect(&settings, self.rx_pipeline.clone()) {
            error!("Failed to open {}: {}", settings, e);
            return Err(e.into());
        }

        info!("Pendant connected on {}", settings);
        *self.settings.lock() = Some(settings);
        Ok(())
    }

    /// 使用上次的参数重新连接
    pub fn reconnect(&self) -> Result<(), DriverError> {
        let settings = self.settings.lock().clone().ok_or_else(|| {
            DriverError::InvalidConfig("no previous connection to restore".to_string())
        })?;
        self.connect_with(settings)
    }

    /// 断开连接
    ///
    /// 先停止字节交付（传输层读线程退出），再清空接收缓冲区。
    pub fn disconnect(&self) {
        let mut transport = self.transport.lock();
        let was_connected = transport.is_connected();
        // 读线程可能已因设备错误退出，仍需回收
        transport.disconnect();
        self.rx_pipeline.reset();
        if was_connected {
            info!("Pendant disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.lock().is_connected()
    }

    /// 最近一次成功连接使用的参数
    pub fn settings(&self) -> Option<SerialSettings> {
        self.settings.lock().clone()
    }

    /// 设置 LED
    ///
    /// # 错误
    /// - `DriverError::NotConnected`: 未连接，指令未入队
    /// - `DriverError::ChannelFull`: 指令队列已满
    pub fn set_led(&self, address: LedAddress, color: LedColor) -> Result<(), DriverError> {
        self.send_command(PendantCommand::set_led(address, color))
    }

    /// 把全部 6 个 LED 设为同一颜色
    pub fn set_all_leds(&self, color: LedColor) -> Result<(), DriverError> {
        LedAddress::ALL
            .into_iter()
            .try_for_each(|address| self.set_led(address, color))
    }

    /// 开关蜂鸣器
    pub fn set_buzzer(&self, on: bool) -> Result<(), DriverError> {
        self.send_command(PendantCommand::set_buzzer(on))
    }

    /// 指令入队（非阻塞）
    pub fn send_command(&self, command: PendantCommand) -> Result<(), DriverError> {
        if !self.is_connected() {
            self.metrics
                .tx_rejected_disconnected
                .fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::NotConnected);
        }

        self.cmd_tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.metrics.tx_queue_full.fetch_add(1, Ordering::Relaxed);
                DriverError::ChannelFull {
                    capacity: self.config.command_queue_capacity,
                }
            },
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 按键事件接收端
    ///
    /// 事件按到达顺序排列。接收端可克隆，但多个消费者会互相竞争事件，
    /// 控制侧应只保留一个消费者。
    pub fn key_events(&self) -> Receiver<KeyTransition> {
        self.key_rx.clone()
    }

    /// 松开事件丢失标志
    ///
    /// 按键队列满时丢弃了松开事件则置位；消费者取空队列后应清除它并停止运动
    /// （见 `JogSession::with_release_guard`）。
    pub fn release_lost_flag(&self) -> Arc<AtomicBool> {
        self.release_lost.clone()
    }

    /// 获取指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 钩子管理器（注册抓包回调）
    pub fn hooks(&self) -> Arc<RwLock<HookManager>> {
        self.hooks.clone()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// TX 线程是否仍在运行
    pub fn is_healthy(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
            && self.tx_thread.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Pendant {
    fn drop(&mut self) {
        // 先关闭指令通道：TX 线程写完已排队的指令后收到 `Disconnected` 退出
        // SAFETY: cmd_tx 之后不再被访问
        unsafe {
            ManuallyDrop::drop(&mut self.cmd_tx);
        }

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.tx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        // 超时的 TX 线程在下一次轮询时退出
        self.is_running.store(false, Ordering::Release);
        self.disconnect();
    }
}
