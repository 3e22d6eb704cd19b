//! 点动会话：单线程协作式控制循环
//!
//! `JogSession` 独占 [`JogController`]，在同一个线程上等待两类事件：
//! 按键变化（来自驱动的有界 FIFO）与节拍。节拍源只在运动期间存在，
//! 空闲时换成 `never()`，不会产生空转唤醒。
//!
//! 位置通过 `ArcSwap` 发布，任何线程都可以无锁读取（[`PositionObserver`]）。
//!
//! 队列溢出丢弃了松开事件时，生产侧置位一个共享标志；会话在取空队列后
//! 清除标志并强制停止，保证不会因为丢失松开而一直运动。

use crate::error::ClientError;
use crate::jog::{AxisPositions, JogConfig, JogController, JogState, PositionChanged};
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, TryRecvError, never, select, tick};
use dtp7h_protocol::KeyTransition;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// `run_until` 检查运行标志的间隔
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 会话事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogEvent {
    StateChanged(JogState),
    Position(PositionChanged),
}

/// 已发布的位置快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSnapshot {
    pub state: JogState,
    pub positions: AxisPositions,
    /// 累计执行的节拍数
    pub ticks: u64,
}

/// 位置观察器（只读，可克隆，可跨线程）
#[derive(Clone)]
pub struct PositionObserver {
    published: Arc<ArcSwap<PositionSnapshot>>,
}

impl PositionObserver {
    /// 读取最新快照（wait-free）
    pub fn snapshot(&self) -> PositionSnapshot {
        **self.published.load()
    }

    pub fn positions(&self) -> AxisPositions {
        self.snapshot().positions
    }

    pub fn state(&self) -> JogState {
        self.snapshot().state
    }
}

/// 点动会话
pub struct JogSession {
    controller: JogController,
    keys: Receiver<KeyTransition>,
    ticker: Receiver<Instant>,
    release_lost: Option<Arc<AtomicBool>>,
    published: Arc<ArcSwap<PositionSnapshot>>,
    ticks: u64,
}

impl JogSession {
    pub fn new(controller: JogController, keys: Receiver<KeyTransition>) -> Self {
        let published = Arc::new(ArcSwap::from_pointee(PositionSnapshot {
            state: controller.state(),
            positions: controller.positions(),
            ticks: 0,
        }));
        let mut session = Self {
            controller,
            keys,
            ticker: never(),
            release_lost: None,
            published,
            ticks: 0,
        };
        session.sync_ticker(false);
        session
    }

    /// 由配置创建控制器与会话
    pub fn with_config(
        config: JogConfig,
        keys: Receiver<KeyTransition>,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(JogController::new(config)?, keys))
    }

    /// 关联松开事件丢失标志
    ///
    /// 标志置位说明在当前队列内容之后有松开事件被丢弃：队列取空后立即停止。
    pub fn with_release_guard(mut self, release_lost: Arc<AtomicBool>) -> Self {
        self.release_lost = Some(release_lost);
        self
    }

    pub fn observer(&self) -> PositionObserver {
        PositionObserver {
            published: self.published.clone(),
        }
    }

    pub fn controller(&self) -> &JogController {
        &self.controller
    }

    pub fn state(&self) -> JogState {
        self.controller.state()
    }

    /// 等待并处理至多一个事件
    ///
    /// 按键事件优先于节拍。超时返回 `Ok(None)`；事件源关闭时返回
    /// [`ClientError::EventSourceClosed`]（此时运动已停止）。
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<JogEvent>, ClientError> {
        match self.keys.try_recv() {
            Ok(transition) => return Ok(self.apply_key(transition)),
            Err(TryRecvError::Disconnected) => return Err(self.close()),
            Err(TryRecvError::Empty) => {},
        }

        if let Some(state) = self.recover_lost_release() {
            return Ok(Some(JogEvent::StateChanged(state)));
        }

        let keys = self.keys.clone();
        let ticker = self.ticker.clone();
        select! {
            recv(keys) -> msg => match msg {
                Ok(transition) => Ok(self.apply_key(transition)),
                Err(_) => Err(self.close()),
            },
            recv(ticker) -> _ => Ok(self.apply_tick()),
            default(timeout) => Ok(None),
        }
    }

    /// 循环处理事件，直到 `running` 被清除
    ///
    /// 事件源关闭时返回 [`ClientError::EventSourceClosed`]。
    pub fn run_until<F>(&mut self, running: &AtomicBool, mut on_event: F) -> Result<(), ClientError>
    where
        F: FnMut(&JogEvent),
    {
        info!("Jog session started");
        while running.load(Ordering::Acquire) {
            if let Some(event) = self.poll(RUN_POLL_INTERVAL)? {
                on_event(&event);
            }
        }
        self.stop();
        info!("Jog session stopped");
        Ok(())
    }

    /// 停止运动
    pub fn stop(&mut self) -> Option<JogState> {
        let changed = self.controller.stop();
        if changed.is_some() {
            self.sync_ticker(true);
            self.publish();
        }
        changed
    }

    /// 停止运动并清零位置
    pub fn reset(&mut self) {
        self.controller.reset();
        self.ticks = 0;
        self.sync_ticker(true);
        self.publish();
    }

    /// 取回控制器
    pub fn into_controller(self) -> JogController {
        self.controller
    }

    fn apply_key(&mut self, transition: KeyTransition) -> Option<JogEvent> {
        let was_jogging = self.controller.state().is_jogging();
        let state = self.controller.handle_key(transition)?;
        self.sync_ticker(was_jogging);
        self.publish();
        Some(JogEvent::StateChanged(state))
    }

    /// 队列已空：丢失的松开事件之前的按键都已处理，可以安全停止
    fn recover_lost_release(&mut self) -> Option<JogState> {
        let lost = self
            .release_lost
            .as_ref()
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel));
        if !lost {
            return None;
        }
        warn!("Key release lost on queue overflow, stopping jog");
        self.stop()
    }

    fn apply_tick(&mut self) -> Option<JogEvent> {
        let changed = self.controller.tick()?;
        self.ticks += 1;
        self.publish();
        Some(JogEvent::Position(changed))
    }

    /// 进入运动时创建节拍源；切换轴时沿用原节拍相位；停止时移除
    fn sync_ticker(&mut self, was_jogging: bool) {
        let jogging = self.controller.state().is_jogging();
        if jogging && !was_jogging {
            self.ticker = tick(self.controller.config().tick_period);
        } else if !jogging {
            self.ticker = never();
        }
    }

    fn publish(&self) {
        self.published.store(Arc::new(PositionSnapshot {
            state: self.controller.state(),
            positions: self.controller.positions(),
            ticks: self.ticks,
        }));
    }

    fn close(&mut self) -> ClientError {
        debug!("key event source closed, stopping jog");
        self.stop();
        ClientError::EventSourceClosed
    }
}
