//! 点动（Jog）状态机
//!
//! 同一时刻最多只有一个轴在运动：
//!
//! ```text
//!            KeyDown(bound key)            KeyDown(bound key)
//!   Idle ────────────────────────► Jogging ◄──────────────┐
//!    ▲                                │  └────────────────┘ 后按下者生效
//!    └──────── KeyUp / stop ──────────┘
//! ```
//!
//! 运动期间每个节拍 `position[axis] += step * direction`，无加减速、无限位。
//! 状态机本身不计时，节拍由调用者（[`JogSession`](crate::JogSession)）驱动。

use crate::error::ClientError;
use dtp7h_protocol::{KeyTransition, LogicalKey};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// 逻辑轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    A,
    Theta,
    Z,
    Y,
    Phi,
}

impl Axis {
    pub const COUNT: usize = 5;

    pub const ALL: [Axis; Axis::COUNT] = [Axis::A, Axis::Theta, Axis::Z, Axis::Y, Axis::Phi];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::A => "A",
            Axis::Theta => "Theta",
            Axis::Z => "Z",
            Axis::Y => "Y",
            Axis::Phi => "Phi",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Axis::ALL
            .into_iter()
            .find(|axis| axis.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ClientError::ParseError(format!("unknown axis: {s}")))
    }
}

/// 运动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Negative,
    Positive,
}

impl Direction {
    /// -1.0 / +1.0
    pub fn sign(self) -> f64 {
        match self {
            Direction::Negative => -1.0,
            Direction::Positive => 1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Negative => f.write_str("-"),
            Direction::Positive => f.write_str("+"),
        }
    }
}

/// 点动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JogState {
    #[default]
    Idle,
    Jogging {
        axis: Axis,
        direction: Direction,
        /// 触发本次运动的按键
        key: LogicalKey,
    },
}

impl JogState {
    pub fn is_jogging(&self) -> bool {
        matches!(self, JogState::Jogging { .. })
    }

    pub fn active_axis(&self) -> Option<Axis> {
        match self {
            JogState::Jogging { axis, .. } => Some(*axis),
            JogState::Idle => None,
        }
    }
}

impl fmt::Display for JogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JogState::Idle => f.write_str("Idle"),
            JogState::Jogging {
                axis,
                direction,
                key,
            } => write!(f, "Jogging({axis}{direction}, key {key})"),
        }
    }
}

/// 位置变化通知
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionChanged {
    pub axis: Axis,
    pub position: f64,
}

impl fmt::Display for PositionChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.3}", self.axis, self.position)
    }
}

/// 各轴位置
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisPositions([f64; Axis::COUNT]);

impl AxisPositions {
    pub fn get(&self, axis: Axis) -> f64 {
        self.0[axis.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL.into_iter().map(|axis| (axis, self.get(axis)))
    }

    fn add(&mut self, axis: Axis, delta: f64) -> f64 {
        let slot = &mut self.0[axis.index()];
        *slot += delta;
        *slot
    }
}

impl Index<Axis> for AxisPositions {
    type Output = f64;

    fn index(&self, axis: Axis) -> &f64 {
        &self.0[axis.index()]
    }
}

impl fmt::Display for AxisPositions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (axis, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("  ")?;
            }
            write!(f, "{axis}={value:.3}")?;
        }
        Ok(())
    }
}

/// 按键 → (轴, 方向) 绑定表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JogBindings {
    table: [Option<(Axis, Direction)>; 12],
}

impl Default for JogBindings {
    /// 相邻两键控制同一轴，前者负向、后者正向；K、L 不绑定
    fn default() -> Self {
        Self::empty()
            .with(LogicalKey::A, Axis::A, Direction::Negative)
            .with(LogicalKey::B, Axis::A, Direction::Positive)
            .with(LogicalKey::C, Axis::Theta, Direction::Negative)
            .with(LogicalKey::D, Axis::Theta, Direction::Positive)
            .with(LogicalKey::E, Axis::Z, Direction::Negative)
            .with(LogicalKey::F, Axis::Z, Direction::Positive)
            .with(LogicalKey::G, Axis::Y, Direction::Negative)
            .with(LogicalKey::H, Axis::Y, Direction::Positive)
            .with(LogicalKey::I, Axis::Phi, Direction::Negative)
            .with(LogicalKey::J, Axis::Phi, Direction::Positive)
    }
}

impl JogBindings {
    /// 不绑定任何按键
    pub fn empty() -> Self {
        Self { table: [None; 12] }
    }

    /// 链式绑定
    pub fn with(mut self, key: LogicalKey, axis: Axis, direction: Direction) -> Self {
        self.bind(key, axis, direction);
        self
    }

    pub fn bind(&mut self, key: LogicalKey, axis: Axis, direction: Direction) {
        self.table[key as usize] = Some((axis, direction));
    }

    pub fn unbind(&mut self, key: LogicalKey) {
        self.table[key as usize] = None;
    }

    pub fn lookup(&self, key: LogicalKey) -> Option<(Axis, Direction)> {
        self.table[key as usize]
    }

    /// 已绑定的按键
    pub fn iter(&self) -> impl Iterator<Item = (LogicalKey, Axis, Direction)> + '_ {
        LogicalKey::ALL
            .into_iter()
            .filter_map(|key| self.lookup(key).map(|(axis, dir)| (key, axis, dir)))
    }
}

/// 松开按键时的停止策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReleasePolicy {
    /// 任意按键松开都停止当前运动
    #[default]
    AnyKey,
    /// 只有触发当前运动的按键松开才停止
    ActiveKey,
}

impl FromStr for ReleasePolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "any-key" | "any_key" => Ok(ReleasePolicy::AnyKey),
            "active" | "active-key" | "active_key" => Ok(ReleasePolicy::ActiveKey),
            _ => Err(ClientError::ParseError(format!(
                "unknown release policy: {s}"
            ))),
        }
    }
}

/// 点动配置
#[derive(Debug, Clone, PartialEq)]
pub struct JogConfig {
    /// 节拍周期
    pub tick_period: Duration,
    /// 每个节拍的位移
    pub step: f64,
    pub release_policy: ReleasePolicy,
    pub bindings: JogBindings,
}

impl Default for JogConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(50),
            step: 1.0,
            release_policy: ReleasePolicy::default(),
            bindings: JogBindings::default(),
        }
    }
}

impl JogConfig {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.tick_period.is_zero() {
            return Err(ClientError::InvalidConfig(
                "tick_period must be > 0".to_string(),
            ));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(ClientError::InvalidConfig(format!(
                "step must be a positive finite number, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// 点动状态机
///
/// 不是线程安全的：状态只能由拥有它的控制线程修改。
///
/// # Example
///
/// ```rust
/// use dtp7h_client::{Axis, JogConfig, JogController, JogState};
/// use dtp7h_protocol::{KeyTransition, LogicalKey};
///
/// let mut jog = JogController::new(JogConfig::default()).unwrap();
/// jog.handle_key(KeyTransition::down(LogicalKey::A));
/// jog.tick();
/// jog.tick();
/// assert_eq!(jog.position(Axis::A), -2.0);
///
/// jog.handle_key(KeyTransition::up(LogicalKey::A));
/// assert_eq!(jog.state(), JogState::Idle);
/// ```
#[derive(Debug, Clone)]
pub struct JogController {
    config: JogConfig,
    state: JogState,
    positions: AxisPositions,
}

impl JogController {
    pub fn new(config: JogConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            config,
            state: JogState::Idle,
            positions: AxisPositions::default(),
        })
    }

    /// 处理按键变化；状态改变时返回新状态
    pub fn handle_key(&mut self, transition: KeyTransition) -> Option<JogState> {
        let next = if transition.is_down {
            match self.config.bindings.lookup(transition.key) {
                // 后按下者生效，不排队
                Some((axis, direction)) => JogState::Jogging {
                    axis,
                    direction,
                    key: transition.key,
                },
                None => return None,
            }
        } else {
            match (self.state, self.config.release_policy) {
                (JogState::Idle, _) => return None,
                (JogState::Jogging { .. }, ReleasePolicy::AnyKey) => JogState::Idle,
                (JogState::Jogging { key, .. }, ReleasePolicy::ActiveKey) => {
                    if key != transition.key {
                        return None;
                    }
                    JogState::Idle
                },
            }
        };

        self.transition_to(next)
    }

    /// 执行一个节拍；运动中返回位置变化
    pub fn tick(&mut self) -> Option<PositionChanged> {
        let JogState::Jogging {
            axis, direction, ..
        } = self.state
        else {
            return None;
        };

        let position = self
            .positions
            .add(axis, self.config.step * direction.sign());
        Some(PositionChanged { axis, position })
    }

    /// 停止运动（位置保留）
    pub fn stop(&mut self) -> Option<JogState> {
        self.transition_to(JogState::Idle)
    }

    /// 停止运动并清零所有位置
    pub fn reset(&mut self) {
        self.state = JogState::Idle;
        self.positions = AxisPositions::default();
    }

    pub fn state(&self) -> JogState {
        self.state
    }

    pub fn position(&self, axis: Axis) -> f64 {
        self.positions.get(axis)
    }

    pub fn positions(&self) -> AxisPositions {
        self.positions
    }

    pub fn config(&self) -> &JogConfig {
        &self.config
    }

    fn transition_to(&mut self, next: JogState) -> Option<JogState> {
        if next == self.state {
            return None;
        }
        debug!("jog {} -> {}", self.state, next);
        self.state = next;
        Some(next)
    }
}
