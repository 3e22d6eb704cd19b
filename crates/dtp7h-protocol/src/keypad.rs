//! 按键上报（上行）
//!
//! 按键帧布局：`DATA1` 为按下/松开状态（0x31 按下），`DATA2` 为扫描码。

use crate::command::{MOD_GET, SEL_KEYPAD, STATE_ON};
use crate::frame::PendantFrame;
use std::fmt;

/// 逻辑按键
///
/// 面板上 12 个功能键，命名沿用扫描码表中的字母。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
}

/// 扫描码 → 逻辑按键映射表
const SCAN_CODE_TABLE: [(u8, LogicalKey); 12] = [
    (0x1E, LogicalKey::A),
    (0x30, LogicalKey::B),
    (0x2E, LogicalKey::C),
    (0x20, LogicalKey::D),
    (0x12, LogicalKey::E),
    (0x21, LogicalKey::F),
    (0x22, LogicalKey::G),
    (0x23, LogicalKey::H),
    (0x17, LogicalKey::I),
    (0x24, LogicalKey::J),
    (0x25, LogicalKey::K),
    (0x26, LogicalKey::L),
];

impl LogicalKey {
    pub const ALL: [LogicalKey; 12] = [
        LogicalKey::A,
        LogicalKey::B,
        LogicalKey::C,
        LogicalKey::D,
        LogicalKey::E,
        LogicalKey::F,
        LogicalKey::G,
        LogicalKey::H,
        LogicalKey::I,
        LogicalKey::J,
        LogicalKey::K,
        LogicalKey::L,
    ];

    /// 查表；未映射的扫描码返回 `None`
    pub fn from_scan_code(code: u8) -> Option<Self> {
        SCAN_CODE_TABLE
            .iter()
            .find(|(scan, _)| *scan == code)
            .map(|(_, key)| *key)
    }

    /// 反查扫描码
    pub fn scan_code(self) -> u8 {
        SCAN_CODE_TABLE
            .iter()
            .find(|(_, key)| *key == self)
            .map(|(scan, _)| *scan)
            .unwrap_or_default()
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 按键状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyTransition {
    pub key: LogicalKey,
    pub is_down: bool,
}

impl KeyTransition {
    pub fn down(key: LogicalKey) -> Self {
        Self { key, is_down: true }
    }

    pub fn up(key: LogicalKey) -> Self {
        Self {
            key,
            is_down: false,
        }
    }
}

impl fmt::Display for KeyTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, if self.is_down { "down" } else { "up" })
    }
}

/// 按键帧的 MOD/SEL 过滤条件
///
/// 不同固件版本上报按键时使用的 MOD/SEL 并不一致，因此做成可配置；
/// 字段为 `None` 表示不检查该字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeypadFilter {
    pub module: Option<u8>,
    pub select: Option<u8>,
}

impl Default for KeypadFilter {
    fn default() -> Self {
        Self {
            module: Some(MOD_GET),
            select: Some(SEL_KEYPAD),
        }
    }
}

impl KeypadFilter {
    /// 不做 MOD/SEL 过滤
    pub fn any() -> Self {
        Self {
            module: None,
            select: None,
        }
    }

    pub fn matches(&self, frame: &PendantFrame) -> bool {
        self.module.is_none_or(|m| m == frame.module)
            && self.select.is_none_or(|s| s == frame.select)
    }
}

/// 单帧分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadReport {
    /// 已映射的按键变化
    Key(KeyTransition),
    /// 按键帧，但扫描码不在表中（正常过滤，不是错误）
    Unmapped { scan_code: u8, is_down: bool },
    /// 不是按键帧
    Ignored,
}

/// 按键解码器
///
/// 无状态，可在 RX 线程上直接调用（不分配内存）。
#[derive(Debug, Clone, Copy, Default)]
pub struct KeypadDecoder {
    filter: KeypadFilter,
}

impl KeypadDecoder {
    pub fn new(filter: KeypadFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> KeypadFilter {
        self.filter
    }

    /// 对帧进行分类
    pub fn classify(&self, frame: &PendantFrame) -> KeypadReport {
        if !self.filter.matches(frame) {
            return KeypadReport::Ignored;
        }

        // 0x31 之外的状态值一律按松开处理，避免按键卡在按下状态
        let is_down = frame.data[0] == STATE_ON;
        let scan_code = frame.data[1];

        match LogicalKey::from_scan_code(scan_code) {
            Some(key) => KeypadReport::Key(KeyTransition { key, is_down }),
            None => KeypadReport::Unmapped { scan_code, is_down },
        }
    }

    /// 解码按键变化；非按键帧或未映射扫描码返回 `None`
    pub fn decode(&self, frame: &PendantFrame) -> Option<KeyTransition> {
        match self.classify(frame) {
            KeypadReport::Key(transition) => Some(transition),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::STATE_OFF;

    fn key_frame(state: u8, scan: u8) -> PendantFrame {
        PendantFrame::new(MOD_GET, SEL_KEYPAD, [state, scan, 0x20])
    }

    #[test]
    fn test_scan_code_table() {
        assert_eq!(LogicalKey::from_scan_code(0x1E), Some(LogicalKey::A));
        assert_eq!(LogicalKey::from_scan_code(0x30), Some(LogicalKey::B));
        assert_eq!(LogicalKey::from_scan_code(0x26), Some(LogicalKey::L));
        assert_eq!(LogicalKey::from_scan_code(0x00), None);

        for key in LogicalKey::ALL {
            assert_eq!(LogicalKey::from_scan_code(key.scan_code()), Some(key));
        }
    }

    #[test]
    fn test_decode_down_and_up() {
        let decoder = KeypadDecoder::default();
        assert_eq!(
            decoder.decode(&key_frame(STATE_ON, 0x1E)),
            Some(KeyTransition::down(LogicalKey::A))
        );
        assert_eq!(
            decoder.decode(&key_frame(STATE_OFF, 0x1E)),
            Some(KeyTransition::up(LogicalKey::A))
        );
    }

    #[test]
    fn test_unknown_state_is_release() {
        let decoder = KeypadDecoder::default();
        let transition = decoder.decode(&key_frame(0x7F, 0x2E)).unwrap();
        assert!(!transition.is_down);
    }

    #[test]
    fn test_unmapped_scan_code_is_filtered() {
        let decoder = KeypadDecoder::default();
        let frame = key_frame(STATE_ON, 0x99);
        assert_eq!(decoder.decode(&frame), None);
        assert_eq!(
            decoder.classify(&frame),
            KeypadReport::Unmapped {
                scan_code: 0x99,
                is_down: true
            }
        );
    }

    #[test]
    fn test_default_filter_rejects_other_commands() {
        let decoder = KeypadDecoder::default();
        // LED 指令回显不是按键帧
        let frame = PendantFrame::new(0x11, 0x3A, [0x31, 0x1E, 0x20]);
        assert_eq!(decoder.classify(&frame), KeypadReport::Ignored);
    }

    #[test]
    fn test_any_filter_accepts_all_families() {
        let decoder = KeypadDecoder::new(KeypadFilter::any());
        let frame = PendantFrame::new(0x11, 0x3A, [0x31, 0x1E, 0x20]);
        assert_eq!(
            decoder.decode(&frame),
            Some(KeyTransition::down(LogicalKey::A))
        );
    }

    #[test]
    fn test_partial_filter() {
        let filter = KeypadFilter {
            module: None,
            select: Some(SEL_KEYPAD),
        };
        let decoder = KeypadDecoder::new(filter);
        assert!(
            decoder
                .decode(&PendantFrame::new(0x55, SEL_KEYPAD, [0x31, 0x1E, 0x20]))
                .is_some()
        );
        assert!(
            decoder
                .decode(&PendantFrame::new(MOD_GET, 0x3C, [0x31, 0x1E, 0x20]))
                .is_none()
        );
    }
}
