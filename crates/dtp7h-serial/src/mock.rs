//! Mock 串口后端
//!
//! 不访问硬件。测试通过 [`MockHandle`] 注入接收字节、检查写出的帧、模拟故障。

use crate::{
    ByteSink, SerialDeviceError, SerialDeviceErrorKind, SerialError, SerialSettings,
    SerialTransport,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct MockState {
    sink: Option<Arc<dyn ByteSink>>,
    settings: Option<SerialSettings>,
    written: Vec<(Instant, Vec<u8>)>,
    connect_count: usize,
    fail_connect: bool,
    fail_write: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<MockState>,
    /// 交付闸门：`inject` 持有期间 `disconnect` 等待，保证断开后不再回调
    delivery: Mutex<()>,
}

/// Mock 传输
#[derive(Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// 测试端句柄（可克隆，可跨线程）
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建传输及其测试句柄
    pub fn with_handle() -> (Self, MockHandle) {
        let transport = Self::new();
        let handle = transport.handle();
        (transport, handle)
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: self.shared.clone(),
        }
    }
}

impl SerialTransport for MockTransport {
    fn connect(
        &mut self,
        settings: &SerialSettings,
        sink: Arc<dyn ByteSink>,
    ) -> Result<(), SerialError> {
        self.disconnect();

        let mut state = self.shared.state.lock();
        if state.fail_connect {
            return Err(SerialError::Device(SerialDeviceError::new(
                SerialDeviceErrorKind::NotFound,
                format!("mock port {} unavailable", settings.port),
            )));
        }
        state.sink = Some(sink);
        state.settings = Some(settings.clone());
        state.connect_count += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        let _gate = self.shared.delivery.lock();
        self.shared.state.lock().sink = None;
    }

    fn is_connected(&self) -> bool {
        self.shared.state.lock().sink.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut state = self.shared.state.lock();
        if state.sink.is_none() {
            return Err(SerialError::NotConnected);
        }
        if state.fail_write {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.written.push((Instant::now(), bytes.to_vec()));
        Ok(())
    }
}

impl MockHandle {
    /// 模拟设备发来字节；未连接时丢弃并返回 `false`
    ///
    /// 在调用者线程上回调 sink，相当于"传输层自己的线程"。
    pub fn inject(&self, bytes: &[u8]) -> bool {
        let _gate = self.shared.delivery.lock();
        let sink = self.shared.state.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink.on_bytes(bytes);
                true
            },
            None => false,
        }
    }

    /// 已写出的字节序列（按写入顺序）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared
            .state
            .lock()
            .written
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// 已写出的字节序列及写入时刻
    pub fn written_with_time(&self) -> Vec<(Instant, Vec<u8>)> {
        self.shared.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.shared.state.lock().written.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().sink.is_some()
    }

    pub fn connect_count(&self) -> usize {
        self.shared.state.lock().connect_count
    }

    /// 最近一次 `connect` 使用的参数
    pub fn last_settings(&self) -> Option<SerialSettings> {
        self.shared.state.lock().settings.clone()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.shared.state.lock().fail_connect = fail;
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.shared.state.lock().fail_write = fail;
    }

    /// 模拟设备拔出（不经过 `disconnect`）
    pub fn unplug(&self) {
        let _gate = self.shared.delivery.lock();
        self.shared.state.lock().sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_sink() -> (Arc<dyn ByteSink>, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let buf_clone = buf.clone();
        let sink: Arc<dyn ByteSink> =
            Arc::new(move |bytes: &[u8]| buf_clone.lock().extend_from_slice(bytes));
        (sink, buf)
    }

    #[test]
    fn test_inject_delivers_only_while_connected() {
        let (mut transport, handle) = MockTransport::with_handle();
        let (sink, received) = collecting_sink();

        assert!(!handle.inject(&[0x01]));

        transport
            .connect(&SerialSettings::new("mock", 115_200), sink)
            .unwrap();
        assert!(handle.inject(&[0x02, 0x03]));

        transport.disconnect();
        assert!(!handle.inject(&[0x04]));

        assert_eq!(*received.lock(), vec![0x02, 0x03]);
    }

    #[test]
    fn test_write_records_bytes() {
        let (mut transport, handle) = MockTransport::with_handle();
        let (sink, _) = collecting_sink();

        assert!(matches!(
            transport.write(&[0xAA]),
            Err(SerialError::NotConnected)
        ));

        transport
            .connect(&SerialSettings::new("mock", 9_600), sink)
            .unwrap();
        transport.write(&[0xAA, 0xBB]).unwrap();
        transport.write(&[0xCC]).unwrap();

        assert_eq!(handle.written(), vec![vec![0xAA, 0xBB], vec![0xCC]]);
        assert_eq!(handle.last_settings().unwrap().baud_rate, 9_600);
    }

    #[test]
    fn test_failure_toggles() {
        let (mut transport, handle) = MockTransport::with_handle();
        let (sink, _) = collecting_sink();

        handle.set_fail_connect(true);
        let err = transport
            .connect(&SerialSettings::new("mock", 115_200), sink.clone())
            .unwrap_err();
        assert!(matches!(err, SerialError::Device(_)));
        assert!(!transport.is_connected());

        handle.set_fail_connect(false);
        transport
            .connect(&SerialSettings::new("mock", 115_200), sink)
            .unwrap();
        handle.set_fail_write(true);
        assert!(matches!(transport.write(&[0x01]), Err(SerialError::Io(_))));
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_unplug_drops_connection() {
        let (mut transport, handle) = MockTransport::with_handle();
        let (sink, _) = collecting_sink();
        transport
            .connect(&SerialSettings::new("mock", 115_200), sink)
            .unwrap();

        handle.unplug();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.write(&[0x01]),
            Err(SerialError::NotConnected)
        ));
    }
}
