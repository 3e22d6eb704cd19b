//! 基于 `serialport` crate 的原生串口后端
//!
//! 连接后由专用读线程阻塞读取（带超时），把读到的块直接交给 [`ByteSink`]。
//! 写入在调用者线程上完成。

use crate::{
    ByteSink, PortInfo, SerialDeviceError, SerialDeviceErrorKind, SerialError, SerialSettings,
    SerialTransport,
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{error, info, trace, warn};

/// 单次读取的缓冲区大小
const READ_CHUNK: usize = 256;

struct Connection {
    writer: Box<dyn SerialPort>,
    is_running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    port: String,
}

/// 原生串口传输
#[derive(Default)]
pub struct SerialPortTransport {
    connection: Option<Connection>,
}

impl SerialPortTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        let kind = match err.kind() {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NotFound,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::UnsupportedConfig,
            serialport::ErrorKind::Io(io::ErrorKind::NotFound) => SerialDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                SerialDeviceErrorKind::AccessDenied
            },
            serialport::ErrorKind::Io(_) => SerialDeviceErrorKind::Backend,
            serialport::ErrorKind::Unknown => SerialDeviceErrorKind::Unknown,
        };
        SerialError::Device(SerialDeviceError::new(kind, err.description))
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, sink: Arc<dyn ByteSink>, is_running: Arc<AtomicBool>) {
    let mut buf = [0u8; READ_CHUNK];
    while is_running.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {},
            Ok(n) => {
                trace!("serial rx {} bytes", n);
                sink.on_bytes(&buf[..n]);
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {},
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => {
                error!("Serial read failed: {}, reader thread exiting", e);
                is_running.store(false, Ordering::Release);
                break;
            },
        }
    }
    trace!("serial reader thread exited");
}

impl SerialTransport for SerialPortTransport {
    fn connect(
        &mut self,
        settings: &SerialSettings,
        sink: Arc<dyn ByteSink>,
    ) -> Result<(), SerialError> {
        self.disconnect();

        let mut writer = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()?;

        // 示教器需要 DTR/RTS 有效才会上报
        writer.write_data_terminal_ready(true)?;
        writer.write_request_to_send(true)?;

        let reader_port = writer.try_clone()?;
        let is_running = Arc::new(AtomicBool::new(true));
        let running_clone = is_running.clone();

        let reader = std::thread::Builder::new()
            .name(format!("dtp7h-rx-{}", settings.port))
            .spawn(move || read_loop(reader_port, sink, running_clone))?;

        info!("Serial port opened: {}", settings);
        self.connection = Some(Connection {
            writer,
            is_running,
            reader: Some(reader),
            port: settings.port.clone(),
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };

        conn.is_running.store(false, Ordering::Release);
        if let Some(handle) = conn.reader.take()
            && handle.join().is_err()
        {
            error!("Serial reader thread panicked");
        }
        info!("Serial port closed: {}", conn.port);
    }

    fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.is_running.load(Ordering::Acquire))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let conn = self.connection.as_mut().ok_or(SerialError::NotConnected)?;
        if !conn.is_running.load(Ordering::Acquire) {
            return Err(SerialError::NotConnected);
        }

        match conn.writer.write_all(bytes).and_then(|_| conn.writer.flush()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!("Serial write timed out on {}", conn.port);
                Err(SerialError::Timeout)
            },
            Err(e) => Err(SerialError::Io(e)),
        }
    }
}

impl Drop for SerialPortTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// 枚举系统上的串口
pub fn available_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let (kind, description) = match p.port_type {
                SerialPortType::UsbPort(info) => {
                    let desc = match (info.manufacturer, info.product) {
                        (Some(vendor), Some(product)) => format!("{vendor} {product}"),
                        (Some(s), None) | (None, Some(s)) => s,
                        (None, None) => String::new(),
                    };
                    let desc = format!("{:04x}:{:04x} {}", info.vid, info.pid, desc);
                    ("usb", Some(desc.trim_end().to_string()))
                },
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: p.port_name,
                kind: kind.to_string(),
                description,
            }
        })
        .collect())
}
