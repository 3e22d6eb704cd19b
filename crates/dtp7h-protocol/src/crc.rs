//! CRC-16/MODBUS 校验
//!
//! 参数：多项式 0xA001（0x8005 反射），初值 0xFFFF，LSB 先处理，无输出异或。

/// CRC-16/MODBUS 初值
pub const CRC16_MODBUS_INIT: u16 = 0xFFFF;

/// CRC-16/MODBUS 反射多项式
pub const CRC16_MODBUS_POLY: u16 = 0xA001;

/// 计算 CRC-16/MODBUS（逐位算法）
///
/// 帧只有 5 字节参与计算，逐位算法足够快，不需要查表。
///
/// # Example
///
/// ```
/// use dtp7h_protocol::crc16_modbus;
///
/// assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
/// ```
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = CRC16_MODBUS_INIT;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_MODBUS_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_modbus_check_value() {
        // CRC catalogue 标准校验值
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_crc16_modbus_reference_frame() {
        // Modbus RTU 读保持寄存器请求：01 03 00 00 00 0A，线上 CRC 为 C5 CD（低位在前）
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xCDC5);
    }

    #[test]
    fn test_crc16_modbus_empty_is_init() {
        assert_eq!(crc16_modbus(&[]), CRC16_MODBUS_INIT);
    }

    #[test]
    fn test_crc16_modbus_pendant_payloads() {
        // SetLed(Left1, Blue)
        assert_eq!(crc16_modbus(&[0x11, 0x3A, 0x41, 0x31, 0x20]), 0x8790);
        // SetBuzzer(on) / SetBuzzer(off)
        assert_eq!(crc16_modbus(&[0x11, 0x3B, 0x31, 0x20, 0x20]), 0xF09C);
        assert_eq!(crc16_modbus(&[0x11, 0x3B, 0x30, 0x20, 0x20]), 0x30CD);
    }
}
