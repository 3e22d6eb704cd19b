//! 端到端测试（Mock 串口）
//!
//! 字节注入 → 帧解码 → 按键事件 → 点动位置；指令 → TX 线程 → 串口字节。

use dtp7h_sdk::client::{Axis, JogEvent, JogState};
use dtp7h_sdk::driver::{FrameTapHook, FrameDirection};
use dtp7h_sdk::protocol::{KeyTransition, LedAddress, LedColor, LogicalKey, encode};
use dtp7h_sdk::serial::{MockHandle, MockTransport};
use dtp7h_sdk::{DriverError, PendantContext, SdkConfig};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn key_frame(scan: u8, down: bool) -> [u8; 9] {
    encode(0x10, 0x3D, if down { 0x31 } else { 0x30 }, scan, 0x20)
}

fn connected(step: f64) -> (PendantContext, MockHandle) {
    let (transport, handle) = MockTransport::with_handle();
    let mut config = SdkConfig::default();
    config.serial.port = Some("mock0".to_string());
    config.jog.tick_period_ms = 5;
    config.jog.step = step;
    (PendantContext::new(transport, config).unwrap(), handle)
}

fn wait_written(handle: &MockHandle, count: usize) -> Vec<Vec<u8>> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let written = handle.written();
        if written.len() >= count || Instant::now() > deadline {
            return written;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_key_press_drives_jog_position() {
    let (context, handle) = connected(0.5);
    let mut session = context.jog_session().unwrap();
    let observer = session.observer();

    // 按下 A（负向），帧被拆成两段送达
    let frame = key_frame(0x1E, true);
    assert!(handle.inject(&frame[..4]));
    assert!(handle.inject(&frame[4..]));

    assert!(matches!(
        session.poll(Duration::from_secs(1)).unwrap(),
        Some(JogEvent::StateChanged(JogState::Jogging { axis: Axis::A, .. }))
    ));

    let mut ticks = 0;
    while ticks < 3 {
        if let Some(JogEvent::Position(changed)) = session.poll(Duration::from_secs(1)).unwrap() {
            assert_eq!(changed.axis, Axis::A);
            ticks += 1;
        }
    }

    handle.inject(&key_frame(0x1E, false));
    assert_eq!(
        session.poll(Duration::from_secs(1)).unwrap(),
        Some(JogEvent::StateChanged(JogState::Idle))
    );

    assert_eq!(observer.positions()[Axis::A], -1.5);
    assert_eq!(observer.state(), JogState::Idle);
    assert_eq!(context.pendant().metrics().key_events, 2);
}

fn connected_with_queue(capacity: usize) -> (PendantContext, MockHandle) {
    let (transport, handle) = MockTransport::with_handle();
    let mut config = SdkConfig::default();
    config.serial.port = Some("mock0".to_string());
    config.driver.key_queue_capacity = capacity;
    config.jog.tick_period_ms = 5;
    (PendantContext::new(transport, config).unwrap(), handle)
}

/// 处理完所有事件后，确认不再产生运动
fn assert_settles_idle(session: &mut dtp7h_sdk::JogSession) {
    let mut last = None;
    for _ in 0..20 {
        if let Some(event) = session.poll(Duration::from_millis(10)).unwrap() {
            last = Some(event);
        }
    }
    assert_eq!(session.state(), JogState::Idle);
    assert!(!matches!(last, Some(JogEvent::Position(_))));

    let observer = session.observer();
    let before = observer.snapshot();
    for _ in 0..5 {
        assert_eq!(session.poll(Duration::from_millis(10)).unwrap(), None);
    }
    assert_eq!(observer.snapshot(), before);
}

#[test]
fn test_dropped_release_does_not_leave_axis_jogging() {
    let (context, handle) = connected_with_queue(1);
    let mut session = context.jog_session().unwrap();

    // 会话取事件之前按下并松开：松开因队列满被丢弃
    handle.inject(&key_frame(0x1E, true));
    handle.inject(&key_frame(0x1E, false));

    let metrics = context.pendant().metrics();
    assert_eq!(metrics.key_events_dropped, 1);
    assert_eq!(metrics.key_releases_dropped, 1);

    assert_settles_idle(&mut session);
}

#[test]
fn test_key_burst_over_capacity_settles_idle() {
    let (context, handle) = connected_with_queue(2);
    let mut session = context.jog_session().unwrap();

    let mut burst = Vec::new();
    for scan in [0x1E, 0x2E, 0x12, 0x22, 0x17] {
        burst.extend_from_slice(&key_frame(scan, true));
        burst.extend_from_slice(&key_frame(scan, false));
    }
    handle.inject(&burst);

    assert!(context.pendant().metrics().key_events_dropped > 0);
    assert_settles_idle(&mut session);
}

#[test]
fn test_noise_and_corrupt_frames_are_skipped() {
    let (context, handle) = connected(1.0);
    let keys = context.pendant().key_events();

    let mut corrupt = key_frame(0x30, true);
    corrupt[7] ^= 0xFF;

    let mut stream = vec![0x55, 0xAA];
    stream.extend_from_slice(&corrupt);
    stream.extend_from_slice(&key_frame(0x30, true));
    handle.inject(&stream);

    assert_eq!(
        keys.recv_timeout(Duration::from_secs(1)).unwrap(),
        KeyTransition::down(LogicalKey::B)
    );
    assert!(keys.try_recv().is_err());

    let metrics = context.pendant().metrics();
    assert_eq!(metrics.rx_frames_valid, 1);
    assert_eq!(metrics.rx_crc_errors, 1);
    assert!(metrics.has_errors());
}

#[test]
fn test_led_and_buzzer_bytes_on_the_wire() {
    let (context, handle) = connected(1.0);
    let pendant = context.pendant();

    pendant.set_led(LedAddress::Left1, LedColor::Blue).unwrap();
    pendant.set_buzzer(true).unwrap();
    pendant.set_buzzer(false).unwrap();

    let written = wait_written(&handle, 3);
    assert_eq!(
        written,
        vec![
            vec![0x02, 0x11, 0x3A, 0x41, 0x31, 0x20, 0x87, 0x90, 0x03],
            vec![0x02, 0x11, 0x3B, 0x31, 0x20, 0x20, 0xF0, 0x9C, 0x03],
            vec![0x02, 0x11, 0x3B, 0x30, 0x20, 0x20, 0x30, 0xCD, 0x03],
        ]
    );
}

#[test]
fn test_commands_are_spaced_by_settle_interval() {
    let (context, handle) = connected(1.0);
    context.pendant().set_all_leds(LedColor::Red).unwrap();

    wait_written(&handle, 6);
    let written = handle.written_with_time();
    assert_eq!(written.len(), 6);
    for pair in written.windows(2) {
        assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(10));
    }
}

#[test]
fn test_write_while_disconnected_is_reported() {
    let context = PendantContext::new(MockTransport::new(), SdkConfig::default()).unwrap();
    assert!(!context.is_ready());

    assert!(matches!(
        context.pendant().set_led(LedAddress::Right3, LedColor::Off),
        Err(DriverError::NotConnected)
    ));
    assert_eq!(context.pendant().metrics().tx_rejected_disconnected, 1);
}

#[test]
fn test_reconnect_discards_partial_frame() {
    let (context, handle) = connected(1.0);
    let pendant = context.pendant();
    let keys = pendant.key_events();

    // 断开前只收到半帧
    handle.inject(&key_frame(0x12, true)[..5]);
    pendant.disconnect();
    assert!(!handle.inject(&[0x00]));

    pendant.reconnect().unwrap();
    assert!(context.is_ready());
    assert_eq!(handle.connect_count(), 2);

    handle.inject(&key_frame(0x21, true));
    assert_eq!(
        keys.recv_timeout(Duration::from_secs(1)).unwrap(),
        KeyTransition::down(LogicalKey::F)
    );
    assert!(keys.try_recv().is_err());
    assert_eq!(pendant.metrics().rx_frames_valid, 1);
}

#[test]
fn test_frame_tap_sees_both_directions() {
    let (context, handle) = connected(1.0);
    let (tap, frames) = FrameTapHook::new(16);
    context.pendant().hooks().write().add_callback(Arc::new(tap));

    handle.inject(&key_frame(0x26, true));
    context.pendant().set_buzzer(true).unwrap();

    let rx = frames.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(rx.direction, FrameDirection::Rx);
    assert_eq!(rx.bytes(), key_frame(0x26, true));

    let tx = frames.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(tx.direction, FrameDirection::Tx);
    assert_eq!(tx.to_hex(), "02113b312020f09c03");
}

#[test]
fn test_session_ends_when_context_shuts_down() {
    let (context, handle) = connected(1.0);
    let mut session = context.jog_session().unwrap();
    handle.inject(&key_frame(0x2E, true));

    context.shutdown();

    // 队列中剩余的按键仍被处理，随后事件源关闭
    assert!(session.poll(Duration::from_secs(1)).unwrap().is_some());
    let mut result = session.poll(Duration::from_millis(10));
    while let Ok(Some(JogEvent::Position(_))) = result {
        result = session.poll(Duration::from_millis(10));
    }
    assert!(result.is_err());
    assert_eq!(session.state(), JogState::Idle);
}

#[test]
fn test_shutdown_flushes_queued_commands() {
    let (context, handle) = connected(1.0);
    context.pendant().set_all_leds(LedColor::Off).unwrap();
    context.pendant().set_buzzer(false).unwrap();

    context.shutdown();

    assert_eq!(handle.written().len(), 7);
    assert!(!handle.is_connected());
}
