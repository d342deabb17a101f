//! Device actor tests against the mock bridge.

use std::sync::Arc;
use std::time::Duration;

use rlink_bridge_protocol::{
    BridgeCommand, BridgeError, FirmwareState, Led, LedMode, Register, ResponseCode,
    CMD_GET_PACKET, CMD_GET_STATE, CMD_LED, CMD_RESET, CMD_UPDATE_REGISTER,
};
use rlink_session::mock::{MockReply, MockTransport};
use rlink_session::{BridgeDevice, ConnectionState, SessionConfig, SessionError};

fn device(firmware: &str) -> (BridgeDevice<MockTransport>, Arc<MockTransport>) {
    let mock = Arc::new(MockTransport::new(firmware));
    let device = BridgeDevice::new("bridge-1", Arc::clone(&mock), SessionConfig::default());
    (device, mock)
}

async fn wait_until_listening(mock: &MockTransport) {
    for _ in 0..1000 {
        if mock.is_listening() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("Expected the bridge to be listening");
}

async fn wait_for_commands(mock: &MockTransport, count: usize) {
    for _ in 0..1000 {
        if mock.commands().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("Expected {} commands, got {:?}", count, mock.command_codes());
}

// ============================================================================
// Connection and Firmware
// ============================================================================

#[tokio::test]
async fn test_current_firmware_is_up_to_date() {
    let (device, _mock) = device("subg_rfspy 2.2");
    let state = device.on_connected().await.expect("should read version");
    assert_eq!(state, FirmwareState::UpToDate);

    let status = device.status();
    assert_eq!(status.firmware_version.as_deref(), Some("subg_rfspy 2.2"));
    assert_eq!(status.firmware_state, FirmwareState::UpToDate);
    assert_eq!(status.connection_state, ConnectionState::Connected);
}

#[tokio::test]
async fn test_legacy_firmware_is_out_of_date_but_usable() {
    let (device, mock) = device("subg_rfspy 1.0");
    let state = device.on_connected().await.expect("should read version");
    assert_eq!(state, FirmwareState::OutOfDate);

    device
        .run_session("registers", |mut session| async move {
            session.update_register(Register::Test0, 0x09).await
        })
        .await
        .expect("legacy register write should succeed");
    assert_eq!(mock.command_codes().last(), Some(&CMD_UPDATE_REGISTER));
}

#[tokio::test]
async fn test_unknown_firmware_is_invalid() {
    let (device, _mock) = device("ble_rfspy 9.9");
    let state = device.on_connected().await.expect("should read version");
    assert_eq!(state, FirmwareState::Invalid);
    assert_eq!(device.firmware_state(), FirmwareState::Invalid);
    assert!(device.firmware().is_none());
}

#[tokio::test]
async fn test_disconnected_bridge_rejects_commands() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_connection_state(ConnectionState::Disconnected);

    let result = device
        .run_session("state", |mut session| async move { session.get_state().await })
        .await;
    assert_eq!(result, Err(SessionError::Disconnected));
    assert!(mock.commands().is_empty());
}

#[tokio::test]
async fn test_custom_name_passes_through() {
    let (device, _mock) = device("subg_rfspy 2.2");
    assert_eq!(device.custom_name(), None);
    device.set_custom_name("kitchen").await.expect("should set name");
    assert_eq!(device.custom_name().as_deref(), Some("kitchen"));
    assert_eq!(device.status().custom_name.as_deref(), Some("kitchen"));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_sessions_never_interleave() {
    let (device, mock) = device("subg_rfspy 2.2");

    let run = |id: u8| {
        let device = device.clone();
        async move {
            device
                .run_session("burst", |mut session| async move {
                    for _ in 0..3 {
                        session.update_register(Register::Test0, id).await?;
                        tokio::task::yield_now().await;
                    }
                    Ok::<_, SessionError>(())
                })
                .await
        }
    };
    let (a, b, c, d) = tokio::join!(run(1), run(2), run(3), run(4));
    for result in [a, b, c, d] {
        result.expect("session should succeed");
    }

    let values: Vec<u8> = mock.commands().iter().map(|c| c.bytes()[2]).collect();
    assert_eq!(values.len(), 12);
    for chunk in values.chunks(3) {
        assert!(
            chunk.iter().all(|&v| v == chunk[0]),
            "sessions interleaved: {:?}",
            values
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_listen() {
    let (device, mock) = device("subg_rfspy 2.2");

    let canceller = device.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel_command();
    });

    let result = device
        .run_session("listen", |mut session| async move {
            session.get_packet(0, 10_000).await
        })
        .await;
    assert_eq!(result, Err(SessionError::Bridge(BridgeError::CmdInterrupted)));

    // The interrupted listen's reply is drained before the next one is read.
    device
        .run_session("state", |mut session| async move { session.get_state().await })
        .await
        .expect("next command should succeed");
    assert_eq!(mock.command_codes(), vec![CMD_GET_PACKET, CMD_GET_STATE]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_bridge_times_out() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_handler(|command| match command.code() {
        CMD_GET_STATE => MockReply::Silent,
        _ => MockReply::Default,
    });

    let result = device
        .run_session("state", |mut session| async move {
            session
                .do_command(&BridgeCommand::GetState, Duration::from_millis(200))
                .await
        })
        .await;
    match result {
        Err(SessionError::ResponseTimeout {
            command,
            timeout_ms,
        }) => {
            assert_eq!(command, "GetState");
            assert_eq!(timeout_ms, 200);
        }
        other => panic!("Expected ResponseTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failure_codes() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_handler(|command| match command.bytes().get(1) {
        Some(1) => MockReply::code(ResponseCode::RxTimeout),
        Some(2) => MockReply::code(ResponseCode::ZeroData),
        Some(3) => MockReply::Bytes(Vec::new()),
        _ => MockReply::Default,
    });

    let listen = |channel: u8| {
        let device = device.clone();
        async move {
            device
                .run_session("listen", |mut session| async move {
                    session.get_packet(channel, 100).await
                })
                .await
        }
    };
    assert_eq!(
        listen(1).await,
        Err(SessionError::Bridge(BridgeError::RxTimeout))
    );
    assert_eq!(
        listen(2).await,
        Err(SessionError::Bridge(BridgeError::ZeroData))
    );
    assert_eq!(
        listen(3).await,
        Err(SessionError::Bridge(BridgeError::ZeroData))
    );
}

#[tokio::test]
async fn test_received_packet() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_handler(|command| match command.code() {
        CMD_GET_PACKET => MockReply::packet(-60, &[0xa9, 0x6c, 0x72]),
        _ => MockReply::Default,
    });

    let packet = device
        .run_session("listen", |mut session| async move {
            session.get_packet(0, 100).await
        })
        .await
        .expect("should receive");
    assert_eq!(packet.rssi, -60);
    assert_eq!(packet.data, vec![0xa9, 0x6c, 0x72]);
}

#[tokio::test]
async fn test_set_base_frequency() {
    let (device, mock) = device("subg_rfspy 2.2");
    device
        .run_session("tune", |mut session| async move {
            session.set_base_frequency(916.55).await
        })
        .await
        .expect("should tune");

    let writes: Vec<Vec<u8>> = mock.commands().iter().map(|c| c.bytes().to_vec()).collect();
    assert_eq!(
        writes,
        vec![
            vec![CMD_UPDATE_REGISTER, 0x0b, 0x88, 0],
            vec![CMD_UPDATE_REGISTER, 0x0a, 0x30, 0],
            vec![CMD_UPDATE_REGISTER, 0x09, 0x26, 0],
        ]
    );
}

#[tokio::test]
async fn test_read_register_needs_current_firmware() {
    let (device, _mock) = device("subg_rfspy 1.0");
    device.on_connected().await.expect("should connect");
    let result = device
        .run_session("read", |mut session| async move {
            session.read_register(Register::Freq0).await
        })
        .await;
    assert_eq!(result, Err(SessionError::Unsupported("ReadRegister")));

    let (device, _mock) = self::device("subg_rfspy 2.2");
    device.on_connected().await.expect("should connect");
    let value = device
        .run_session("read", |mut session| async move {
            session.read_register(Register::Freq0).await
        })
        .await
        .expect("should read");
    assert_eq!(value, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_listen_waits_for_cancel() {
    let (device, _mock) = device("subg_rfspy 2.2");

    let canceller = device.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        canceller.cancel_command();
    });

    let started = tokio::time::Instant::now();
    let result = device
        .run_session("listen", |mut session| async move {
            session.get_packet(0, 0).await
        })
        .await;
    assert_eq!(result, Err(SessionError::Bridge(BridgeError::CmdInterrupted)));
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_to_abandoned_command_is_drained() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_handler(|command| match command.code() {
        CMD_GET_STATE => MockReply::Silent,
        _ => MockReply::Default,
    });

    let result = device
        .run_session("state", |mut session| async move {
            session
                .do_command(&BridgeCommand::GetState, Duration::from_millis(200))
                .await
        })
        .await;
    assert!(matches!(result, Err(SessionError::ResponseTimeout { .. })));

    // The bridge answers after the host stopped waiting.
    mock.push_reply(&[ResponseCode::RxTimeout.to_byte()]);

    device
        .run_session("registers", |mut session| async move {
            session.update_register(Register::Test0, 0x09).await
        })
        .await
        .expect("the late reply belongs to GetState");
}

#[tokio::test]
async fn test_led_and_reset() {
    let (device, mock) = device("subg_rfspy 2.2");
    device
        .run_session("led", |mut session| async move {
            session.set_led(Led::Blue, LedMode::On).await?;
            session.reset().await
        })
        .await
        .expect("should run");

    let sent: Vec<Vec<u8>> = mock.commands().iter().map(|c| c.bytes().to_vec()).collect();
    assert_eq!(sent, vec![vec![CMD_LED, 1, 1], vec![CMD_RESET]]);
}

// ============================================================================
// Idle Listening
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_listening_publishes_packets() {
    let (device, mock) = device("subg_rfspy 2.2");
    let mut packets = device.subscribe_packets();
    device.enable_idle_listening(0).await.expect("should enable");
    assert!(mock.idle_signal());

    wait_until_listening(&mock).await;
    assert!(mock.inject_packet(-48, &[0xa8, 0x01, 0x02]));

    let frame = packets.recv().await.expect("should publish");
    assert_eq!(frame.data, vec![0xa8, 0x01, 0x02]);
    assert_eq!(frame.rssi, -48);
    assert_eq!(frame.sequence, 0);

    // Listening resumes after a capture.
    wait_until_listening(&mock).await;
    assert!(device.status().last_idle.is_some());
    assert_eq!(device.status().idle_listen_channel, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_session_preempts_idle_listen() {
    let (device, mock) = device("subg_rfspy 2.2");
    device.enable_idle_listening(0).await.expect("should enable");
    wait_until_listening(&mock).await;

    let started = tokio::time::Instant::now();
    device
        .run_session("state", |mut session| async move { session.get_state().await })
        .await
        .expect("session should not wait out the idle listen");
    assert!(started.elapsed() < Duration::from_secs(1));

    wait_until_listening(&mock).await;
    assert_eq!(
        mock.command_codes(),
        vec![CMD_GET_PACKET, CMD_GET_STATE, CMD_GET_PACKET]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disable_idle_listening() {
    let (device, mock) = device("subg_rfspy 2.2");
    device.enable_idle_listening(0).await.expect("should enable");
    wait_until_listening(&mock).await;

    device.disable_idle_listening().await.expect("should disable");
    assert!(!mock.idle_signal());

    device
        .run_session("state", |mut session| async move { session.get_state().await })
        .await
        .expect("should run");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.command_codes(), vec![CMD_GET_PACKET, CMD_GET_STATE]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_channel_from_config() {
    let mock = Arc::new(MockTransport::new("subg_rfspy 2.2"));
    let config = SessionConfig {
        idle_channel: Some(2),
        ..SessionConfig::default()
    };
    let device = BridgeDevice::new("bridge-1", Arc::clone(&mock), config);
    device.on_connected().await.expect("should connect");

    wait_until_listening(&mock).await;
    let listen = mock.commands().pop().expect("should have listened");
    assert_eq!(listen.bytes()[..2], [CMD_GET_PACKET, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_listening_resumes_after_cancelled_session() {
    let (device, mock) = device("subg_rfspy 2.2");
    device.enable_idle_listening(0).await.expect("should enable");
    wait_until_listening(&mock).await;

    let canceller = device.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel_command();
    });
    let result = device
        .run_session("listen", |mut session| async move {
            session.get_packet(1, 10_000).await
        })
        .await;
    assert_eq!(result, Err(SessionError::Bridge(BridgeError::CmdInterrupted)));

    wait_for_commands(&mock, 3).await;
    wait_until_listening(&mock).await;
    let channels: Vec<u8> = mock
        .commands()
        .iter()
        .filter(|c| c.code() == CMD_GET_PACKET)
        .map(|c| c.bytes()[1])
        .collect();
    assert_eq!(channels, vec![0, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_forced_restart_resends_listen() {
    let (device, mock) = device("subg_rfspy 2.2");
    device.enable_idle_listening(0).await.expect("should enable");
    wait_until_listening(&mock).await;

    // A healthy listener is left alone.
    device.assert_idle_listening(false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.command_codes(), vec![CMD_GET_PACKET]);

    // The bridge may have dropped the listen without saying so.
    device.assert_idle_listening(true);
    wait_for_commands(&mock, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.command_codes(), vec![CMD_GET_PACKET, CMD_GET_PACKET]);
    assert!(mock.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_packet_caught_while_preempted_is_not_a_reply() {
    let (device, mock) = device("subg_rfspy 2.2");
    mock.set_handler(|command| match (command.code(), command.bytes().get(1)) {
        (CMD_GET_PACKET, Some(1)) => MockReply::packet(-60, &[0x01, 0x02, 0x03]),
        _ => MockReply::Default,
    });
    let mut packets = device.subscribe_packets();
    device.enable_idle_listening(0).await.expect("should enable");
    wait_until_listening(&mock).await;
    mock.capture_on_interrupt(-52, &[0xa7, 0x12, 0x34]);

    let packet = device
        .run_session("registers", |mut session| async move {
            session.update_register(Register::Test0, 0x09).await?;
            session.get_packet(1, 100).await
        })
        .await
        .expect("replies should stay matched to their commands");
    assert_eq!(packet.data, vec![0x01, 0x02, 0x03]);

    let frame = packets.recv().await.expect("should publish the caught packet");
    assert_eq!(frame.data, vec![0xa7, 0x12, 0x34]);
    assert_eq!(frame.rssi, -52);
}
