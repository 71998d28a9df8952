//! End-to-end tests of the driver against the scripted mock transport.
//!
//! Each test plays the module's side of the conversation byte for byte,
//! including unsolicited `+RCV` / `+ERR` lines at awkward moments.

use rylr998::mock::{MockHandle, MockTransport};
use rylr998::{DriverConfig, DriverError, RadioDriver, RfParameters, Transport, WorkMode};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short timeouts keep failing exchanges fast.
fn test_config() -> DriverConfig {
    DriverConfig::from_yaml_str(
        "command_timeout_ms: 50\nreceive_timeout_ms: 50\nreset_pulse_ms: 1\nreset_settle_ms: 1\n",
    )
    .expect("test config should parse")
}

fn radio() -> (RadioDriver<MockTransport>, MockHandle) {
    init_tracing();
    let (transport, handle) = MockTransport::new();
    (RadioDriver::new(transport, test_config()), handle)
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_configure_and_exchange() {
    let (radio, handle) = radio();
    handle.expect(b"AT\r\n", b"+OK\r\n");
    handle.expect(b"AT+ADDRESS=120\r\n", b"+OK\r\n");
    handle.expect(b"AT+NETWORKID=18\r\n", b"+OK\r\n");
    handle.expect(b"AT+BAND=915000000\r\n", b"+OK\r\n");
    handle.expect(b"AT+PARAMETER=9,7,2,8\r\n", b"+OK\r\n");
    handle.expect(b"AT+PARAMETER?\r\n", b"+PARAMETER=9,7,2,8\r\n");
    handle.expect(b"AT+SEND=121,7,HELLO 1\r\n", b"+OK\r\n");

    radio.at_available().expect("module should answer");
    radio.set_address(120).expect("set address");
    radio.set_network_id(18).expect("set network id");
    radio.set_band(915_000_000).expect("set band");

    let params = RfParameters::new(9, 7, 2, 8).expect("valid parameters");
    radio.set_rf_parameters(params).expect("set parameters");
    assert_eq!(radio.get_rf_parameters().expect("get parameters"), params);

    radio.send(121, b"HELLO 1").expect("send");
    assert_eq!(handle.remaining_expectations(), 0);

    let cache = radio.cached_config();
    assert_eq!(cache.address, 120);
    assert_eq!(cache.network_id, 18);
    assert_eq!(cache.band, 915_000_000);
    assert_eq!(cache.rf_parameters, Some(params));

    handle.inject(b"+RCV=121,5,HELLO,-40,9\r\n");
    assert_eq!(radio.get_size().expect("get size"), 5);

    let mut buf = [0u8; 31];
    let received = radio.recv(&mut buf).expect("recv").expect("a packet");
    assert_eq!(received.address, 121);
    assert_eq!(&buf[..received.len], b"HELLO");
    assert_eq!(radio.last_rssi(), -40);
    assert_eq!(radio.last_snr(), 9);
}

#[test]
fn test_rejected_values_send_nothing() {
    let (radio, handle) = radio();

    assert!(radio.set_network_id(0).unwrap_err().is_validation());
    for power in [23u8, 255] {
        assert!(radio.set_rf_output_power(power).unwrap_err().is_validation());
    }
    assert!(RfParameters::new(6, 7, 1, 12).is_err());
    assert!(radio
        .set_rf_parameters(RfParameters {
            spreading_factor: 9,
            bandwidth: 10,
            coding_rate: 1,
            preamble: 12,
        })
        .unwrap_err()
        .is_validation());
    assert!(radio.send(0, &[0u8; 241]).unwrap_err().is_validation());

    assert!(handle.written().is_empty());
}

#[test]
fn test_rejected_values_keep_committed_cache() {
    let (radio, handle) = radio();
    handle.expect(b"AT+ADDRESS=120\r\n", b"+OK\r\n");
    handle.expect(b"AT+NETWORKID=18\r\n", b"+OK\r\n");
    handle.expect(b"AT+CRFOP=14\r\n", b"+OK\r\n");
    handle.expect(b"AT+PARAMETER=9,7,2,8\r\n", b"+OK\r\n");
    handle.expect(b"AT+IPR=9600\r\n", b"+IPR=9600\r\n");

    radio.set_address(120).expect("set address");
    radio.set_network_id(18).expect("set network id");
    radio.set_rf_output_power(14).expect("set power");
    radio
        .set_rf_parameters(RfParameters::new(9, 7, 2, 8).expect("valid"))
        .expect("set parameters");
    radio.set_baud_rate(9600).expect("set baud rate");

    let committed = radio.cached_config();
    let writes = handle.written().len();

    assert!(radio.set_network_id(0).unwrap_err().is_validation());
    assert!(radio.set_rf_output_power(23).unwrap_err().is_validation());
    assert!(radio.set_baud_rate(12345).unwrap_err().is_validation());
    assert!(radio
        .set_rf_parameters(RfParameters {
            spreading_factor: 12,
            bandwidth: 7,
            coding_rate: 2,
            preamble: 8,
        })
        .unwrap_err()
        .is_validation());
    assert!(radio.send(120, &[b'x'; 241]).unwrap_err().is_validation());

    assert_eq!(radio.cached_config(), committed);
    assert_eq!(handle.written().len(), writes);
}

#[test]
fn test_boundary_values_accepted() {
    let (radio, handle) = radio();
    handle.expect(b"AT+NETWORKID=255\r\n", b"+OK\r\n");
    handle.expect(b"AT+CRFOP=0\r\n", b"+OK\r\n");
    handle.expect(b"AT+PARAMETER=11,9,4,24\r\n", b"+OK\r\n");

    radio.set_network_id(255).expect("max network id");
    radio.set_rf_output_power(0).expect("min power");
    radio
        .set_rf_parameters(RfParameters::new(11, 9, 4, 24).expect("valid"))
        .expect("max parameters");

    let max = [b'z'; 240];
    handle.expect(&[b"AT+SEND=0,240,".as_slice(), max.as_slice(), b"\r\n".as_slice()].concat(), b"+OK\r\n");
    radio.send(0, &max).expect("full-size payload");
}

#[test]
fn test_mode_and_rx_boost() {
    let (radio, handle) = radio();
    handle.expect(b"AT+MODE=1\r\n", b"+OK\r\n");
    handle.expect(b"AT+RXBOOST=1\r\n", b"+OK\r\n");
    handle.expect(b"AT+RXBOOST?\r\n", b"+RXBOOST=1\r\n");

    radio.set_mode(WorkMode::Sleep).expect("set mode");
    radio.set_rx_boost(true).expect("set rx boost");
    assert!(radio.get_rx_boost().expect("get rx boost"));
    assert_eq!(radio.cached_config().mode, Some(WorkMode::Sleep));
}

#[test]
fn test_stale_cache_survives_failures() {
    let (radio, handle) = radio();
    handle.expect(b"AT+CRFOP?\r\n", b"+CRFOP=14\r\n");
    assert_eq!(radio.get_rf_output_power().expect("get power"), 14);

    // Unanswered set and unanswered get both leave the cache alone.
    assert!(radio.set_rf_output_power(20).unwrap_err().is_timeout());
    assert!(radio.get_rf_output_power().unwrap_err().is_timeout());
    assert_eq!(radio.cached_config().rf_output_power, 14);
}

#[test]
fn test_timeout_override() {
    let (radio, _handle) = radio();
    radio.set_timeout(std::time::Duration::from_millis(5));

    let started = std::time::Instant::now();
    assert!(radio.get_address().unwrap_err().is_timeout());
    assert!(started.elapsed() < std::time::Duration::from_millis(50));
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn test_packet_between_command_and_reply() {
    let (radio, handle) = radio();
    handle.expect(
        b"AT+ADDRESS?\r\n",
        b"+RCV=7,4,ping,-55,11\r\n+ADDRESS=120\r\n",
    );

    assert_eq!(radio.get_address().expect("get address"), 120);
    assert_eq!(radio.pending(), 1);

    let packet = radio.recv_packet().expect("recv").expect("queued packet");
    assert_eq!(packet.address, 7);
    assert_eq!(packet.payload.as_bytes(), b"ping");
}

#[test]
fn test_payload_with_delimiters_and_commas() {
    let (radio, handle) = radio();
    handle.set_chunk_size(3);
    handle.inject(b"+RCV=9,8,a,b\r\n+OK,-30,5\r\n");

    let packet = radio.recv_packet().expect("recv").expect("packet");
    assert_eq!(packet.payload.as_bytes(), b"a,b\r\n+OK");
    assert_eq!((packet.rssi, packet.snr), (-30, 5));
}

#[test]
fn test_error_notification_does_not_fail_command() {
    let (radio, handle) = radio();
    handle.expect(b"AT+ADDRESS=5\r\n", b"+ERR=2\r\n+OK\r\n");

    radio.set_address(5).expect("command still acknowledged");
    assert_eq!(radio.last_error(), Some(2));
}

#[test]
fn test_truncated_notification_recovers() {
    let (radio, handle) = radio();
    handle.inject(b"+RCV=1,30,short");

    assert_eq!(radio.get_size().expect("get size"), 0);

    handle.inject(b"+RCV=121,5,HELLO,-40,9\r\n");
    assert_eq!(radio.get_size().expect("get size"), 5);
}

#[test]
fn test_packets_in_arrival_order() {
    let (radio, handle) = radio();
    for i in 1..=20u16 {
        handle.inject(format!("+RCV={},4,m{:03},-40,9\r\n", i, i).as_bytes());
    }

    let mut buf = [0u8; 8];
    for i in 1..=20u16 {
        let received = radio.recv(&mut buf).expect("recv").expect("packet");
        assert_eq!(received.address, i);
        assert_eq!(&buf[..received.len], format!("m{:03}", i).as_bytes());
    }
    assert!(radio.recv(&mut buf).expect("recv").is_none());
}

// ============================================================================
// Liveness and Reset
// ============================================================================

#[test]
fn test_liveness_after_silence() {
    let (radio, handle) = radio();
    handle.expect(b"AT\r\n", b"");
    handle.expect(b"AT\r\n", b"+OK\r\n");

    radio.at_available().expect("second probe answered");
}

#[test]
fn test_liveness_transport_fault() {
    let (radio, handle) = radio();
    handle.set_failed(true);

    assert!(matches!(radio.at_available(), Err(DriverError::Transport(_))));
}

#[test]
fn test_boot_banner_flushed() {
    init_tracing();
    struct NoopLine;
    impl rylr998::ResetLine for NoopLine {
        fn set_high(&mut self) {}
        fn set_low(&mut self) {}
    }

    let (transport, handle) = MockTransport::new();
    handle.inject(b"+READY\r\n");
    handle.expect(b"AT\r\n", b"+OK\r\n");

    let radio = RadioDriver::with_reset_line(transport, Box::new(NoopLine), test_config())
        .expect("construct");
    radio.at_available().expect("module answers after reset");
}

#[test]
fn test_boxed_transport() {
    init_tracing();
    let (transport, handle) = MockTransport::new();
    let boxed: Box<dyn Transport> = Box::new(transport);
    handle.expect(b"AT+UID?\r\n", b"+UID=000500010B1A2C3D4E5F6071\r\n");

    let radio = RadioDriver::new(boxed, test_config());
    assert_eq!(radio.get_uid().expect("uid").len(), 24);
}
