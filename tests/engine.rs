mod common;

use common::{client_config, drive_handshake, init_logging, server_config, server_engine};
use veil::{Error, HandshakeStatus, Status, TlsEngine};

#[test]
fn wrap_reports_overflow_on_empty_destination() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut empty = [0u8; 0];
    let result = client.wrap(&[], &mut empty).unwrap();
    assert_eq!(result.status, Status::BufferOverflow);
    assert_eq!(result.bytes_produced, 0);

    // Pending output can be drained in pieces.
    let mut small = [0u8; 4];
    let result = client.wrap(&[], &mut small).unwrap();
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.bytes_produced, 4);
    assert_eq!(result.handshake_status, HandshakeStatus::NeedWrap);
}

#[test]
fn unwrap_reports_underflow_on_partial_record() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut wire = vec![0u8; 20 * 1024];
    let hello = client.wrap(&[], &mut wire).unwrap();

    let mut server = server_engine(server_config());
    let mut app = vec![0u8; 17 * 1024];

    // Less than a record header.
    let result = server.unwrap(&wire[..3], &mut app).unwrap();
    assert_eq!(result.status, Status::BufferUnderflow);
    assert_eq!(result.bytes_consumed, 0);

    // A header but a truncated body.
    let result = server.unwrap(&wire[..8], &mut app).unwrap();
    assert_eq!(result.status, Status::BufferUnderflow);

    // The full record goes through.
    let result = server
        .unwrap(&wire[..hello.bytes_produced], &mut app)
        .unwrap();
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.bytes_consumed, hello.bytes_produced);
    assert_eq!(result.handshake_status, HandshakeStatus::NeedWrap);
}

#[test]
fn unwrap_reports_overflow_on_small_destination() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut wire = vec![0u8; 20 * 1024];
    let hello = client.wrap(&[], &mut wire).unwrap();

    let mut server = server_engine(server_config());
    let mut empty = [0u8; 0];
    let result = server
        .unwrap(&wire[..hello.bytes_produced], &mut empty)
        .unwrap();
    assert_eq!(result.status, Status::BufferOverflow);
    assert_eq!(result.bytes_consumed, 0);
}

#[test]
fn unwrap_failure_is_deferred_to_the_next_wrap() {
    init_logging();

    let mut server = server_engine(server_config());
    let mut wire = vec![0u8; 1024];
    let mut app = vec![0u8; 1024];

    // A well-framed handshake record whose message type is garbage.
    let bogus = hex::decode("1603030004ee000000").unwrap();

    // First: the failing unwrap itself reports clean progress and flips
    // to NeedWrap so the caller flushes the alert.
    let result = server.unwrap(&bogus, &mut app).unwrap();
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.handshake_status, HandshakeStatus::NeedWrap);
    assert_eq!(result.bytes_consumed, 0);
    assert_eq!(result.bytes_produced, 0);

    // Second: the next wrap raises the stored failure, once.
    assert!(matches!(
        server.wrap(&[], &mut wire),
        Err(Error::Alert(_))
    ));

    // Third: wrap again flushes the alert record and reports closed.
    let result = server.wrap(&[], &mut wire).unwrap();
    assert!(result.bytes_produced > 0);
    assert_eq!(result.status, Status::Closed);
    assert_eq!(wire[0], 21, "expected an alert record");
}

#[test]
fn close_before_handshake() {
    init_logging();

    let mut engine = TlsEngine::new(client_config(None), "example.com", 443);
    engine.close_outbound();

    let mut wire = vec![0u8; 1024];
    let result = engine.wrap(&[], &mut wire).unwrap();
    assert_eq!(result.status, Status::Closed);
    assert_eq!(result.bytes_produced, 0);

    let result = engine.unwrap(&[22, 3, 3, 0, 1, 0], &mut wire).unwrap();
    assert_eq!(result.status, Status::Closed);
    assert_eq!(result.bytes_consumed, 0);

    assert!(matches!(
        engine.begin_handshake(),
        Err(Error::ConnectionClosed)
    ));
}

#[test]
fn orderly_shutdown_exchanges_close_notify() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());
    drive_handshake(&mut client, &mut server);

    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    // Inbound close before the peer's close_notify is a truncation.
    assert!(server.close_inbound().is_err());

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());
    drive_handshake(&mut client, &mut server);

    client.close_outbound();
    let w = client.wrap(&[], &mut wire).unwrap();
    assert_eq!(w.status, Status::Closed);
    assert!(w.bytes_produced > 0);

    // The server sees the close and echoes it.
    let u = server.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.status, Status::Closed);
    assert!(server.close_inbound().is_ok());

    let w = server.wrap(&[], &mut wire).unwrap();
    assert_eq!(w.status, Status::Closed);
    assert!(w.bytes_produced > 0);

    let u = client.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.status, Status::Closed);
    assert!(client.close_inbound().is_ok());

    // Writing after close fails cleanly on the closed side.
    let w = client.wrap(b"too late", &mut wire).unwrap();
    assert_eq!(w.status, Status::Closed);
    assert_eq!(w.bytes_consumed, 0);
}

#[test]
fn peer_close_tears_down_the_session() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());
    drive_handshake(&mut client, &mut server);

    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    client.close_outbound();
    let w = client.wrap(&[], &mut wire).unwrap();

    // The receiving side observes the close and releases its session
    // state; only the close_notify echo is still owed.
    let u = server.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.status, Status::Closed);
    assert!(server.close_inbound().is_ok());

    let w = server.wrap(&[], &mut wire).unwrap();
    assert_eq!(w.status, Status::Closed);
    assert!(w.bytes_produced > 0, "close_notify echo never flushed");

    // After the echo, neither direction moves data again.
    let w = server.wrap(b"late", &mut wire).unwrap();
    assert_eq!(w.status, Status::Closed);
    assert_eq!(w.bytes_consumed, 0);

    let u = server.unwrap(&[23, 3, 3, 0, 1, 0], &mut app).unwrap();
    assert_eq!(u.status, Status::Closed);
    assert_eq!(u.bytes_consumed, 0);
}

#[test]
fn renegotiation_is_rejected() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());
    drive_handshake(&mut client, &mut server);

    assert!(matches!(
        client.begin_handshake(),
        Err(Error::RenegotiationUnsupported)
    ));
    assert!(matches!(
        server.begin_handshake(),
        Err(Error::RenegotiationUnsupported)
    ));
}

#[test]
fn mode_is_fixed_once_handshaking() {
    init_logging();

    let mut engine = TlsEngine::new(client_config(None), "example.com", 443);
    assert!(engine.is_client_mode());
    engine.set_client_mode(false).unwrap();
    engine.set_client_mode(true).unwrap();

    let mut wire = vec![0u8; 20 * 1024];
    engine.wrap(&[], &mut wire).unwrap();

    // Same mode is a no-op, switching is not.
    assert!(engine.set_client_mode(true).is_ok());
    assert!(matches!(
        engine.set_client_mode(false),
        Err(Error::ModeChangeAfterHandshake)
    ));
}
