mod common;

use std::sync::Arc;

use common::{client_config, drive_handshake, init_logging, server_config, server_engine};
use veil::{Config, Error, HandshakeStatus, ResumptionCache, Status, TlsEngine};

#[test]
fn full_handshake_then_application_data() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());

    let stats = drive_handshake(&mut client, &mut server);
    assert!(stats.client_finished, "client never reported Finished");
    assert!(stats.server_finished, "server never reported Finished");
    assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
    assert_eq!(server.handshake_status(), HandshakeStatus::NotHandshaking);

    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    // Client to server.
    let w = client.wrap(b"hello from the client", &mut wire).unwrap();
    assert_eq!(w.status, Status::Ok);
    assert_eq!(w.bytes_consumed, 21);
    let u = server.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.bytes_consumed, w.bytes_produced);
    assert_eq!(&app[..u.bytes_produced], b"hello from the client");

    // And back.
    let w = server.wrap(b"hello from the server", &mut wire).unwrap();
    let u = client.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(&app[..u.bytes_produced], b"hello from the server");
}

#[test]
fn large_writes_split_into_records() {
    init_logging();

    let mut client = TlsEngine::new(client_config(None), "example.com", 443);
    let mut server = server_engine(server_config());
    drive_handshake(&mut client, &mut server);

    let data = vec![0x5au8; 40_000];
    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    let mut sent = 0;
    let mut received = Vec::new();
    while sent < data.len() {
        let w = client.wrap(&data[sent..], &mut wire).unwrap();
        assert!(w.bytes_consumed > 0 && w.bytes_consumed <= 16384);
        sent += w.bytes_consumed;

        let u = server.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
        received.extend_from_slice(&app[..u.bytes_produced]);
    }
    assert_eq!(received, data);
}

#[test]
fn session_is_cached_and_resumed() {
    init_logging();

    let cache = Arc::new(ResumptionCache::new());
    let server_cfg = server_config();

    let mut client = TlsEngine::new(client_config(Some(cache.clone())), "example.com", 443);
    let mut server = server_engine(server_cfg.clone());
    let full = drive_handshake(&mut client, &mut server);

    let cached = cache.lookup("example.com", 443).expect("session not cached");
    assert!(!cached.ticket.is_empty());

    // Second connection against the same server config resumes: the
    // server flight shrinks because Certificate and ServerKeyExchange
    // are skipped.
    let mut client = TlsEngine::new(client_config(Some(cache.clone())), "example.com", 443);
    let mut server = server_engine(server_cfg);
    let resumed = drive_handshake(&mut client, &mut server);

    assert!(
        resumed.server_to_client < full.server_to_client,
        "resumed server flight ({}) not smaller than full ({})",
        resumed.server_to_client,
        full.server_to_client
    );
    assert!(resumed.client_finished && resumed.server_finished);

    // A fresh ticket was issued for the resumed session too.
    assert!(cache.lookup("example.com", 443).is_some());
}

#[test]
fn no_ticket_when_server_disables_them() {
    init_logging();

    let cache = Arc::new(ResumptionCache::new());
    let (cert, key) = veil::crypto::rust_crypto::generate_identity();
    let server_cfg = Config::builder()
        .with_identity(vec![cert], key)
        .issue_tickets(false)
        .build()
        .unwrap();

    let mut client = TlsEngine::new(client_config(Some(cache.clone())), "example.com", 443);
    let mut server = server_engine(server_cfg);
    drive_handshake(&mut client, &mut server);

    assert!(cache.lookup("example.com", 443).is_none());
}

#[test]
fn failed_handshake_evicts_cached_session() {
    init_logging();

    let cache = Arc::new(ResumptionCache::new());
    let server_cfg = server_config();

    let mut client = TlsEngine::new(client_config(Some(cache.clone())), "example.com", 443);
    let mut server = server_engine(server_cfg);
    drive_handshake(&mut client, &mut server);
    assert!(cache.lookup("example.com", 443).is_some());

    // Second attempt hits a server with no suite in common.
    let (cert, key) = veil::crypto::rust_crypto::generate_identity();
    let strict_cfg = Config::builder()
        .with_identity(vec![cert], key)
        .with_cipher_suites(&[veil::crypto::CipherSuite::ECDHE_ECDSA_NULL_SHA])
        .build()
        .unwrap();

    let mut client = TlsEngine::new(client_config(Some(cache.clone())), "example.com", 443);
    let mut server = server_engine(strict_cfg);

    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    let w = client.wrap(&[], &mut wire).unwrap();

    // The server rejects the ClientHello; the failure is deferred so the
    // alert can be flushed.
    let u = server.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.status, Status::Ok);
    assert_eq!(u.handshake_status, HandshakeStatus::NeedWrap);
    assert!(matches!(server.wrap(&[], &mut wire), Err(Error::Alert(_))));
    let w = server.wrap(&[], &mut wire).unwrap();
    assert!(w.bytes_produced > 0);

    // The fatal alert reaches the client, which evicts the session.
    let u = client.unwrap(&wire[..w.bytes_produced], &mut app).unwrap();
    assert_eq!(u.handshake_status, HandshakeStatus::NeedWrap);
    assert!(matches!(
        client.wrap(&[], &mut wire),
        Err(Error::PeerAlert(_))
    ));
    assert!(cache.lookup("example.com", 443).is_none());
}

#[test]
fn server_without_identity_cannot_handshake() {
    init_logging();

    let mut server = server_engine(client_config(None));
    let mut app = vec![0u8; 1024];
    assert!(matches!(
        server.unwrap(&[22, 3, 3, 0, 1, 0], &mut app),
        Err(Error::ConfigError(_))
    ));
}
