use std::sync::Arc;

use veil::crypto::rust_crypto::generate_identity;
use veil::{Config, HandshakeStatus, ResumptionCache, Status, TlsEngine};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn server_config() -> Config {
    let (cert, key) = generate_identity();
    Config::builder()
        .with_identity(vec![cert], key)
        .build()
        .unwrap()
}

pub fn client_config(cache: Option<Arc<ResumptionCache>>) -> Config {
    let mut builder = Config::builder();
    if let Some(cache) = cache {
        builder = builder.with_resumption_cache(cache);
    }
    builder.build().unwrap()
}

pub fn server_engine(config: Config) -> TlsEngine {
    let mut engine = TlsEngine::new(config, "localhost", 0);
    engine.set_client_mode(false).unwrap();
    engine
}

#[derive(Debug, Default)]
pub struct DriveStats {
    pub client_to_server: usize,
    pub server_to_client: usize,
    pub client_finished: bool,
    pub server_finished: bool,
}

/// Pump wrap/unwrap between the two engines until both report a
/// completed handshake.
pub fn drive_handshake(client: &mut TlsEngine, server: &mut TlsEngine) -> DriveStats {
    let mut stats = DriveStats::default();
    let mut wire = vec![0u8; 20 * 1024];
    let mut app = vec![0u8; 17 * 1024];

    for _ in 0..32 {
        let result = client.wrap(&[], &mut wire).unwrap();
        assert_ne!(result.status, Status::BufferOverflow);
        if result.handshake_status == HandshakeStatus::Finished {
            stats.client_finished = true;
        }
        stats.client_to_server += result.bytes_produced;
        feed(
            server,
            &wire[..result.bytes_produced],
            &mut app,
            &mut stats.server_finished,
        );

        let result = server.wrap(&[], &mut wire).unwrap();
        assert_ne!(result.status, Status::BufferOverflow);
        if result.handshake_status == HandshakeStatus::Finished {
            stats.server_finished = true;
        }
        stats.server_to_client += result.bytes_produced;
        feed(
            client,
            &wire[..result.bytes_produced],
            &mut app,
            &mut stats.client_finished,
        );

        if client.is_handshake_complete() && server.is_handshake_complete() {
            break;
        }
    }

    assert!(client.is_handshake_complete(), "client never completed");
    assert!(server.is_handshake_complete(), "server never completed");
    stats
}

/// Feed every record in `wire` to the engine, one unwrap per record.
pub fn feed(engine: &mut TlsEngine, mut wire: &[u8], app: &mut [u8], finished: &mut bool) {
    while !wire.is_empty() {
        let result = engine.unwrap(wire, app).unwrap();
        if result.handshake_status == HandshakeStatus::Finished {
            *finished = true;
        }
        assert!(
            result.bytes_consumed > 0,
            "engine stalled with {} wire bytes left ({:?})",
            wire.len(),
            result
        );
        wire = &wire[result.bytes_consumed..];
    }
}
