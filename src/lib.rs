//! Sans-IO TLS 1.2 protocol engine.
//!
//! The crate never touches a socket. A [`TlsEngine`] is driven entirely
//! through two buffer-to-buffer calls modeled on the classic non-blocking
//! engine shape:
//!
//! * [`TlsEngine::wrap`] turns outbound application bytes (and pending
//!   handshake or alert traffic) into wire records.
//! * [`TlsEngine::unwrap`] consumes one wire record and yields inbound
//!   application bytes.
//!
//! Each call returns an [`EngineResult`] telling the caller what happened
//! and what the handshake needs next, so the engine composes with any
//! transport: blocking sockets, mio, async runtimes, or in-memory pipes.
//!
//! ```no_run
//! use veil::{Config, TlsEngine, HandshakeStatus};
//!
//! let config = Config::builder().build().unwrap();
//! let mut engine = TlsEngine::new(config, "example.com", 443);
//!
//! let mut wire = [0u8; 16 * 1024 + 512];
//! let result = engine.wrap(&[], &mut wire).unwrap();
//! assert_eq!(result.handshake_status, HandshakeStatus::NeedUnwrap);
//! // send wire[..result.bytes_produced] to the peer, then feed the
//! // peer's reply to engine.unwrap(..)
//! ```
//!
//! Session resumption (RFC 5077 tickets) is automatic when a shared
//! [`ResumptionCache`] is configured on the client and the server issues
//! tickets.

#![forbid(unsafe_code)]
#![allow(clippy::result_large_err)]

mod buffer;
mod client;
mod config;
mod connection;
pub mod crypto;
mod engine;
mod error;
mod message;
mod record;
mod server;
mod session;
mod transcript;
mod types;
mod util;

pub use config::{Config, ConfigBuilder, Identity};
pub use engine::{EngineResult, HandshakeStatus, Status, TlsEngine};
pub use error::{AlertDescription, AlertLevel, Error};
pub use session::{CachedSession, ResumptionCache, SessionParams, Ticketer};
pub use types::{CompressionMethod, NamedGroup, ProtocolVersion, Role, SignatureScheme};
