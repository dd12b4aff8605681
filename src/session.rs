//! Session resumption: the client-side cache and the server-side
//! stateless ticketer (RFC 5077).

use std::collections::HashMap;
use std::sync::RwLock;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use log::{debug, trace};
use zeroize::Zeroizing;

use crate::crypto::provider::SecureRandom;
use crate::crypto::CipherSuite;
use crate::types::ProtocolVersion;

/// The parameters a resumed connection is rebuilt from.
#[derive(Clone)]
pub struct SessionParams {
    pub protocol_version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub master_secret: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionParams")
            .field("protocol_version", &self.protocol_version)
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}

/// A cached client-side session: the ticket to present and the
/// parameters to resume with.
#[derive(Debug, Clone)]
pub struct CachedSession {
    pub params: SessionParams,
    pub ticket: Vec<u8>,
}

/// Client-side session store keyed by `host:port`.
///
/// Shared across connections by the application; an `Arc` of this goes
/// into the config.
#[derive(Debug, Default)]
pub struct ResumptionCache {
    sessions: RwLock<HashMap<String, CachedSession>>,
}

fn peer_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

impl ResumptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, host: &str, port: u16) -> Option<CachedSession> {
        let sessions = self.sessions.read().ok()?;
        sessions.get(&peer_key(host, port)).cloned()
    }

    /// Store after a fully successful handshake.
    pub fn store(&self, host: &str, port: u16, session: CachedSession) {
        trace!("Caching session for {}:{}", host, port);
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(peer_key(host, port), session);
        }
    }

    /// Drop the entry after a failed handshake so the next attempt
    /// starts clean.
    pub fn remove(&self, host: &str, port: u16) {
        if let Ok(mut sessions) = self.sessions.write() {
            if sessions.remove(&peer_key(host, port)).is_some() {
                debug!("Removed cached session for {}:{}", host, port);
            }
        }
    }
}

/// Sealed ticket layout: version(2) || suite(2) || master_secret(48).
const TICKET_PLAINTEXT_LEN: usize = 2 + 2 + 48;
const TICKET_NONCE_LEN: usize = 12;

/// Server-side stateless ticket protection.
///
/// Tickets are AES-128-GCM sealed under a random key generated when the
/// config is built, so a restart invalidates all outstanding tickets and
/// the server falls back to a full handshake.
pub struct Ticketer {
    key: Aes128Gcm,
    random: &'static dyn SecureRandom,
    /// Advertised in NewSessionTicket as ticket_lifetime_hint.
    pub lifetime_hint_secs: u32,
}

impl std::fmt::Debug for Ticketer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticketer")
            .field("lifetime_hint_secs", &self.lifetime_hint_secs)
            .finish_non_exhaustive()
    }
}

impl Ticketer {
    pub fn new(random: &'static dyn SecureRandom) -> Result<Self, String> {
        let mut key_bytes = Zeroizing::new([0u8; 16]);
        random.fill(&mut *key_bytes)?;
        Ok(Ticketer {
            key: Aes128Gcm::new_from_slice(&*key_bytes).map_err(|e| e.to_string())?,
            random,
            lifetime_hint_secs: 7200,
        })
    }

    pub fn seal(&self, params: &SessionParams) -> Result<Vec<u8>, String> {
        if params.master_secret.len() != 48 {
            return Err(format!(
                "master secret length {}",
                params.master_secret.len()
            ));
        }

        let mut plaintext = Zeroizing::new(Vec::with_capacity(TICKET_PLAINTEXT_LEN));
        plaintext.extend_from_slice(&params.protocol_version.as_u16().to_be_bytes());
        plaintext.extend_from_slice(&params.cipher_suite.as_u16().to_be_bytes());
        plaintext.extend_from_slice(&params.master_secret);

        let mut nonce = [0u8; TICKET_NONCE_LEN];
        self.random.fill(&mut nonce)?;

        let sealed = self
            .key
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &[],
                },
            )
            .map_err(|_| "ticket seal failed".to_string())?;

        let mut ticket = nonce.to_vec();
        ticket.extend_from_slice(&sealed);
        Ok(ticket)
    }

    /// `None` for any ticket this process did not issue (or a garbled
    /// one). The caller falls back to a full handshake.
    pub fn unseal(&self, ticket: &[u8]) -> Option<SessionParams> {
        if ticket.len() <= TICKET_NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = ticket.split_at(TICKET_NONCE_LEN);

        let plaintext = Zeroizing::new(
            self.key
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: &[],
                    },
                )
                .ok()?,
        );
        if plaintext.len() != TICKET_PLAINTEXT_LEN {
            return None;
        }

        let version = u16::from_be_bytes([plaintext[0], plaintext[1]]);
        let protocol_version = ProtocolVersion::from_u16(version)?;
        let cipher_suite = CipherSuite::from_u16(u16::from_be_bytes([plaintext[2], plaintext[3]]));
        let master_secret = Zeroizing::new(plaintext[4..].to_vec());

        Some(SessionParams {
            protocol_version,
            cipher_suite,
            master_secret,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::SystemRandom;

    static RANDOM: SystemRandom = SystemRandom;

    fn params() -> SessionParams {
        SessionParams {
            protocol_version: ProtocolVersion::Tls1_2,
            cipher_suite: CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            master_secret: Zeroizing::new(vec![7u8; 48]),
        }
    }

    #[test]
    fn cache_lifecycle() {
        let cache = ResumptionCache::new();
        assert!(cache.lookup("example.com", 443).is_none());

        cache.store(
            "example.com",
            443,
            CachedSession {
                params: params(),
                ticket: vec![1, 2, 3],
            },
        );

        let hit = cache.lookup("example.com", 443).unwrap();
        assert_eq!(hit.ticket, vec![1, 2, 3]);
        // Different port is a different peer.
        assert!(cache.lookup("example.com", 8443).is_none());

        cache.remove("example.com", 443);
        assert!(cache.lookup("example.com", 443).is_none());
    }

    #[test]
    fn ticket_roundtrip() {
        let ticketer = Ticketer::new(&RANDOM).unwrap();
        let ticket = ticketer.seal(&params()).unwrap();

        let unsealed = ticketer.unseal(&ticket).unwrap();
        assert_eq!(unsealed.protocol_version, ProtocolVersion::Tls1_2);
        assert_eq!(
            unsealed.cipher_suite,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
        );
        assert_eq!(&*unsealed.master_secret, &[7u8; 48]);
    }

    #[test]
    fn foreign_ticket_rejected() {
        let ticketer = Ticketer::new(&RANDOM).unwrap();
        let other = Ticketer::new(&RANDOM).unwrap();

        let ticket = other.seal(&params()).unwrap();
        assert!(ticketer.unseal(&ticket).is_none());
        assert!(ticketer.unseal(&[0u8; 4]).is_none());

        let mut garbled = other.seal(&params()).unwrap();
        let last = garbled.len() - 1;
        garbled[last] ^= 1;
        assert!(other.unseal(&garbled).is_none());
    }
}
