//! X25519 key exchange.

use core::fmt;

use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// The X25519 key exchange group.
#[derive(Debug)]
pub struct X25519;

impl SupportedKxGroup for X25519 {
    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }

    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String> {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let pub_key = PublicKey::from(&secret);
        Ok(Box::new(X25519Active {
            secret: Some(secret),
            pub_key: pub_key.to_bytes(),
        }))
    }
}

struct X25519Active {
    secret: Option<EphemeralSecret>,
    pub_key: [u8; 32],
}

impl ActiveKeyExchange for X25519Active {
    fn pub_key(&self) -> &[u8] {
        &self.pub_key
    }

    fn complete(mut self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        let peer: [u8; 32] = peer_pub
            .try_into()
            .map_err(|_| format!("x25519 peer key length {}", peer_pub.len()))?;

        let secret = self
            .secret
            .take()
            .ok_or_else(|| "key exchange already completed".to_string())?;

        let shared = secret.diffie_hellman(&PublicKey::from(peer));

        // All-zero output means a low-order peer point (RFC 7748 6.1).
        if shared.as_bytes().iter().all(|b| *b == 0) {
            return Err("x25519 produced all-zero shared secret".to_string());
        }

        Ok(shared.as_bytes().to_vec())
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

impl fmt::Debug for X25519Active {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X25519Active").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exchange_agrees() {
        let a = X25519.start_exchange().unwrap();
        let b = X25519.start_exchange().unwrap();

        let a_pub = a.pub_key().to_vec();
        let b_pub = b.pub_key().to_vec();

        let s1 = a.complete(&b_pub).unwrap();
        let s2 = b.complete(&a_pub).unwrap();

        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 32);
    }

    #[test]
    fn rejects_bad_peer_length() {
        let a = X25519.start_exchange().unwrap();
        assert!(a.complete(&[0u8; 31]).is_err());
    }
}
