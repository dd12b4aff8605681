//! Ed25519 signing and verification.
//!
//! The engine treats certificates as opaque bytes; this backend expects
//! the peer "certificate" to carry a raw 32-byte Ed25519 verifying key at
//! its tail, which is the shape produced by
//! [`generate_identity`](super::generate_identity). Deployments with real
//! X.509 chains supply their own [`SignatureVerifier`].

use core::fmt;

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};

use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey};
use crate::types::SignatureScheme;

/// Parses raw 32-byte Ed25519 seeds into signing keys.
#[derive(Debug)]
pub struct Ed25519KeyProvider;

impl KeyProvider for Ed25519KeyProvider {
    fn load_private_key(&self, key: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        let seed: [u8; 32] = key
            .try_into()
            .map_err(|_| format!("ed25519 key length {}", key.len()))?;
        Ok(Box::new(Ed25519Signer {
            key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }))
    }
}

struct Ed25519Signer {
    key: ed25519_dalek::SigningKey,
}

impl SigningKey for Ed25519Signer {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        Ok(self.key.sign(data).to_bytes().to_vec())
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer").finish_non_exhaustive()
    }
}

/// Verifies Ed25519 signatures against the key embedded in the opaque
/// certificate bytes.
#[derive(Debug)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify_signature(
        &self,
        cert: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String> {
        if scheme != SignatureScheme::Ed25519 {
            return Err(format!("unsupported signature scheme {:?}", scheme));
        }
        if cert.len() < 32 {
            return Err("certificate too short for ed25519 key".to_string());
        }

        let key_bytes: [u8; 32] = cert[cert.len() - 32..]
            .try_into()
            .map_err(|_| "bad key slice".to_string())?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| format!("ed25519 public key: {}", e))?;

        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| format!("ed25519 signature length {}", signature.len()))?;

        key.verify(data, &Signature::from_bytes(&sig_bytes))
            .map_err(|e| format!("signature verification failed: {}", e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::RngCore;

    #[test]
    fn sign_verify_roundtrip() {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);

        let signer = Ed25519KeyProvider.load_private_key(&seed).unwrap();
        let sig = signer.sign(b"server key exchange params").unwrap();

        let key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let cert = key.verifying_key().to_bytes().to_vec();

        Ed25519Verifier
            .verify_signature(
                &cert,
                b"server key exchange params",
                &sig,
                SignatureScheme::Ed25519,
            )
            .unwrap();

        assert!(Ed25519Verifier
            .verify_signature(&cert, b"other data", &sig, SignatureScheme::Ed25519)
            .is_err());
    }
}
