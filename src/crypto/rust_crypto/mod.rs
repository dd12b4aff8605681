//! Default crypto provider backed by the RustCrypto crates.

mod cipher;
mod hash;
mod hmac;
mod kx;
mod random;
mod sign;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::provider::{
    CryptoProvider, HashProvider, HmacProvider, SupportedCipherSuite, SupportedKxGroup,
};

pub use cipher::{Aes128GcmSuite, Aes256GcmSuite, ChaChaSuite, NullSuite};
pub use hash::Hashes;
pub use hmac::Hmacs;
pub use kx::X25519;
pub use random::SystemRandom;
pub use sign::{Ed25519KeyProvider, Ed25519Verifier};

pub(crate) static HASH_PROVIDER: &dyn HashProvider = &Hashes;
pub(crate) static HMAC_PROVIDER: &dyn HmacProvider = &Hmacs;

static AES128_GCM: Aes128GcmSuite = Aes128GcmSuite;
static AES256_GCM: Aes256GcmSuite = Aes256GcmSuite;
static CHACHA: ChaChaSuite = ChaChaSuite;
static NULL: NullSuite = NullSuite;

/// Suites this backend can protect records with, preference order.
pub static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] =
    &[&AES128_GCM, &AES256_GCM, &CHACHA, &NULL];

static X25519_GROUP: X25519 = X25519;

pub static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[&X25519_GROUP];

/// The default provider.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        hash_provider: HASH_PROVIDER,
        hmac_provider: HMAC_PROVIDER,
        cipher_suites: ALL_CIPHER_SUITES,
        kx_groups: ALL_KX_GROUPS,
        signature_verifier: &Ed25519Verifier,
        key_provider: &Ed25519KeyProvider,
        secure_random: &SystemRandom,
    }
}

/// Generate a throwaway Ed25519 identity: (certificate bytes, private key).
///
/// The "certificate" is simply the raw verifying key, matching what
/// [`Ed25519Verifier`] expects. Real deployments substitute X.509 material
/// and their own verifier.
pub fn generate_identity() -> (Vec<u8>, Vec<u8>) {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let key = ed25519_dalek::SigningKey::from_bytes(&seed);
    let cert = key.verifying_key().to_bytes().to_vec();
    (cert, seed.to_vec())
}
