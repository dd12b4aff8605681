//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The engine performs no cipher or digest math itself. Everything it
//! needs is expressed as a capability here, and a [`CryptoProvider`]
//! bundles static references to the chosen implementations. The default
//! backend lives in [`rust_crypto`](super::rust_crypto); alternative
//! backends implement the same traits and are selected at `Config`
//! construction time.

use std::fmt::Debug;

use crate::buffer::Buf;
use crate::crypto::suites::{CipherSuite, HashAlgorithm};
use crate::types::{NamedGroup, SignatureScheme};

/// Marker trait for types usable as crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug {}

impl<T: Send + Sync + Debug> CryptoSafe for T {}

// ============================================================================
// Instance traits (created by factories)
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Snapshot the current state into an independent context.
    fn fork(&self) -> Box<dyn HashContext>;

    /// Clone the state and finalize the clone. The original context can
    /// continue to be updated.
    fn clone_and_finalize(&self) -> Vec<u8>;

    /// The algorithm this context runs.
    fn algorithm(&self) -> HashAlgorithm;
}

/// Record protection instance: AEAD, or MAC-only for the NULL cipher.
pub trait Cipher: CryptoSafe {
    /// Encrypt/authenticate plaintext in place, appending the tag.
    fn encrypt(&mut self, buf: &mut Buf, aad: &[u8], nonce: &[u8; 12]) -> Result<(), String>;

    /// Decrypt/verify ciphertext in place, removing the tag.
    fn decrypt(&mut self, buf: &mut Buf, aad: &[u8], nonce: &[u8; 12]) -> Result<(), String>;
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// The public key to send to the peer.
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public key, returning the
    /// shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String>;

    /// The named group of this exchange.
    fn group(&self) -> NamedGroup;
}

/// Signing key for the server's key exchange parameters.
pub trait SigningKey: CryptoSafe {
    /// Sign data and return the signature.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Signature scheme produced by this key.
    fn scheme(&self) -> SignatureScheme;
}

// ============================================================================
// Factory traits (referenced by CryptoProvider)
// ============================================================================

/// Hash provider (factory for [`HashContext`]).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;
}

/// HMAC computation over multi-part input.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC over the concatenation of `parts`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        parts: &[&[u8]],
    ) -> Result<Vec<u8>, String>;
}

/// Cipher suite support (factory for [`Cipher`] instances).
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Create a cipher instance. `mac_key` is empty for AEAD suites.
    fn create_cipher(&self, enc_key: &[u8], mac_key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Key exchange group support (factory for [`ActiveKeyExchange`]).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group of this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against opaque certificate bytes.
///
/// Chain validation and key extraction policy are the caller's concern;
/// the engine only hands over what it saw on the wire.
pub trait SignatureVerifier: CryptoSafe {
    fn verify_signature(
        &self,
        cert: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String>;
}

/// Private key parser (factory for [`SigningKey`]).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from its encoded bytes.
    fn load_private_key(&self, key: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill `buf` with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

// ============================================================================
// Core provider struct
// ============================================================================

/// Cryptographic provider consumed by the engine.
///
/// Holds static references to each component so provider selection is a
/// plain struct copy with zero dispatch overhead beyond the vtables.
#[derive(Debug, Clone, Copy)]
pub struct CryptoProvider {
    /// Hash factory used by the transcript hash and PRF.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC used by the TLS PRFs and the NULL cipher record MAC.
    pub hmac_provider: &'static dyn HmacProvider,

    /// Cipher suites this provider can actually protect records with.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported key exchange groups.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Verifies the server's signature over its key exchange parameters.
    pub signature_verifier: &'static dyn SignatureVerifier,

    /// Parses private keys into signing keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Random source for hello randoms, session ids and key generation.
    pub secure_random: &'static dyn SecureRandom,
}

impl CryptoProvider {
    /// Find the factory for a negotiated suite, if this provider has one.
    pub fn find_cipher_suite(
        &self,
        suite: CipherSuite,
    ) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites
            .iter()
            .find(|s| s.suite() == suite)
            .copied()
    }

    /// Find a key exchange group by name.
    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().find(|g| g.name() == group).copied()
    }
}
