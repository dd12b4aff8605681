//! Cryptographic capability interface, secrets and key derivation.

pub mod prf;
pub mod provider;
pub mod rust_crypto;
mod secret;
mod suites;

pub use provider::{
    ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider,
};
pub use provider::{HmacProvider, KeyProvider, SecureRandom};
pub use provider::{SignatureVerifier, SigningKey, SupportedCipherSuite, SupportedKxGroup};

pub use secret::Secret;
pub use suites::{BulkCipher, CipherSuite, HashAlgorithm, PrfAlgorithm};

pub(crate) use suites::record_nonce;
