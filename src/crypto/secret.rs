//! Opaque, derivable secret material.

use core::fmt;

use zeroize::Zeroizing;

use crate::crypto::prf::prf;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::suites::PrfAlgorithm;
use crate::error::Error;

/// Byte material that supports PRF expansion and explicit destruction.
///
/// Derivation is non-destructive and repeatable: the source secret stays
/// usable until [`Secret::destroy`] is called. After destruction every
/// operation fails with [`Error::SecretDestroyed`]; the backing storage is
/// zeroized on destroy and on drop.
pub struct Secret {
    provider: CryptoProvider,
    data: Option<Zeroizing<Vec<u8>>>,
}

impl Secret {
    pub fn new(provider: CryptoProvider, data: Vec<u8>) -> Self {
        Secret {
            provider,
            data: Some(Zeroizing::new(data)),
        }
    }

    pub fn from_slice(provider: CryptoProvider, data: &[u8]) -> Self {
        Self::new(provider, data.to_vec())
    }

    /// Expand this secret into a freshly owned secret.
    pub fn derive_using_prf(
        &self,
        algorithm: PrfAlgorithm,
        label: &str,
        seed: &[u8],
        length: usize,
    ) -> Result<Secret, Error> {
        let data = self.check_alive()?;
        let out = prf(
            self.provider.hash_provider,
            self.provider.hmac_provider,
            algorithm,
            data,
            label,
            seed,
            length,
        )?;
        Ok(Secret::new(self.provider, out))
    }

    /// Borrow the raw bytes. Fails after destruction.
    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        self.check_alive()
    }

    /// Copy out the bytes, e.g. for a resumption snapshot.
    pub fn snapshot(&self) -> Result<Vec<u8>, Error> {
        Ok(self.check_alive()?.to_vec())
    }

    /// Best-effort zeroize and invalidate.
    pub fn destroy(&mut self) {
        // Zeroizing handles the wipe on drop.
        self.data = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.data.is_none()
    }

    fn check_alive(&self) -> Result<&[u8], Error> {
        match &self.data {
            Some(d) => Ok(d),
            None => Err(Error::SecretDestroyed),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.data.as_ref().map(|d| d.len()))
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    #[test]
    fn derive_is_repeatable_and_non_destructive() {
        let provider = default_provider();
        let secret = Secret::from_slice(provider, &[1, 2, 3, 4]);

        let a = secret
            .derive_using_prf(PrfAlgorithm::TlsPrfSha256, "master secret", &[9; 64], 48)
            .unwrap();
        let b = secret
            .derive_using_prf(PrfAlgorithm::TlsPrfSha256, "master secret", &[9; 64], 48)
            .unwrap();

        assert_eq!(a.as_bytes().unwrap(), b.as_bytes().unwrap());
        assert_eq!(a.as_bytes().unwrap().len(), 48);
        // Source still alive.
        assert_eq!(secret.as_bytes().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn destroyed_secret_rejects_use() {
        let provider = default_provider();
        let mut secret = Secret::from_slice(provider, &[5; 32]);
        secret.destroy();

        assert!(secret.is_destroyed());
        assert!(matches!(secret.as_bytes(), Err(Error::SecretDestroyed)));
        assert!(matches!(
            secret.derive_using_prf(PrfAlgorithm::TlsPrfSha256, "x", &[], 12),
            Err(Error::SecretDestroyed)
        ));
    }
}
