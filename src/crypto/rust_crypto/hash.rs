//! Hash contexts backed by the RustCrypto digest crates.

use core::fmt;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::crypto::provider::{HashContext, HashProvider};
use crate::crypto::suites::HashAlgorithm;

#[derive(Clone)]
enum Inner {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

/// Incremental hash with cheap state snapshots (digest states are plain
/// values in the RustCrypto implementations).
#[derive(Clone)]
pub struct Hash {
    inner: Inner,
}

impl Hash {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let inner = match algorithm {
            HashAlgorithm::Md5 => Inner::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Inner::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Inner::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => Inner::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => Inner::Sha512(Sha512::new()),
        };
        Hash { inner }
    }
}

impl HashContext for Hash {
    fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Md5(h) => h.update(data),
            Inner::Sha1(h) => h.update(data),
            Inner::Sha256(h) => h.update(data),
            Inner::Sha384(h) => h.update(data),
            Inner::Sha512(h) => h.update(data),
        }
    }

    fn fork(&self) -> Box<dyn HashContext> {
        Box::new(self.clone())
    }

    fn clone_and_finalize(&self) -> Vec<u8> {
        match &self.inner {
            Inner::Md5(h) => h.clone().finalize().to_vec(),
            Inner::Sha1(h) => h.clone().finalize().to_vec(),
            Inner::Sha256(h) => h.clone().finalize().to_vec(),
            Inner::Sha384(h) => h.clone().finalize().to_vec(),
            Inner::Sha512(h) => h.clone().finalize().to_vec(),
        }
    }

    fn algorithm(&self) -> HashAlgorithm {
        match &self.inner {
            Inner::Md5(_) => HashAlgorithm::Md5,
            Inner::Sha1(_) => HashAlgorithm::Sha1,
            Inner::Sha256(_) => HashAlgorithm::Sha256,
            Inner::Sha384(_) => HashAlgorithm::Sha384,
            Inner::Sha512(_) => HashAlgorithm::Sha512,
        }
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hash")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Factory handing out [`Hash`] contexts.
#[derive(Debug)]
pub struct Hashes;

impl HashProvider for Hashes {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        Box::new(Hash::new(algorithm))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sha256_known_answer() {
        let mut hash = Hash::new(HashAlgorithm::Sha256);
        hash.update(b"hello");
        hash.update(b" ");
        hash.update(b"world");
        let result = hash.clone_and_finalize();

        let expected =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn fork_is_independent() {
        let mut hash = Hash::new(HashAlgorithm::Sha1);
        hash.update(b"abc");

        let mut forked = hash.fork();
        forked.update(b"def");

        // The original is unaffected by updates to the fork.
        let one_shot = Hash::new(HashAlgorithm::Sha1);
        let mut reference = one_shot;
        reference.update(b"abc");
        assert_eq!(hash.clone_and_finalize(), reference.clone_and_finalize());
        assert_ne!(hash.clone_and_finalize(), forked.clone_and_finalize());
    }
}
