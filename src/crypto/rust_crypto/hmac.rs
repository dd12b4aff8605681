//! HMAC over the RustCrypto `hmac` crate.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::crypto::provider::HmacProvider;
use crate::crypto::suites::HashAlgorithm;

/// HMAC provider over all supported hash algorithms.
#[derive(Debug)]
pub struct Hmacs;

macro_rules! mac_over {
    ($digest:ty, $key:expr, $parts:expr) => {{
        let mut mac = Hmac::<$digest>::new_from_slice($key)
            .map_err(|e| format!("hmac key: {}", e))?;
        for part in $parts {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    }};
}

impl HmacProvider for Hmacs {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        parts: &[&[u8]],
    ) -> Result<Vec<u8>, String> {
        match hash {
            HashAlgorithm::Md5 => mac_over!(Md5, key, parts),
            HashAlgorithm::Sha1 => mac_over!(Sha1, key, parts),
            HashAlgorithm::Sha256 => mac_over!(Sha256, key, parts),
            HashAlgorithm::Sha384 => mac_over!(Sha384, key, parts),
            HashAlgorithm::Sha512 => mac_over!(Sha512, key, parts),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// RFC 4231 test case 2 (HMAC-SHA256 with key "Jefe").
    #[test]
    fn hmac_sha256_rfc4231() {
        let out = Hmacs
            .hmac(
                HashAlgorithm::Sha256,
                b"Jefe",
                &[b"what do ya want ", b"for nothing?"],
            )
            .unwrap();
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        assert_eq!(out, expected);
    }
}
