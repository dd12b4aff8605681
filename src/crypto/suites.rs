//! Cipher suite registry: hash, PRF and bulk cipher parameters.

use core::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

/// Hash algorithms the provider capability can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// Key-derivation (PRF) families across the protocol eras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrfAlgorithm {
    /// SSL 3.0 MD5/SHA-1 mixing with alphabetic prefixes.
    SslPrfLegacy,
    /// TLS 1.0/1.1 dual HMAC-MD5 / HMAC-SHA1 XOR construction.
    TlsPrfLegacy,
    /// TLS 1.2 single P_SHA256.
    TlsPrfSha256,
    /// TLS 1.2 single P_SHA384.
    TlsPrfSha384,
}

impl PrfAlgorithm {
    /// The PRF in effect for a protocol version and suite PRF hash.
    pub fn for_version(
        version: crate::types::ProtocolVersion,
        suite_prf_hash: HashAlgorithm,
    ) -> PrfAlgorithm {
        use crate::types::ProtocolVersion::*;
        match version {
            Ssl3_0 => PrfAlgorithm::SslPrfLegacy,
            Tls1_0 | Tls1_1 => PrfAlgorithm::TlsPrfLegacy,
            Tls1_2 => match suite_prf_hash {
                HashAlgorithm::Sha384 => PrfAlgorithm::TlsPrfSha384,
                _ => PrfAlgorithm::TlsPrfSha256,
            },
        }
    }

    /// The single digest this PRF runs on, or `None` for the dual
    /// MD5+SHA1 legacy schemes.
    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        match self {
            PrfAlgorithm::SslPrfLegacy | PrfAlgorithm::TlsPrfLegacy => None,
            PrfAlgorithm::TlsPrfSha256 => Some(HashAlgorithm::Sha256),
            PrfAlgorithm::TlsPrfSha384 => Some(HashAlgorithm::Sha384),
        }
    }
}

/// Bulk encryption identifiers a crypto provider can be asked to satisfy.
///
/// The engine negotiates these; the provider decides which it actually
/// implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum BulkCipher {
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    Aes128Ccm,
    Aes256Ccm,
    Aes128Ccm8,
    Aes256Ccm8,
    Aes128Ocb,
    Aes256Ocb,
    Aria128Cbc,
    Aria256Cbc,
    Aria128Gcm,
    Aria256Gcm,
    Camellia128Cbc,
    Camellia256Cbc,
    Camellia128Gcm,
    Camellia256Gcm,
    TripleDesEdeCbc,
    SeedCbc,
    Chacha20Poly1305,
    /// No encryption, MAC only. Testing and fallback.
    Null,
}

impl BulkCipher {
    /// Encryption key length in bytes.
    pub fn enc_key_len(&self) -> usize {
        use BulkCipher::*;
        match self {
            Aes128Cbc | Aes128Gcm | Aes128Ccm | Aes128Ccm8 | Aes128Ocb | Aria128Cbc
            | Aria128Gcm | Camellia128Cbc | Camellia128Gcm | SeedCbc => 16,
            Aes256Cbc | Aes256Gcm | Aes256Ccm | Aes256Ccm8 | Aes256Ocb | Aria256Cbc
            | Aria256Gcm | Camellia256Cbc | Camellia256Gcm | Chacha20Poly1305 => 32,
            TripleDesEdeCbc => 24,
            Null => 0,
        }
    }

    /// Length of the per-connection fixed IV in the key block.
    pub fn fixed_iv_len(&self) -> usize {
        use BulkCipher::*;
        match self {
            Aes128Gcm | Aes256Gcm | Aes128Ccm | Aes256Ccm | Aes128Ccm8 | Aes256Ccm8
            | Aes128Ocb | Aes256Ocb | Aria128Gcm | Aria256Gcm | Camellia128Gcm
            | Camellia256Gcm => 4,
            Chacha20Poly1305 => 12,
            _ => 0,
        }
    }

    /// Length of the per-record explicit nonce on the wire.
    pub fn explicit_nonce_len(&self) -> usize {
        use BulkCipher::*;
        match self {
            Aes128Gcm | Aes256Gcm | Aes128Ccm | Aes256Ccm | Aes128Ccm8 | Aes256Ccm8
            | Aes128Ocb | Aes256Ocb | Aria128Gcm | Aria256Gcm | Camellia128Gcm
            | Camellia256Gcm => 8,
            _ => 0,
        }
    }

    /// Authentication tag (or MAC) length appended to the ciphertext.
    pub fn tag_len(&self) -> usize {
        use BulkCipher::*;
        match self {
            Aes128Ccm8 | Aes256Ccm8 => 8,
            Aes128Gcm | Aes256Gcm | Aes128Ccm | Aes256Ccm | Aes128Ocb | Aes256Ocb
            | Aria128Gcm | Aria256Gcm | Camellia128Gcm | Camellia256Gcm
            | Chacha20Poly1305 => 16,
            // HMAC-SHA1 record MAC.
            Null => 20,
            // CBC suites carry the HMAC of the suite; only the SHA-1
            // variants are listed in the registry below.
            Aes128Cbc | Aes256Cbc | Aria128Cbc | Aria256Cbc | Camellia128Cbc
            | Camellia256Cbc | TripleDesEdeCbc | SeedCbc => 20,
        }
    }

    /// MAC key length for non-AEAD protection.
    pub fn mac_key_len(&self) -> usize {
        use BulkCipher::*;
        match self {
            Null | Aes128Cbc | Aes256Cbc | Aria128Cbc | Aria256Cbc | Camellia128Cbc
            | Camellia256Cbc | TripleDesEdeCbc | SeedCbc => 20,
            _ => 0,
        }
    }

    /// Total per-record ciphertext expansion.
    pub fn record_overhead(&self) -> usize {
        self.explicit_nonce_len() + self.tag_len()
    }
}

/// Build the 12-byte AEAD nonce for one record.
///
/// GCM-style suites use fixed_iv(4) || explicit(8) where explicit is the
/// record sequence number (RFC 5288). ChaCha20-Poly1305 XORs the padded
/// sequence number into the full 12-byte fixed IV (RFC 7905).
pub(crate) fn record_nonce(bulk: BulkCipher, fixed_iv: &[u8], seq: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    match bulk {
        BulkCipher::Chacha20Poly1305 => {
            nonce.copy_from_slice(fixed_iv);
            let seq_bytes = seq.to_be_bytes();
            for (n, s) in nonce[4..].iter_mut().zip(seq_bytes.iter()) {
                *n ^= s;
            }
        }
        _ => {
            // MAC-only protection has no fixed IV; the nonce is unused.
            nonce[..fixed_iv.len()].copy_from_slice(fixed_iv);
            nonce[4..].copy_from_slice(&seq.to_be_bytes());
        }
    }
    nonce
}

/// Negotiable cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    #[default]
    ECDHE_ECDSA_AES128_GCM_SHA256,
    ECDHE_ECDSA_AES256_GCM_SHA384,
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
    /// MAC-only suite, used in tests and as an explicit opt-in fallback.
    ECDHE_ECDSA_NULL_SHA,
    Unknown(u16),
}

impl CipherSuite {
    pub fn as_u16(&self) -> u16 {
        use CipherSuite::*;
        match self {
            ECDHE_ECDSA_AES128_GCM_SHA256 => 0xc02b,
            ECDHE_ECDSA_AES256_GCM_SHA384 => 0xc02c,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => 0xcca9,
            ECDHE_ECDSA_NULL_SHA => 0xc006,
            Unknown(v) => *v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        use CipherSuite::*;
        match v {
            0xc02b => ECDHE_ECDSA_AES128_GCM_SHA256,
            0xc02c => ECDHE_ECDSA_AES256_GCM_SHA384,
            0xcca9 => ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            0xc006 => ECDHE_ECDSA_NULL_SHA,
            other => Unknown(other),
        }
    }

    /// The hash used for the suite's PRF and Finished computation.
    pub fn prf_hash(&self) -> HashAlgorithm {
        use CipherSuite::*;
        match self {
            ECDHE_ECDSA_AES256_GCM_SHA384 => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Sha256,
        }
    }

    pub fn bulk_cipher(&self) -> BulkCipher {
        use CipherSuite::*;
        match self {
            ECDHE_ECDSA_AES128_GCM_SHA256 => BulkCipher::Aes128Gcm,
            ECDHE_ECDSA_AES256_GCM_SHA384 => BulkCipher::Aes256Gcm,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => BulkCipher::Chacha20Poly1305,
            ECDHE_ECDSA_NULL_SHA | Unknown(_) => BulkCipher::Null,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, v) = be_u16(input)?;
        Ok((input, Self::from_u16(v)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn suite_codepoints() {
        assert_eq!(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256.as_u16(), 0xc02b);
        assert_eq!(
            CipherSuite::from_u16(0xcca9),
            CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256
        );
        assert_eq!(CipherSuite::from_u16(0x1234), CipherSuite::Unknown(0x1234));
    }

    #[test]
    fn gcm_nonce_layout() {
        let fixed = [1u8, 2, 3, 4];
        let nonce = record_nonce(BulkCipher::Aes128Gcm, &fixed, 0x0102030405060708);
        assert_eq!(&nonce[..4], &fixed);
        assert_eq!(&nonce[4..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn chacha_nonce_xors_sequence() {
        let fixed = [0xffu8; 12];
        let nonce = record_nonce(BulkCipher::Chacha20Poly1305, &fixed, 1);
        assert_eq!(&nonce[..4], &[0xff; 4]);
        assert_eq!(nonce[11], 0xfe);
    }

    #[test]
    fn prf_for_version() {
        use crate::types::ProtocolVersion::*;
        assert_eq!(
            PrfAlgorithm::for_version(Tls1_2, HashAlgorithm::Sha384),
            PrfAlgorithm::TlsPrfSha384
        );
        assert_eq!(
            PrfAlgorithm::for_version(Tls1_0, HashAlgorithm::Sha256),
            PrfAlgorithm::TlsPrfLegacy
        );
        assert_eq!(
            PrfAlgorithm::for_version(Ssl3_0, HashAlgorithm::Sha256),
            PrfAlgorithm::SslPrfLegacy
        );
    }
}
