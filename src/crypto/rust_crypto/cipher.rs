//! Record protection ciphers: AES-GCM, ChaCha20-Poly1305 and the
//! MAC-only NULL cipher.

use core::fmt;

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::crypto::provider::{Cipher, SupportedCipherSuite};
use crate::crypto::suites::CipherSuite;

macro_rules! fmt_debug {
    ($label:literal) => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str($label)
        }
    };
}

macro_rules! aead_cipher {
    ($name:ident, $aead:ty, $label:literal) => {
        pub struct $name {
            aead: $aead,
        }

        impl $name {
            pub fn new(key: &[u8]) -> Result<Self, String> {
                let aead = <$aead>::new_from_slice(key)
                    .map_err(|e| format!("{} key: {}", $label, e))?;
                Ok(Self { aead })
            }
        }

        impl Cipher for $name {
            fn encrypt(
                &mut self,
                buf: &mut Buf,
                aad: &[u8],
                nonce: &[u8; 12],
            ) -> Result<(), String> {
                self.aead
                    .encrypt_in_place(aes_gcm::Nonce::from_slice(nonce), aad, buf)
                    .map_err(|_| format!("{} encrypt failed", $label))
            }

            fn decrypt(
                &mut self,
                buf: &mut Buf,
                aad: &[u8],
                nonce: &[u8; 12],
            ) -> Result<(), String> {
                self.aead
                    .decrypt_in_place(aes_gcm::Nonce::from_slice(nonce), aad, buf)
                    .map_err(|_| format!("{} decrypt failed", $label))
            }
        }

        impl fmt::Debug for $name {
            fmt_debug!($label);
        }
    };
}

aead_cipher!(Aes128GcmCipher, Aes128Gcm, "aes-128-gcm");
aead_cipher!(Aes256GcmCipher, Aes256Gcm, "aes-256-gcm");
aead_cipher!(ChaChaCipher, ChaCha20Poly1305, "chacha20-poly1305");

/// MAC-only protection: HMAC-SHA1 over aad || plaintext appended as the
/// "tag". No confidentiality; testing and explicit fallback only.
pub struct NullCipher {
    mac_key: Vec<u8>,
}

impl NullCipher {
    pub fn new(mac_key: &[u8]) -> Result<Self, String> {
        if mac_key.len() != 20 {
            return Err(format!("null cipher mac key length {}", mac_key.len()));
        }
        Ok(NullCipher {
            mac_key: mac_key.to_vec(),
        })
    }

    fn compute_mac(&self, aad: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        // Fully qualified: `KeyInit` (for the AEADs) also has a
        // `new_from_slice` in scope.
        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| format!("null cipher mac: {}", e))?;
        mac.update(aad);
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl Cipher for NullCipher {
    fn encrypt(&mut self, buf: &mut Buf, aad: &[u8], _nonce: &[u8; 12]) -> Result<(), String> {
        let tag = self.compute_mac(aad, buf)?;
        buf.extend_from_slice(&tag);
        Ok(())
    }

    fn decrypt(&mut self, buf: &mut Buf, aad: &[u8], _nonce: &[u8; 12]) -> Result<(), String> {
        if buf.len() < 20 {
            return Err("record too short for mac".to_string());
        }
        let split = buf.len() - 20;
        let expected = self.compute_mac(aad, &buf[..split])?;
        let ok: bool = expected.ct_eq(&buf[split..]).into();
        if !ok {
            return Err("bad record mac".to_string());
        }
        buf.truncate(split);
        Ok(())
    }
}

impl fmt::Debug for NullCipher {
    fmt_debug!("null-hmac-sha1");
}

macro_rules! suite_factory {
    ($name:ident, $suite:ident, $cipher:ident, aead) => {
        #[derive(Debug)]
        pub struct $name;

        impl SupportedCipherSuite for $name {
            fn suite(&self) -> CipherSuite {
                CipherSuite::$suite
            }

            fn create_cipher(
                &self,
                enc_key: &[u8],
                _mac_key: &[u8],
            ) -> Result<Box<dyn Cipher>, String> {
                Ok(Box::new($cipher::new(enc_key)?))
            }
        }
    };
}

suite_factory!(
    Aes128GcmSuite,
    ECDHE_ECDSA_AES128_GCM_SHA256,
    Aes128GcmCipher,
    aead
);
suite_factory!(
    Aes256GcmSuite,
    ECDHE_ECDSA_AES256_GCM_SHA384,
    Aes256GcmCipher,
    aead
);
suite_factory!(
    ChaChaSuite,
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
    ChaChaCipher,
    aead
);

#[derive(Debug)]
pub struct NullSuite;

impl SupportedCipherSuite for NullSuite {
    fn suite(&self) -> CipherSuite {
        CipherSuite::ECDHE_ECDSA_NULL_SHA
    }

    fn create_cipher(&self, _enc_key: &[u8], mac_key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(NullCipher::new(mac_key)?))
    }
}
