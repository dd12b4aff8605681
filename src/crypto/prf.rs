//! The three generations of TLS key-derivation PRFs.
//!
//! All derivation flows through [`prf`], selected by the negotiated
//! [`PrfAlgorithm`]. The constructions follow RFC 6101 (SSL 3.0),
//! RFC 2246 section 5 (TLS 1.0/1.1) and RFC 5246 section 5 (TLS 1.2).

use once_cell::sync::Lazy;

use crate::crypto::provider::{HashProvider, HmacProvider};
use crate::crypto::suites::{HashAlgorithm, PrfAlgorithm};
use crate::error::Error;

/// SSL3 magic mix constants ("A", "BB", "CCC", ...).
static SSL3_CONST: Lazy<Vec<u8>> = Lazy::new(|| {
    let n = 15;
    let mut result = Vec::with_capacity(n * (n + 1) / 2);
    for i in 0..n {
        let b = b'A' + i as u8;
        for _ in 0..=i {
            result.push(b);
        }
    }
    result
});

/// Expand `secret` into `output_len` bytes of key material.
///
/// The label and seed are concatenated for the TLS PRFs; the legacy SSL
/// PRF mixes the secret with the raw seed and ignores the label entirely.
pub fn prf(
    hash_provider: &dyn HashProvider,
    hmac_provider: &dyn HmacProvider,
    algorithm: PrfAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    if algorithm == PrfAlgorithm::SslPrfLegacy {
        return prf_ssl(hash_provider, secret, seed, output_len);
    }

    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    match algorithm {
        PrfAlgorithm::TlsPrfLegacy => {
            prf_legacy(hmac_provider, secret, &label_seed, output_len)
        }
        PrfAlgorithm::TlsPrfSha256 => p_hash(
            hmac_provider,
            HashAlgorithm::Sha256,
            secret,
            &label_seed,
            output_len,
        ),
        PrfAlgorithm::TlsPrfSha384 => p_hash(
            hmac_provider,
            HashAlgorithm::Sha384,
            secret,
            &label_seed,
            output_len,
        ),
        PrfAlgorithm::SslPrfLegacy => unreachable!("handled above"),
    }
}

/// P_hash (RFC 5246 section 5).
///
/// A(0) = seed, A(i) = HMAC(secret, A(i-1)),
/// output chunk i = HMAC(secret, A(i) || seed).
fn p_hash(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    full_seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut result = Vec::with_capacity(output_len);

    let mut a = hmac
        .hmac(hash, secret, &[full_seed])
        .map_err(Error::CryptoError)?;

    while result.len() < output_len {
        let output = hmac
            .hmac(hash, secret, &[&a, full_seed])
            .map_err(Error::CryptoError)?;

        let remaining = output_len - result.len();
        let to_copy = remaining.min(output.len());
        result.extend_from_slice(&output[..to_copy]);

        if result.len() < output_len {
            a = hmac.hmac(hash, secret, &[&a]).map_err(Error::CryptoError)?;
        }
    }

    Ok(result)
}

/// TLS 1.0/1.1 PRF: P_MD5 over the first half of the secret XOR P_SHA1
/// over the second half. For odd secret lengths the halves overlap by one
/// byte (both are ceil(len/2) bytes long).
fn prf_legacy(
    hmac: &dyn HmacProvider,
    secret: &[u8],
    label_seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let s_half = (secret.len() + 1) / 2;

    let mut b1 = p_hash(
        hmac,
        HashAlgorithm::Md5,
        &secret[..s_half],
        label_seed,
        output_len,
    )?;
    let b2 = p_hash(
        hmac,
        HashAlgorithm::Sha1,
        &secret[secret.len() - s_half..],
        label_seed,
        output_len,
    )?;

    for (x, y) in b1.iter_mut().zip(b2.iter()) {
        *x ^= y;
    }
    Ok(b1)
}

/// SSL 3.0 PRF: each round hashes an increasing alphabetic prefix, the
/// secret and the seed with SHA-1, then feeds secret || sha1-digest into
/// MD5 for 16 more output bytes.
fn prf_ssl(
    hashes: &dyn HashProvider,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut result = Vec::with_capacity(output_len);

    let mut const_len = 1;
    let mut const_pos = 0;

    while result.len() < output_len {
        let mut sha1 = hashes.create_hash(HashAlgorithm::Sha1);
        sha1.update(&SSL3_CONST[const_pos..const_pos + const_len]);
        const_pos += const_len;
        const_len += 1;

        sha1.update(secret);
        sha1.update(seed);
        let sha1_out = sha1.clone_and_finalize();

        let mut md5 = hashes.create_hash(HashAlgorithm::Md5);
        md5.update(secret);
        md5.update(&sha1_out);
        let md5_out = md5.clone_and_finalize();

        let remaining = output_len - result.len();
        let to_copy = remaining.min(md5_out.len());
        result.extend_from_slice(&md5_out[..to_copy]);
    }

    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::{HASH_PROVIDER, HMAC_PROVIDER};

    #[test]
    fn ssl3_constants() {
        assert!(SSL3_CONST.starts_with(b"ABBCCCDDDD"));
        assert_eq!(SSL3_CONST.len(), 15 * 16 / 2);
    }

    /// RFC 5246 style test vector for P_SHA256, cross-checked against the
    /// widely published IETF mailing list vector.
    #[test]
    fn tls12_prf_sha256_vector() {
        let secret = hex::decode("9bbe436ba940f017b17652849a71db35").unwrap();
        let seed = hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap();
        let expected = hex::decode(
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
             6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
             4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
             87347b66",
        )
        .unwrap();

        let out = prf(
            HASH_PROVIDER,
            HMAC_PROVIDER,
            PrfAlgorithm::TlsPrfSha256,
            &secret,
            "test label",
            &seed,
            100,
        )
        .unwrap();

        assert_eq!(out, expected);
    }

    /// The legacy PRF must equal P_MD5(first half) XOR P_SHA1(second half),
    /// with overlapping halves for odd secret lengths.
    #[test]
    fn legacy_prf_matches_manual_xor() {
        let secret = [0xabu8; 31];
        let label = "key expansion";
        let seed = [0x42u8; 13];

        let out = prf(
            HASH_PROVIDER,
            HMAC_PROVIDER,
            PrfAlgorithm::TlsPrfLegacy,
            &secret,
            label,
            &seed,
            40,
        )
        .unwrap();

        let mut label_seed = label.as_bytes().to_vec();
        label_seed.extend_from_slice(&seed);

        let s_half = 16;
        let b1 = p_hash(
            HMAC_PROVIDER,
            HashAlgorithm::Md5,
            &secret[..s_half],
            &label_seed,
            40,
        )
        .unwrap();
        let b2 = p_hash(
            HMAC_PROVIDER,
            HashAlgorithm::Sha1,
            &secret[31 - s_half..],
            &label_seed,
            40,
        )
        .unwrap();
        let manual: Vec<u8> = b1.iter().zip(b2.iter()).map(|(x, y)| x ^ y).collect();

        assert_eq!(out, manual);
    }

    /// SSL PRF mixes the raw seed (no label) and is deterministic.
    #[test]
    fn ssl_prf_deterministic_and_label_free() {
        let secret = [7u8; 48];
        let seed = [9u8; 64];

        let a = prf(
            HASH_PROVIDER,
            HMAC_PROVIDER,
            PrfAlgorithm::SslPrfLegacy,
            &secret,
            "ignored",
            &seed,
            104,
        )
        .unwrap();
        let b = prf(
            HASH_PROVIDER,
            HMAC_PROVIDER,
            PrfAlgorithm::SslPrfLegacy,
            &secret,
            "different label",
            &seed,
            104,
        )
        .unwrap();

        assert_eq!(a.len(), 104);
        assert_eq!(a, b);
    }
}
