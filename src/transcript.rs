//! Deferred transcript hash.
//!
//! TLS authenticates its own negotiation transcript, but the hash
//! algorithm used for that authentication is itself negotiated partway
//! through the transcript. This module buffers the raw handshake bytes
//! until the algorithm set is known, then replays the buffer into live
//! digests and (usually) retires it.

use std::collections::HashMap;

use log::trace;

use crate::crypto::provider::{CryptoProvider, HashContext};
use crate::crypto::{HashAlgorithm, PrfAlgorithm};
use crate::error::Error;

/// Above this many tracked digests the raw buffer is kept alive after
/// sealing, so a later narrowing can still reconstruct any of them.
const BUFFERING_HASH_LIMIT: usize = 4;

/// A forked, independently finalizable transcript digest.
///
/// The legacy dual-PRF eras authenticate with MD5 || SHA-1; everything
/// newer uses a single digest.
pub enum PrfHash {
    Single(Box<dyn HashContext>),
    Combined {
        md5: Box<dyn HashContext>,
        sha1: Box<dyn HashContext>,
    },
}

impl PrfHash {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            PrfHash::Single(h) => h.update(data),
            PrfHash::Combined { md5, sha1 } => {
                md5.update(data);
                sha1.update(data);
            }
        }
    }

    /// Finalize without consuming the fork.
    pub fn finalize(&self) -> Vec<u8> {
        match self {
            PrfHash::Single(h) => h.clone_and_finalize(),
            PrfHash::Combined { md5, sha1 } => {
                let mut out = md5.clone_and_finalize();
                out.extend_from_slice(&sha1.clone_and_finalize());
                out
            }
        }
    }
}

/// Running hash of the exact handshake byte stream under every algorithm
/// that turns out to be needed.
pub struct TranscriptHash {
    provider: CryptoProvider,
    /// Raw transcript. `Some` until retired by sealing.
    buf: Option<Vec<u8>>,
    hashes: HashMap<HashAlgorithm, Box<dyn HashContext>>,
    force_buffering: bool,
    sealed: bool,
}

impl TranscriptHash {
    pub fn new(provider: CryptoProvider) -> Self {
        TranscriptHash {
            provider,
            buf: Some(Vec::new()),
            hashes: HashMap::new(),
            force_buffering: false,
            sealed: false,
        }
    }

    /// Append handshake bytes.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(buf) = &mut self.buf {
            buf.extend_from_slice(data);
            return;
        }

        for hash in self.hashes.values_mut() {
            hash.update(data);
        }
    }

    /// Register interest in a hash algorithm. Only before sealing.
    pub fn track_hash_algorithm(&mut self, algorithm: HashAlgorithm) -> Result<(), Error> {
        if self.sealed {
            return Err(Error::SecurityError(
                "too late to track more hash algorithms".to_string(),
            ));
        }
        self.check_tracking_hash(algorithm);
        Ok(())
    }

    /// Track the digest(s) the negotiated PRF requires: MD5 and SHA-1 for
    /// the legacy dual schemes, the PRF's own hash otherwise.
    pub fn notify_prf_determined(&mut self, prf: PrfAlgorithm) -> Result<(), Error> {
        match prf.hash_algorithm() {
            None => {
                self.track_hash_algorithm(HashAlgorithm::Md5)?;
                self.track_hash_algorithm(HashAlgorithm::Sha1)?;
            }
            Some(alg) => self.track_hash_algorithm(alg)?,
        }
        Ok(())
    }

    /// Disable buffer retirement. Required when an algorithm determined
    /// only very late (e.g. a signature-bound hash) must see the full raw
    /// transcript at fork time.
    pub fn force_buffering(&mut self) -> Result<(), Error> {
        if self.sealed {
            return Err(Error::SecurityError(
                "too late to force buffering".to_string(),
            ));
        }
        self.force_buffering = true;
        Ok(())
    }

    /// Freeze the tracked-algorithm set, retiring the buffer when
    /// possible.
    pub fn seal_hash_algorithms(&mut self) {
        if !self.sealed {
            self.sealed = true;
            self.check_stop_buffering();
        }
    }

    /// The raw transcript. Requires [`force_buffering`](Self::force_buffering)
    /// to have been called before sealing.
    pub fn buffered_transcript(&self) -> Result<&[u8], Error> {
        match &self.buf {
            Some(buf) => Ok(buf),
            None => Err(Error::SecurityError("transcript not buffering".to_string())),
        }
    }

    /// Fork the digest(s) the PRF authenticates with, fed with the buffer
    /// if one is still held. Non-destructive to the live transcript.
    pub fn fork_prf_hash(&mut self, prf: PrfAlgorithm) -> Result<PrfHash, Error> {
        self.check_stop_buffering();

        let mut fork = match prf.hash_algorithm() {
            None => PrfHash::Combined {
                md5: self.clone_hash(HashAlgorithm::Md5)?,
                sha1: self.clone_hash(HashAlgorithm::Sha1)?,
            },
            Some(alg) => PrfHash::Single(self.clone_hash(alg)?),
        };

        if let Some(buf) = &self.buf {
            fork.update(buf);
        }

        Ok(fork)
    }

    /// Finalize the tracked digest for `algorithm` without disturbing it.
    pub fn get_final_hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>, Error> {
        let mut hash = self.clone_hash(algorithm)?;
        if let Some(buf) = &self.buf {
            hash.update(buf);
        }
        Ok(hash.clone_and_finalize())
    }

    /// Narrow tracking to exactly the algorithms `prf` needs, producing a
    /// fresh sealed transcript with cloned digest states. The original
    /// handle continues unaffected.
    pub fn stop_tracking(&self, prf: PrfAlgorithm) -> Result<TranscriptHash, Error> {
        let mut new_hashes: HashMap<HashAlgorithm, Box<dyn HashContext>> = HashMap::new();

        let algorithms: &[HashAlgorithm] = match prf.hash_algorithm() {
            None => &[HashAlgorithm::Md5, HashAlgorithm::Sha1],
            Some(_) => &[prf.hash_algorithm().unwrap()],
        };

        for alg in algorithms {
            let mut hash = self.clone_hash(*alg)?;
            if let Some(buf) = &self.buf {
                hash.update(buf);
            }
            new_hashes.insert(*alg, hash);
        }

        Ok(TranscriptHash {
            provider: self.provider,
            buf: None,
            hashes: new_hashes,
            force_buffering: false,
            sealed: true,
        })
    }

    fn check_stop_buffering(&mut self) {
        if !self.force_buffering
            && self.sealed
            && self.buf.is_some()
            && self.hashes.len() <= BUFFERING_HASH_LIMIT
        {
            trace!(
                "Retiring transcript buffer into {} tracked digest(s)",
                self.hashes.len()
            );
            // Unwrap is OK, checked is_some above.
            let buf = self.buf.take().unwrap();
            for hash in self.hashes.values_mut() {
                hash.update(&buf);
            }
        }
    }

    fn check_tracking_hash(&mut self, algorithm: HashAlgorithm) {
        if !self.hashes.contains_key(&algorithm) {
            let hash = self.provider.hash_provider.create_hash(algorithm);
            self.hashes.insert(algorithm, hash);
        }
    }

    fn clone_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, Error> {
        match self.hashes.get(&algorithm) {
            Some(h) => Ok(h.fork()),
            None => Err(Error::SecurityError(format!(
                "{:?} is not being tracked",
                algorithm
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn one_shot(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        let mut h = default_provider().hash_provider.create_hash(algorithm);
        h.update(data);
        h.clone_and_finalize()
    }

    /// Buffered-then-replayed and fully-incremental paths must agree.
    #[test]
    fn transcript_determinism() {
        let data = b"ClientHello ServerHello Certificate";

        // Path A: update first, track+seal later (buffer replay).
        let mut a = TranscriptHash::new(default_provider());
        a.update(data);
        a.track_hash_algorithm(HashAlgorithm::Sha256).unwrap();
        a.seal_hash_algorithms();

        // Path B: track+seal first, update after (incremental).
        let mut b = TranscriptHash::new(default_provider());
        b.track_hash_algorithm(HashAlgorithm::Sha256).unwrap();
        b.seal_hash_algorithms();
        b.update(data);

        assert_eq!(
            a.get_final_hash(HashAlgorithm::Sha256).unwrap(),
            b.get_final_hash(HashAlgorithm::Sha256).unwrap()
        );
        assert_eq!(
            a.get_final_hash(HashAlgorithm::Sha256).unwrap(),
            one_shot(HashAlgorithm::Sha256, data)
        );
    }

    /// Tracking over the buffering limit keeps the buffer alive but must
    /// not change any digest.
    #[test]
    fn buffering_equivalence_over_limit() {
        let all = [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ];
        let data = b"the same handshake bytes";

        let mut few = TranscriptHash::new(default_provider());
        for alg in &all[..3] {
            few.track_hash_algorithm(*alg).unwrap();
        }
        few.seal_hash_algorithms();
        few.update(data);

        let mut many = TranscriptHash::new(default_provider());
        for alg in &all {
            many.track_hash_algorithm(*alg).unwrap();
        }
        many.seal_hash_algorithms();
        many.update(data);

        for alg in &all[..3] {
            assert_eq!(
                few.get_final_hash(*alg).unwrap(),
                many.get_final_hash(*alg).unwrap(),
                "{:?} digests diverge between buffered and retired paths",
                alg
            );
        }
    }

    /// fork/get_final_hash must not disturb subsequent updates.
    #[test]
    fn fork_non_destructive() {
        let mut t = TranscriptHash::new(default_provider());
        t.notify_prf_determined(PrfAlgorithm::TlsPrfSha256).unwrap();
        t.seal_hash_algorithms();

        t.update(b"first flight");
        let fork = t.fork_prf_hash(PrfAlgorithm::TlsPrfSha256).unwrap();
        let mid = fork.finalize();
        let _ = t.get_final_hash(HashAlgorithm::Sha256).unwrap();

        t.update(b"second flight");
        let full = t.get_final_hash(HashAlgorithm::Sha256).unwrap();

        let mut expected = b"first flight".to_vec();
        expected.extend_from_slice(b"second flight");
        assert_eq!(full, one_shot(HashAlgorithm::Sha256, &expected));
        assert_eq!(mid, one_shot(HashAlgorithm::Sha256, b"first flight"));
    }

    /// Legacy PRF forks concatenate MD5 || SHA-1.
    #[test]
    fn legacy_fork_combines_digests() {
        let mut t = TranscriptHash::new(default_provider());
        t.notify_prf_determined(PrfAlgorithm::TlsPrfLegacy).unwrap();
        t.seal_hash_algorithms();
        t.update(b"legacy transcript");

        let fork = t.fork_prf_hash(PrfAlgorithm::TlsPrfLegacy).unwrap();
        let out = fork.finalize();
        assert_eq!(out.len(), 16 + 20);
        assert_eq!(&out[..16], &one_shot(HashAlgorithm::Md5, b"legacy transcript")[..]);
        assert_eq!(&out[16..], &one_shot(HashAlgorithm::Sha1, b"legacy transcript")[..]);
    }

    /// stop_tracking yields an independent narrowed transcript.
    #[test]
    fn stop_tracking_narrows_independently() {
        let mut t = TranscriptHash::new(default_provider());
        for alg in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            t.track_hash_algorithm(alg).unwrap();
        }
        t.update(b"prefix");
        t.seal_hash_algorithms();

        let mut narrowed = t.stop_tracking(PrfAlgorithm::TlsPrfSha256).unwrap();
        narrowed.update(b" suffix");
        assert_eq!(
            narrowed.get_final_hash(HashAlgorithm::Sha256).unwrap(),
            one_shot(HashAlgorithm::Sha256, b"prefix suffix")
        );
        // Narrowed transcript no longer tracks the others.
        assert!(narrowed.get_final_hash(HashAlgorithm::Sha512).is_err());

        // Original is unaffected.
        assert_eq!(
            t.get_final_hash(HashAlgorithm::Sha512).unwrap(),
            one_shot(HashAlgorithm::Sha512, b"prefix")
        );
    }

    /// Sealing after tracking refuses further tracking and forced
    /// buffering keeps the raw transcript available.
    #[test]
    fn sealing_and_forced_buffering() {
        let mut t = TranscriptHash::new(default_provider());
        t.force_buffering().unwrap();
        t.track_hash_algorithm(HashAlgorithm::Sha256).unwrap();
        t.update(b"raw bytes");
        t.seal_hash_algorithms();

        assert!(t.track_hash_algorithm(HashAlgorithm::Sha384).is_err());
        assert_eq!(t.buffered_transcript().unwrap(), b"raw bytes");

        // Digest output is unchanged by the retained buffer.
        assert_eq!(
            t.get_final_hash(HashAlgorithm::Sha256).unwrap(),
            one_shot(HashAlgorithm::Sha256, b"raw bytes")
        );
    }
}
