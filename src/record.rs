//! Record layer: framing, protection and sizing previews.
//!
//! Records pass through one at a time. Callers first ask for a
//! [`RecordPreview`] to size their buffers, then hand over exactly one
//! record per call.

use log::trace;

use crate::buffer::{Buf, BufferPool};
use crate::crypto::provider::Cipher;
use crate::crypto::{record_nonce, BulkCipher};
use crate::error::{AlertDescription, Error};
use crate::types::{ContentType, ProtocolVersion};

/// Record header: type(1) version(2) length(2).
pub const RECORD_HEADER_LEN: usize = 5;

/// Plaintext fragment limit (RFC 5246 6.2.1).
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Ciphertext may expand by at most 2048 bytes (RFC 5246 6.2.3).
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

/// Sizing answer for one prospective record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPreview {
    /// The whole record on the wire, header included.
    pub record_size: usize,
    /// Application bytes the record carries (predicted for input,
    /// capacity for output).
    pub content_limit: usize,
}

struct CipherState {
    cipher: Box<dyn Cipher>,
    bulk: BulkCipher,
    fixed_iv: Vec<u8>,
}

#[derive(Default)]
struct Direction {
    active: Option<CipherState>,
    pending: Option<CipherState>,
    seq: u64,
}

/// One decrypted record.
#[derive(Debug)]
pub struct PlainRecord {
    pub content_type: ContentType,
    pub payload: Buf,
    /// Bytes consumed from the input, header included.
    pub consumed: usize,
}

pub struct RecordLayer {
    version: ProtocolVersion,
    read: Direction,
    write: Direction,
    pool: BufferPool,
}

impl RecordLayer {
    pub fn new() -> Self {
        RecordLayer {
            version: ProtocolVersion::Tls1_2,
            read: Direction::default(),
            write: Direction::default(),
            pool: BufferPool::default(),
        }
    }

    /// Install the read protection keyed from the key block. It stays
    /// pending until the peer's ChangeCipherSpec arrives.
    pub fn set_pending_read(&mut self, cipher: Box<dyn Cipher>, bulk: BulkCipher, fixed_iv: &[u8]) {
        self.read.pending = Some(CipherState {
            cipher,
            bulk,
            fixed_iv: fixed_iv.to_vec(),
        });
    }

    pub fn set_pending_write(
        &mut self,
        cipher: Box<dyn Cipher>,
        bulk: BulkCipher,
        fixed_iv: &[u8],
    ) {
        self.write.pending = Some(CipherState {
            cipher,
            bulk,
            fixed_iv: fixed_iv.to_vec(),
        });
    }

    /// Activate pending read protection (peer sent ChangeCipherSpec).
    pub fn enable_read(&mut self) -> Result<(), Error> {
        match self.read.pending.take() {
            Some(state) => {
                trace!("Read protection enabled");
                self.read.active = Some(state);
                self.read.seq = 0;
                Ok(())
            }
            None => Err(Error::Alert(AlertDescription::UnexpectedMessage)),
        }
    }

    /// Activate pending write protection (we sent ChangeCipherSpec).
    pub fn enable_write(&mut self) -> Result<(), Error> {
        match self.write.pending.take() {
            Some(state) => {
                trace!("Write protection enabled");
                self.write.active = Some(state);
                self.write.seq = 0;
                Ok(())
            }
            None => Err(Error::Alert(AlertDescription::InternalError)),
        }
    }

    /// Size up the record at the head of `input` without consuming it.
    ///
    /// `None` means the header itself is incomplete.
    pub fn preview_input_record(&self, input: &[u8]) -> Result<Option<RecordPreview>, Error> {
        if input.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }

        let length = u16::from_be_bytes([input[3], input[4]]) as usize;
        if length > MAX_CIPHERTEXT_LEN {
            return Err(Error::Alert(AlertDescription::RecordOverflow));
        }

        let overhead = match &self.read.active {
            Some(state) => state.bulk.record_overhead(),
            None => 0,
        };

        Ok(Some(RecordPreview {
            record_size: RECORD_HEADER_LEN + length,
            content_limit: length.saturating_sub(overhead).min(MAX_PLAINTEXT_LEN),
        }))
    }

    /// Size up the record that would carry `app_len` bytes of output.
    pub fn preview_output_record(&self, app_len: usize) -> RecordPreview {
        let content_limit = app_len.min(MAX_PLAINTEXT_LEN);
        let overhead = match &self.write.active {
            Some(state) => state.bulk.record_overhead(),
            None => 0,
        };

        RecordPreview {
            record_size: RECORD_HEADER_LEN + content_limit + overhead,
            content_limit,
        }
    }

    /// Decode and decrypt the record at the head of `input`.
    ///
    /// `None` means more input is needed for a complete record.
    pub fn open_record(&mut self, input: &[u8]) -> Result<Option<PlainRecord>, Error> {
        let preview = match self.preview_input_record(input)? {
            Some(p) => p,
            None => return Ok(None),
        };
        if input.len() < preview.record_size {
            return Ok(None);
        }

        let content_type = ContentType::from_u8(input[0])
            .ok_or(Error::Alert(AlertDescription::UnexpectedMessage))?;
        let version = u16::from_be_bytes([input[1], input[2]]);
        if ProtocolVersion::from_u16(version).is_none() {
            return Err(Error::Alert(AlertDescription::DecodeError));
        }

        let body = &input[RECORD_HEADER_LEN..preview.record_size];

        let mut payload = self.pool.pop();
        match &mut self.read.active {
            None => payload.extend_from_slice(body),
            Some(state) => {
                let explicit_len = state.bulk.explicit_nonce_len();
                let overhead = state.bulk.record_overhead();
                if body.len() < overhead {
                    self.pool.push(payload);
                    return Err(Error::Alert(AlertDescription::DecodeError));
                }

                // Bumped as a direct field access: `state` still borrows
                // `self.read.active`.
                let seq = self.read.seq;
                if seq == u64::MAX {
                    self.pool.push(payload);
                    return Err(Error::Alert(AlertDescription::InternalError));
                }
                self.read.seq += 1;

                let nonce = if explicit_len > 0 {
                    // GCM-style: the sender's explicit nonce from the wire.
                    let mut n = [0u8; 12];
                    n[..4].copy_from_slice(&state.fixed_iv);
                    n[4..].copy_from_slice(&body[..explicit_len]);
                    n
                } else {
                    record_nonce(state.bulk, &state.fixed_iv, seq)
                };

                let plaintext_len = body.len() - overhead;
                let aad = record_aad(seq, content_type, version, plaintext_len);

                payload.extend_from_slice(&body[explicit_len..]);
                if let Err(e) = state.cipher.decrypt(&mut payload, &aad, &nonce) {
                    trace!("Record decrypt failed: {}", e);
                    self.pool.push(payload);
                    return Err(Error::Alert(AlertDescription::BadRecordMac));
                }
            }
        }

        if payload.len() > MAX_PLAINTEXT_LEN {
            self.pool.push(payload);
            return Err(Error::Alert(AlertDescription::RecordOverflow));
        }

        Ok(Some(PlainRecord {
            content_type,
            payload,
            consumed: preview.record_size,
        }))
    }

    /// Frame (and under active protection, encrypt) one record.
    pub fn write_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
        output: &mut Vec<u8>,
    ) -> Result<(), Error> {
        if payload.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::Alert(AlertDescription::InternalError));
        }

        output.push(content_type.as_u8());
        self.version.serialize(output);
        let len_at = output.len();
        output.extend_from_slice(&[0, 0]);

        match &mut self.write.active {
            None => output.extend_from_slice(payload),
            Some(state) => {
                let seq = self.write.seq;
                if seq == u64::MAX {
                    return Err(Error::Alert(AlertDescription::InternalError));
                }
                self.write.seq += 1;

                let nonce = record_nonce(state.bulk, &state.fixed_iv, seq);
                let aad = record_aad(seq, content_type, self.version.as_u16(), payload.len());

                let mut buf = self.pool.pop();
                buf.extend_from_slice(payload);
                state
                    .cipher
                    .encrypt(&mut buf, &aad, &nonce)
                    .map_err(|_| Error::Alert(AlertDescription::InternalError))?;

                if state.bulk.explicit_nonce_len() == 8 {
                    // RFC 5288: the sequence number doubles as the
                    // explicit nonce.
                    output.extend_from_slice(&seq.to_be_bytes());
                }
                output.extend_from_slice(&buf);
                self.pool.push(buf);
            }
        }

        let body_len = (output.len() - len_at - 2) as u16;
        output[len_at..len_at + 2].copy_from_slice(&body_len.to_be_bytes());
        Ok(())
    }

    /// Return a payload buffer for reuse.
    pub fn recycle(&mut self, buf: Buf) {
        self.pool.push(buf);
    }
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Additional data: seq(8) || type(1) || version(2) || plaintext_len(2).
fn record_aad(seq: u64, content_type: ContentType, version: u16, plaintext_len: usize) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type.as_u8();
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}
