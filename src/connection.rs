//! Connection plumbing shared by the client and server handshakes:
//! record dispatch, handshake reassembly, alert handling, queued output
//! and the key schedule.

use log::{debug, trace, warn};
use nom::number::complete::be_u24;

use crate::crypto::provider::CryptoProvider;
use crate::crypto::{BulkCipher, CipherSuite, PrfAlgorithm, Secret};
use crate::error::{AlertDescription, AlertLevel, Error};
use crate::message::{Random, HANDSHAKE_HEADER_LEN, VERIFY_DATA_LEN};
use crate::record::{RecordLayer, MAX_PLAINTEXT_LEN};
use crate::types::{ContentType, HandshakeType};

/// What one record delivered.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InputEvent {
    /// The record is incomplete; nothing was consumed.
    NeedMore,
    /// Handshake bytes were appended to the reassembly buffer.
    Handshake { consumed: usize },
    /// The peer switched to its pending cipher.
    ChangeCipherSpec { consumed: usize },
    /// Application data was queued for reading.
    ApplicationData { consumed: usize },
    /// An alert was processed internally.
    AlertHandled { consumed: usize },
}

impl InputEvent {
    pub(crate) fn consumed(&self) -> usize {
        match self {
            InputEvent::NeedMore => 0,
            InputEvent::Handshake { consumed }
            | InputEvent::ChangeCipherSpec { consumed }
            | InputEvent::ApplicationData { consumed }
            | InputEvent::AlertHandled { consumed } => *consumed,
        }
    }
}

/// Per-connection byte plumbing below the handshake state machines.
pub(crate) struct Connection {
    pub(crate) record_layer: RecordLayer,
    /// Wire bytes waiting to be drained by `wrap`.
    outgoing: Vec<u8>,
    /// Decrypted application bytes waiting to be drained by `unwrap`.
    incoming_app: Vec<u8>,
    /// Partially reassembled handshake stream.
    reassembly: Vec<u8>,
    pub(crate) handshake_complete: bool,
    close_sent: bool,
    close_received: bool,
    failed: bool,
}

impl Connection {
    pub(crate) fn new() -> Self {
        Connection {
            record_layer: RecordLayer::new(),
            outgoing: Vec::new(),
            incoming_app: Vec::new(),
            reassembly: Vec::new(),
            handshake_complete: false,
            close_sent: false,
            close_received: false,
            failed: false,
        }
    }

    /// Feed one record from the wire.
    pub(crate) fn offer_input(&mut self, input: &[u8]) -> Result<InputEvent, Error> {
        if self.failed {
            return Err(Error::ConnectionClosed);
        }

        let record = match self.record_layer.open_record(input)? {
            Some(r) => r,
            None => return Ok(InputEvent::NeedMore),
        };
        let consumed = record.consumed;

        let event = match record.content_type {
            ContentType::Handshake => {
                if self.close_received {
                    return Err(Error::Alert(AlertDescription::UnexpectedMessage));
                }
                self.reassembly.extend_from_slice(&record.payload);
                InputEvent::Handshake { consumed }
            }
            ContentType::ChangeCipherSpec => {
                if &*record.payload != [1u8] {
                    return Err(Error::Alert(AlertDescription::DecodeError));
                }
                InputEvent::ChangeCipherSpec { consumed }
            }
            ContentType::Alert => {
                self.handle_alert_payload(&record.payload)?;
                InputEvent::AlertHandled { consumed }
            }
            ContentType::ApplicationData => {
                if !self.handshake_complete {
                    return Err(Error::Alert(AlertDescription::UnexpectedMessage));
                }
                if !self.close_received {
                    self.incoming_app.extend_from_slice(&record.payload);
                }
                InputEvent::ApplicationData { consumed }
            }
        };

        let payload = record.payload;
        self.record_layer.recycle(payload);
        Ok(event)
    }

    fn handle_alert_payload(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() != 2 {
            return Err(Error::Alert(AlertDescription::DecodeError));
        }
        let level = AlertLevel::from_u8(payload[0])
            .ok_or(Error::Alert(AlertDescription::DecodeError))?;
        let description = AlertDescription::from_u8(payload[1]);

        match (level, description) {
            (_, AlertDescription::CloseNotify) => {
                debug!("Peer sent close_notify");
                self.close_received = true;
                // Reply in kind, then both directions are done.
                self.close();
                Ok(())
            }
            (AlertLevel::Fatal, description) => {
                warn!("Peer sent fatal alert: {}", description);
                self.failed = true;
                Err(Error::PeerAlert(description))
            }
            (AlertLevel::Warning, description) => {
                debug!("Ignoring warning alert: {}", description);
                Ok(())
            }
        }
    }

    /// Pop the next complete handshake message (header included) off the
    /// reassembly buffer.
    pub(crate) fn next_handshake_message(
        &mut self,
    ) -> Result<Option<(HandshakeType, Vec<u8>)>, Error> {
        if self.reassembly.len() < HANDSHAKE_HEADER_LEN {
            return Ok(None);
        }

        let typ = HandshakeType::from_u8(self.reassembly[0])
            .ok_or(Error::Alert(AlertDescription::UnexpectedMessage))?;
        // Unwrap is OK, there are at least 4 bytes.
        let (_, body_len) = be_u24::<_, nom::error::Error<&[u8]>>(&self.reassembly[1..4])
            .map_err(|_| Error::Alert(AlertDescription::DecodeError))?;

        let total = HANDSHAKE_HEADER_LEN + body_len as usize;
        if self.reassembly.len() < total {
            return Ok(None);
        }

        trace!("Handshake message {:?} ({} bytes)", typ, total);
        let message: Vec<u8> = self.reassembly.drain(..total).collect();
        Ok(Some((typ, message)))
    }

    /// Queue already-serialized handshake messages, splitting into
    /// records as needed.
    pub(crate) fn send_handshake_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for chunk in bytes.chunks(MAX_PLAINTEXT_LEN) {
            self.record_layer
                .write_record(ContentType::Handshake, chunk, &mut self.outgoing)?;
        }
        Ok(())
    }

    /// Send ChangeCipherSpec and switch our writes to the pending cipher.
    pub(crate) fn send_change_cipher_spec(&mut self) -> Result<(), Error> {
        self.record_layer
            .write_record(ContentType::ChangeCipherSpec, &[1], &mut self.outgoing)?;
        self.record_layer.enable_write()
    }

    fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) {
        let payload = [level.as_u8(), description.as_u8()];
        // An alert that cannot be framed has nowhere to go anyway.
        let _ = self
            .record_layer
            .write_record(ContentType::Alert, &payload, &mut self.outgoing);
    }

    /// Queue a fatal alert and mark the connection dead.
    pub(crate) fn fail_with_alert(&mut self, description: AlertDescription) {
        if !self.failed {
            debug!("Raising fatal alert: {}", description);
            self.send_alert(AlertLevel::Fatal, description);
            self.failed = true;
        }
    }

    /// Orderly close: queue close_notify once.
    pub(crate) fn close(&mut self) {
        if !self.close_sent && !self.failed {
            self.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify);
            self.close_sent = true;
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.failed || self.close_sent || self.close_received
    }

    pub(crate) fn close_received(&self) -> bool {
        self.close_received
    }

    /// Encrypt and queue at most one record of application data,
    /// returning how much of `data` it carried.
    pub(crate) fn write_application_data(&mut self, data: &[u8]) -> Result<usize, Error> {
        if !self.handshake_complete {
            return Err(Error::UnexpectedMessage(
                "application data before handshake completion",
            ));
        }
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let preview = self.record_layer.preview_output_record(data.len());
        let count = preview.content_limit.min(data.len());
        self.record_layer
            .write_record(ContentType::ApplicationData, &data[..count], &mut self.outgoing)?;
        Ok(count)
    }

    pub(crate) fn available_output(&self) -> usize {
        self.outgoing.len()
    }

    pub(crate) fn read_output(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.outgoing.len());
        for (d, s) in dst.iter_mut().zip(self.outgoing.drain(..count)) {
            *d = s;
        }
        count
    }

    pub(crate) fn available_input(&self) -> usize {
        self.incoming_app.len()
    }

    pub(crate) fn read_input(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.incoming_app.len());
        for (d, s) in dst.iter_mut().zip(self.incoming_app.drain(..count)) {
            *d = s;
        }
        count
    }
}

// ============================================================================
// Key schedule
// ============================================================================

const MASTER_SECRET_LEN: usize = 48;

/// Key block slices, in RFC 5246 section 6.3 order.
pub(crate) struct KeyBlock {
    pub client_mac: Vec<u8>,
    pub server_mac: Vec<u8>,
    pub client_key: Vec<u8>,
    pub server_key: Vec<u8>,
    pub client_iv: Vec<u8>,
    pub server_iv: Vec<u8>,
}

/// master_secret = PRF(pre_master, "master secret",
///                     client_random || server_random, 48)
pub(crate) fn compute_master_secret(
    provider: CryptoProvider,
    prf: PrfAlgorithm,
    pre_master: &[u8],
    client_random: &Random,
    server_random: &Random,
) -> Result<Secret, Error> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random.as_slice());
    seed.extend_from_slice(server_random.as_slice());

    Secret::from_slice(provider, pre_master).derive_using_prf(
        prf,
        "master secret",
        &seed,
        MASTER_SECRET_LEN,
    )
}

/// key_block = PRF(master, "key expansion",
///                 server_random || client_random, needed)
pub(crate) fn derive_key_block(
    prf: PrfAlgorithm,
    master: &Secret,
    client_random: &Random,
    server_random: &Random,
    bulk: BulkCipher,
) -> Result<KeyBlock, Error> {
    let mac_len = bulk.mac_key_len();
    let key_len = bulk.enc_key_len();
    let iv_len = bulk.fixed_iv_len();
    let total = 2 * (mac_len + key_len + iv_len);

    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random.as_slice());
    seed.extend_from_slice(client_random.as_slice());

    let block = master.derive_using_prf(prf, "key expansion", &seed, total)?;
    let bytes = block.as_bytes()?;

    let mut at = 0;
    let mut next = |len: usize| {
        let part = bytes[at..at + len].to_vec();
        at += len;
        part
    };

    Ok(KeyBlock {
        client_mac: next(mac_len),
        server_mac: next(mac_len),
        client_key: next(key_len),
        server_key: next(key_len),
        client_iv: next(iv_len),
        server_iv: next(iv_len),
    })
}

/// verify_data = PRF(master, label, transcript_hash, 12)
pub(crate) fn compute_verify_data(
    prf: PrfAlgorithm,
    master: &Secret,
    label: &str,
    transcript_hash: &[u8],
) -> Result<[u8; VERIFY_DATA_LEN], Error> {
    let derived = master.derive_using_prf(prf, label, transcript_hash, VERIFY_DATA_LEN)?;
    let bytes = derived.as_bytes()?;
    let mut verify_data = [0u8; VERIFY_DATA_LEN];
    verify_data.copy_from_slice(bytes);
    Ok(verify_data)
}

/// Install read/write protection from the key block. Which half is ours
/// depends on the role.
pub(crate) fn install_pending_ciphers(
    provider: &CryptoProvider,
    record_layer: &mut RecordLayer,
    suite: CipherSuite,
    keys: &KeyBlock,
    is_client: bool,
) -> Result<(), Error> {
    let factory = provider
        .find_cipher_suite(suite)
        .ok_or_else(|| Error::SecurityError(format!("no cipher for {:?}", suite)))?;
    let bulk = suite.bulk_cipher();

    let (write_key, write_mac, write_iv, read_key, read_mac, read_iv) = if is_client {
        (
            &keys.client_key,
            &keys.client_mac,
            &keys.client_iv,
            &keys.server_key,
            &keys.server_mac,
            &keys.server_iv,
        )
    } else {
        (
            &keys.server_key,
            &keys.server_mac,
            &keys.server_iv,
            &keys.client_key,
            &keys.client_mac,
            &keys.client_iv,
        )
    };

    let write_cipher = factory
        .create_cipher(write_key, write_mac)
        .map_err(Error::CryptoError)?;
    let read_cipher = factory
        .create_cipher(read_key, read_mac)
        .map_err(Error::CryptoError)?;

    record_layer.set_pending_write(write_cipher, bulk, write_iv);
    record_layer.set_pending_read(read_cipher, bulk, read_iv);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn randoms() -> (Random, Random) {
        (Random([1; 32]), Random([2; 32]))
    }

    #[test]
    fn master_secret_is_48_bytes_and_deterministic() {
        let provider = default_provider();
        let (cr, sr) = randoms();

        let a = compute_master_secret(provider, PrfAlgorithm::TlsPrfSha256, &[7; 32], &cr, &sr)
            .unwrap();
        let b = compute_master_secret(provider, PrfAlgorithm::TlsPrfSha256, &[7; 32], &cr, &sr)
            .unwrap();

        assert_eq!(a.as_bytes().unwrap().len(), 48);
        assert_eq!(a.as_bytes().unwrap(), b.as_bytes().unwrap());
    }

    #[test]
    fn key_block_layout() {
        let provider = default_provider();
        let (cr, sr) = randoms();
        let master = Secret::from_slice(provider, &[3; 48]);

        let keys = derive_key_block(
            PrfAlgorithm::TlsPrfSha256,
            &master,
            &cr,
            &sr,
            BulkCipher::Aes128Gcm,
        )
        .unwrap();

        assert!(keys.client_mac.is_empty());
        assert_eq!(keys.client_key.len(), 16);
        assert_eq!(keys.server_key.len(), 16);
        assert_eq!(keys.client_iv.len(), 4);
        assert_ne!(keys.client_key, keys.server_key);
    }

    #[test]
    fn reassembly_across_records() {
        let mut conn = Connection::new();

        // One handshake message split over two records.
        let mut message = vec![14u8, 0, 0, 4];
        message.extend_from_slice(&[1, 2, 3, 4]);

        let mut wire = Vec::new();
        conn.record_layer
            .write_record(ContentType::Handshake, &message[..3], &mut wire)
            .unwrap();
        let first_len = wire.len();
        conn.record_layer
            .write_record(ContentType::Handshake, &message[3..], &mut wire)
            .unwrap();

        let event = conn.offer_input(&wire[..first_len]).unwrap();
        assert!(matches!(event, InputEvent::Handshake { .. }));
        assert!(conn.next_handshake_message().unwrap().is_none());

        conn.offer_input(&wire[first_len..]).unwrap();
        let (typ, bytes) = conn.next_handshake_message().unwrap().unwrap();
        assert_eq!(typ, HandshakeType::ServerHelloDone);
        assert_eq!(bytes, message);
    }

    #[test]
    fn close_notify_is_echoed() {
        let mut conn = Connection::new();
        let mut wire = Vec::new();
        conn.record_layer
            .write_record(ContentType::Alert, &[1, 0], &mut wire)
            .unwrap();

        let mut peer = Connection::new();
        peer.offer_input(&wire).unwrap();
        assert!(peer.is_closed());
        assert!(peer.close_received());
        // The reply close_notify is queued.
        assert!(peer.available_output() > 0);
    }

    #[test]
    fn fatal_alert_fails_connection() {
        let mut conn = Connection::new();
        let mut wire = Vec::new();
        conn.record_layer
            .write_record(ContentType::Alert, &[2, 40], &mut wire)
            .unwrap();

        let mut peer = Connection::new();
        let err = peer.offer_input(&wire).unwrap_err();
        assert!(matches!(
            err,
            Error::PeerAlert(AlertDescription::HandshakeFailure)
        ));
        assert!(peer.offer_input(&wire).is_err());
    }
}
