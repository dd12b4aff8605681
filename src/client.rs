//! Client-side handshake.
//!
//! Full exchange:
//!
//! 1. Client sends ClientHello (offering a cached ticket if one exists)
//! 2. Server answers ServerHello, Certificate, ServerKeyExchange,
//!    ServerHelloDone
//! 3. Client sends ClientKeyExchange, ChangeCipherSpec, Finished
//! 4. Server answers NewSessionTicket (if issuing), ChangeCipherSpec,
//!    Finished
//!
//! Abbreviated (ticket accepted, detected by the server echoing the
//! session id the client sent as a resumption marker):
//!
//! 1. Client sends ClientHello with the ticket and a fresh session id
//! 2. Server echoes the session id in ServerHello, then sends
//!    ChangeCipherSpec, Finished
//! 3. Client answers ChangeCipherSpec, Finished

use log::{debug, trace};
use subtle::ConstantTimeEq;
use tinyvec::ArrayVec;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::connection::{
    compute_master_secret, compute_verify_data, derive_key_block, install_pending_ciphers,
    Connection, InputEvent,
};
use crate::crypto::provider::ActiveKeyExchange;
use crate::crypto::{CipherSuite, PrfAlgorithm, Secret};
use crate::error::{AlertDescription, Error};
use crate::message::{
    Body, ClientHello, ClientKeyExchange, Extension, ExtensionType, Finished, Handshake, Random,
    SessionId,
};
use crate::session::{CachedSession, SessionParams};
use crate::transcript::TranscriptHash;
use crate::types::{CompressionMethod, HandshakeType, NamedGroup, ProtocolVersion};

/// Extensions we put in our ClientHello. A ServerHello extension outside
/// this set is unexpected.
const OFFERED_EXTENSIONS: &[ExtensionType] = &[
    ExtensionType::SupportedGroups,
    ExtensionType::EcPointFormats,
    ExtensionType::SignatureAlgorithms,
    ExtensionType::SessionTicket,
];

/// Extensions some deployed servers send even when unsolicited. These are
/// tolerated but still checked for well-formedness.
const TOLERATED_EXTENSIONS: &[ExtensionType] = &[
    ExtensionType::SupportedGroups,
    ExtensionType::EcPointFormats,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    AwaitServerHello,
    AwaitCertificate,
    AwaitServerKeyExchange,
    AwaitServerHelloDone,
    AwaitServerCcs,
    AwaitServerFinished,
    Complete,
}

pub(crate) struct Client {
    config: Config,
    pub(crate) conn: Connection,
    state: ClientState,
    transcript: TranscriptHash,
    client_random: Random,
    server_random: Option<Random>,
    /// Resumption candidate from the cache, if any.
    offered_session: Option<CachedSession>,
    /// The resumption marker the server echoes back when it accepts the
    /// ticket. Empty when no session was offered.
    offered_session_id: SessionId,
    suite: Option<CipherSuite>,
    prf: Option<PrfAlgorithm>,
    kx: Option<Box<dyn ActiveKeyExchange>>,
    server_cert: Option<Vec<u8>>,
    server_kx_public: Option<Vec<u8>>,
    master: Option<Secret>,
    expect_ticket: bool,
    new_ticket: Option<Vec<u8>>,
    resumed: bool,
}

impl Client {
    pub(crate) fn new(
        config: Config,
        offered_session: Option<CachedSession>,
    ) -> Result<Client, Error> {
        let provider = *config.crypto_provider();
        let client_random =
            Random::generate(provider.secure_random).map_err(Error::CryptoError)?;

        let offered_session_id = if offered_session.is_some() {
            SessionId::generate(provider.secure_random).map_err(Error::CryptoError)?
        } else {
            SessionId::empty()
        };

        Ok(Client {
            transcript: TranscriptHash::new(provider),
            config,
            conn: Connection::new(),
            state: ClientState::AwaitServerHello,
            client_random,
            server_random: None,
            offered_session,
            offered_session_id,
            suite: None,
            prf: None,
            kx: None,
            server_cert: None,
            server_kx_public: None,
            master: None,
            expect_ticket: false,
            new_ticket: None,
            resumed: false,
        })
    }

    /// Queue the ClientHello.
    pub(crate) fn start(&mut self) -> Result<(), Error> {
        debug!(
            "Starting client handshake{}",
            if self.offered_session.is_some() {
                " (offering resumption ticket)"
            } else {
                ""
            }
        );

        // Extension payloads, owned for the duration of serialization.
        let supported_groups: Vec<u8> = {
            let mut v = vec![0x00, 0x02];
            NamedGroup::X25519.serialize(&mut v);
            v
        };
        let ec_point_formats = vec![0x01, 0x00]; // uncompressed only
        let signature_algorithms = {
            let mut v = vec![0x00, 0x02];
            crate::types::SignatureScheme::Ed25519.serialize(&mut v);
            v
        };
        let ticket: Vec<u8> = self
            .offered_session
            .as_ref()
            .map(|s| s.ticket.clone())
            .unwrap_or_default();

        let mut extensions: ArrayVec<[Extension<'_>; 16]> = ArrayVec::new();
        extensions.push(Extension::new(
            ExtensionType::SupportedGroups,
            &supported_groups,
        ));
        extensions.push(Extension::new(
            ExtensionType::EcPointFormats,
            &ec_point_formats,
        ));
        extensions.push(Extension::new(
            ExtensionType::SignatureAlgorithms,
            &signature_algorithms,
        ));
        extensions.push(Extension::new(ExtensionType::SessionTicket, &ticket));

        let mut cipher_suites = ArrayVec::new();
        for suite in self.config.cipher_suites() {
            cipher_suites.push(*suite);
        }

        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        let hello = ClientHello {
            client_version: ProtocolVersion::Tls1_2,
            random: self.client_random,
            session_id: self.offered_session_id,
            cipher_suites,
            compression_methods,
            extensions,
        };

        let mut bytes = Vec::new();
        Handshake::new(Body::ClientHello(hello)).serialize(&mut bytes);
        self.transcript.update(&bytes);
        self.conn.send_handshake_bytes(&bytes)
    }

    /// Feed one record; drives the state machine as far as the new bytes
    /// allow. Returns bytes consumed from `input`.
    pub(crate) fn offer_input(&mut self, input: &[u8]) -> Result<usize, Error> {
        let event = self.conn.offer_input(input)?;
        let consumed = event.consumed();

        match event {
            InputEvent::Handshake { .. } => {
                while let Some((typ, message)) = self.conn.next_handshake_message()? {
                    self.handle_message(typ, &message)?;
                }
            }
            InputEvent::ChangeCipherSpec { .. } => self.handle_change_cipher_spec()?,
            _ => {}
        }

        Ok(consumed)
    }

    pub(crate) fn is_handshake_complete(&self) -> bool {
        self.state == ClientState::Complete
    }

    /// The session to cache after a completed handshake, if the server
    /// issued a ticket.
    pub(crate) fn take_new_session(&mut self) -> Option<CachedSession> {
        let ticket = self.new_ticket.take()?;
        let master = self.master.as_ref()?.snapshot().ok()?;

        Some(CachedSession {
            params: SessionParams {
                protocol_version: ProtocolVersion::Tls1_2,
                cipher_suite: self.suite?,
                master_secret: Zeroizing::new(master),
            },
            ticket,
        })
    }

    pub(crate) fn destroy_secrets(&mut self) {
        if let Some(master) = &mut self.master {
            master.destroy();
        }
    }

    fn handle_change_cipher_spec(&mut self) -> Result<(), Error> {
        if self.state != ClientState::AwaitServerCcs {
            return Err(Error::UnexpectedMessage("ChangeCipherSpec"));
        }
        self.conn.record_layer.enable_read()?;
        self.state = ClientState::AwaitServerFinished;
        Ok(())
    }

    fn handle_message(&mut self, typ: HandshakeType, message: &[u8]) -> Result<(), Error> {
        trace!("Client handling {:?} in {:?}", typ, self.state);

        // The transcript covers every handshake message except
        // HelloRequest. The peer Finished is added only after the
        // expected verify_data is forked out.
        if typ != HandshakeType::Finished && typ != HandshakeType::HelloRequest {
            self.transcript.update(message);
        }

        let (_, handshake) = Handshake::parse(message)
            .map_err(|_| Error::ParseError("malformed handshake message"))?;

        match (self.state, handshake.body) {
            (ClientState::AwaitServerHello, Body::ServerHello(sh)) => {
                self.handle_server_hello(&sh)
            }
            (ClientState::AwaitCertificate, Body::Certificate(cert)) => {
                let end_entity = cert
                    .end_entity()
                    .ok_or(Error::Alert(AlertDescription::BadCertificate))?;
                self.server_cert = Some(end_entity.to_vec());
                self.state = ClientState::AwaitServerKeyExchange;
                Ok(())
            }
            (ClientState::AwaitServerKeyExchange, Body::ServerKeyExchange(ske)) => {
                self.handle_server_key_exchange(
                    ske.named_group,
                    ske.public_key,
                    ske.scheme,
                    ske.signature,
                )
            }
            (ClientState::AwaitServerHelloDone, Body::ServerHelloDone) => {
                self.send_client_flight()
            }
            (ClientState::AwaitServerCcs, Body::NewSessionTicket(nst)) => {
                if !self.expect_ticket {
                    return Err(Error::UnexpectedMessage("NewSessionTicket not negotiated"));
                }
                if !nst.ticket.is_empty() {
                    self.new_ticket = Some(nst.ticket.to_vec());
                }
                Ok(())
            }
            (ClientState::AwaitServerFinished, Body::Finished(finished)) => {
                self.handle_server_finished(&finished, message)
            }
            (ClientState::Complete, Body::HelloRequest) => {
                Err(Error::RenegotiationUnsupported)
            }
            (_, body) => {
                debug!(
                    "Unexpected {:?} in client state {:?}",
                    body.handshake_type(),
                    self.state
                );
                Err(Error::Alert(AlertDescription::UnexpectedMessage))
            }
        }
    }

    fn handle_server_hello(&mut self, sh: &crate::message::ServerHello<'_>) -> Result<(), Error> {
        if sh.server_version != ProtocolVersion::Tls1_2 {
            return Err(Error::SecurityError(format!(
                "unsupported server version {}",
                sh.server_version
            )));
        }
        if sh.compression_method != CompressionMethod::Null {
            return Err(Error::SecurityError(
                "server selected non-null compression".to_string(),
            ));
        }
        if !self.config.cipher_suites().contains(&sh.cipher_suite) {
            return Err(Error::SecurityError(format!(
                "server selected suite we did not offer: {:?}",
                sh.cipher_suite
            )));
        }

        self.validate_server_extensions(sh)?;
        self.expect_ticket = sh.find_extension(ExtensionType::SessionTicket).is_some();

        self.server_random = Some(sh.random);
        self.suite = Some(sh.cipher_suite);

        let prf = PrfAlgorithm::for_version(sh.server_version, sh.cipher_suite.prf_hash());
        self.prf = Some(prf);
        self.transcript.notify_prf_determined(prf)?;
        self.transcript.seal_hash_algorithms();

        // The server accepts resumption by echoing our marker id.
        let resumed = self.offered_session.is_some()
            && !sh.session_id.is_empty()
            && sh.session_id == self.offered_session_id;

        if resumed {
            let session = self.offered_session.as_ref().unwrap();
            if sh.cipher_suite != session.params.cipher_suite {
                return Err(Error::SecurityError(
                    "server resumed with a different cipher suite".to_string(),
                ));
            }

            debug!("Server accepted session resumption");
            let provider = *self.config.crypto_provider();
            let master = Secret::from_slice(provider, &session.params.master_secret);
            self.install_keys(&master)?;
            self.master = Some(master);
            self.resumed = true;
            self.state = ClientState::AwaitServerCcs;
        } else {
            self.state = ClientState::AwaitCertificate;
        }
        Ok(())
    }

    fn validate_server_extensions(
        &self,
        sh: &crate::message::ServerHello<'_>,
    ) -> Result<(), Error> {
        for ext in &sh.extensions {
            let offered = OFFERED_EXTENSIONS.contains(&ext.extension_type);
            let tolerated = TOLERATED_EXTENSIONS.contains(&ext.extension_type);
            if !offered && !tolerated {
                return Err(Error::SecurityError(format!(
                    "server sent extension we did not offer: {:?}",
                    ext.extension_type
                )));
            }

            // Well-formedness for the list-shaped ones.
            match ext.extension_type {
                ExtensionType::SupportedGroups => {
                    if ext.extension_data.len() < 2 || ext.extension_data.len() % 2 != 0 {
                        return Err(Error::ParseError("malformed supported_groups"));
                    }
                }
                ExtensionType::EcPointFormats => {
                    if ext.extension_data.is_empty() {
                        return Err(Error::ParseError("malformed ec_point_formats"));
                    }
                }
                ExtensionType::SessionTicket => {
                    if !ext.extension_data.is_empty() {
                        return Err(Error::ParseError("session_ticket extension must be empty"));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_server_key_exchange(
        &mut self,
        group: NamedGroup,
        public_key: &[u8],
        scheme: crate::types::SignatureScheme,
        signature: &[u8],
    ) -> Result<(), Error> {
        let provider = self.config.crypto_provider();
        let cert = self
            .server_cert
            .as_deref()
            .ok_or(Error::UnexpectedMessage("ServerKeyExchange before Certificate"))?;

        // The signature covers both randoms and the named-curve params.
        let mut signed = Vec::new();
        signed.extend_from_slice(self.client_random.as_slice());
        // Unwrap is OK, server random is set by ServerHello.
        signed.extend_from_slice(self.server_random.as_ref().unwrap().as_slice());
        let params = crate::message::ServerKeyExchange {
            named_group: group,
            public_key,
            scheme,
            signature,
        };
        params.serialize_params(&mut signed);

        provider
            .signature_verifier
            .verify_signature(cert, &signed, signature, scheme)
            .map_err(Error::CertificateError)?;

        let kx_group = provider
            .find_kx_group(group)
            .ok_or_else(|| Error::SecurityError(format!("unsupported group {:?}", group)))?;
        self.kx = Some(kx_group.start_exchange().map_err(Error::CryptoError)?);
        self.server_kx_public = Some(public_key.to_vec());

        self.state = ClientState::AwaitServerHelloDone;
        Ok(())
    }

    /// ClientKeyExchange, ChangeCipherSpec, Finished.
    fn send_client_flight(&mut self) -> Result<(), Error> {
        let kx = self
            .kx
            .take()
            .ok_or(Error::UnexpectedMessage("ServerHelloDone before ServerKeyExchange"))?;
        let server_public = self
            .server_kx_public
            .take()
            .ok_or(Error::UnexpectedMessage("missing server key share"))?;

        let public_key = kx.pub_key().to_vec();
        self.send_handshake(Body::ClientKeyExchange(ClientKeyExchange {
            public_key: &public_key,
        }))?;

        let pre_master = Zeroizing::new(
            kx.complete(&server_public).map_err(Error::CryptoError)?,
        );

        let provider = *self.config.crypto_provider();
        // Unwrap is OK, set by ServerHello.
        let prf = self.prf.unwrap();
        let master = compute_master_secret(
            provider,
            prf,
            &pre_master,
            &self.client_random,
            self.server_random.as_ref().unwrap(),
        )?;

        self.install_keys(&master)?;
        self.master = Some(master);

        self.conn.send_change_cipher_spec()?;
        self.send_finished("client finished")?;

        self.state = ClientState::AwaitServerCcs;
        Ok(())
    }

    fn handle_server_finished(
        &mut self,
        finished: &Finished,
        message: &[u8],
    ) -> Result<(), Error> {
        // Unwraps are OK, both set by ServerHello.
        let prf = self.prf.unwrap();
        let master = self.master.as_ref().unwrap();

        let transcript_hash = self.transcript.fork_prf_hash(prf)?.finalize();
        let expected = compute_verify_data(prf, master, "server finished", &transcript_hash)?;

        if !bool::from(expected.ct_eq(&finished.verify_data)) {
            return Err(Error::Alert(AlertDescription::DecryptError));
        }
        self.transcript.update(message);

        if self.resumed {
            // Abbreviated handshake: our flight comes second.
            self.conn.send_change_cipher_spec()?;
            self.send_finished("client finished")?;
        }

        debug!("Client handshake complete (resumed: {})", self.resumed);
        self.conn.handshake_complete = true;
        self.state = ClientState::Complete;
        Ok(())
    }

    fn send_finished(&mut self, label: &str) -> Result<(), Error> {
        // Unwraps are OK, both set by ServerHello.
        let prf = self.prf.unwrap();
        let master = self.master.as_ref().unwrap();

        let transcript_hash = self.transcript.fork_prf_hash(prf)?.finalize();
        let verify_data = compute_verify_data(prf, master, label, &transcript_hash)?;

        self.send_handshake(Body::Finished(Finished { verify_data }))
    }

    fn send_handshake(&mut self, body: Body<'_>) -> Result<(), Error> {
        let mut bytes = Vec::new();
        Handshake::new(body).serialize(&mut bytes);
        self.transcript.update(&bytes);
        self.conn.send_handshake_bytes(&bytes)
    }

    fn install_keys(&mut self, master: &Secret) -> Result<(), Error> {
        // Unwraps are OK, set by ServerHello before any key install.
        let prf = self.prf.unwrap();
        let suite = self.suite.unwrap();
        let provider = *self.config.crypto_provider();

        let keys = derive_key_block(
            prf,
            master,
            &self.client_random,
            self.server_random.as_ref().unwrap(),
            suite.bulk_cipher(),
        )?;

        install_pending_ciphers(&provider, &mut self.conn.record_layer, suite, &keys, true)
    }
}
