//! Server-side handshake.
//!
//! Mirror image of [`crate::client`]. The server is stateless about past
//! sessions: resumption state lives entirely inside the encrypted ticket
//! the client presents (RFC 5077), sealed by the config's [`Ticketer`].

use std::sync::Arc;

use log::{debug, trace};
use subtle::ConstantTimeEq;
use tinyvec::ArrayVec;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::connection::{
    compute_master_secret, compute_verify_data, derive_key_block, install_pending_ciphers,
    Connection, InputEvent,
};
use crate::crypto::provider::{ActiveKeyExchange, SigningKey};
use crate::crypto::{CipherSuite, PrfAlgorithm, Secret};
use crate::error::{AlertDescription, Error};
use crate::message::{
    Body, Certificate, Extension, ExtensionType, Finished, Handshake, NewSessionTicket, Random,
    ServerHello, ServerKeyExchange, SessionId,
};
use crate::session::{SessionParams, Ticketer};
use crate::transcript::TranscriptHash;
use crate::types::{CompressionMethod, HandshakeType, NamedGroup, ProtocolVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    AwaitClientHello,
    AwaitClientKeyExchange,
    AwaitCcs,
    AwaitFinished,
    Complete,
}

pub(crate) struct Server {
    config: Config,
    pub(crate) conn: Connection,
    state: ServerState,
    transcript: TranscriptHash,
    signer: Box<dyn SigningKey>,
    ticketer: Option<Arc<Ticketer>>,
    client_random: Option<Random>,
    server_random: Option<Random>,
    suite: Option<CipherSuite>,
    prf: Option<PrfAlgorithm>,
    kx: Option<Box<dyn ActiveKeyExchange>>,
    master: Option<Secret>,
    /// True when the client offered the session_ticket extension and we
    /// are configured to issue one.
    will_issue_ticket: bool,
    resumed: bool,
}

impl Server {
    pub(crate) fn new(config: Config) -> Result<Server, Error> {
        let identity = config
            .identity()
            .ok_or_else(|| Error::ConfigError("server requires an identity".into()))?
            .clone();
        let provider = *config.crypto_provider();

        let signer = provider
            .key_provider
            .load_private_key(&identity.key)
            .map_err(Error::ConfigError)?;
        let ticketer = config.ticketer().cloned();

        Ok(Server {
            transcript: TranscriptHash::new(provider),
            config,
            conn: Connection::new(),
            state: ServerState::AwaitClientHello,
            signer,
            ticketer,
            client_random: None,
            server_random: None,
            suite: None,
            prf: None,
            kx: None,
            master: None,
            will_issue_ticket: false,
            resumed: false,
        })
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
        self.state == ServerState::Complete
    }

    pub(crate) fn destroy_secrets(&mut self) {
        if let Some(master) = &mut self.master {
            master.destroy();
        }
    }

    fn handle_change_cipher_spec(&mut self) -> Result<(), Error> {
        if self.state != ServerState::AwaitCcs {
            return Err(Error::UnexpectedMessage("ChangeCipherSpec"));
        }
        self.conn.record_layer.enable_read()?;
        self.state = ServerState::AwaitFinished;
        Ok(())
    }

    fn handle_message(&mut self, typ: HandshakeType, message: &[u8]) -> Result<(), Error> {
        trace!("Server handling {:?} in {:?}", typ, self.state);

        // Peer Finished enters the transcript only after verification
        // forked out the expected value.
        if typ != HandshakeType::Finished {
            self.transcript.update(message);
        }

        let (_, handshake) = Handshake::parse(message)
            .map_err(|_| Error::ParseError("malformed handshake message"))?;

        match (self.state, handshake.body) {
            (ServerState::AwaitClientHello, Body::ClientHello(ch)) => {
                self.handle_client_hello(&ch)
            }
            (ServerState::AwaitClientKeyExchange, Body::ClientKeyExchange(cke)) => {
                self.handle_client_key_exchange(cke.public_key)
            }
            (ServerState::AwaitFinished, Body::Finished(finished)) => {
                self.handle_client_finished(&finished, message)
            }
            (ServerState::Complete, Body::ClientHello(_)) => Err(Error::RenegotiationUnsupported),
            (_, body) => {
                debug!(
                    "Unexpected {:?} in server state {:?}",
                    body.handshake_type(),
                    self.state
                );
                Err(Error::Alert(AlertDescription::UnexpectedMessage))
            }
        }
    }

    fn handle_client_hello(&mut self, ch: &crate::message::ClientHello<'_>) -> Result<(), Error> {
        if ch.client_version < ProtocolVersion::Tls1_2 {
            return Err(Error::SecurityError(format!(
                "client version {} too old",
                ch.client_version
            )));
        }
        if !ch.compression_methods.contains(&CompressionMethod::Null) {
            return Err(Error::SecurityError(
                "client does not offer null compression".to_string(),
            ));
        }
        if let Some(groups) = ch.find_extension(ExtensionType::SupportedGroups) {
            if !supported_groups_contains(groups.extension_data, NamedGroup::X25519) {
                return Err(Error::Alert(AlertDescription::HandshakeFailure));
            }
        }

        // First suite in the client's order that we accept.
        let suite = *ch
            .cipher_suites
            .iter()
            .find(|s| self.config.cipher_suites().contains(*s))
            .ok_or(Error::Alert(AlertDescription::HandshakeFailure))?;

        let provider = *self.config.crypto_provider();
        let server_random =
            Random::generate(provider.secure_random).map_err(Error::CryptoError)?;

        self.client_random = Some(ch.random);
        self.server_random = Some(server_random);
        self.suite = Some(suite);

        let prf = PrfAlgorithm::for_version(ProtocolVersion::Tls1_2, suite.prf_hash());
        self.prf = Some(prf);
        self.transcript.notify_prf_determined(prf)?;
        self.transcript.seal_hash_algorithms();

        let ticket_ext = ch.find_extension(ExtensionType::SessionTicket);
        self.will_issue_ticket = ticket_ext.is_some() && self.ticketer.is_some();

        // A presented ticket resumes only if it unseals, negotiation
        // still lands on the ticket's suite, and the client supplied a
        // session id for us to echo as the acceptance signal.
        let resumable = ticket_ext
            .filter(|ext| !ext.extension_data.is_empty() && !ch.session_id.is_empty())
            .and_then(|ext| self.ticketer.as_ref()?.unseal(ext.extension_data))
            .filter(|params| params.cipher_suite == suite)
            .filter(|params| params.protocol_version == ProtocolVersion::Tls1_2);

        if let Some(params) = resumable {
            self.resume_session(ch.session_id, &params)
        } else {
            self.start_full_handshake(suite)
        }
    }

    /// ServerHello, Certificate, ServerKeyExchange, ServerHelloDone.
    fn start_full_handshake(&mut self, suite: CipherSuite) -> Result<(), Error> {
        debug!("Server starting full handshake with {:?}", suite);
        let provider = *self.config.crypto_provider();

        self.send_server_hello(SessionId::empty(), suite)?;

        // Unwrap is OK, Server::new rejects configs without an identity.
        let identity = self.config.identity().unwrap().clone();
        let mut certificate_list = ArrayVec::new();
        for cert in &identity.cert_chain {
            certificate_list.push(cert.as_slice());
        }
        self.send_handshake(Body::Certificate(Certificate { certificate_list }))?;

        let kx_group = provider
            .find_kx_group(NamedGroup::X25519)
            .ok_or_else(|| Error::CryptoError("provider lacks x25519".to_string()))?;
        let kx = kx_group.start_exchange().map_err(Error::CryptoError)?;
        let public_key = kx.pub_key().to_vec();

        // Sign both randoms and the curve parameters.
        let mut signed = Vec::new();
        signed.extend_from_slice(self.client_random.as_ref().unwrap().as_slice());
        signed.extend_from_slice(self.server_random.as_ref().unwrap().as_slice());
        let params = ServerKeyExchange {
            named_group: NamedGroup::X25519,
            public_key: &public_key,
            scheme: self.signer.scheme(),
            signature: &[],
        };
        params.serialize_params(&mut signed);
        let signature = self.signer.sign(&signed).map_err(Error::CryptoError)?;

        self.send_handshake(Body::ServerKeyExchange(ServerKeyExchange {
            named_group: NamedGroup::X25519,
            public_key: &public_key,
            scheme: self.signer.scheme(),
            signature: &signature,
        }))?;
        self.send_handshake(Body::ServerHelloDone)?;

        self.kx = Some(kx);
        self.state = ServerState::AwaitClientKeyExchange;
        Ok(())
    }

    /// Abbreviated handshake: echo the client's session id, rebuild keys
    /// from the ticket, and send our Finished flight first.
    fn resume_session(
        &mut self,
        session_id: SessionId,
        params: &SessionParams,
    ) -> Result<(), Error> {
        debug!("Server resuming session with {:?}", params.cipher_suite);
        let provider = *self.config.crypto_provider();

        self.send_server_hello(session_id, params.cipher_suite)?;

        let master = Secret::from_slice(provider, &params.master_secret);
        self.install_keys(&master)?;
        self.master = Some(master);
        self.resumed = true;

        if self.will_issue_ticket {
            self.send_new_session_ticket()?;
        }
        self.conn.send_change_cipher_spec()?;
        self.send_finished("server finished")?;

        self.state = ServerState::AwaitCcs;
        Ok(())
    }

    fn send_server_hello(
        &mut self,
        session_id: SessionId,
        suite: CipherSuite,
    ) -> Result<(), Error> {
        let mut extensions: ArrayVec<[Extension<'_>; 16]> = ArrayVec::new();
        if self.will_issue_ticket {
            extensions.push(Extension::new(ExtensionType::SessionTicket, &[]));
        }

        let hello = ServerHello {
            server_version: ProtocolVersion::Tls1_2,
            // Unwrap is OK, set in handle_client_hello.
            random: *self.server_random.as_ref().unwrap(),
            session_id,
            cipher_suite: suite,
            compression_method: CompressionMethod::Null,
            extensions,
        };

        let mut bytes = Vec::new();
        Handshake::new(Body::ServerHello(hello)).serialize(&mut bytes);
        self.transcript.update(&bytes);
        self.conn.send_handshake_bytes(&bytes)
    }

    fn handle_client_key_exchange(&mut self, public_key: &[u8]) -> Result<(), Error> {
        let kx = self
            .kx
            .take()
            .ok_or(Error::UnexpectedMessage("ClientKeyExchange"))?;
        let pre_master = Zeroizing::new(
            kx.complete(public_key).map_err(Error::CryptoError)?,
        );

        let provider = *self.config.crypto_provider();
        // Unwraps are OK, all set in handle_client_hello.
        let prf = self.prf.unwrap();
        let master = compute_master_secret(
            provider,
            prf,
            &pre_master,
            self.client_random.as_ref().unwrap(),
            self.server_random.as_ref().unwrap(),
        )?;

        self.install_keys(&master)?;
        self.master = Some(master);

        self.state = ServerState::AwaitCcs;
        Ok(())
    }

    fn handle_client_finished(
        &mut self,
        finished: &Finished,
        message: &[u8],
    ) -> Result<(), Error> {
        // Unwraps are OK, set in handle_client_hello.
        let prf = self.prf.unwrap();
        let master = self.master.as_ref().unwrap();

        let transcript_hash = self.transcript.fork_prf_hash(prf)?.finalize();
        let expected = compute_verify_data(prf, master, "client finished", &transcript_hash)?;

        if !bool::from(expected.ct_eq(&finished.verify_data)) {
            return Err(Error::Alert(AlertDescription::DecryptError));
        }
        self.transcript.update(message);

        if !self.resumed {
            // Full handshake: our flight comes second.
            if self.will_issue_ticket {
                self.send_new_session_ticket()?;
            }
            self.conn.send_change_cipher_spec()?;
            self.send_finished("server finished")?;
        }

        debug!("Server handshake complete (resumed: {})", self.resumed);
        self.conn.handshake_complete = true;
        self.state = ServerState::Complete;
        Ok(())
    }

    fn send_new_session_ticket(&mut self) -> Result<(), Error> {
        // Unwraps are OK, will_issue_ticket implies a ticketer and the
        // master is installed before any ticket issue.
        let master = self.master.as_ref().unwrap().snapshot()?;
        let params = SessionParams {
            protocol_version: ProtocolVersion::Tls1_2,
            cipher_suite: self.suite.unwrap(),
            master_secret: Zeroizing::new(master),
        };
        let ticketer = self.ticketer.as_ref().unwrap();
        let ticket = ticketer.seal(&params).map_err(Error::CryptoError)?;

        self.send_handshake(Body::NewSessionTicket(NewSessionTicket {
            lifetime_hint_secs: ticketer.lifetime_hint_secs,
            ticket: &ticket,
        }))
    }

    fn send_finished(&mut self, label: &str) -> Result<(), Error> {
        // Unwraps are OK, set in handle_client_hello.
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
        // Unwraps are OK, set in handle_client_hello.
        let prf = self.prf.unwrap();
        let suite = self.suite.unwrap();
        let provider = *self.config.crypto_provider();

        let keys = derive_key_block(
            prf,
            master,
            self.client_random.as_ref().unwrap(),
            self.server_random.as_ref().unwrap(),
            suite.bulk_cipher(),
        )?;

        install_pending_ciphers(&provider, &mut self.conn.record_layer, suite, &keys, false)
    }
}

fn supported_groups_contains(data: &[u8], group: NamedGroup) -> bool {
    if data.len() < 2 {
        return false;
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let Some(list) = data.get(2..2 + list_len) else {
        return false;
    };
    list.chunks_exact(2)
        .any(|c| u16::from_be_bytes([c[0], c[1]]) == group.as_u16())
}
