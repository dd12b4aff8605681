//! Non-blocking engine surface.
//!
//! [`TlsEngine`] moves bytes between two pairs of buffers the caller
//! owns: `wrap` encrypts outbound application data into wire records,
//! `unwrap` decrypts one wire record into inbound application data. All
//! transport I/O stays with the caller; the engine never blocks.
//!
//! Capacity problems are statuses, not errors. `BufferUnderflow` means
//! feed more wire bytes, `BufferOverflow` means retry with more room in
//! `dst`. Either way nothing was consumed.

use log::{debug, trace};

use crate::client::Client;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{AlertDescription, Error};
use crate::server::Server;
use crate::types::Role;

/// Overall result status of a `wrap` or `unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The call made normal progress.
    Ok,
    /// The connection is closed in the relevant direction.
    Closed,
    /// `src` does not yet hold a complete record. Feed more bytes.
    BufferUnderflow,
    /// `dst` is too small for what this call would produce. Retry with
    /// a larger buffer.
    BufferOverflow,
}

/// What the handshake needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake in progress.
    NotHandshaking,
    /// The engine has records to emit. Call `wrap`.
    NeedWrap,
    /// The engine needs peer records. Call `unwrap`.
    NeedUnwrap,
    /// The handshake just completed. Reported exactly once, by the call
    /// that finished it.
    Finished,
}

/// Outcome of one `wrap` or `unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineResult {
    pub status: Status,
    pub handshake_status: HandshakeStatus,
    /// Bytes read from `src`.
    pub bytes_consumed: usize,
    /// Bytes written to `dst`.
    pub bytes_produced: usize,
}

impl EngineResult {
    fn new(
        status: Status,
        handshake_status: HandshakeStatus,
        bytes_consumed: usize,
        bytes_produced: usize,
    ) -> Self {
        EngineResult {
            status,
            handshake_status,
            bytes_consumed,
            bytes_produced,
        }
    }
}

enum Endpoint {
    Client(Client),
    Server(Server),
}

impl Endpoint {
    fn conn(&mut self) -> &mut Connection {
        match self {
            Endpoint::Client(c) => &mut c.conn,
            Endpoint::Server(s) => &mut s.conn,
        }
    }

    fn offer_input(&mut self, input: &[u8]) -> Result<usize, Error> {
        match self {
            Endpoint::Client(c) => c.offer_input(input),
            Endpoint::Server(s) => s.offer_input(input),
        }
    }

    fn is_handshake_complete(&self) -> bool {
        match self {
            Endpoint::Client(c) => c.is_handshake_complete(),
            Endpoint::Server(s) => s.is_handshake_complete(),
        }
    }

    fn destroy_secrets(&mut self) {
        match self {
            Endpoint::Client(c) => c.destroy_secrets(),
            Endpoint::Server(s) => s.destroy_secrets(),
        }
    }
}

enum Phase {
    /// No handshake has begun. The role can still change.
    Idle,
    Active(Endpoint),
    /// Closed before any handshake. Every call reports `Closed`.
    ClosedEarly,
}

enum RecordOutcome {
    Underflow,
    Overflow,
    Consumed(usize),
}

/// A single non-blocking TLS connection.
///
/// `host` and `port` identify the peer for session resumption; they are
/// not used for any I/O.
pub struct TlsEngine {
    config: Config,
    host: String,
    port: u16,
    client_mode: bool,
    phase: Phase,
    handshake_status: HandshakeStatus,
    /// Failure noticed while the caller was mid-`unwrap` loop, re-raised
    /// by the next `wrap` so the alert record can still be flushed.
    pending_error: Option<Error>,
    finished_reported: bool,
}

impl TlsEngine {
    /// Create an engine in client mode.
    pub fn new(config: Config, host: &str, port: u16) -> Self {
        TlsEngine {
            config,
            host: host.to_string(),
            port,
            client_mode: true,
            phase: Phase::Idle,
            handshake_status: HandshakeStatus::NotHandshaking,
            pending_error: None,
            finished_reported: false,
        }
    }

    /// Switch between client and server role. Only possible before the
    /// initial handshake has begun.
    pub fn set_client_mode(&mut self, client_mode: bool) -> Result<(), Error> {
        match self.phase {
            Phase::Idle => {
                self.client_mode = client_mode;
                Ok(())
            }
            _ if client_mode == self.client_mode => Ok(()),
            _ => Err(Error::ModeChangeAfterHandshake),
        }
    }

    pub fn is_client_mode(&self) -> bool {
        self.client_mode
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.handshake_status
    }

    pub fn is_handshake_complete(&self) -> bool {
        match &self.phase {
            Phase::Active(endpoint) => endpoint.is_handshake_complete(),
            _ => false,
        }
    }

    /// Explicitly start the handshake. `wrap`/`unwrap` do this implicitly
    /// on first use; calling it again after that is renegotiation, which
    /// is not supported.
    pub fn begin_handshake(&mut self) -> Result<(), Error> {
        match self.phase {
            Phase::Idle => self.start_handshake(),
            Phase::Active(_) => Err(Error::RenegotiationUnsupported),
            Phase::ClosedEarly => Err(Error::ConnectionClosed),
        }
    }

    fn start_handshake(&mut self) -> Result<(), Error> {
        let role = if self.client_mode {
            Role::Client
        } else {
            Role::Server
        };
        debug!("Beginning {} handshake for {}:{}", role, self.host, self.port);

        if self.client_mode {
            let offered = self
                .config
                .resumption_cache()
                .and_then(|cache| cache.lookup(&self.host, self.port));
            let mut client = Client::new(self.config.clone(), offered)?;
            client.start()?;
            self.phase = Phase::Active(Endpoint::Client(client));
            self.handshake_status = HandshakeStatus::NeedWrap;
        } else {
            let server = Server::new(self.config.clone())?;
            self.phase = Phase::Active(Endpoint::Server(server));
            self.handshake_status = HandshakeStatus::NeedUnwrap;
        }
        Ok(())
    }

    /// Encrypt outbound data and drain queued wire bytes into `dst`.
    ///
    /// While handshaking, `src` is ignored and `dst` receives handshake
    /// records. Once established, at most one record of `src` is encoded
    /// per call.
    pub fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, Error> {
        // A failure deferred from `unwrap` surfaces here, once. The
        // caller is expected to wrap again to flush the alert record.
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }

        if matches!(self.phase, Phase::Idle) {
            self.start_handshake()?;
        }

        let started_in_need_wrap = self.handshake_status == HandshakeStatus::NeedWrap;
        let not_handshaking = self.handshake_status == HandshakeStatus::NotHandshaking;

        let Phase::Active(endpoint) = &mut self.phase else {
            return Ok(EngineResult::new(
                Status::Closed,
                HandshakeStatus::NotHandshaking,
                0,
                0,
            ));
        };
        let complete = endpoint.is_handshake_complete();
        let conn = endpoint.conn();

        let mut consumed = 0;
        let mut overflow = false;

        // Application data goes out only when no handshake or alert
        // traffic is waiting.
        if not_handshaking && !conn.is_closed() && conn.available_output() == 0 && !src.is_empty()
        {
            let preview = conn.record_layer.preview_output_record(src.len());
            if dst.len() < preview.record_size {
                overflow = true;
            } else {
                consumed = conn.write_application_data(src)?;
            }
        }

        let produced = conn.read_output(dst);
        if produced == 0 && conn.available_output() > 0 {
            overflow = true;
        }

        let output_pending = conn.available_output() > 0;
        let closed = conn.is_closed();

        if overflow && consumed == 0 && produced == 0 {
            return Ok(EngineResult::new(
                Status::BufferOverflow,
                self.handshake_status,
                0,
                0,
            ));
        }

        let reported = if started_in_need_wrap {
            self.advance_handshake_status(output_pending, complete, closed)
        } else {
            self.handshake_status
        };

        let status = if closed && !output_pending {
            Status::Closed
        } else {
            Status::Ok
        };
        trace!(
            "wrap: {:?}/{:?} consumed {} produced {}",
            status,
            reported,
            consumed,
            produced
        );
        Ok(EngineResult::new(status, reported, consumed, produced))
    }

    /// Decrypt at most one record from `src` and drain plaintext into
    /// `dst`. Handshake records are consumed internally and advance the
    /// handshake instead of producing output.
    pub fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, Error> {
        if matches!(self.phase, Phase::Idle) {
            self.start_handshake()?;
        }

        let started_in_need_unwrap = self.handshake_status == HandshakeStatus::NeedUnwrap;

        {
            let Phase::Active(endpoint) = &mut self.phase else {
                return Ok(EngineResult::new(
                    Status::Closed,
                    HandshakeStatus::NotHandshaking,
                    0,
                    0,
                ));
            };
            if endpoint.conn().close_received() {
                return Ok(EngineResult::new(Status::Closed, self.handshake_status, 0, 0));
            }
        }

        let consumed = match self.process_record(src, dst.len()) {
            Ok(RecordOutcome::Underflow) => {
                return Ok(EngineResult::new(
                    Status::BufferUnderflow,
                    self.handshake_status,
                    0,
                    0,
                ));
            }
            Ok(RecordOutcome::Overflow) => {
                return Ok(EngineResult::new(
                    Status::BufferOverflow,
                    self.handshake_status,
                    0,
                    0,
                ));
            }
            Ok(RecordOutcome::Consumed(n)) => n,
            Err(error) => return self.fail_unwrap(error, started_in_need_unwrap),
        };

        self.store_session_on_completion();

        let (produced, leftover, complete, output_pending, close_received) = {
            let Phase::Active(endpoint) = &mut self.phase else {
                return Ok(EngineResult::new(Status::Closed, self.handshake_status, 0, 0));
            };
            let complete = endpoint.is_handshake_complete();
            let conn = endpoint.conn();
            let produced = conn.read_input(dst);
            let leftover = conn.available_input();
            let output_pending = conn.available_output() > 0;
            let close_received = conn.close_received();
            if close_received {
                // The session is over; only the close_notify echo remains
                // to be flushed.
                endpoint.destroy_secrets();
            }
            (produced, leftover, complete, output_pending, close_received)
        };

        if leftover > 0 {
            return self.fail_unwrap(
                Error::Alert(AlertDescription::RecordOverflow),
                started_in_need_unwrap,
            );
        }

        let reported = if started_in_need_unwrap {
            self.advance_handshake_status(output_pending, complete, close_received)
        } else {
            self.handshake_status
        };

        let status = if close_received { Status::Closed } else { Status::Ok };
        trace!(
            "unwrap: {:?}/{:?} consumed {} produced {}",
            status,
            reported,
            consumed,
            produced
        );
        Ok(EngineResult::new(status, reported, consumed, produced))
    }

    /// Size up and hand exactly one record to the endpoint.
    fn process_record(&mut self, src: &[u8], dst_len: usize) -> Result<RecordOutcome, Error> {
        let Phase::Active(endpoint) = &mut self.phase else {
            return Ok(RecordOutcome::Consumed(0));
        };

        let preview = match endpoint.conn().record_layer.preview_input_record(src)? {
            None => return Ok(RecordOutcome::Underflow),
            Some(p) => p,
        };
        if src.len() < preview.record_size {
            return Ok(RecordOutcome::Underflow);
        }
        if dst_len < preview.content_limit {
            return Ok(RecordOutcome::Overflow);
        }

        let consumed = endpoint.offer_input(&src[..preview.record_size])?;
        Ok(RecordOutcome::Consumed(consumed))
    }

    /// Unified failure path for `unwrap`.
    ///
    /// A failure while the caller is still feeding us records (status
    /// `NeedUnwrap`) is deferred: the alert is queued, the status flips
    /// to `NeedWrap` so the caller flushes it, and the error itself is
    /// raised by the next `wrap`.
    fn fail_unwrap(
        &mut self,
        error: Error,
        started_in_need_unwrap: bool,
    ) -> Result<EngineResult, Error> {
        debug!("unwrap failed: {}", error);

        if self.client_mode {
            if let Some(cache) = self.config.resumption_cache() {
                cache.remove(&self.host, self.port);
            }
        }

        if let Phase::Active(endpoint) = &mut self.phase {
            let description = error
                .alert_description()
                .unwrap_or(AlertDescription::InternalError);
            endpoint.conn().fail_with_alert(description);
            endpoint.destroy_secrets();
        }

        if started_in_need_unwrap {
            self.pending_error = Some(error);
            self.handshake_status = HandshakeStatus::NeedWrap;
            Ok(EngineResult::new(Status::Ok, HandshakeStatus::NeedWrap, 0, 0))
        } else {
            Err(error)
        }
    }

    fn store_session_on_completion(&mut self) {
        let Phase::Active(Endpoint::Client(client)) = &mut self.phase else {
            return;
        };
        if !client.is_handshake_complete() {
            return;
        }
        if let Some(session) = client.take_new_session() {
            if let Some(cache) = self.config.resumption_cache() {
                cache.store(&self.host, self.port, session);
            }
        }
    }

    /// Recompute the handshake status after a call that was driving the
    /// handshake. `Finished` is reported exactly once, on completion.
    fn advance_handshake_status(
        &mut self,
        output_pending: bool,
        complete: bool,
        closed: bool,
    ) -> HandshakeStatus {
        if output_pending {
            self.handshake_status = HandshakeStatus::NeedWrap;
        } else if complete {
            self.handshake_status = HandshakeStatus::NotHandshaking;
            if !self.finished_reported {
                self.finished_reported = true;
                return HandshakeStatus::Finished;
            }
        } else if closed {
            self.handshake_status = HandshakeStatus::NotHandshaking;
        } else {
            self.handshake_status = HandshakeStatus::NeedUnwrap;
        }
        self.handshake_status
    }

    /// Close the outbound direction: queue close_notify for the next
    /// `wrap`. Before any handshake this closes the engine outright.
    pub fn close_outbound(&mut self) {
        match &mut self.phase {
            Phase::Idle => self.phase = Phase::ClosedEarly,
            Phase::ClosedEarly => {}
            Phase::Active(endpoint) => {
                endpoint.conn().close();
                endpoint.destroy_secrets();
                self.handshake_status = HandshakeStatus::NeedWrap;
            }
        }
    }

    /// Close the inbound direction. An inbound close before the peer's
    /// close_notify is a truncation and fails the connection.
    pub fn close_inbound(&mut self) -> Result<(), Error> {
        match &mut self.phase {
            Phase::Idle => {
                self.phase = Phase::ClosedEarly;
                Ok(())
            }
            Phase::ClosedEarly => Ok(()),
            Phase::Active(endpoint) => {
                if endpoint.conn().close_received() {
                    endpoint.destroy_secrets();
                    Ok(())
                } else {
                    endpoint.conn().fail_with_alert(AlertDescription::InternalError);
                    endpoint.destroy_secrets();
                    self.handshake_status = HandshakeStatus::NeedWrap;
                    Err(Error::ConnectionClosed)
                }
            }
        }
    }
}

impl std::fmt::Debug for TlsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsEngine")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_mode", &self.client_mode)
            .field("handshake_status", &self.handshake_status)
            .finish_non_exhaustive()
    }
}
