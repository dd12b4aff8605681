use core::fmt;

use thiserror::Error;

/// Alert severity as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
}

impl AlertLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(AlertLevel::Warning),
            2 => Some(AlertLevel::Fatal),
            _ => None,
        }
    }
}

/// Alert descriptions (RFC 5246 section 7.2).
///
/// Only the codes the engine can itself raise or must recognize are named;
/// everything else round-trips through `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    BadCertificate,
    CertificateUnknown,
    IllegalParameter,
    DecodeError,
    DecryptError,
    InternalError,
    Unknown(u8),
}

impl AlertDescription {
    pub fn as_u8(&self) -> u8 {
        use AlertDescription::*;
        match self {
            CloseNotify => 0,
            UnexpectedMessage => 10,
            BadRecordMac => 20,
            RecordOverflow => 22,
            HandshakeFailure => 40,
            BadCertificate => 42,
            CertificateUnknown => 46,
            IllegalParameter => 47,
            DecodeError => 50,
            DecryptError => 51,
            InternalError => 80,
            Unknown(v) => *v,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        use AlertDescription::*;
        match v {
            0 => CloseNotify,
            10 => UnexpectedMessage,
            20 => BadRecordMac,
            22 => RecordOverflow,
            40 => HandshakeFailure,
            42 => BadCertificate,
            46 => CertificateUnknown,
            47 => IllegalParameter,
            50 => DecodeError,
            51 => DecryptError,
            80 => InternalError,
            other => Unknown(other),
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}

/// Errors surfaced by the engine.
///
/// Capacity conditions (buffer underflow/overflow) are *not* errors. They
/// are reported through [`Status`](crate::Status) so the caller can retry
/// the same operation with more buffer space.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A fatal protocol alert raised locally. An outbound alert record is
    /// queued for the peer where possible.
    #[error("Fatal alert: {0}")]
    Alert(AlertDescription),

    /// The peer sent us a fatal alert.
    #[error("Received fatal alert: {0}")]
    PeerAlert(AlertDescription),

    /// Crypto provider failure (opaque to the engine).
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// A certificate was rejected by the external verifier.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Handshake message that is invalid in the current state.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// Wire data that does not parse.
    #[error("Parse error: {0}")]
    ParseError(&'static str),

    /// Negotiation could not converge (no common suite, bad version, ...).
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Operation on a secret after `destroy()`.
    #[error("Secret has been destroyed")]
    SecretDestroyed,

    /// Renegotiation is not supported.
    #[error("Renegotiation not supported")]
    RenegotiationUnsupported,

    /// Role cannot change once the handshake has begun.
    #[error("Mode cannot be changed after the initial handshake has begun")]
    ModeChangeAfterHandshake,

    /// Operation on a connection that is already closed.
    #[error("Connection is already closed")]
    ConnectionClosed,

    /// Invalid configuration detected at build time.
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl Error {
    /// The alert this error would put on the wire, if any.
    pub(crate) fn alert_description(&self) -> Option<AlertDescription> {
        match self {
            Error::Alert(d) => Some(*d),
            Error::CryptoError(_) => Some(AlertDescription::InternalError),
            Error::CertificateError(_) => Some(AlertDescription::BadCertificate),
            Error::UnexpectedMessage(_) => Some(AlertDescription::UnexpectedMessage),
            Error::ParseError(_) => Some(AlertDescription::DecodeError),
            Error::SecurityError(_) => Some(AlertDescription::IllegalParameter),
            _ => None,
        }
    }
}
