//! Protocol-level enums shared by the record layer and the handshake
//! state machines.

use core::fmt;

use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

/// Record content type (first byte of the 5 byte record header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

impl ContentType {
    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// TLS protocol versions, newest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    Ssl3_0,
    Tls1_0,
    Tls1_1,
    Tls1_2,
}

impl ProtocolVersion {
    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::Ssl3_0 => 0x0300,
            ProtocolVersion::Tls1_0 => 0x0301,
            ProtocolVersion::Tls1_1 => 0x0302,
            ProtocolVersion::Tls1_2 => 0x0303,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0300 => Some(ProtocolVersion::Ssl3_0),
            0x0301 => Some(ProtocolVersion::Tls1_0),
            0x0302 => Some(ProtocolVersion::Tls1_1),
            0x0303 => Some(ProtocolVersion::Tls1_2),
            _ => None,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, v) = be_u16(input)?;
        match Self::from_u16(v) {
            Some(p) => Ok((input, p)),
            None => Err(Err::Error(NomError::new(input, ErrorKind::Tag))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ProtocolVersion::*;
        write!(
            f,
            "{}",
            match self {
                Ssl3_0 => "SSL 3.0",
                Tls1_0 => "TLS 1.0",
                Tls1_1 => "TLS 1.1",
                Tls1_2 => "TLS 1.2",
            }
        )
    }
}

/// Handshake message types (RFC 5246 section 7.4, RFC 5077).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    NewSessionTicket,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
}

impl HandshakeType {
    pub fn as_u8(&self) -> u8 {
        use HandshakeType::*;
        match self {
            HelloRequest => 0,
            ClientHello => 1,
            ServerHello => 2,
            NewSessionTicket => 4,
            Certificate => 11,
            ServerKeyExchange => 12,
            CertificateRequest => 13,
            ServerHelloDone => 14,
            CertificateVerify => 15,
            ClientKeyExchange => 16,
            Finished => 20,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        use HandshakeType::*;
        match v {
            0 => Some(HelloRequest),
            1 => Some(ClientHello),
            2 => Some(ServerHello),
            4 => Some(NewSessionTicket),
            11 => Some(Certificate),
            12 => Some(ServerKeyExchange),
            13 => Some(CertificateRequest),
            14 => Some(ServerHelloDone),
            15 => Some(CertificateVerify),
            16 => Some(ClientKeyExchange),
            20 => Some(Finished),
            _ => None,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeType> {
        let (input, v) = be_u8(input)?;
        match Self::from_u8(v) {
            Some(t) => Ok((input, t)),
            None => Err(Err::Error(NomError::new(input, ErrorKind::Tag))),
        }
    }
}

/// Compression methods. Only null is ever negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    #[default]
    Null,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => CompressionMethod::Null,
            other => CompressionMethod::Unknown(other),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, v) = be_u8(input)?;
        Ok((input, Self::from_u8(v)))
    }
}

/// Named groups for (EC)DHE key exchange (RFC 8422).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamedGroup {
    Secp256r1,
    Secp384r1,
    #[default]
    X25519,
    Unknown(u16),
}

impl NamedGroup {
    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 0x0017,
            NamedGroup::Secp384r1 => 0x0018,
            NamedGroup::X25519 => 0x001d,
            NamedGroup::Unknown(v) => *v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            0x0017 => NamedGroup::Secp256r1,
            0x0018 => NamedGroup::Secp384r1,
            0x001d => NamedGroup::X25519,
            other => NamedGroup::Unknown(other),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, v) = be_u16(input)?;
        Ok((input, Self::from_u16(v)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

/// Signature schemes (RFC 8446 section 4.2.3 code points, usable in 1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    Ed25519,
    RsaPkcs1Sha256,
    Unknown(u16),
}

impl SignatureScheme {
    pub fn as_u16(&self) -> u16 {
        use SignatureScheme::*;
        match self {
            EcdsaSecp256r1Sha256 => 0x0403,
            EcdsaSecp384r1Sha384 => 0x0503,
            Ed25519 => 0x0807,
            RsaPkcs1Sha256 => 0x0401,
            Unknown(v) => *v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        use SignatureScheme::*;
        match v {
            0x0403 => EcdsaSecp256r1Sha256,
            0x0503 => EcdsaSecp384r1Sha384,
            0x0807 => Ed25519,
            0x0401 => RsaPkcs1Sha256,
            other => Unknown(other),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureScheme> {
        let (input, v) = be_u16(input)?;
        Ok((input, Self::from_u16(v)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

/// The endpoint role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_type_roundtrip() {
        for v in [20u8, 21, 22, 23] {
            let ct = ContentType::from_u8(v).unwrap();
            assert_eq!(ct.as_u8(), v);
        }
        assert!(ContentType::from_u8(24).is_none());
        assert!(ContentType::from_u8(0).is_none());
    }

    #[test]
    fn version_ordering() {
        assert!(ProtocolVersion::Tls1_2 > ProtocolVersion::Tls1_0);
        assert!(ProtocolVersion::Tls1_0 > ProtocolVersion::Ssl3_0);
    }

    #[test]
    fn handshake_type_rejects_unknown() {
        let result = HandshakeType::parse(&[99, 0]);
        assert!(result.is_err());
    }
}
