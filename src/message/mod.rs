//! Handshake message framing and bodies.
//!
//! Every body follows the same two-method shape: a nom `parse` borrowing
//! from the reassembled handshake buffer and a `serialize` appending the
//! wire form to a `Vec<u8>`.

use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u24, be_u8};
use nom::Err;
use nom::{bytes::complete::take, number::complete::be_u16, IResult};
use tinyvec::ArrayVec;

use crate::crypto::provider::SecureRandom;
use crate::types::HandshakeType;
use crate::util::many0;

mod certificate;
mod client_hello;
mod client_key_exchange;
mod extension;
mod finished;
mod new_session_ticket;
mod random;
mod server_hello;
mod server_key_exchange;

pub use certificate::Certificate;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use extension::{Extension, ExtensionType};
pub use finished::{Finished, VERIFY_DATA_LEN};
pub use new_session_ticket::NewSessionTicket;
pub use random::Random;
pub use server_hello::ServerHello;
pub use server_key_exchange::ServerKeyExchange;

/// The 4 byte handshake header: type and u24 body length.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Session id, at most 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionId(ArrayVec<[u8; 32]>);

impl SessionId {
    pub fn empty() -> Self {
        SessionId(ArrayVec::new())
    }

    pub fn try_new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > 32 {
            return None;
        }
        let mut v = ArrayVec::new();
        v.extend_from_slice(bytes);
        Some(SessionId(v))
    }

    /// A fresh full-length id, used by resuming clients as a resumption
    /// marker the server echoes back.
    pub fn generate(random: &dyn SecureRandom) -> Result<Self, String> {
        let mut bytes = [0u8; 32];
        random.fill(&mut bytes)?;
        Ok(SessionId(ArrayVec::from(bytes)))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SessionId> {
        let (input, len) = be_u8(input)?;
        if len > 32 {
            return Err(Err::Failure(NomError::new(input, ErrorKind::LengthValue)));
        }
        let (input, bytes) = take(len as usize)(input)?;
        // Unwrap is OK, length checked above.
        Ok((input, SessionId::try_new(bytes).unwrap()))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.0.len() as u8);
        output.extend_from_slice(&self.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Shared tail parser for the hello messages. Absent and empty extension
/// blocks both yield an empty list.
pub(crate) fn parse_extensions(input: &[u8]) -> IResult<&[u8], ArrayVec<[Extension<'_>; 16]>> {
    if input.is_empty() {
        return Ok((input, ArrayVec::new()));
    }

    let (input, extensions_len) = be_u16(input)?;
    let (input, extensions_data) = take(extensions_len)(input)?;
    let (rest, extensions) = many0(Extension::parse)(extensions_data)?;
    if !rest.is_empty() {
        return Err(Err::Failure(NomError::new(rest, ErrorKind::LengthValue)));
    }

    Ok((input, extensions))
}

/// Extensions block, omitted entirely when the list is empty.
pub(crate) fn serialize_extensions(extensions: &[Extension<'_>], output: &mut Vec<u8>) {
    if extensions.is_empty() {
        return;
    }

    let total: usize = extensions.iter().map(|e| 4 + e.extension_data.len()).sum();
    output.extend_from_slice(&(total as u16).to_be_bytes());
    for ext in extensions {
        ext.serialize(output);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Body<'a> {
    HelloRequest,
    ClientHello(ClientHello<'a>),
    ServerHello(ServerHello<'a>),
    NewSessionTicket(NewSessionTicket<'a>),
    Certificate(Certificate<'a>),
    ServerKeyExchange(ServerKeyExchange<'a>),
    ServerHelloDone,
    ClientKeyExchange(ClientKeyExchange<'a>),
    Finished(Finished),
}

impl<'a> Body<'a> {
    pub fn parse(input: &'a [u8], typ: HandshakeType) -> IResult<&'a [u8], Body<'a>> {
        Ok(match typ {
            HandshakeType::HelloRequest => (input, Body::HelloRequest),
            HandshakeType::ClientHello => {
                let (input, v) = ClientHello::parse(input)?;
                (input, Body::ClientHello(v))
            }
            HandshakeType::ServerHello => {
                let (input, v) = ServerHello::parse(input)?;
                (input, Body::ServerHello(v))
            }
            HandshakeType::NewSessionTicket => {
                let (input, v) = NewSessionTicket::parse(input)?;
                (input, Body::NewSessionTicket(v))
            }
            HandshakeType::Certificate => {
                let (input, v) = Certificate::parse(input)?;
                (input, Body::Certificate(v))
            }
            HandshakeType::ServerKeyExchange => {
                let (input, v) = ServerKeyExchange::parse(input)?;
                (input, Body::ServerKeyExchange(v))
            }
            HandshakeType::ServerHelloDone => (input, Body::ServerHelloDone),
            HandshakeType::ClientKeyExchange => {
                let (input, v) = ClientKeyExchange::parse(input)?;
                (input, Body::ClientKeyExchange(v))
            }
            HandshakeType::Finished => {
                let (input, v) = Finished::parse(input)?;
                (input, Body::Finished(v))
            }
            // Client certificates are not negotiated.
            HandshakeType::CertificateRequest | HandshakeType::CertificateVerify => {
                return Err(Err::Failure(NomError::new(input, ErrorKind::Tag)))
            }
        })
    }

    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            Body::HelloRequest => HandshakeType::HelloRequest,
            Body::ClientHello(_) => HandshakeType::ClientHello,
            Body::ServerHello(_) => HandshakeType::ServerHello,
            Body::NewSessionTicket(_) => HandshakeType::NewSessionTicket,
            Body::Certificate(_) => HandshakeType::Certificate,
            Body::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            Body::ServerHelloDone => HandshakeType::ServerHelloDone,
            Body::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            Body::Finished(_) => HandshakeType::Finished,
        }
    }

    fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Body::HelloRequest | Body::ServerHelloDone => {}
            Body::ClientHello(v) => v.serialize(output),
            Body::ServerHello(v) => v.serialize(output),
            Body::NewSessionTicket(v) => v.serialize(output),
            Body::Certificate(v) => v.serialize(output),
            Body::ServerKeyExchange(v) => v.serialize(output),
            Body::ClientKeyExchange(v) => v.serialize(output),
            Body::Finished(v) => v.serialize(output),
        }
    }
}

/// One framed handshake message.
#[derive(Debug, PartialEq, Eq)]
pub struct Handshake<'a> {
    pub body: Body<'a>,
}

impl<'a> Handshake<'a> {
    pub fn new(body: Body<'a>) -> Self {
        Handshake { body }
    }

    /// Parse one full message. The body must consume its declared length
    /// exactly.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Handshake<'a>> {
        let (input, typ) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, body_bytes) = take(length as usize)(input)?;

        let (rest, body) = Body::parse(body_bytes, typ)?;
        if !rest.is_empty() {
            return Err(Err::Failure(NomError::new(rest, ErrorKind::LengthValue)));
        }

        Ok((input, Handshake { body }))
    }

    /// Serialize header and body, backpatching the u24 length.
    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.body.handshake_type().as_u8());
        let len_at = output.len();
        output.extend_from_slice(&[0, 0, 0]);

        self.body.serialize(output);

        let body_len = (output.len() - len_at - 3) as u32;
        output[len_at..len_at + 3].copy_from_slice(&body_len.to_be_bytes()[1..]);
    }
}
