use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u8},
    IResult,
};
use tinyvec::ArrayVec;

use crate::crypto::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};
use crate::util::many1;

use super::{parse_extensions, serialize_extensions, Extension, Random, SessionId};

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: ArrayVec<[CipherSuite; 32]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 4]>,
    pub extensions: ArrayVec<[Extension<'a>; 16]>,
}

impl<'a> ClientHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, input_cipher) = take(cipher_suites_len)(input)?;
        let (rest, cipher_suites) = many1(CipherSuite::parse)(input_cipher)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(input_compression)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            suite.serialize(output);
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        serialize_extensions(&self.extensions, output);
    }

    pub fn find_extension(&self, typ: super::ExtensionType) -> Option<&Extension<'a>> {
        self.extensions.iter().find(|e| e.extension_type == typ)
    }
}

#[cfg(test)]
mod test {
    use tinyvec::array_vec;

    use super::super::ExtensionType;
    use super::*;

    fn sample() -> Vec<u8> {
        let mut m = vec![0x03, 0x03]; // TLS 1.2
        m.extend((0..32).map(|i| i as u8)); // random
        m.push(0x00); // empty session id
        m.extend_from_slice(&[0x00, 0x04, 0xC0, 0x2B, 0xCC, 0xA9]); // two suites
        m.extend_from_slice(&[0x01, 0x00]); // null compression
        m.extend_from_slice(&[0x00, 0x04, 0x00, 0x23, 0x00, 0x00]); // session_ticket ext, empty
        m
    }

    #[test]
    fn roundtrip() {
        let message = sample();
        let (rest, hello) = ClientHello::parse(&message).unwrap();
        assert!(rest.is_empty());

        assert_eq!(hello.client_version, ProtocolVersion::Tls1_2);
        assert_eq!(
            hello.cipher_suites,
            array_vec![
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256
            ]
        );
        assert!(hello.find_extension(ExtensionType::SessionTicket).is_some());

        let mut serialized = Vec::new();
        hello.serialize(&mut serialized);
        assert_eq!(serialized, message);
    }

    #[test]
    fn session_id_too_long() {
        let mut message = sample();
        message[34] = 0x21; // 33 bytes exceeds the limit
        assert!(ClientHello::parse(&message).is_err());
    }
}
