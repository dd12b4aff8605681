use nom::IResult;
use tinyvec::ArrayVec;

use crate::crypto::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};

use super::{parse_extensions, serialize_extensions, Extension, ExtensionType, Random, SessionId};

#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: ArrayVec<[Extension<'a>; 16]>,
}

impl<'a> ServerHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cipher_suite.serialize(output);
        output.push(self.compression_method.as_u8());
        serialize_extensions(&self.extensions, output);
    }

    pub fn find_extension(&self, typ: ExtensionType) -> Option<&Extension<'a>> {
        self.extensions.iter().find(|e| e.extension_type == typ)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut m = vec![0x03, 0x03]; // TLS 1.2
        m.extend((0..32).rev().map(|i| i as u8)); // random
        m.extend_from_slice(&[0x02, 0xAA, 0xBB]); // session id
        m.extend_from_slice(&[0xC0, 0x2B]); // suite
        m.push(0x00); // null compression
        m.extend_from_slice(&[0x00, 0x04, 0x00, 0x23, 0x00, 0x00]); // session_ticket ext
        m
    }

    #[test]
    fn roundtrip() {
        let message = sample();
        let (rest, hello) = ServerHello::parse(&message).unwrap();
        assert!(rest.is_empty());

        assert_eq!(hello.cipher_suite, CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256);
        assert_eq!(hello.session_id, SessionId::try_new(&[0xAA, 0xBB]).unwrap());
        assert!(hello.find_extension(ExtensionType::SessionTicket).is_some());

        let mut serialized = Vec::new();
        hello.serialize(&mut serialized);
        assert_eq!(serialized, message);
    }

    #[test]
    fn no_extensions() {
        let message = &sample()[..40]; // cut before the extensions block
        let (rest, hello) = ServerHello::parse(message).unwrap();
        assert!(rest.is_empty());
        assert!(hello.extensions.is_empty());
    }
}
