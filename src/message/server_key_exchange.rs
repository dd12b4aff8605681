use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::Err;
use nom::{bytes::complete::take, IResult};

use crate::types::{NamedGroup, SignatureScheme};

/// Only named-curve ECDHE params are produced or accepted.
const CURVE_TYPE_NAMED_CURVE: u8 = 3;

/// ECDHE ServerKeyExchange: signed ephemeral parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub named_group: NamedGroup,
    pub public_key: &'a [u8],
    pub scheme: SignatureScheme,
    pub signature: &'a [u8],
}

impl<'a> ServerKeyExchange<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let (input, curve_type) = be_u8(input)?;
        if curve_type != CURVE_TYPE_NAMED_CURVE {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, named_group) = NamedGroup::parse(input)?;
        let (input, public_key_len) = be_u8(input)?;
        let (input, public_key) = take(public_key_len as usize)(input)?;
        let (input, scheme) = SignatureScheme::parse(input)?;
        let (input, signature_len) = be_u16(input)?;
        let (input, signature) = take(signature_len as usize)(input)?;

        Ok((
            input,
            ServerKeyExchange {
                named_group,
                public_key,
                scheme,
                signature,
            },
        ))
    }

    /// The server_params portion the signature covers, without the
    /// trailing DigitallySigned.
    pub fn serialize_params(&self, output: &mut Vec<u8>) {
        output.push(CURVE_TYPE_NAMED_CURVE);
        self.named_group.serialize(output);
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.serialize_params(output);
        self.scheme.serialize(output);
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(self.signature);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let ske = ServerKeyExchange {
            named_group: NamedGroup::X25519,
            public_key: &[0x11; 32],
            scheme: SignatureScheme::Ed25519,
            signature: &[0x22; 64],
        };

        let mut serialized = Vec::new();
        ske.serialize(&mut serialized);
        assert_eq!(serialized.len(), 1 + 2 + 1 + 32 + 2 + 2 + 64);

        let (rest, parsed) = ServerKeyExchange::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ske);

        // Params serialization stops before the signature.
        let mut params = Vec::new();
        ske.serialize_params(&mut params);
        assert_eq!(&serialized[..params.len()], &params[..]);
        assert_eq!(params.len(), 36);
    }

    #[test]
    fn rejects_explicit_curves() {
        let message = [0x01, 0x00, 0x1D, 0x00]; // curve_type 1 (explicit_prime)
        assert!(ServerKeyExchange::parse(&message).is_err());
    }
}
