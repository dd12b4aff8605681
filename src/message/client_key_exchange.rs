use nom::number::complete::be_u8;
use nom::{bytes::complete::take, IResult};

/// ECDHE ClientKeyExchange: the client's ephemeral public key.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub public_key: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, public_key_len) = be_u8(input)?;
        let (input, public_key) = take(public_key_len as usize)(input)?;
        Ok((input, ClientKeyExchange { public_key }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let cke = ClientKeyExchange {
            public_key: &[0x42; 32],
        };
        let mut serialized = Vec::new();
        cke.serialize(&mut serialized);
        assert_eq!(serialized.len(), 33);
        assert_eq!(serialized[0], 32);

        let (rest, parsed) = ClientKeyExchange::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cke);
    }
}
