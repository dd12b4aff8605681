use nom::bytes::complete::take;
use nom::IResult;

use crate::crypto::provider::SecureRandom;

/// The 32 byte hello random. Treated as opaque, no embedded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub fn generate(random: &dyn SecureRandom) -> Result<Self, String> {
        let mut bytes = [0u8; 32];
        random.fill(&mut bytes)?;
        Ok(Random(bytes))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = take(32usize)(input)?;
        let mut random = [0u8; 32];
        random.copy_from_slice(bytes);
        Ok((input, Random(random)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let bytes: Vec<u8> = (0..32).collect();
        let (rest, random) = Random::parse(&bytes).unwrap();
        assert!(rest.is_empty());

        let mut serialized = Vec::new();
        random.serialize(&mut serialized);
        assert_eq!(serialized, bytes);
    }

    #[test]
    fn too_short() {
        assert!(Random::parse(&[0u8; 31]).is_err());
    }
}
