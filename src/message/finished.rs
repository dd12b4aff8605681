use nom::bytes::complete::take;
use nom::IResult;

/// TLS 1.2 verify_data is always 12 bytes for the standard PRFs.
pub const VERIFY_DATA_LEN: usize = 12;

#[derive(Debug, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; VERIFY_DATA_LEN],
}

impl Finished {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, bytes) = take(VERIFY_DATA_LEN)(input)?;
        let mut verify_data = [0u8; VERIFY_DATA_LEN];
        verify_data.copy_from_slice(bytes);
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.verify_data);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let finished = Finished {
            verify_data: [7; 12],
        };
        let mut serialized = Vec::new();
        finished.serialize(&mut serialized);

        let (rest, parsed) = Finished::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, finished);
    }

    #[test]
    fn too_short() {
        assert!(Finished::parse(&[0u8; 11]).is_err());
    }
}
