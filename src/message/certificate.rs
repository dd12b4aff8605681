use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u24;
use nom::Err;
use nom::{bytes::complete::take, IResult};
use tinyvec::ArrayVec;

/// The certificate_list, each entry opaque DER (or whatever the
/// configured verifier understands).
#[derive(Debug, PartialEq, Eq, Default)]
pub struct Certificate<'a> {
    pub certificate_list: ArrayVec<[&'a [u8]; 8]>,
}

impl<'a> Certificate<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut list_input) = take(total_len as usize)(input)?;

        let mut certificate_list = ArrayVec::new();
        while !list_input.is_empty() {
            if certificate_list.len() == certificate_list.capacity() {
                return Err(Err::Failure(Error::new(list_input, ErrorKind::TooLarge)));
            }
            let (rest, cert_len) = be_u24(list_input)?;
            let (rest, cert) = take(cert_len as usize)(rest)?;
            certificate_list.push(cert);
            list_input = rest;
        }

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total: usize = self.certificate_list.iter().map(|c| 3 + c.len()).sum();
        output.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        for cert in &self.certificate_list {
            output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(cert);
        }
    }

    /// The end-entity certificate, first in the list.
    pub fn end_entity(&self) -> Option<&'a [u8]> {
        self.certificate_list.first().copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut certificate = Certificate::default();
        certificate.certificate_list.push(&[0x01, 0x02, 0x03]);
        certificate.certificate_list.push(&[0x04]);

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized);
        assert_eq!(
            serialized,
            &[0x00, 0x00, 0x0A, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03, 0x00, 0x00, 0x01, 0x04]
        );

        let (rest, parsed) = Certificate::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, certificate);
        assert_eq!(parsed.end_entity(), Some(&[0x01u8, 0x02, 0x03][..]));
    }

    #[test]
    fn empty_list() {
        let (rest, parsed) = Certificate::parse(&[0x00, 0x00, 0x00]).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.end_entity().is_none());
    }
}
