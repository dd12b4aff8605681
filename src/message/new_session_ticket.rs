use nom::number::complete::{be_u16, be_u32};
use nom::{bytes::complete::take, IResult};

/// RFC 5077 NewSessionTicket. The ticket is opaque to the client.
#[derive(Debug, PartialEq, Eq)]
pub struct NewSessionTicket<'a> {
    pub lifetime_hint_secs: u32,
    pub ticket: &'a [u8],
}

impl<'a> NewSessionTicket<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], NewSessionTicket<'a>> {
        let (input, lifetime_hint_secs) = be_u32(input)?;
        let (input, ticket_len) = be_u16(input)?;
        let (input, ticket) = take(ticket_len as usize)(input)?;

        Ok((
            input,
            NewSessionTicket {
                lifetime_hint_secs,
                ticket,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.lifetime_hint_secs.to_be_bytes());
        output.extend_from_slice(&(self.ticket.len() as u16).to_be_bytes());
        output.extend_from_slice(self.ticket);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let nst = NewSessionTicket {
            lifetime_hint_secs: 7200,
            ticket: &[0xAB; 48],
        };
        let mut serialized = Vec::new();
        nst.serialize(&mut serialized);

        let (rest, parsed) = NewSessionTicket::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, nst);
    }

    #[test]
    fn empty_ticket() {
        // Servers may send a zero-length ticket to decline issuing one.
        let (rest, parsed) = NewSessionTicket::parse(&[0, 0, 0, 0, 0, 0]).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.ticket.is_empty());
    }
}
