pub mod common;
pub mod constants;
pub mod enums;
pub mod header;
pub mod question;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::PacketComponent;
use constants::{HEADER_SIZE, MIN_RESOURCE_SIZE};
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use thiserror::Error;
use tracing::trace;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name too long")]
    NameTooLong,
    #[error("Invalid question section")]
    InvalidQuestionSection,
    #[error("Invalid answer section")]
    InvalidAnswerSection,
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(#[from] std::io::Error),
}

impl DNSPacket {
    /// Parses only the fixed header. Used to recover the id of a message
    /// whose body is malformed.
    pub fn parse_header(buf: &[u8]) -> Result<DNSHeader, ParseError> {
        if buf.len() < HEADER_SIZE {
            return Err(ParseError::InvalidHeader);
        }
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut header = DNSHeader::default();
        header.read(&mut reader, buf)?;
        Ok(header)
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        if buf.len() < HEADER_SIZE {
            return Err(ParseError::InvalidHeader);
        }

        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut packet = DNSPacket::default();
        packet.header.read(&mut reader, buf)?;

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }

        packet.answers = read_section(&mut reader, buf, packet.header.ancount)?;
        packet.authorities = read_section(&mut reader, buf, packet.header.nscount)?;
        packet.resources = read_section(&mut reader, buf, packet.header.arcount)?;

        Ok(packet)
    }

    /// Serializes the packet. Section counts are taken from the section
    /// vectors, not from the header fields.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        {
            let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

            let mut header = self.header.clone();
            header.qdcount = section_count(self.questions.len())?;
            header.ancount = section_count(self.answers.len())?;
            header.nscount = section_count(self.authorities.len())?;
            header.arcount = section_count(self.resources.len())?;
            header.write(&mut writer)?;

            for question in &self.questions {
                question.write(&mut writer)?;
            }
            for resource in self
                .answers
                .iter()
                .chain(&self.authorities)
                .chain(&self.resources)
            {
                resource.write(&mut writer)?;
            }
        }

        Ok(buf)
    }

    /// Starts a reply to this query: same id, opcode, RD bit and questions,
    /// QR set, every other flag clear and no records.
    pub fn reply(&self) -> Self {
        DNSPacket {
            header: DNSHeader {
                id: self.header.id,
                qr: true,
                opcode: self.header.opcode,
                rd: self.header.rd,
                ..Default::default()
            },
            questions: self.questions.clone(),
            ..Default::default()
        }
    }
}

fn read_section(
    reader: &mut BitReader<&[u8], BigEndian>,
    buf: &[u8],
    count: u16,
) -> Result<Vec<DNSResource>, ParseError> {
    // The count comes from the sender; never reserve more records than
    // the message could hold.
    let mut records = Vec::with_capacity((count as usize).min(buf.len() / MIN_RESOURCE_SIZE));
    for _ in 0..count {
        let mut resource = DNSResource::default();
        resource.read(reader, buf)?;
        records.push(resource);
    }
    Ok(records)
}

fn section_count(len: usize) -> Result<u16, ParseError> {
    u16::try_from(len).map_err(|_| ParseError::InvalidAnswerSection)
}

#[cfg(test)]
mod test {
    use super::*;
    use enums::{DNSResourceClass, DNSResourceType};
    use std::net::{IpAddr, Ipv4Addr};

    fn query_bytes(domain: &str, qtype: u16) -> Vec<u8> {
        let mut packet = vec![
            0x12, 0x34, // ID
            0x01, 0x00, // RD
            0x00, 0x01, // QDCOUNT
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        for label in domain.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x01]);
        packet
    }

    #[test]
    fn test_parse_query() {
        let packet = DNSPacket::parse(&query_bytes("boop.example", 1)).unwrap();
        assert_eq!(packet.header.id, 0x1234);
        assert!(packet.header.rd);
        assert!(!packet.header.qr);
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.questions[0].name(), "boop.example.");
        assert_eq!(packet.questions[0].qtype, DNSResourceType::A);
        assert_eq!(packet.questions[0].qclass, DNSResourceClass::IN);
    }

    #[test]
    fn test_parse_truncated_packet() {
        assert!(matches!(
            DNSPacket::parse(&[0x12, 0x34, 0x01]),
            Err(ParseError::InvalidHeader)
        ));

        let mut bytes = query_bytes("boop", 1);
        bytes.truncate(bytes.len() - 3);
        assert!(DNSPacket::parse(&bytes).is_err());
        // The header alone is still readable.
        assert_eq!(DNSPacket::parse_header(&bytes).unwrap().id, 0x1234);
    }

    #[test]
    fn test_parse_inflated_section_counts() {
        let mut bytes = query_bytes("boop", 1);
        bytes[6..12].copy_from_slice(&[0xFF; 6]);
        assert!(DNSPacket::parse(&bytes).is_err());

        let header_only = [0x12, 0x34, 0x01, 0x00, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(DNSPacket::parse(&header_only).is_err());
        assert_eq!(DNSPacket::parse_header(&header_only).unwrap().ancount, 0xFFFF);
    }

    #[test]
    fn test_parse_compressed_answer_name() {
        let mut bytes = query_bytes("boop", 1);
        // ANCOUNT = 1
        bytes[7] = 1;
        // Answer owner is a pointer to the question name at offset 12.
        bytes.extend_from_slice(&[0xC0, 0x0C]);
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        bytes.extend_from_slice(&60_u32.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x04, 10, 0, 0, 9]);

        let packet = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(packet.answers[0].name(), "boop.");
        assert_eq!(packet.answers[0].ttl, 60);
        assert_eq!(
            packet.answers[0].ip(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))
        );
    }

    #[test]
    fn test_reply_keeps_identity_and_sets_counts() {
        let query = DNSPacket::parse(&query_bytes("svc", 1)).unwrap();
        let mut reply = query.reply();
        reply.answers.push(DNSResource::address(
            query.questions[0].labels.clone(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            60,
        ));

        let bytes = reply.serialize().unwrap();
        let decoded = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(decoded.header.id, 0x1234);
        assert!(decoded.header.qr);
        assert!(decoded.header.rd);
        assert_eq!(decoded.header.qdcount, 1);
        assert_eq!(decoded.header.ancount, 1);
        assert_eq!(decoded.questions, query.questions);
        assert_eq!(decoded.answers[0].ip(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn test_oversized_label_is_rejected_on_write() {
        let mut packet = DNSPacket::default();
        packet
            .questions
            .push(DNSQuestion::new(&"a".repeat(64), DNSResourceType::A));
        assert!(matches!(packet.serialize(), Err(ParseError::InvalidLabel)));
    }
}
