use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{
    ParseError,
    common::{PacketComponent, name_from_labels},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: DNSResourceData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceData {
    #[default]
    Empty,
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    /// Anything this server does not interpret, kept as raw bytes.
    Raw(Vec<u8>),
}

impl DNSResourceData {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            DNSResourceData::Empty => Vec::new(),
            DNSResourceData::A(addr) => addr.octets().to_vec(),
            DNSResourceData::AAAA(addr) => addr.octets().to_vec(),
            DNSResourceData::Raw(bytes) => bytes.clone(),
        }
    }
}

impl DNSResource {
    /// Builds an IN-class address record. IPv4 addresses become A records,
    /// IPv6 addresses become AAAA records.
    pub fn address(labels: Vec<String>, ip: IpAddr, ttl: u32) -> Self {
        let (rtype, rdata) = match ip {
            IpAddr::V4(v4) => (DNSResourceType::A, DNSResourceData::A(v4)),
            IpAddr::V6(v6) => (DNSResourceType::AAAA, DNSResourceData::AAAA(v6)),
        };
        Self {
            labels,
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn name(&self) -> String {
        name_from_labels(&self.labels)
    }

    /// The address carried by an A/AAAA record, if any.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.rdata {
            DNSResourceData::A(v4) => Some(IpAddr::V4(v4)),
            DNSResourceData::AAAA(v6) => Some(IpAddr::V6(v6)),
            _ => None,
        }
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let rdata = self.rdata.to_bytes();
        let rdlength = u16::try_from(rdata.len()).map_err(|_| ParseError::InvalidAnswerSection)?;

        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError> {
        self.labels = self.read_labels(reader, packet)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)?;
        let mut buf = vec![0_u8; rdlength as usize];
        reader.read_bytes(&mut buf)?;

        self.rdata = match (self.rtype, buf.len()) {
            (DNSResourceType::A, 4) => {
                DNSResourceData::A(Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]))
            }
            (DNSResourceType::AAAA, 16) => {
                let mut octets = [0_u8; 16];
                octets.copy_from_slice(&buf);
                DNSResourceData::AAAA(Ipv6Addr::from(octets))
            }
            (_, 0) => DNSResourceData::Empty,
            _ => DNSResourceData::Raw(buf),
        };

        Ok(())
    }
}
