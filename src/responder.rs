use std::sync::Arc;
use tracing::{debug, trace};

use crate::dns::{
    DNSPacket, ParseError,
    constants::{DNSRcode, MAX_UDP_PAYLOAD},
    resource::DNSResource,
};
use crate::records::RecordSource;

/// TTL of every answer this server hands out.
pub const ANSWER_TTL: u32 = 60;

/// Answers resolution requests from a record source.
///
/// Built once and shared by every listener task; it keeps no state between
/// requests.
///
/// The requested record type is ignored: every question is
/// answered with the first matching record's address, as an A record for
/// IPv4 and AAAA for IPv6, even when the client asked for MX, TXT or
/// anything else. A name with no record gets NOERROR with an empty answer
/// section, not NXDOMAIN.
#[derive(Clone)]
pub struct QueryResponder {
    source: Arc<dyn RecordSource>,
}

impl QueryResponder {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }

    /// Builds the response to a parsed query.
    pub fn answer(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = query.reply();

        if !query.header.is_standard_query() {
            response.header.rcode = DNSRcode::NOTIMP;
            return response;
        }

        for question in &query.questions {
            let name = question.name();
            match self.source.lookup(&name) {
                Some(ip) => {
                    debug!("{} {:?} -> {}", name, question.qtype, ip);
                    response
                        .answers
                        .push(DNSResource::address(question.labels.clone(), ip, ANSWER_TTL));
                }
                None => debug!("{} {:?} -> no record", name, question.qtype),
            }
        }

        response.header.aa = !response.answers.is_empty();
        response.header.rcode = DNSRcode::NOERROR;
        response
    }

    /// Decodes a raw request and encodes the response.
    ///
    /// Returns `Ok(None)` when the message should be dropped: too short to
    /// carry a header, or itself a response. A header followed by an
    /// undecodable body is answered with FORMERR.
    pub fn handle(&self, data: &[u8]) -> Result<Option<Vec<u8>>, ParseError> {
        let query = match DNSPacket::parse(data) {
            Ok(query) => query,
            Err(e) => {
                let Ok(header) = DNSPacket::parse_header(data) else {
                    trace!("Dropping message without a usable header: {}", e);
                    return Ok(None);
                };
                if header.qr {
                    return Ok(None);
                }
                debug!("Malformed request {}: {}", header.id, e);
                let mut response = DNSPacket {
                    header,
                    ..Default::default()
                }
                .reply();
                response.header.rcode = DNSRcode::FORMERR;
                return response.serialize().map(Some);
            }
        };

        if query.header.qr {
            trace!("Ignoring response message {}", query.header.id);
            return Ok(None);
        }

        self.answer(&query).serialize().map(Some)
    }

    /// Like `handle`, but keeps the reply within the plain UDP payload
    /// limit. An oversized reply is replaced by one with TC set and no
    /// answers, telling the client to retry over TCP. If the echoed
    /// questions alone still exceed the limit they are dropped as well.
    pub fn handle_udp(&self, data: &[u8]) -> Result<Option<Vec<u8>>, ParseError> {
        let Some(bytes) = self.handle(data)? else {
            return Ok(None);
        };
        if bytes.len() <= MAX_UDP_PAYLOAD {
            return Ok(Some(bytes));
        }

        debug!(
            "Response too large for UDP ({} > {} bytes), truncating",
            bytes.len(),
            MAX_UDP_PAYLOAD
        );
        let mut truncated = DNSPacket::parse(&bytes)?;
        truncated.answers.clear();
        truncated.header.tc = true;
        let bytes = truncated.serialize()?;
        if bytes.len() <= MAX_UDP_PAYLOAD {
            return Ok(Some(bytes));
        }

        // Questions are written uncompressed, so a request built from
        // compression pointers can echo back far larger than it arrived.
        truncated.questions.clear();
        truncated.serialize().map(Some)
    }
}
