/// DNS Response Code constants from RFC 1035
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0; // No error
    pub const FORMERR: u8 = 1; // Format error
    pub const NOTIMP: u8 = 4; // Not implemented
}

/// Opcode of a standard query; every other opcode is answered with NOTIMP
pub const OPCODE_QUERY: u8 = 0;

/// Size of the fixed message header
pub const HEADER_SIZE: usize = 12;

/// Smallest encoded resource record: root name plus the fixed fields
pub const MIN_RESOURCE_SIZE: usize = 11;

/// Largest UDP payload a client is guaranteed to accept without EDNS
pub const MAX_UDP_PAYLOAD: usize = 512;

/// Limits from RFC 1035 section 2.3.4
pub const MAX_LABEL_LENGTH: usize = 63;
pub const MAX_NAME_LENGTH: usize = 255;

/// Upper bound on compression pointers followed while decoding one name
pub const MAX_POINTER_JUMPS: usize = 16;
