pub mod admin;
pub mod config;
pub mod dns;
pub mod error;
pub mod graceful_shutdown;
pub mod records;
pub mod responder;
pub mod server;

pub use dns::DNSPacket;
pub use records::{Record, RecordStore};
pub use responder::QueryResponder;
