use std::path::PathBuf;
use thiserror::Error;

use crate::dns::ParseError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid DNS bind address: {0}")]
    InvalidDnsBindAddress(String),

    #[error("Invalid HTTP bind address: {0}")]
    InvalidHttpBindAddress(String),

    #[error("{} does not exist", .0.display())]
    MissingDataDir(PathBuf),

    #[error("{} is not a directory", .0.display())]
    DataDirNotADirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    /// No snapshot has been written yet. Not fatal: the store starts empty.
    #[error("snapshot {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse snapshot {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("snapshot I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The request was rejected and the record set is unchanged.
    #[error("{0}")]
    Validation(String),

    /// The mutation is applied in memory but did not reach the snapshot.
    #[error("record change applied but not persisted: {0}")]
    Persist(#[from] SnapshotError),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid DNS packet: {0}")]
    Packet(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
