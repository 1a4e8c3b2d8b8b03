//! Error types for dove-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Primary store (etcd) error
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// A record could not be parsed or encoded
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Stored zone data is damaged and cannot be decoded
    #[error("corrupt zone data for {zone}: {reason}")]
    CorruptZone {
        /// Zone whose stored bytes failed to decode.
        zone: String,
        /// What went wrong while decoding.
        reason: String,
    },

    /// Operation not supported by this storage backend
    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    /// A bounded operation ran past its deadline
    #[error("deadline exceeded: {0}")]
    Deadline(&'static str),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
