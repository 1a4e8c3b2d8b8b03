//! Stored DNS records and their serialized forms.
//!
//! A record travels through three representations: the textual RR a zone
//! admin submits ("@ 300 IN A 1.2.3.4"), the decoded [`Record`] the query
//! engine matches against, and standalone DNS wire bytes used by both
//! storage backends. This module owns the conversions between them.

use hickory_proto::rr::{Name, Record};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncodable, BinEncoder};
use hickory_proto::serialize::txt::Parser;

use crate::error::DnsError;

/// One record as tracked by zone storage.
///
/// `id` is the admin-chosen handle used as the primary key for patch and
/// delete; it is unique within a zone and unrelated to the owner name.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Stable per-zone identifier of this record.
    pub id: String,
    /// The record itself.
    pub rr: Record,
}

impl StoredRecord {
    /// Create a stored record from an id and a decoded RR.
    pub fn new(id: impl Into<String>, rr: Record) -> Self {
        Self { id: id.into(), rr }
    }
}

/// Encode one record as standalone DNS wire bytes.
///
/// The buffer is self-contained: the encoder starts at offset zero, so any
/// name compression pointers resolve within the returned bytes.
pub fn pack_record(rr: &Record) -> Result<Vec<u8>, DnsError> {
    let mut buf = Vec::with_capacity(64);
    let mut encoder = BinEncoder::new(&mut buf);
    rr.emit(&mut encoder)?;
    Ok(buf)
}

/// Decode one record from the front of `buf`.
///
/// Returns the record and the number of bytes consumed; the RR header's
/// RDLENGTH makes the encoding self-describing, so callers can concatenate
/// packed records and walk them with repeated calls.
pub fn unpack_record(buf: &[u8]) -> Result<(Record, usize), DnsError> {
    let mut decoder = BinDecoder::new(buf);
    let rr = Record::read(&mut decoder)
        .map_err(|e| DnsError::InvalidRecord(format!("failed to unpack record: {e}")))?;
    Ok((rr, decoder.index()))
}

/// Parse a single textual RR, qualifying relative owners (and `@`) against
/// the zone apex.
pub fn parse_rr_text(text: &str, origin: &Name) -> Result<Record, DnsError> {
    let (_, sets) = Parser::new(text, None, Some(origin.clone()))
        .parse()
        .map_err(|e| DnsError::InvalidRecord(format!("failed to parse record: {e}")))?;

    sets.into_values()
        .flat_map(|set| set.records_without_rrsigs().cloned().collect::<Vec<_>>())
        .next()
        .ok_or_else(|| DnsError::InvalidRecord("no record found in input".to_string()))
}
