//! In-memory zone data and the authoritative lookup algorithm.
//!
//! The [`ZoneTable`] is the sole source of truth for the query path. The
//! coordinator publishes whole zones into it; query handlers pick a zone by
//! longest apex suffix and run [`Zone::lookup`] against the snapshot they
//! grabbed. Matching happens on names relative to the apex, case
//! insensitively, with exact owners shadowing wildcards.

use std::collections::HashMap;
use std::sync::Arc;

use hickory_proto::rr::{Name, Record, RecordType};
use parking_lot::RwLock;
use tracing::trace;

use crate::record::StoredRecord;

/// One authoritative zone as loaded from storage.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Apex name, absolute and lowercase (trailing dot).
    pub name: String,
    /// Records in the order the store returned them.
    pub records: Vec<StoredRecord>,
    /// Opaque drift-detection token from the primary store, if any.
    pub change_token: Option<String>,
}

impl Zone {
    /// Create a zone with no records and no change token.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            records: Vec::new(),
            change_token: None,
        }
    }

    /// Answer one question against this zone.
    ///
    /// Returns copies of every matching record with the owner rewritten to
    /// `qname` exactly as the requester spelled it. The exact pass wins over
    /// the wildcard pass, and at most one wildcard record is synthesized.
    pub fn lookup(&self, qname: &Name, qtype: RecordType) -> Vec<Record> {
        let rel_q = relative_name(&qname.to_ascii().to_ascii_lowercase(), &self.name);
        let mut answers = Vec::new();

        // Record order from storage is not significant; both passes scan
        // every record rather than assuming any grouping.
        for stored in &self.records {
            let owner = self.relative_owner(stored);
            if owner == rel_q && type_matches(stored, qtype) {
                trace!(owner = %owner, rtype = ?stored.rr.record_type(), "exact match");
                answers.push(rewrite_owner(&stored.rr, qname));
            }
        }
        if !answers.is_empty() {
            return answers;
        }

        for stored in &self.records {
            let owner = self.relative_owner(stored);
            let Some(suffix) = wildcard_suffix(&owner) else {
                continue;
            };
            if rel_q.ends_with(suffix) && type_matches(stored, qtype) {
                trace!(owner = %owner, rtype = ?stored.rr.record_type(), "wildcard match");
                answers.push(rewrite_owner(&stored.rr, qname));
                // A single wildcard synthesizes the whole answer.
                break;
            }
        }

        answers
    }

    fn relative_owner(&self, stored: &StoredRecord) -> String {
        relative_name(
            &stored.rr.name().to_ascii().to_ascii_lowercase(),
            &self.name,
        )
    }
}

fn type_matches(stored: &StoredRecord, qtype: RecordType) -> bool {
    qtype == RecordType::ANY || stored.rr.record_type() == qtype
}

fn rewrite_owner(rr: &Record, qname: &Name) -> Record {
    let mut copy = Record::from_rdata(qname.clone(), rr.ttl(), rr.data().clone());
    copy.set_dns_class(rr.dns_class());
    copy
}

/// Lowercase a name and ensure it is absolute (trailing dot).
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.trim().to_ascii_lowercase();
    if !normalized.ends_with('.') {
        normalized.push('.');
    }
    normalized
}

/// Express `name` relative to `zone`, both lowercase and absolute.
///
/// The apex itself (or its `@` alias) becomes `"@"`; names below the apex
/// keep only the leading labels; names outside the zone are returned as
/// given. The wildcard label `*` survives untouched.
pub fn relative_name(name: &str, zone: &str) -> String {
    if name == zone || name == "@" || name == "@." {
        return "@".to_string();
    }
    if let Some(rest) = name.strip_suffix(zone) {
        let rest = rest.strip_suffix('.').unwrap_or(rest);
        if rest.is_empty() {
            return "@".to_string();
        }
        return rest.to_string();
    }
    name.to_string()
}

/// The suffix a wildcard owner matches against, or `None` for non-wildcards.
///
/// A bare `*` has the empty suffix and therefore matches every name in the
/// zone; `*.sub` yields `sub`.
fn wildcard_suffix(relative_owner: &str) -> Option<&str> {
    let rest = relative_owner.strip_prefix('*')?;
    Some(rest.strip_prefix('.').unwrap_or(rest))
}

/// Process-wide mapping from zone name to the currently served snapshot.
///
/// Cheap to clone; all clones share the same map. The coordinator replaces
/// whole entries, so a query handler that grabbed an `Arc<Zone>` keeps a
/// stable record list for the duration of its scan.
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    inner: Arc<RwLock<HashMap<String, Arc<Zone>>>>,
}

impl ZoneTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current snapshot of a zone by exact apex name.
    pub fn get(&self, name: &str) -> Option<Arc<Zone>> {
        self.inner.read().get(&normalize_name(name)).cloned()
    }

    /// Publish a zone, replacing any previous snapshot in one swap.
    pub fn publish(&self, zone: Zone) -> Arc<Zone> {
        let zone = Arc::new(zone);
        self.inner.write().insert(zone.name.clone(), zone.clone());
        zone
    }

    /// Remove a zone; returns the last served snapshot if there was one.
    pub fn remove(&self, name: &str) -> Option<Arc<Zone>> {
        self.inner.write().remove(&normalize_name(name))
    }

    /// Select the zone whose apex is the longest suffix of `qname`.
    pub fn find(&self, qname: &str) -> Option<Arc<Zone>> {
        let qname = normalize_name(qname);
        let table = self.inner.read();

        let mut candidate = qname.as_str();
        loop {
            if let Some(zone) = table.get(candidate) {
                return Some(zone.clone());
            }
            if candidate == "." {
                return None;
            }
            // Peel one label: "a.b.test." -> "b.test." -> "test." -> "."
            candidate = match candidate.split_once('.') {
                Some((_, rest)) if !rest.is_empty() => rest,
                _ => ".",
            };
        }
    }

    /// Names of all currently loaded zones.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Number of loaded zones.
    pub fn zone_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Total number of records across all loaded zones.
    pub fn record_count(&self) -> usize {
        self.inner.read().values().map(|z| z.records.len()).sum()
    }

    /// True when no zone has been loaded.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
