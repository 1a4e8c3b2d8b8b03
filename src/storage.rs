//! The storage contract shared by the primary and fallback backends.

use async_trait::async_trait;

use crate::error::DnsError;
use crate::record::StoredRecord;
use crate::zone::Zone;

/// Uniform capability set required of a zone storage backend.
///
/// The primary (etcd) adapter supports everything. The fallback (file)
/// adapter supports the load / patch / clear subset plus `list_zones`, and
/// reports `Unsupported` for the rest; the coordinator never exercises
/// those paths against it.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// All admin-declared zone names.
    async fn list_zones(&self) -> Result<Vec<String>, DnsError>;

    /// Declare a zone. Idempotent; admin path only.
    async fn add_zone(&self, zone: &str) -> Result<(), DnsError>;

    /// Remove a zone declaration and its data. Idempotent; admin path only.
    async fn remove_zone(&self, zone: &str) -> Result<(), DnsError>;

    /// Load the full zone. A zone with zero records is valid.
    async fn load(&self, zone: &str) -> Result<Zone, DnsError>;

    /// Whether `snapshot` still reflects what this store holds for `zone`.
    ///
    /// A zone never loaded (`None` snapshot) is not current.
    async fn is_current(&self, zone: &str, snapshot: Option<&Zone>) -> Result<bool, DnsError>;

    /// Upsert one record by id, atomically with a change-token bump.
    async fn patch(&self, zone: &str, record: StoredRecord) -> Result<(), DnsError>;

    /// Delete one record by id, atomically with a change-token bump.
    /// No-op if the id is absent.
    async fn delete(&self, zone: &str, record_id: &str) -> Result<(), DnsError>;

    /// Remove all records of a zone along with its change token.
    async fn clear(&self, zone: &str) -> Result<(), DnsError>;
}

/// Rewrite `target`'s copy of a zone to exactly the given snapshot.
///
/// Clear-then-patch-all; per-record deletes never need to propagate because
/// the whole file is rebuilt. Used by the coordinator to keep the fallback
/// mirror in step with the in-memory table.
pub async fn mirror_zone(zone: &Zone, target: &dyn ZoneStore) -> Result<(), DnsError> {
    target.clear(&zone.name).await?;
    for record in &zone.records {
        target.patch(&zone.name, record.clone()).await?;
    }
    Ok(())
}
