//! Fallback zone storage: one file per zone on local disk.
//!
//! The mirror keeps queries answerable when etcd is unreachable at boot.
//! It is write-through only; steady-state refreshes never read from here.
//!
//! File format (filename = zone name, trailing dot included): a plain
//! concatenation of records, each record being a 1-byte id length, the id
//! bytes, then the RR in DNS wire form. The RR's RDLENGTH field makes its
//! length recoverable, so no further framing is needed; end of file is end
//! of records, and a short read is a corrupt file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::DnsError;
use crate::record::{pack_record, unpack_record, StoredRecord};
use crate::storage::ZoneStore;
use crate::zone::{normalize_name, Zone};

/// Zone storage in a local directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a file store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, DnsError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn zone_path(&self, zone: &str) -> PathBuf {
        self.dir.join(zone)
    }
}

#[async_trait]
impl ZoneStore for FileStore {
    async fn list_zones(&self) -> Result<Vec<String>, DnsError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut zones = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                zones.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        zones.sort();
        Ok(zones)
    }

    async fn add_zone(&self, _zone: &str) -> Result<(), DnsError> {
        Err(DnsError::Unsupported("add_zone"))
    }

    async fn remove_zone(&self, _zone: &str) -> Result<(), DnsError> {
        Err(DnsError::Unsupported("remove_zone"))
    }

    async fn load(&self, zone: &str) -> Result<Zone, DnsError> {
        let zone = normalize_name(zone);
        let data = fs::read(self.zone_path(&zone)).await?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < data.len() {
            let id_len = data[offset] as usize;
            offset += 1;
            if offset + id_len > data.len() {
                return Err(DnsError::CorruptZone {
                    zone,
                    reason: "truncated record id".to_string(),
                });
            }
            let id = String::from_utf8_lossy(&data[offset..offset + id_len]).into_owned();
            offset += id_len;

            let (rr, used) = unpack_record(&data[offset..]).map_err(|e| DnsError::CorruptZone {
                zone: zone.clone(),
                reason: format!("record {id}: {e}"),
            })?;
            offset += used;
            records.push(StoredRecord::new(id, rr));
        }

        Ok(Zone {
            name: zone,
            records,
            // The mirror carries no token; it never informs drift detection.
            change_token: None,
        })
    }

    async fn is_current(&self, _zone: &str, snapshot: Option<&Zone>) -> Result<bool, DnsError> {
        // Current whenever a snapshot is already being served, so the
        // coordinator loads from disk at boot and never afterwards.
        Ok(snapshot.is_some())
    }

    async fn patch(&self, zone: &str, record: StoredRecord) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        if record.id.len() > u8::MAX as usize {
            return Err(DnsError::InvalidRecord(format!(
                "record id longer than 255 bytes: {}",
                record.id
            )));
        }

        let rr_bytes = pack_record(&record.rr)?;
        let mut data = Vec::with_capacity(1 + record.id.len() + rr_bytes.len());
        data.push(record.id.len() as u8);
        data.extend_from_slice(record.id.as_bytes());
        data.extend_from_slice(&rr_bytes);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.zone_path(&zone))
            .await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, _zone: &str, _record_id: &str) -> Result<(), DnsError> {
        // Deletes reach the mirror implicitly: the coordinator rewrites the
        // whole file via clear-then-patch-all.
        Err(DnsError::Unsupported("delete"))
    }

    async fn clear(&self, zone: &str) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        let path = self.zone_path(&zone);
        match fs::metadata(&path).await {
            Ok(_) => {
                fs::File::create(&path).await?;
                debug!(zone = %zone, "truncated fallback zone file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
