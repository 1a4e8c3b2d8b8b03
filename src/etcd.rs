//! Primary zone storage backed by etcd.
//!
//! Key layout under the configured prefix `P`:
//!
//! ```text
//! P/__zones/<zone>        -> declaration marker
//! P/<zone>/<recordId>     -> packed RR wire bytes
//! P/<zone>/__changeToken  -> opaque token, rewritten on every write
//! ```
//!
//! Every write commits the record mutation and a fresh change token in one
//! transaction, so readers observe either the pre-write or the post-write
//! state of a zone, never a mix.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, ConnectOptions, DeleteOptions, GetOptions, KvClient, Txn, TxnOp,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::DnsError;
use crate::record::{pack_record, unpack_record, StoredRecord};
use crate::storage::ZoneStore;
use crate::zone::{normalize_name, Zone};

const CHANGE_TOKEN_KEY: &str = "__changeToken";
const ZONE_MARKER_DIR: &str = "__zones";

/// Zone storage on an etcd cluster.
pub struct EtcdStore {
    client: Client,
    prefix: String,
}

impl EtcdStore {
    /// Connect to etcd and return a store rooted at `prefix`.
    pub async fn connect(endpoints: &[String], prefix: &str) -> Result<Self, DnsError> {
        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(10));
        let client = Client::connect(endpoints, Some(options)).await?;

        Ok(Self {
            client,
            prefix: prefix.trim_end_matches('/').to_string(),
        })
    }

    fn kv(&self) -> KvClient {
        self.client.kv_client()
    }

    fn zone_prefix(&self, zone: &str) -> String {
        format!("{}/{}/", self.prefix, zone)
    }

    fn token_key(&self, zone: &str) -> String {
        format!("{}{}", self.zone_prefix(zone), CHANGE_TOKEN_KEY)
    }

    fn marker_key(&self, zone: &str) -> String {
        format!("{}/{}/{}", self.prefix, ZONE_MARKER_DIR, zone)
    }

    async fn stored_token(&self, zone: &str) -> Result<Option<String>, DnsError> {
        let resp = self.kv().get(self.token_key(zone), None).await?;
        Ok(resp
            .kvs()
            .first()
            .map(|kv| String::from_utf8_lossy(kv.value()).into_owned()))
    }
}

#[async_trait]
impl ZoneStore for EtcdStore {
    async fn list_zones(&self) -> Result<Vec<String>, DnsError> {
        let marker_prefix = format!("{}/{}/", self.prefix, ZONE_MARKER_DIR);
        let resp = self
            .kv()
            .get(marker_prefix.as_str(), Some(GetOptions::new().with_prefix()))
            .await?;

        let mut zones = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            let key = kv.key_str()?;
            zones.push(key[marker_prefix.len()..].to_string());
        }
        Ok(zones)
    }

    async fn add_zone(&self, zone: &str) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        self.kv().put(self.marker_key(&zone), "", None).await?;
        debug!(zone = %zone, "declared zone");
        Ok(())
    }

    async fn remove_zone(&self, zone: &str) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        let txn = Txn::new().and_then(vec![
            TxnOp::delete(self.marker_key(&zone), None),
            TxnOp::delete(
                self.zone_prefix(&zone),
                Some(DeleteOptions::new().with_prefix()),
            ),
        ]);
        self.kv().txn(txn).await?;
        debug!(zone = %zone, "removed zone");
        Ok(())
    }

    async fn load(&self, zone: &str) -> Result<Zone, DnsError> {
        let zone = normalize_name(zone);
        let prefix = self.zone_prefix(&zone);
        let resp = self
            .kv()
            .get(prefix.as_str(), Some(GetOptions::new().with_prefix()))
            .await?;

        let mut records = Vec::new();
        let mut change_token = None;
        for kv in resp.kvs() {
            let key = kv.key_str()?;
            let id = &key[prefix.len()..];
            if id == CHANGE_TOKEN_KEY {
                change_token = Some(String::from_utf8_lossy(kv.value()).into_owned());
                continue;
            }

            // One bad record fails the whole load; the coordinator keeps
            // serving the previous snapshot in that case.
            let (rr, _) = unpack_record(kv.value()).map_err(|e| DnsError::CorruptZone {
                zone: zone.clone(),
                reason: format!("record {id}: {e}"),
            })?;
            records.push(StoredRecord::new(id, rr));
        }

        Ok(Zone {
            name: zone,
            records,
            change_token,
        })
    }

    async fn is_current(&self, zone: &str, snapshot: Option<&Zone>) -> Result<bool, DnsError> {
        let Some(snapshot) = snapshot else {
            return Ok(false);
        };
        let stored = self.stored_token(&normalize_name(zone)).await?;
        Ok(stored == snapshot.change_token)
    }

    async fn patch(&self, zone: &str, record: StoredRecord) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        let data = pack_record(&record.rr)?;
        let token = Uuid::new_v4().to_string();

        let txn = Txn::new().and_then(vec![
            TxnOp::put(format!("{}{}", self.zone_prefix(&zone), record.id), data, None),
            TxnOp::put(self.token_key(&zone), token, None),
        ]);
        self.kv().txn(txn).await?;
        Ok(())
    }

    async fn delete(&self, zone: &str, record_id: &str) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        let token = Uuid::new_v4().to_string();

        let txn = Txn::new().and_then(vec![
            TxnOp::delete(format!("{}{}", self.zone_prefix(&zone), record_id), None),
            TxnOp::put(self.token_key(&zone), token, None),
        ]);
        self.kv().txn(txn).await?;
        Ok(())
    }

    async fn clear(&self, zone: &str) -> Result<(), DnsError> {
        let zone = normalize_name(zone);
        self.kv()
            .delete(
                self.zone_prefix(&zone),
                Some(DeleteOptions::new().with_prefix()),
            )
            .await?;
        Ok(())
    }
}
