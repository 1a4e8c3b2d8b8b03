//! Shared test infrastructure: an in-memory primary store double and
//! DNS client helpers.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use dove_dns::record::{parse_rr_text, StoredRecord};
use dove_dns::zone::{normalize_name, Zone, ZoneTable};
use dove_dns::{DnsConfig, DnsError, DnsServer, ZoneStore};

// --- In-memory primary store ---

#[derive(Default)]
struct MemoryStoreInner {
    declared: BTreeSet<String>,
    records: HashMap<String, BTreeMap<String, StoredRecord>>,
    tokens: HashMap<String, String>,
    poisoned: HashSet<String>,
    load_counts: HashMap<String, usize>,
    token_seq: u64,
}

/// A `ZoneStore` double with the primary adapter's semantics: change tokens
/// bumped atomically with writes, plus switches to simulate outages and
/// per-zone load failures.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
    unreachable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every operation fail, as if the backing cluster were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make loads of one zone fail, as if its stored bytes were corrupt.
    pub fn poison_zone(&self, zone: &str) {
        self.inner
            .lock()
            .unwrap()
            .poisoned
            .insert(normalize_name(zone));
    }

    /// How many times a zone has been fully loaded.
    pub fn load_count(&self, zone: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .load_counts
            .get(&normalize_name(zone))
            .copied()
            .unwrap_or(0)
    }

    fn check_reachable(&self) -> Result<(), DnsError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DnsError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "primary store unreachable",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ZoneStore for MemoryStore {
    async fn list_zones(&self) -> Result<Vec<String>, DnsError> {
        self.check_reachable()?;
        Ok(self.inner.lock().unwrap().declared.iter().cloned().collect())
    }

    async fn add_zone(&self, zone: &str) -> Result<(), DnsError> {
        self.check_reachable()?;
        self.inner
            .lock()
            .unwrap()
            .declared
            .insert(normalize_name(zone));
        Ok(())
    }

    async fn remove_zone(&self, zone: &str) -> Result<(), DnsError> {
        self.check_reachable()?;
        let zone = normalize_name(zone);
        let mut inner = self.inner.lock().unwrap();
        inner.declared.remove(&zone);
        inner.records.remove(&zone);
        inner.tokens.remove(&zone);
        Ok(())
    }

    async fn load(&self, zone: &str) -> Result<Zone, DnsError> {
        self.check_reachable()?;
        let zone = normalize_name(zone);
        let mut inner = self.inner.lock().unwrap();
        if inner.poisoned.contains(&zone) {
            return Err(DnsError::CorruptZone {
                zone,
                reason: "poisoned by test".to_string(),
            });
        }
        *inner.load_counts.entry(zone.clone()).or_insert(0) += 1;

        Ok(Zone {
            name: zone.clone(),
            records: inner
                .records
                .get(&zone)
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default(),
            change_token: inner.tokens.get(&zone).cloned(),
        })
    }

    async fn is_current(&self, zone: &str, snapshot: Option<&Zone>) -> Result<bool, DnsError> {
        self.check_reachable()?;
        let Some(snapshot) = snapshot else {
            return Ok(false);
        };
        let stored = self
            .inner
            .lock()
            .unwrap()
            .tokens
            .get(&normalize_name(zone))
            .cloned();
        Ok(stored == snapshot.change_token)
    }

    async fn patch(&self, zone: &str, record: StoredRecord) -> Result<(), DnsError> {
        self.check_reachable()?;
        let zone = normalize_name(zone);
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .entry(zone.clone())
            .or_default()
            .insert(record.id.clone(), record);
        inner.token_seq += 1;
        let token = format!("tok-{}", inner.token_seq);
        inner.tokens.insert(zone, token);
        Ok(())
    }

    async fn delete(&self, zone: &str, record_id: &str) -> Result<(), DnsError> {
        self.check_reachable()?;
        let zone = normalize_name(zone);
        let mut inner = self.inner.lock().unwrap();
        if let Some(records) = inner.records.get_mut(&zone) {
            records.remove(record_id);
        }
        inner.token_seq += 1;
        let token = format!("tok-{}", inner.token_seq);
        inner.tokens.insert(zone, token);
        Ok(())
    }

    async fn clear(&self, zone: &str) -> Result<(), DnsError> {
        self.check_reachable()?;
        let zone = normalize_name(zone);
        let mut inner = self.inner.lock().unwrap();
        inner.records.remove(&zone);
        inner.tokens.remove(&zone);
        Ok(())
    }
}

// --- Record builders ---

/// Parse a textual RR the way the admin surface does.
pub fn stored_record(id: &str, text: &str, zone: &str) -> StoredRecord {
    let origin = Name::from_ascii(zone).expect("invalid zone name");
    let rr = parse_rr_text(text, &origin).expect("invalid record text");
    StoredRecord::new(id, rr)
}

// --- DNS client helpers ---

/// Start a DNS server over `table` on an ephemeral loopback port.
pub async fn start_dns_server(table: ZoneTable, cancel: CancellationToken) -> SocketAddr {
    let config = DnsConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
    };
    let server = DnsServer::bind(&config, table)
        .await
        .expect("failed to bind DNS server");
    let addr = server.local_addr().expect("failed to get local addr");

    tokio::spawn(async move {
        if let Err(e) = server.run(cancel).await {
            eprintln!("DNS server error: {e}");
        }
    });

    addr
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Send one query over UDP and return the parsed response.
pub async fn query_udp(server: SocketAddr, name: &str, record_type: RecordType, id: u16) -> Message {
    let bytes = build_query_bytes(name, record_type, id);
    send_udp(server, &bytes).await.expect("query timed out")
}

/// Send raw bytes over UDP; `None` when no reply arrives in time.
pub async fn send_udp(server: SocketAddr, bytes: &[u8]) -> Option<Message> {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind client socket");
    sock.send_to(bytes, server).await.expect("failed to send");

    let mut buf = vec![0u8; 4096];
    let len = tokio::time::timeout(Duration::from_secs(2), sock.recv(&mut buf))
        .await
        .ok()?
        .expect("failed to recv response");

    Some(Message::from_vec(&buf[..len]).expect("failed to parse DNS response"))
}
