//! Dove DNS - An authoritative DNS server with zones stored in etcd.
//!
//! This crate serves standard DNS over UDP for zones that operators manage
//! through a small HTTP admin API. Zone data lives in etcd; a coordinator
//! task mirrors every loaded zone to local disk so queries keep being
//! answered when etcd is unreachable at startup.
//!
//! ## Features
//!
//! - Change-token drift detection: zones reload only when etcd content
//!   actually changed
//! - Write-through on-disk fallback, used when etcd is down at boot
//! - Exact and wildcard owner matching with case-preserving answers
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           dove-dns                             │
//! │                                                                │
//! │  admin API ──▶ ┌──────────────┐      ┌──────────────────┐      │
//! │   (HTTP)       │  etcd store  │─────▶│ zone coordinator │      │
//! │                └──────────────┘ load └────────┬─────────┘      │
//! │                        ▲                      │ publish        │
//! │                        │ change token         ▼        mirror  │
//! │                        │              ┌──────────────┐    │    │
//! │                        └──────────────│  zone table  │    ▼    │
//! │                                       │ (in-memory)  │  files  │
//! │                                       └──────┬───────┘         │
//! │                                              │ lookup          │
//! │                              UDP :53 ──▶ DNS server            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dove_dns::{Coordinator, DnsServer, EtcdStore, FileStore, ZoneTable};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let primary = Arc::new(
//!         EtcdStore::connect(&["http://127.0.0.1:2379".into()], "/dove/zones")
//!             .await
//!             .unwrap(),
//!     );
//!     let fallback = Arc::new(FileStore::open("/var/lib/dove-dns/zones").await.unwrap());
//!     let table = ZoneTable::new();
//!
//!     let cancel = CancellationToken::new();
//!     let coordinator = Coordinator::new(
//!         primary,
//!         fallback,
//!         table.clone(),
//!         std::time::Duration::from_secs(15),
//!     );
//!     tokio::spawn(coordinator.run(cancel.clone()));
//!
//!     let config = dove_dns::DnsConfig { listen_addr: "[::]:53".parse().unwrap() };
//!     let server = DnsServer::bind(&config, table).await.unwrap();
//!     server.run(cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod etcd;
pub mod file;
pub mod metrics;
pub mod record;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod zone;

// Re-export main types
pub use config::{AdminConfig, Config, DnsConfig, StoreConfig, TelemetryConfig};
pub use coordinator::Coordinator;
pub use error::DnsError;
pub use etcd::EtcdStore;
pub use file::FileStore;
pub use record::StoredRecord;
pub use server::DnsServer;
pub use storage::ZoneStore;
pub use zone::{Zone, ZoneTable};
