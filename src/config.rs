//! Configuration types for dove-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Admin API configuration.
    pub admin: AdminConfig,

    /// Zone storage configuration.
    pub store: StoreConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP).
    pub listen_addr: SocketAddr,
}

/// Admin API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Address for the HTTP admin API to listen on.
    pub listen_addr: SocketAddr,

    /// Accepted API keys. Requests without one of these are rejected.
    pub api_keys: Vec<String>,
}

/// Zone storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// etcd endpoints of the primary store (e.g., "http://127.0.0.1:2379").
    pub etcd_endpoints: Vec<String>,

    /// Key prefix for zone data in etcd.
    #[serde(default = "default_etcd_prefix")]
    pub etcd_prefix: String,

    /// Directory for the on-disk fallback mirror.
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,

    /// Seconds between reconcile passes against the primary.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl StoreConfig {
    /// The refresh interval as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "dove_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_etcd_prefix() -> String {
    "/dove/zones".to_string()
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("/var/lib/dove-dns/zones")
}

fn default_refresh_interval_secs() -> u64 {
    15
}
