//! dove-dns binary entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dove_dns::{
    admin, metrics, telemetry, Config, Coordinator, DnsServer, EtcdStore, FileStore, ZoneStore,
    ZoneTable,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Authoritative DNS server with zones stored in etcd.
#[derive(Parser, Debug)]
#[command(name = "dove-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "dove-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("DOVE_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        dns_addr = %config.dns.listen_addr,
        admin_addr = %config.admin.listen_addr,
        etcd_prefix = %config.store.etcd_prefix,
        "Starting dove-dns"
    );

    // Setup graceful shutdown on Ctrl-C
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_cancel.cancel();
        }
    });

    // Storage backends
    let primary: Arc<dyn ZoneStore> = Arc::new(
        EtcdStore::connect(&config.store.etcd_endpoints, &config.store.etcd_prefix).await?,
    );
    let fallback: Arc<dyn ZoneStore> = Arc::new(FileStore::open(&config.store.fallback_dir).await?);

    // Zone coordinator
    let table = ZoneTable::new();
    let coordinator = Coordinator::new(
        primary.clone(),
        fallback,
        table.clone(),
        config.store.refresh_interval(),
    )
    .with_listener(Arc::new(|zone, snapshot| {
        let records = snapshot.map(|z| z.records.len()).unwrap_or(0);
        metrics::record_zone_records(zone, records);
    }));
    let coordinator_handle = tokio::spawn(coordinator.run(cancel.clone()));

    // Admin API
    let admin_config = config.admin.clone();
    let admin_store = primary.clone();
    let admin_cancel = cancel.clone();
    let admin_handle = tokio::spawn(async move {
        if let Err(e) = admin::serve(&admin_config, admin_store, admin_cancel).await {
            error!("Admin API error: {}", e);
        }
    });

    // DNS server runs on the main task until shutdown
    let server = DnsServer::bind(&config.dns, table).await?;
    let result = server.run(cancel.clone()).await;

    cancel.cancel();
    let _ = coordinator_handle.await;
    let _ = admin_handle.await;

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("dove-dns shutdown complete");
    Ok(())
}
