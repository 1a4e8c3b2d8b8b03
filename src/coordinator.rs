//! Zone reconciliation between the stores and the in-memory table.
//!
//! One coordinator task runs per process. On every tick it fetches the
//! primary's zone list, reloads zones whose change token drifted, swaps the
//! new snapshots into the [`ZoneTable`], mirrors them to the fallback store,
//! and drops zones that left the list. Failures degrade to serving the
//! previous snapshot; only the query table is authoritative for live
//! serving.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::DnsError;
use crate::metrics::{self, BootSource, ReconcileOutcome, RefreshOutcome};
use crate::storage::{mirror_zone, ZoneStore};
use crate::zone::{Zone, ZoneTable};

/// Hard ceiling on the work done per reconcile pass.
const TICK_DEADLINE: Duration = Duration::from_secs(10);

/// Callback invoked after each table mutation: `Some` for a published
/// snapshot, `None` for a removed zone. Called in application order.
pub type ZoneListener = Arc<dyn Fn(&str, Option<&Arc<Zone>>) + Send + Sync>;

/// Keeps the [`ZoneTable`] reconciled against the primary store.
pub struct Coordinator {
    table: ZoneTable,
    primary: Arc<dyn ZoneStore>,
    fallback: Arc<dyn ZoneStore>,
    refresh_interval: Duration,
    listener: Option<ZoneListener>,
}

impl Coordinator {
    /// Create a coordinator over the given stores and table.
    pub fn new(
        primary: Arc<dyn ZoneStore>,
        fallback: Arc<dyn ZoneStore>,
        table: ZoneTable,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            table,
            primary,
            fallback,
            refresh_interval,
            listener: None,
        }
    }

    /// Install a listener for zone publish/remove events.
    pub fn with_listener(mut self, listener: ZoneListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Load the initial zone set.
    ///
    /// Prefers the primary; falls back to the on-disk mirror when the
    /// primary is unreachable. Never fails: with both stores down the
    /// table simply stays empty and queries answer NXDOMAIN until a later
    /// tick succeeds.
    pub async fn bootstrap(&self) {
        info!("loading zones from primary store");
        match self.reconcile_with_deadline(true).await {
            Ok(()) => {
                metrics::record_boot_source(BootSource::Primary);
                return;
            }
            Err(e) => {
                error!(error = %e, "failed to load zones from primary, trying fallback");
            }
        }

        match timeout(TICK_DEADLINE, self.reconcile(&*self.fallback, false)).await {
            Ok(Ok(())) => {
                metrics::record_boot_source(BootSource::Fallback);
                info!(zones = self.table.zone_count(), "loaded zones from fallback store");
            }
            Ok(Err(e)) => {
                metrics::record_boot_source(BootSource::Empty);
                error!(error = %e, "failed to load zones from fallback, serving empty zone set");
            }
            Err(_) => {
                metrics::record_boot_source(BootSource::Empty);
                error!("fallback load exceeded deadline, serving empty zone set");
            }
        }

        if self.table.is_empty() {
            warn!("no DNS zones loaded");
        }
    }

    /// Run one reconcile pass against the primary store.
    pub async fn refresh(&self) -> Result<(), DnsError> {
        self.reconcile(&*self.primary, true).await
    }

    /// Run the refresh loop until cancelled.
    ///
    /// Ticks never overlap: the next tick waits for the previous pass to
    /// finish, and each pass is bounded by [`TICK_DEADLINE`].
    pub async fn run(self, cancel: CancellationToken) {
        self.bootstrap().await;

        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately and
        // bootstrap just ran; swallow it.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("zone coordinator shutting down");
                    return;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_with_deadline(true).await {
                        warn!(error = %e, "zone refresh failed, serving stale data");
                    }
                }
            }
        }
    }

    async fn reconcile_with_deadline(&self, mirror: bool) -> Result<(), DnsError> {
        match timeout(TICK_DEADLINE, self.reconcile(&*self.primary, mirror)).await {
            Ok(Ok(())) => {
                metrics::record_reconcile(ReconcileOutcome::Completed);
                Ok(())
            }
            Ok(Err(e)) => {
                metrics::record_reconcile(ReconcileOutcome::ListFailed);
                Err(e)
            }
            Err(_) => {
                metrics::record_reconcile(ReconcileOutcome::DeadlineExceeded);
                Err(DnsError::Deadline("reconcile pass"))
            }
        }
    }

    /// One reconcile pass against `store`.
    ///
    /// Fails only when the zone list cannot be fetched; per-zone problems
    /// are logged and leave that zone's previous snapshot in place.
    async fn reconcile(&self, store: &dyn ZoneStore, mirror: bool) -> Result<(), DnsError> {
        let zone_names = store.list_zones().await?;

        for name in &zone_names {
            let snapshot = self.table.get(name);
            let current = match store.is_current(name, snapshot.as_deref()).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(zone = %name, error = %e, "drift check failed, keeping current snapshot");
                    metrics::record_zone_refresh(RefreshOutcome::CheckFailed);
                    continue;
                }
            };
            trace!(zone = %name, updated = !current, "checked zone for update");
            if current {
                metrics::record_zone_refresh(RefreshOutcome::Current);
                continue;
            }

            let zone = match store.load(name).await {
                Ok(zone) => zone,
                Err(e) => {
                    warn!(zone = %name, error = %e, "zone load failed, keeping current snapshot");
                    metrics::record_zone_refresh(RefreshOutcome::LoadFailed);
                    continue;
                }
            };

            let published = self.table.publish(zone);
            if let Some(listener) = &self.listener {
                listener(name, Some(&published));
            }
            metrics::record_zone_refresh(RefreshOutcome::Reloaded);
            info!(zone = %name, records = published.records.len(), "loaded zone");

            if mirror {
                // Mirror errors are not fatal; in-memory stays authoritative.
                if let Err(e) = mirror_zone(&published, &*self.fallback).await {
                    warn!(zone = %name, error = %e, "failed to mirror zone to fallback");
                    metrics::record_mirror_error();
                }
            }
        }

        let listed: HashSet<&str> = zone_names.iter().map(String::as_str).collect();
        for stale in self.table.names() {
            if listed.contains(stale.as_str()) {
                continue;
            }
            self.table.remove(&stale);
            if let Some(listener) = &self.listener {
                listener(&stale, None);
            }
            metrics::record_zone_removed();
            info!(zone = %stale, "unloaded zone");
        }

        metrics::record_table_size(self.table.zone_count(), self.table.record_count());
        debug!(zones = self.table.zone_count(), "reconcile pass complete");
        Ok(())
    }
}
