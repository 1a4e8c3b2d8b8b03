//! Metrics instrumentation for dove-dns.
//!
//! All metrics are prefixed with `dove_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record one answered DNS question.
pub fn record_query(qtype: &str, outcome: QueryOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        QueryOutcome::Answered => "answered",
        QueryOutcome::NoRecords => "no_records",
        QueryOutcome::NxDomain => "nxdomain",
    };

    counter!("dove_dns.query.count", "type" => qtype.to_string(), "outcome" => outcome_str)
        .increment(1);
    histogram!("dove_dns.query.duration.seconds", "type" => qtype.to_string())
        .record(duration.as_secs_f64());
}

/// Per-question query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryOutcome {
    /// At least one record matched.
    Answered,
    /// The zone exists but nothing matched.
    NoRecords,
    /// No zone covers the queried name.
    NxDomain,
}

/// Record the answer count of a successful question.
pub fn record_answers_returned(count: usize) {
    histogram!("dove_dns.query.answers_returned").record(count as f64);
}

/// Record an inbound message dropped before handling (undecodable).
pub fn record_dropped_message() {
    counter!("dove_dns.message.dropped.count").increment(1);
}

/// Record a per-zone refresh decision during a reconcile pass.
pub fn record_zone_refresh(outcome: RefreshOutcome) {
    let outcome_str = match outcome {
        RefreshOutcome::Reloaded => "reloaded",
        RefreshOutcome::Current => "current",
        RefreshOutcome::CheckFailed => "check_failed",
        RefreshOutcome::LoadFailed => "load_failed",
    };

    counter!("dove_dns.zone.refresh.count", "outcome" => outcome_str).increment(1);
}

/// Per-zone refresh outcomes.
#[derive(Debug, Clone, Copy)]
pub enum RefreshOutcome {
    /// Drift detected and the zone was reloaded.
    Reloaded,
    /// Change token matched; nothing to do.
    Current,
    /// The drift check itself failed.
    CheckFailed,
    /// The reload failed; the prior snapshot stays live.
    LoadFailed,
}

/// Record a zone dropped because it left the primary's zone list.
pub fn record_zone_removed() {
    counter!("dove_dns.zone.removed.count").increment(1);
}

/// Record a failed write-through to the fallback mirror.
pub fn record_mirror_error() {
    counter!("dove_dns.mirror.error.count").increment(1);
}

/// Record the outcome of a whole reconcile pass.
pub fn record_reconcile(outcome: ReconcileOutcome) {
    let outcome_str = match outcome {
        ReconcileOutcome::Completed => "completed",
        ReconcileOutcome::ListFailed => "list_failed",
        ReconcileOutcome::DeadlineExceeded => "deadline_exceeded",
    };

    counter!("dove_dns.reconcile.count", "outcome" => outcome_str).increment(1);
}

/// Reconcile pass outcomes.
#[derive(Debug, Clone, Copy)]
pub enum ReconcileOutcome {
    /// The pass ran to completion (individual zones may still have failed).
    Completed,
    /// The zone list could not be fetched; the pass was aborted.
    ListFailed,
    /// The pass overran its deadline and was abandoned.
    DeadlineExceeded,
}

/// Record which store the boot-time zone set came from.
pub fn record_boot_source(source: BootSource) {
    let source_str = match source {
        BootSource::Primary => "primary",
        BootSource::Fallback => "fallback",
        BootSource::Empty => "empty",
    };

    counter!("dove_dns.boot.count", "source" => source_str).increment(1);
}

/// Where the initial zone set was loaded from.
#[derive(Debug, Clone, Copy)]
pub enum BootSource {
    /// The primary store answered at boot.
    Primary,
    /// The primary was down; zones came from the on-disk mirror.
    Fallback,
    /// Both stores failed; serving an empty zone set.
    Empty,
}

/// Record table-wide sizes (call after each reconcile pass).
pub fn record_table_size(zones: usize, records: usize) {
    gauge!("dove_dns.table.zones").set(zones as f64);
    gauge!("dove_dns.table.records").set(records as f64);
}

/// Record the published record count of one zone (0 on removal).
pub fn record_zone_records(zone: &str, records: usize) {
    gauge!("dove_dns.zone.records", "zone" => zone.to_string()).set(records as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
