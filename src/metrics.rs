//! Process-wide counters exposed for operational visibility: no metrics exporter is in
//! scope here, so these are surfaced only via the `/health` endpoint and periodic log lines,
//! using plain atomics rather than a dedicated metrics registry.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::ingest::IngestMetrics;
use crate::scheduler::AnalyticsMetrics;

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_published: u64,
    pub frames_dropped: u64,
    pub ingest_reconnects: u64,
    pub snapshots_generated: u64,
    pub cycles_skipped_insufficient_data: u64,
}

pub struct AppMetrics {
    pub ingest: Arc<IngestMetrics>,
    pub analytics: Arc<AnalyticsMetrics>,
}

impl AppMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_published: self.ingest.ticks_published.load(Ordering::Relaxed),
            frames_dropped: self.ingest.frames_dropped.load(Ordering::Relaxed),
            ingest_reconnects: self.ingest.reconnects.load(Ordering::Relaxed),
            snapshots_generated: self.analytics.snapshots_generated.load(Ordering::Relaxed),
            cycles_skipped_insufficient_data: self
                .analytics
                .cycles_skipped_insufficient_data
                .load(Ordering::Relaxed),
        }
    }
}
