use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

/// Request counters keyed by request path, plus process uptime.
pub struct ApiMetrics {
    endpoint_calls: DashMap<String, AtomicU64>,
    total_calls: AtomicU64,
    started: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_api_calls: u64,
    pub uptime: String,
    pub endpoint_stats: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub active_endpoints: usize,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self {
            endpoint_calls: DashMap::new(),
            total_calls: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record(&self, endpoint: &str) {
        if let Some(counter) = self.endpoint_calls.get(endpoint) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            self.endpoint_calls
                .entry(endpoint.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let endpoint_stats = self
            .endpoint_calls
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            total_api_calls: self.total_calls.load(Ordering::Relaxed),
            uptime: format!("{} seconds", self.started.elapsed().as_secs()),
            endpoint_stats,
        }
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "UP",
            timestamp: chrono::Utc::now().to_rfc3339(),
            active_endpoints: self.endpoint_calls.len(),
        }
    }

    /// Drops all counters. Uptime is not affected.
    pub fn reset(&self) {
        self.endpoint_calls.clear();
        self.total_calls.store(0, Ordering::Relaxed);
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}
