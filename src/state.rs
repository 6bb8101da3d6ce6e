use crate::config::AppConfig;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Performance Counters (lock-free) ──

#[derive(Debug, Default)]
pub struct PerfCounters {
    pub requests_served: AtomicU64,
    pub options_priced: AtomicU64,
    pub simulation_paths: AtomicU64,
    pub scenarios_projected: AtomicU64,
    pub errors_returned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub requests_served: u64,
    pub options_priced: u64,
    pub simulation_paths: u64,
    pub scenarios_projected: u64,
    pub errors_returned: u64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests_served: self.requests_served.load(Ordering::Relaxed),
            options_priced: self.options_priced.load(Ordering::Relaxed),
            simulation_paths: self.simulation_paths.load(Ordering::Relaxed),
            scenarios_projected: self.scenarios_projected.load(Ordering::Relaxed),
            errors_returned: self.errors_returned.load(Ordering::Relaxed),
        }
    }
}

// ── Application shared state ──

/// Read-only config plus counters. Computations themselves keep no state
/// between requests.
pub struct AppState {
    pub config: AppConfig,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            counters: PerfCounters::new(),
        })
    }
}
