//! Lightweight metrics. No allocations, no locks, just atomics.
//!
//! Accumulates are not counted here: per-bank counters already hold the net
//! applied count and a shared counter would be the one contended line on the
//! hot path.

use core::fmt::Write;
use core::sync::atomic::{AtomicU64, Ordering};

/// Engine counters. All monotonic until the engine is dropped.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub loads: AtomicU64,
    pub reads: AtomicU64,
    pub rollbacks: AtomicU64,
    pub rolled_back: AtomicU64,
    pub truncated_rollbacks: AtomicU64,
    pub rebanks: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`] plus the net applied-delta gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub loads: u64,
    pub applied: u64,
    pub reads: u64,
    pub rollbacks: u64,
    pub rolled_back: u64,
    pub truncated_rollbacks: u64,
    pub rebanks: u64,
}

impl EngineMetrics {
    pub const fn new() -> Self {
        Self {
            loads: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
            truncated_rollbacks: AtomicU64::new(0),
            rebanks: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_rollback(&self, requested: usize, actual: usize) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        self.rolled_back.fetch_add(actual as u64, Ordering::Relaxed);
        if actual < requested {
            self.truncated_rollbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn record_rebank(&self) {
        self.rebanks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, applied: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            loads: self.loads.load(Ordering::Relaxed),
            applied,
            reads: self.reads.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            truncated_rollbacks: self.truncated_rollbacks.load(Ordering::Relaxed),
            rebanks: self.rebanks.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Prometheus text exposition.
    pub fn render_prometheus(&self, prefix: &str) -> String {
        let series: [(&str, &str, &str, u64); 7] = [
            ("loads_total", "counter", "LOAD operations", self.loads),
            (
                "applied_deltas",
                "gauge",
                "Deltas applied since the last LOAD, net of undos",
                self.applied,
            ),
            ("reads_total", "counter", "READ operations", self.reads),
            ("rollbacks_total", "counter", "ROLLBACK operations", self.rollbacks),
            ("rolled_back_total", "counter", "Deltas undone by ROLLBACK", self.rolled_back),
            (
                "truncated_rollbacks_total",
                "counter",
                "ROLLBACKs that hit the end of undo history",
                self.truncated_rollbacks,
            ),
            ("rebanks_total", "counter", "Bank count changes", self.rebanks),
        ];

        let mut out = String::with_capacity(1024);
        for (name, kind, help, value) in series {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "# HELP {prefix}_{name} {help}");
            let _ = writeln!(out, "# TYPE {prefix}_{name} {kind}");
            let _ = writeln!(out, "{prefix}_{name} {value}");
        }
        out
    }
}
