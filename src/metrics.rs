//! Run-level progress counters (spec §5 "Shared vs. private state", §6.6).
//!
//! Each worker owns its [`crate::aggregator::AggregatorStats`]; nothing here
//! synchronizes access to a worker's counters mid-run — a UI thread reading
//! them tolerates torn/stale values, per the ordering guarantees in spec
//! §5. This module only aggregates the *final* per-worker snapshots once
//! all workers have joined, and reports them the way the rest of the crate
//! reports everything else: a `tracing::info!` line, plus an optional JSON
//! dump for tooling that wants to parse it.

use serde::Serialize;
use serde_json::Value;

use crate::aggregator::AggregatorStats;

/// Totals across every worker's aggregator, taken after all workers have
/// joined and before the merge (files/records) or after the merge
/// (`output_records`).
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RunMetrics {
    pub workers: usize,
    pub files_processed: u64,
    pub records_processed: u64,
    pub records_dropped: u64,
    pub output_records: u64,
}

impl RunMetrics {
    /// Fold the final stats of every worker's aggregator into one summary.
    #[must_use]
    pub fn from_worker_stats(stats: &[AggregatorStats]) -> Self {
        let mut totals = Self {
            workers: stats.len(),
            ..Self::default()
        };
        for s in stats {
            totals.files_processed += s.files_processed;
            totals.records_processed += s.records_processed;
            totals.records_dropped += s.records_dropped;
        }
        totals
    }

    pub fn set_output_records(&mut self, n: u64) {
        self.output_records = n;
    }

    #[must_use]
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Emit the one-line end-of-run summary (spec §2.2 logging policy).
    pub fn log_summary(&self) {
        tracing::info!(
            workers = self.workers,
            files_processed = self.files_processed,
            records_processed = self.records_processed,
            records_dropped = self.records_dropped,
            output_records = self.output_records,
            "aggregation run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_per_worker_stats() {
        let stats = vec![
            AggregatorStats {
                files_processed: 2,
                records_processed: 100,
                records_dropped: 1,
            },
            AggregatorStats {
                files_processed: 3,
                records_processed: 150,
                records_dropped: 0,
            },
        ];
        let mut totals = RunMetrics::from_worker_stats(&stats);
        totals.set_output_records(10);

        assert_eq!(totals.workers, 2);
        assert_eq!(totals.files_processed, 5);
        assert_eq!(totals.records_processed, 250);
        assert_eq!(totals.records_dropped, 1);
        assert_eq!(totals.output_records, 10);
    }
}
