//! Orchestration: expand the input glob, fan work out across a rayon
//! scope of file-queue-draining workers, sort each worker's table, and run
//! the threshold merge (spec §5, §6.1).

use std::path::PathBuf;
use std::sync::Mutex;

use crate::aggregator::{Aggregator, AggregatorStats};
use crate::comparator::{compare_slots, SortSpec};
use crate::config::RunConfig;
use crate::error::{AggError, Result};
use crate::filter::{InputFilter, OutputFilter};
use crate::ipfix::RecordReader;
use crate::merge;
use crate::metrics::RunMetrics;
use crate::queue::FileQueue;
use crate::table::Table;
use crate::view::ViewDefinition;

/// The result of one complete aggregation run: the surviving rows (already
/// top-N-selected and output-filtered), in descending sort order, plus the
/// final progress counters.
pub struct RunOutcome {
    pub rows: Vec<Vec<u8>>,
    pub metrics: RunMetrics,
}

/// Drives one end-to-end run: worker fan-out, per-worker sort, merge,
/// output filter. Stateless — every run gets a fresh `Runner`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Runner {
    /// Overrides `config.threads` when set; mainly for tests that want a
    /// deterministic worker count regardless of the host machine.
    pub thread_override: Option<usize>,
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
        let paths: std::result::Result<Vec<PathBuf>, _> = glob::glob(pattern)
            .map_err(|e| AggError::config(format!("invalid input glob \"{pattern}\": {e}")))?
            .collect();
        paths.map_err(|e| AggError::config(format!("error expanding input glob: {e}")))
    }

    /// Run the aggregation end to end. `R` is the concrete IPFIX reader
    /// type (spec §6.2); the engine only depends on its [`RecordReader`]
    /// contract.
    pub fn run<R: RecordReader>(
        &self,
        config: &RunConfig,
        view: &ViewDefinition,
        sort_spec: &SortSpec,
        input_filter: &(dyn InputFilter + Sync),
        output_filter: &(dyn OutputFilter + Sync),
    ) -> Result<RunOutcome> {
        config.validate()?;

        let paths = Self::expand_glob(&config.input_glob)?;
        let queue = FileQueue::new(paths);
        let threads = self.thread_override.unwrap_or_else(|| config.resolved_thread_count());

        let results: Mutex<Vec<(Table, AggregatorStats)>> = Mutex::new(Vec::with_capacity(threads));
        let fatal: Mutex<Option<AggError>> = Mutex::new(None);

        rayon::scope(|scope| {
            for _ in 0..threads {
                let queue = &queue;
                let results = &results;
                let fatal = &fatal;
                scope.spawn(move |_| {
                    let mut agg = Aggregator::new(view);
                    while let Some(path) = queue.pop() {
                        if fatal.lock().expect("fatal-error mutex poisoned").is_some() {
                            break;
                        }
                        match agg.run_file::<R>(&path, input_filter) {
                            Ok(()) => {}
                            Err(err) if err.is_fatal() => {
                                tracing::error!(path = %path.display(), error = %err, "fatal error processing file");
                                *fatal.lock().expect("fatal-error mutex poisoned") = Some(err);
                                break;
                            }
                            Err(_) => {
                                // Non-fatal (I/O on one file): already logged
                                // by `Aggregator::run_file`; keep going.
                            }
                        }
                    }
                    let stats = agg.stats();
                    results.lock().expect("results mutex poisoned").push((agg.into_table(), stats));
                });
            }
        });

        if let Some(err) = fatal.into_inner().expect("fatal-error mutex poisoned") {
            return Err(err);
        }

        let mut tables = Vec::new();
        let mut stats = Vec::new();
        for (mut table, s) in results.into_inner().expect("results mutex poisoned") {
            table.sort_items_by(|a, b| compare_slots(view, sort_spec, a, b));
            tables.push(table);
            stats.push(s);
        }

        let mut metrics = RunMetrics::from_worker_stats(&stats);

        let k = config.top_n.unwrap_or_else(|| tables.iter().map(Table::len).sum());
        let merged = merge::threshold_merge(view, sort_spec, &tables, k);

        let rows: Vec<Vec<u8>> = merged
            .into_iter()
            .filter(|row| output_filter.passes(&row[view.keys_size..]))
            .collect();

        metrics.set_output_records(rows.len() as u64);
        metrics.log_summary();

        Ok(RunOutcome { rows, metrics })
    }
}
