//! Parallel flow-aggregation engine.
//!
//! Groups decoded IPFIX flow records by a user-defined key, reduces their
//! values with per-field accumulators, and produces the global top-N
//! groups across a pool of worker threads. The wire decoder, IE
//! dictionary, and filter-expression compiler are external collaborators
//! (see [`ipfix`], [`ie`], [`filter`]) — this crate owns the schema
//! compiler, the key/value codec, the hash table, and the merge.
//!
//! # Layout
//!
//! - [`view`] — the `-a`/`-s` schema compiler and the compiled
//!   [`view::ViewDefinition`].
//! - [`codec`] — key extraction and value accumulator init/update/merge.
//! - [`biflow`] — the direction × find-flags event table.
//! - [`table`] — the block-based open-addressing hash table.
//! - [`aggregator`] — the per-thread read/filter/expand/insert loop.
//! - [`comparator`] — the sort-spec comparator shared by the per-worker
//!   sort and the merge.
//! - [`merge`] — the distributed top-N threshold algorithm.
//! - [`queue`] / [`runner`] — file-queue work distribution and
//!   orchestration.
//! - [`config`] — typed run configuration.
//! - [`metrics`] — end-of-run progress counters.
//! - [`error`] — the crate's error taxonomy.
//! - [`ipfix`] / [`ie`] / [`filter`] — external-collaborator contracts.
//! - [`testing`] — fixtures for exercising the above without a real
//!   decoder.

pub mod aggregator;
pub mod biflow;
pub mod codec;
pub mod comparator;
pub mod config;
pub mod error;
pub mod ie;
pub mod ipfix;
pub mod filter;
pub mod merge;
pub mod metrics;
pub mod queue;
pub mod runner;
pub mod table;
pub mod testing;
pub mod types;
pub mod view;

pub use error::{AggError, Result};
pub use runner::{RunOutcome, Runner};
pub use view::{compile_view, ViewDefinition};
