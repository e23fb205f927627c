//! Per-thread aggregator: owns one hash table and drives the
//! read → filter → expand → key → insert/merge loop (spec §3.5, §4.6).

use std::path::Path;

use crate::biflow;
use crate::codec;
use crate::error::{AggError, Result};
use crate::filter::InputFilter;
use crate::ipfix::{DecodedRecord, FieldLookup, RecordReader};
use crate::table::Table;
use crate::view::ViewDefinition;

/// Running counters for one aggregator's lifetime (spec §3.5, §6.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct AggregatorStats {
    pub files_processed: u64,
    pub records_processed: u64,
    /// Records dropped for being malformed (`AggError::Decode`). Counted,
    /// never logged per-record (spec §7).
    pub records_dropped: u64,
}

/// One worker's private aggregation state: its hash table, a reusable key
/// buffer, and a reference to the view definition it was built from.
/// Never shared across threads (spec §3.5).
pub struct Aggregator<'v> {
    view: &'v ViewDefinition,
    table: Table,
    key_buf: Vec<u8>,
    stats: AggregatorStats,
}

impl<'v> Aggregator<'v> {
    #[must_use]
    pub fn new(view: &'v ViewDefinition) -> Self {
        Self {
            view,
            table: Table::new(view.keys_size, view.values_size),
            key_buf: vec![0u8; view.keys_size],
            stats: AggregatorStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Consume the aggregator and hand its table to the merge coordinator.
    #[must_use]
    pub fn into_table(self) -> Table {
        self.table
    }

    /// Process one already-decoded record: apply the input filter, expand
    /// it into its biflow events, and fold each event into the table
    /// (spec §4.6 inner loop).
    pub fn ingest_record<F: FieldLookup>(
        &mut self,
        reader: &F,
        record: &DecodedRecord,
        input_filter: &dyn InputFilter,
    ) {
        self.stats.records_processed += 1;
        if !input_filter.passes(record) {
            return;
        }

        for event in biflow::expand(record.template_kind, self.view.bidirectional) {
            if !codec::extract_key(
                self.view,
                reader,
                record,
                event.direction,
                event.find_flags,
                &mut self.key_buf,
            ) {
                continue;
            }
            let (slot, created) = self.table.find_or_create(&self.key_buf);
            if created {
                codec::init_values(self.view, self.table.value_bytes_mut(slot));
            }
            codec::update_values(
                self.view,
                reader,
                record,
                event.direction,
                event.find_flags,
                self.table.value_bytes_mut(slot),
            );
        }
    }

    /// Read and ingest every record of one input file (spec §4.6 outer
    /// loop). A malformed record is dropped and counted, not propagated; a
    /// failure opening the file, or any other error from the reader, is
    /// returned to the caller (the worker's file queue loop decides
    /// whether to skip the file or abort the run, spec §7).
    pub fn run_file<R: RecordReader>(&mut self, path: &Path, input_filter: &dyn InputFilter) -> Result<()> {
        let mut reader = R::open(path).inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "failed to open input file");
        })?;

        loop {
            match reader.read_record() {
                Ok(Some(record)) => self.ingest_record(&reader, &record, input_filter),
                Ok(None) => break,
                Err(AggError::Decode { .. }) => {
                    self.stats.records_dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        self.stats.files_processed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAll;
    use crate::ie::StaticDictionary;
    use crate::ipfix::{FindFlags, TemplateKind};
    use crate::types::WireValue;
    use crate::view::compile_view;

    fn unidirectional_record() -> DecodedRecord {
        DecodedRecord {
            template_kind: TemplateKind::Unidirectional,
            template_ref: 256,
            snapshot_ref: 1,
            raw_bytes: vec![],
        }
    }

    #[test]
    fn two_records_same_key_accumulate_bytes() {
        let dict = StaticDictionary::new();
        let view = compile_view("srcip", "bytes", &dict).unwrap();
        let mut agg = Aggregator::new(&view);

        let lookup = |_: &DecodedRecord, _enterprise: u32, element_id: u16, _flags: FindFlags| match element_id {
            8 => Some(WireValue::Ipv4([10, 0, 0, 1])),
            1 => Some(WireValue::Unsigned(100)),
            _ => None,
        };
        let reader = crate::ipfix::VecReader::new(vec![unidirectional_record(), unidirectional_record()], lookup);

        for _ in 0..2 {
            agg.ingest_record(&reader, &unidirectional_record(), &AcceptAll);
        }

        assert_eq!(agg.table().len(), 1);
        let slot = agg.table().items()[0];
        let bytes = u64::from_ne_bytes(agg.table().value_bytes(slot).try_into().unwrap());
        assert_eq!(bytes, 200);
        assert_eq!(agg.stats().records_processed, 2);
    }

    #[test]
    fn verbatim_miss_drops_the_event() {
        let dict = StaticDictionary::new();
        let view = compile_view("proto", "flows", &dict).unwrap();
        let mut agg = Aggregator::new(&view);

        let lookup = |_: &DecodedRecord, _e: u32, _id: u16, _f: FindFlags| None;
        let reader = crate::ipfix::VecReader::new(vec![unidirectional_record()], lookup);
        agg.ingest_record(&reader, &unidirectional_record(), &AcceptAll);

        assert_eq!(agg.table().len(), 0);
        assert_eq!(agg.stats().records_processed, 1);
    }
}
