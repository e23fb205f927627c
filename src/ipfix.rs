//! IPFIX reader (external collaborator, spec §6.2).
//!
//! The wire decoder and template-snapshot manager live outside this crate.
//! This module defines the contract the aggregator and codec consume:
//! opening a file, pulling decoded records out of it, and looking up wire
//! fields on a record with a direction mask for biflow templates.

use crate::error::AggError;
use crate::types::WireValue;
use std::path::Path;

/// Restricts which half of a biflow record a field lookup reads from.
/// Independent of the key/value direction dimension (spec §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindFlags {
    /// No direction restriction (unidirectional template, or reading a
    /// field that is not direction-scoped).
    None,
    /// Read from the forward half of a biflow record.
    Forward,
    /// Read from the reverse half of a biflow record.
    Reverse,
}

/// Whether a record's template carries one logical direction or both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    Unidirectional,
    Biflow,
}

/// A decoded flow record, as handed to the aggregator by the reader.
///
/// `template_ref`/`snapshot_ref` stand in for the original's
/// reference-counted template snapshot; this crate never needs to mutate
/// or outlive them beyond the record's own lifetime, so they are plain
/// opaque ids here rather than a handle type.
#[derive(Clone, Debug)]
pub struct DecodedRecord {
    pub template_kind: TemplateKind,
    pub template_ref: u32,
    pub snapshot_ref: u64,
    pub raw_bytes: Vec<u8>,
}

/// Contract for locating a wire field on a decoded record.
///
/// Implemented alongside a concrete reader; `find_field` returns `None`
/// when the record has no such element (spec §4.10: the caller drops the
/// dependent key/value update, not the whole record).
pub trait FieldLookup {
    fn find_field(
        &self,
        record: &DecodedRecord,
        enterprise: u32,
        element_id: u16,
        flags: FindFlags,
    ) -> Option<WireValue>;
}

/// Contract for reading a sequence of records out of one archive file.
pub trait RecordReader: FieldLookup {
    /// Open the file at `path`. Per spec §4.10, an open failure is a
    /// per-file `AggError::Io`; the caller logs and skips the file.
    fn open(path: &Path) -> crate::error::Result<Self>
    where
        Self: Sized;

    /// Pull the next decoded record, or `Ok(None)` at end of file.
    /// A malformed record is `Err(AggError::Decode)`; the caller drops the
    /// record and continues (spec §7).
    fn read_record(&mut self) -> crate::error::Result<Option<DecodedRecord>>;

    /// Number of records read so far, for progress reporting (spec §6.2).
    fn record_count(&self) -> u64;
}

/// An in-memory reader over pre-decoded records, used by tests and by
/// embedders that already have records in hand (e.g. from a prior decode
/// pass). Field lookups are served by a caller-supplied closure so tests
/// can model arbitrary wire layouts without a real IPFIX decoder.
pub struct VecReader<F> {
    records: std::vec::IntoIter<DecodedRecord>,
    count: u64,
    lookup: F,
}

impl<F> VecReader<F>
where
    F: Fn(&DecodedRecord, u32, u16, FindFlags) -> Option<WireValue>,
{
    pub fn new(records: Vec<DecodedRecord>, lookup: F) -> Self {
        Self {
            records: records.into_iter(),
            count: 0,
            lookup,
        }
    }
}

impl<F> FieldLookup for VecReader<F>
where
    F: Fn(&DecodedRecord, u32, u16, FindFlags) -> Option<WireValue>,
{
    fn find_field(
        &self,
        record: &DecodedRecord,
        enterprise: u32,
        element_id: u16,
        flags: FindFlags,
    ) -> Option<WireValue> {
        (self.lookup)(record, enterprise, element_id, flags)
    }
}

impl<F> VecReader<F>
where
    F: Fn(&DecodedRecord, u32, u16, FindFlags) -> Option<WireValue>,
{
    /// `VecReader` has no file to open; construct it directly with
    /// [`VecReader::new`] instead of going through [`RecordReader::open`].
    pub fn read_record(&mut self) -> crate::error::Result<Option<DecodedRecord>> {
        match self.records.next() {
            Some(r) => {
                self.count += 1;
                Ok(Some(r))
            }
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.count
    }
}

/// Uniform error helper for a reader whose file cannot be opened.
pub fn open_error(path: &Path, source: std::io::Error) -> AggError {
    AggError::io(path, source)
}
