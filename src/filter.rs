//! Input and output filters (external collaborators, spec §6.4).
//!
//! The expression compiler for filter syntax lives outside this crate.
//! What the engine owns is the evaluation contract: a boolean predicate
//! over a raw decoded record (applied before key extraction), and a
//! boolean predicate over an aggregated slot (applied after top-N
//! selection, spec §4.9) that resolves field names through the view
//! definition rather than re-parsing slot layout itself.

use crate::ipfix::DecodedRecord;
use crate::types::DataType;
use crate::view::ViewDefinition;

/// Evaluated once per record, before key extraction and direction
/// expansion. A record failing this filter contributes no events at all.
pub trait InputFilter: Send + Sync {
    fn passes(&self, record: &DecodedRecord) -> bool;
}

/// A filter that accepts every record; the default when `-f` is omitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl InputFilter for AcceptAll {
    fn passes(&self, _record: &DecodedRecord) -> bool {
        true
    }
}

/// What an output-filter expression resolver needs to answer for each name
/// it references: the value field's data type and its byte offset within
/// the value tuple (spec §4.9, §6.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedField {
    pub data_type: DataType,
    pub offset_in_values: usize,
}

/// Resolves an aggregate-filter's referenced names against a compiled
/// view definition. Built once per run; the filter expression compiler
/// calls this during its own compilation pass.
pub struct OutputFilterResolver<'a> {
    view: &'a ViewDefinition,
}

impl<'a> OutputFilterResolver<'a> {
    #[must_use]
    pub fn new(view: &'a ViewDefinition) -> Self {
        Self { view }
    }

    /// Resolve a value-field name to its data type and offset. Per spec
    /// §6.4 the aggregate filter only references value fields (the ones
    /// that carry per-group numbers); key fields are not resolvable here.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<ResolvedField> {
        self.view.values.iter().find(|f| f.name == name).map(|f| ResolvedField {
            data_type: f.data_type,
            offset_in_values: f.offset,
        })
    }
}

/// Evaluated once per surviving top-N slot (spec §4.9). Implementations
/// read the typed word at a previously-resolved offset from the value
/// tuple; `values` excludes the key bytes.
pub trait OutputFilter: Send + Sync {
    fn passes(&self, values: &[u8]) -> bool;
}

/// An output filter that accepts every slot; the default when `-F` is
/// omitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllOutput;

impl OutputFilter for AcceptAllOutput {
    fn passes(&self, _values: &[u8]) -> bool {
        true
    }
}
