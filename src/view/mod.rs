//! View definition & schema compiler (spec §3.1–§3.2, §4.1).
//!
//! A [`ViewDefinition`] is the compiled, immutable schema shared read-only
//! among all worker threads: an ordered key tuple, an ordered value tuple,
//! and the metadata (`bidirectional`, `biflow_enabled`) derived from them.

pub mod compile;

use crate::ie::IeDictionary;
use crate::types::DataType;

/// Which half of an expanded biflow event a value accumulator may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionFilter {
    Any,
    FwdOnly,
    RevOnly,
}

/// The event-direction dimension used during key extraction (spec §4.2,
/// §4.3): controls src/dst swapping for `Bidi*` key kinds and which value
/// accumulators are eligible via [`DirectionFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDirection {
    /// Unidirectional schema, or a bidirectional schema's "no swap"
    /// event (used only when `bidirectional` is false).
    Any,
    Forward,
    Reverse,
}

/// How a key field's bytes are produced from a decoded record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Verbatim,
    Ipv4Subnet(u8),
    Ipv6Subnet(u8),
    SourceIp,
    DestinationIp,
    BidiIp,
    BidiPort,
    BidiIpv4Subnet(u8),
    BidiIpv6Subnet(u8),
    BiflowDirectionTag,
}

/// How a value field's accumulator is initialized and updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Sum,
    Min,
    Max,
    Count,
}

/// The kind of a view field: either a key-tuple column or a value-tuple
/// column. Kept as one enum (rather than two separate field structs) so
/// that name resolution (comparator, output filter) can walk a single
/// `Vec<ViewField>` slice for whichever tuple it needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Key(KeyKind),
    Value(ValueKind),
}

/// The wire element a `Verbatim`-family field reads from, when applicable.
/// `None` for fields that are purely derived (e.g. `BiflowDirectionTag`,
/// which writes a synthetic marker rather than reading the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSource {
    pub enterprise: u32,
    pub element_id: u16,
}

/// One column of either the key tuple or the value tuple (spec §3.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewField {
    pub name: String,
    pub data_type: DataType,
    pub size: usize,
    pub offset: usize,
    pub kind: FieldKind,
    pub direction_filter: DirectionFilter,
    pub source: Option<FieldSource>,
}

impl ViewField {
    #[must_use]
    pub fn is_key(&self) -> bool {
        matches!(self.kind, FieldKind::Key(_))
    }

    #[must_use]
    pub fn key_kind(&self) -> Option<KeyKind> {
        match self.kind {
            FieldKind::Key(k) => Some(k),
            FieldKind::Value(_) => None,
        }
    }

    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self.kind {
            FieldKind::Value(v) => Some(v),
            FieldKind::Key(_) => None,
        }
    }
}

/// The compiled schema for one aggregation run (spec §3.2). Built once
/// from the `-a`/`-s` strings via [`compile::compile_view`] and shared
/// read-only among all workers for the life of the run.
#[derive(Clone, Debug)]
pub struct ViewDefinition {
    pub keys: Vec<ViewField>,
    pub values: Vec<ViewField>,
    pub keys_size: usize,
    pub values_size: usize,
    /// True iff any key field is one of the `Bidi*` kinds.
    pub bidirectional: bool,
    /// True iff `bidirectional`, or any value has a non-`Any` direction
    /// filter. Drives biflow event expansion (spec §4.3).
    pub biflow_enabled: bool,
}

impl ViewDefinition {
    /// Look up a field (key or value) by display name. Returns the field
    /// and, for value fields, its offset within the *values* tuple alone
    /// (not the combined slot) — this is what the output filter and
    /// comparator both need (spec §4.7, §4.9).
    #[must_use]
    pub fn field_offset(&self, name: &str) -> Option<(&ViewField, usize)> {
        if let Some(f) = self.keys.iter().find(|f| f.name == name) {
            return Some((f, f.offset));
        }
        self.values.iter().find(|f| f.name == name).map(|f| (f, f.offset))
    }

    /// Validate the hash-table invariant that `keys_size`/`values_size`
    /// match the sum of their fields' sizes. Used in tests and by callers
    /// constructing a `ViewDefinition` by hand rather than through the
    /// compiler.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let keys_sum: usize = self.keys.iter().map(|f| f.size).sum();
        let values_sum: usize = self.values.iter().map(|f| f.size).sum();
        keys_sum == self.keys_size && values_sum == self.values_size
    }
}

/// Build a [`ViewDefinition`] from the `-a <keys>` and `-s <values>`
/// strings (spec §4.1). Thin re-export of [`compile::compile_view`] kept
/// at module root for ergonomic `view::compile_view(...)` call sites.
pub fn compile_view(
    keys: &str,
    values: &str,
    dict: &dyn IeDictionary,
) -> crate::error::Result<ViewDefinition> {
    compile::compile_view(keys, values, dict)
}
