//! Slot comparator for the per-worker sort pass and the merge's ordering
//! (spec §3.6, §4.7). Grounded on the original `fdsdump` sorter
//! (`sorter.cpp`): a small ordered list of `(field, ascending)` pairs,
//! compared lexicographically, first non-equal field wins.

use std::cmp::Ordering;

use crate::types::DataType;
use crate::view::ViewDefinition;

/// Points a sort-spec entry at one column of either tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRef {
    Key(usize),
    Value(usize),
}

/// One `(field, ascending)` pair of the sort specification (spec §3.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: FieldRef,
    pub ascending: bool,
}

/// The full ordered sort specification.
pub type SortSpec = Vec<SortKey>;

/// Build a [`SortSpec`] by resolving `-O` field names against the view.
/// Unlike the output-filter resolver, the sort spec may reference both key
/// and value fields (spec §3.6).
pub fn resolve_sort_spec(view: &ViewDefinition, fields: &[(&str, bool)]) -> crate::error::Result<SortSpec> {
    let mut spec = Vec::with_capacity(fields.len());
    for (name, ascending) in fields {
        let field_ref = if let Some(idx) = view.keys.iter().position(|f| &f.name == name) {
            FieldRef::Key(idx)
        } else if let Some(idx) = view.values.iter().position(|f| &f.name == name) {
            FieldRef::Value(idx)
        } else {
            return Err(crate::error::AggError::config(format!("unknown sort field \"{name}\"")));
        };
        spec.push(SortKey {
            field: field_ref,
            ascending: *ascending,
        });
    }
    Ok(spec)
}

fn absolute_offset(view: &ViewDefinition, field_ref: FieldRef) -> (usize, DataType) {
    match field_ref {
        FieldRef::Key(i) => {
            let f = &view.keys[i];
            (f.offset, f.data_type)
        }
        FieldRef::Value(i) => {
            let f = &view.values[i];
            (view.keys_size + f.offset, f.data_type)
        }
    }
}

fn compare_field(a: &[u8], b: &[u8], data_type: DataType) -> Ordering {
    match data_type {
        DataType::U8 => a[0].cmp(&b[0]),
        DataType::U16 => u16::from_ne_bytes(a.try_into().unwrap()).cmp(&u16::from_ne_bytes(b.try_into().unwrap())),
        DataType::U32 => u32::from_ne_bytes(a.try_into().unwrap()).cmp(&u32::from_ne_bytes(b.try_into().unwrap())),
        DataType::U64 | DataType::DateTimeMs => {
            u64::from_ne_bytes(a.try_into().unwrap()).cmp(&u64::from_ne_bytes(b.try_into().unwrap()))
        }
        DataType::I8 => (a[0] as i8).cmp(&(b[0] as i8)),
        DataType::I16 => i16::from_ne_bytes(a.try_into().unwrap()).cmp(&i16::from_ne_bytes(b.try_into().unwrap())),
        DataType::I32 => i32::from_ne_bytes(a.try_into().unwrap()).cmp(&i32::from_ne_bytes(b.try_into().unwrap())),
        DataType::I64 => i64::from_ne_bytes(a.try_into().unwrap()).cmp(&i64::from_ne_bytes(b.try_into().unwrap())),
        // Remaining types (Ip/Ipv4/Ipv6/Mac/FixedString128) are not numeric
        // sort keys in practice; compare as raw bytes so the function stays
        // total rather than panicking on an unusual `-O` request.
        DataType::Ip | DataType::Ipv4 | DataType::Ipv6 | DataType::Mac | DataType::FixedString128 => a.cmp(b),
    }
}

/// Compare two full slot byte-strings (`keys_size + values_size` each)
/// according to `spec`. The base field comparison is natural ascending
/// order; since the engine's default (and the one `sort_items_by`/the
/// merge rely on) is *descending*, a field with `ascending == false` is
/// reversed, and a field with `ascending == true` is left as natural
/// order (spec §4.7, §4.6 "sort ... descending primary"). Returns the
/// first non-equal field's ordering; `Ordering::Equal` if every field
/// compares equal.
#[must_use]
pub fn compare_slots(view: &ViewDefinition, spec: &SortSpec, a: &[u8], b: &[u8]) -> Ordering {
    for key in spec {
        let (offset, data_type) = absolute_offset(view, key.field);
        let size = data_type.size();
        let ord = compare_field(&a[offset..offset + size], &b[offset..offset + size], data_type);
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::StaticDictionary;
    use crate::view::compile_view;

    #[test]
    fn descending_by_default_orders_larger_first() {
        let dict = StaticDictionary::new();
        let view = compile_view("srcip", "bytes", &dict).unwrap();
        let spec = resolve_sort_spec(&view, &[("bytes", false)]).unwrap();

        let mut a = vec![0u8; view.keys_size + view.values_size];
        let mut b = a.clone();
        a[view.keys_size..].copy_from_slice(&200u64.to_ne_bytes());
        b[view.keys_size..].copy_from_slice(&100u64.to_ne_bytes());

        assert_eq!(compare_slots(&view, &spec, &a, &b), Ordering::Less);
    }

    #[test]
    fn ascending_flag_reverses_order() {
        let dict = StaticDictionary::new();
        let view = compile_view("srcip", "bytes", &dict).unwrap();
        let spec = resolve_sort_spec(&view, &[("bytes", true)]).unwrap();

        let mut a = vec![0u8; view.keys_size + view.values_size];
        let mut b = a.clone();
        a[view.keys_size..].copy_from_slice(&200u64.to_ne_bytes());
        b[view.keys_size..].copy_from_slice(&100u64.to_ne_bytes());

        assert_eq!(compare_slots(&view, &spec, &a, &b), Ordering::Greater);
    }
}
