//! Key extraction and value accumulator init/update (spec §4.2, §4.4).
//!
//! Grounded on the original `fdsdump` aggregator's `load_view_value`,
//! `init_value`, and `merge_value` (the counterparts to
//! [`extract_key`]/[`init_values`]/[`update_values`] below), reworked as
//! pure functions over a view definition rather than methods mutating a
//! shared aggregator instance.

use crate::ie::IeDictionary;
use crate::ipfix::{DecodedRecord, FieldLookup, FindFlags};
use crate::types::{DataType, WireValue};
use crate::view::{EventDirection, FieldSource, KeyKind, ValueKind, ViewDefinition, ViewField};

const SOURCE_IPV4_ADDRESS: (u32, u16) = (0, 8);
const DESTINATION_IPV4_ADDRESS: (u32, u16) = (0, 12);
const SOURCE_IPV6_ADDRESS: (u32, u16) = (0, 27);
const DESTINATION_IPV6_ADDRESS: (u32, u16) = (0, 28);
const SOURCE_TRANSPORT_PORT: (u32, u16) = (0, 7);
const DESTINATION_TRANSPORT_PORT: (u32, u16) = (0, 11);

fn lookup(
    reader: &dyn FieldLookup,
    record: &DecodedRecord,
    pair: (u32, u16),
    flags: FindFlags,
) -> Option<WireValue> {
    reader.find_field(record, pair.0, pair.1, flags)
}

fn write_tagged_ip(out: &mut [u8], addr: &WireValue) {
    match addr {
        WireValue::Ipv4(b) => {
            out[0] = 4;
            out[1..5].copy_from_slice(b);
            out[5..17].fill(0);
        }
        WireValue::Ipv6(b) => {
            out[0] = 16;
            out[1..17].copy_from_slice(b);
        }
        _ => out.fill(0),
    }
}

fn lookup_ip(reader: &dyn FieldLookup, record: &DecodedRecord, src: bool, flags: FindFlags) -> Option<WireValue> {
    let (v4, v6) = if src {
        (SOURCE_IPV4_ADDRESS, SOURCE_IPV6_ADDRESS)
    } else {
        (DESTINATION_IPV4_ADDRESS, DESTINATION_IPV6_ADDRESS)
    };
    lookup(reader, record, v4, flags).or_else(|| lookup(reader, record, v6, flags))
}

fn mask_bytes(addr: &mut [u8], prefix_len: u8) {
    let full_bytes = (prefix_len / 8) as usize;
    let rem_bits = prefix_len % 8;
    if full_bytes < addr.len() {
        if rem_bits > 0 {
            let keep_mask = 0xFFu8 << (8 - rem_bits);
            addr[full_bytes] &= keep_mask;
        } else if full_bytes == addr.len() {
            // nothing to zero
        }
        let zero_start = if rem_bits > 0 { full_bytes + 1 } else { full_bytes };
        for b in &mut addr[zero_start..] {
            *b = 0;
        }
    }
}

fn write_int(out: &mut [u8], data_type: DataType, value: &WireValue) -> bool {
    match (data_type, value) {
        (DataType::U8, WireValue::Unsigned(v)) => {
            out[0] = *v as u8;
            true
        }
        (DataType::U16, WireValue::Unsigned(v)) => {
            out.copy_from_slice(&(*v as u16).to_ne_bytes());
            true
        }
        (DataType::U32, WireValue::Unsigned(v)) => {
            out.copy_from_slice(&(*v as u32).to_ne_bytes());
            true
        }
        (DataType::U64, WireValue::Unsigned(v)) => {
            out.copy_from_slice(&v.to_ne_bytes());
            true
        }
        (DataType::I8, WireValue::Signed(v)) => {
            out[0] = *v as i8 as u8;
            true
        }
        (DataType::I16, WireValue::Signed(v)) => {
            out.copy_from_slice(&(*v as i16).to_ne_bytes());
            true
        }
        (DataType::I32, WireValue::Signed(v)) => {
            out.copy_from_slice(&(*v as i32).to_ne_bytes());
            true
        }
        (DataType::I64, WireValue::Signed(v)) => {
            out.copy_from_slice(&v.to_ne_bytes());
            true
        }
        (DataType::DateTimeMs, WireValue::DateTimeMs(v) | WireValue::Unsigned(v)) => {
            out.copy_from_slice(&v.to_ne_bytes());
            true
        }
        (DataType::Mac, WireValue::Mac(b)) => {
            out.copy_from_slice(b);
            true
        }
        (DataType::Ipv4, WireValue::Ipv4(b)) => {
            out.copy_from_slice(b);
            true
        }
        (DataType::Ipv6, WireValue::Ipv6(b)) => {
            out.copy_from_slice(b);
            true
        }
        (DataType::FixedString128, WireValue::Bytes(b)) => {
            let n = b.len().min(out.len());
            out[..n].copy_from_slice(&b[..n]);
            out[n..].fill(0);
            true
        }
        _ => false,
    }
}

/// Populate `out[0..view.keys_size]` for one (record, direction, find_flags)
/// event. Returns `false` when a `Verbatim` field's wire source is missing —
/// per spec §4.2 the whole event is dropped in that case, not just the
/// field.
pub fn extract_key(
    view: &ViewDefinition,
    reader: &dyn FieldLookup,
    record: &DecodedRecord,
    direction: EventDirection,
    find_flags: FindFlags,
    out: &mut [u8],
) -> bool {
    debug_assert_eq!(out.len(), view.keys_size);
    let want_source = !matches!(direction, EventDirection::Reverse);

    for field in &view.keys {
        let slot = &mut out[field.offset..field.offset + field.size];
        match field.key_kind().expect("view.keys only holds key fields") {
            KeyKind::Verbatim => {
                let Some(FieldSource { enterprise, element_id }) = field.source else {
                    return false;
                };
                let Some(wire) = lookup(reader, record, (enterprise, element_id), find_flags) else {
                    return false;
                };
                if !write_int(slot, field.data_type, &wire) {
                    return false;
                }
            }
            KeyKind::SourceIp => {
                let Some(wire) = lookup_ip(reader, record, true, find_flags) else {
                    return false;
                };
                write_tagged_ip(slot, &wire);
            }
            KeyKind::DestinationIp => {
                let Some(wire) = lookup_ip(reader, record, false, find_flags) else {
                    return false;
                };
                write_tagged_ip(slot, &wire);
            }
            KeyKind::BidiIp => {
                let Some(wire) = lookup_ip(reader, record, want_source, find_flags) else {
                    return false;
                };
                write_tagged_ip(slot, &wire);
            }
            KeyKind::BidiPort => {
                let pair = if want_source {
                    SOURCE_TRANSPORT_PORT
                } else {
                    DESTINATION_TRANSPORT_PORT
                };
                let Some(wire) = lookup(reader, record, pair, find_flags) else {
                    return false;
                };
                if !write_int(slot, DataType::U16, &wire) {
                    return false;
                }
            }
            KeyKind::Ipv4Subnet(prefix) | KeyKind::Ipv6Subnet(prefix) => {
                let Some(FieldSource { enterprise, element_id }) = field.source else {
                    return false;
                };
                let Some(wire) = lookup(reader, record, (enterprise, element_id), find_flags) else {
                    return false;
                };
                if !write_int(slot, field.data_type, &wire) {
                    return false;
                }
                mask_bytes(slot, prefix);
            }
            KeyKind::BidiIpv4Subnet(prefix) => {
                let pair = if want_source { SOURCE_IPV4_ADDRESS } else { DESTINATION_IPV4_ADDRESS };
                let Some(wire) = lookup(reader, record, pair, find_flags) else {
                    return false;
                };
                if !write_int(slot, DataType::Ipv4, &wire) {
                    return false;
                }
                mask_bytes(slot, prefix);
            }
            KeyKind::BidiIpv6Subnet(prefix) => {
                let pair = if want_source { SOURCE_IPV6_ADDRESS } else { DESTINATION_IPV6_ADDRESS };
                let Some(wire) = lookup(reader, record, pair, find_flags) else {
                    return false;
                };
                if !write_int(slot, DataType::Ipv6, &wire) {
                    return false;
                }
                mask_bytes(slot, prefix);
            }
            KeyKind::BiflowDirectionTag => {
                slot[0] = match direction {
                    EventDirection::Forward => 1,
                    EventDirection::Reverse => 2,
                    EventDirection::Any => 0,
                };
                slot[1..].fill(0);
            }
        }
    }
    true
}

fn unsigned_extreme(data_type: DataType, max: bool) -> u64 {
    match (data_type, max) {
        (DataType::U8, true) => u8::MAX as u64,
        (DataType::U16, true) => u16::MAX as u64,
        (DataType::U32, true) => u32::MAX as u64,
        (DataType::U64 | DataType::DateTimeMs, true) => u64::MAX,
        _ => 0,
    }
}

fn signed_extreme(data_type: DataType, max: bool) -> i64 {
    match (data_type, max) {
        (DataType::I8, true) => i8::MAX as i64,
        (DataType::I8, false) => i8::MIN as i64,
        (DataType::I16, true) => i16::MAX as i64,
        (DataType::I16, false) => i16::MIN as i64,
        (DataType::I32, true) => i32::MAX as i64,
        (DataType::I32, false) => i32::MIN as i64,
        (DataType::I64, true) => i64::MAX,
        (DataType::I64, false) => i64::MIN,
        _ => 0,
    }
}

fn write_unsigned(out: &mut [u8], data_type: DataType, v: u64) {
    match data_type {
        DataType::U8 => out[0] = v as u8,
        DataType::U16 => out.copy_from_slice(&(v as u16).to_ne_bytes()),
        DataType::U32 => out.copy_from_slice(&(v as u32).to_ne_bytes()),
        DataType::U64 | DataType::DateTimeMs => out.copy_from_slice(&v.to_ne_bytes()),
        _ => {}
    }
}

fn read_unsigned(bytes: &[u8], data_type: DataType) -> u64 {
    match data_type {
        DataType::U8 => bytes[0] as u64,
        DataType::U16 => u16::from_ne_bytes(bytes.try_into().unwrap()) as u64,
        DataType::U32 => u32::from_ne_bytes(bytes.try_into().unwrap()) as u64,
        DataType::U64 | DataType::DateTimeMs => u64::from_ne_bytes(bytes.try_into().unwrap()),
        _ => 0,
    }
}

fn write_signed(out: &mut [u8], data_type: DataType, v: i64) {
    match data_type {
        DataType::I8 => out[0] = v as i8 as u8,
        DataType::I16 => out.copy_from_slice(&(v as i16).to_ne_bytes()),
        DataType::I32 => out.copy_from_slice(&(v as i32).to_ne_bytes()),
        DataType::I64 => out.copy_from_slice(&v.to_ne_bytes()),
        _ => {}
    }
}

fn read_signed(bytes: &[u8], data_type: DataType) -> i64 {
    match data_type {
        DataType::I8 => bytes[0] as i8 as i64,
        DataType::I16 => i16::from_ne_bytes(bytes.try_into().unwrap()) as i64,
        DataType::I32 => i32::from_ne_bytes(bytes.try_into().unwrap()) as i64,
        DataType::I64 => i64::from_ne_bytes(bytes.try_into().unwrap()),
        _ => 0,
    }
}

/// Initialize one newly-allocated slot's value tuple (spec §4.2).
pub fn init_values(view: &ViewDefinition, out: &mut [u8]) {
    debug_assert_eq!(out.len(), view.values_size);
    for field in &view.values {
        let slot = &mut out[field.offset..field.offset + field.size];
        match field.value_kind() {
            Some(ValueKind::Sum | ValueKind::Count) => slot.fill(0),
            Some(ValueKind::Min) => {
                if field.data_type.is_signed() {
                    write_signed(slot, field.data_type, signed_extreme(field.data_type, true));
                } else {
                    write_unsigned(slot, field.data_type, unsigned_extreme(field.data_type, true));
                }
            }
            Some(ValueKind::Max) => {
                if field.data_type.is_signed() {
                    write_signed(slot, field.data_type, signed_extreme(field.data_type, false));
                } else {
                    write_unsigned(slot, field.data_type, 0);
                }
            }
            None => {}
        }
    }
}

/// Apply one event's updates to a slot's value tuple (spec §4.4). `reader`
/// and `record`/`find_flags` supply the wire values for `Min`/`Max`/`Sum`;
/// `direction` gates which fields are eligible via `direction_filter`.
pub fn update_values(
    view: &ViewDefinition,
    reader: &dyn FieldLookup,
    record: &DecodedRecord,
    direction: EventDirection,
    find_flags: FindFlags,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), view.values_size);
    let effective_direction = effective_direction(direction, find_flags);
    for field in &view.values {
        if !direction_matches(field.direction_filter, effective_direction) {
            continue;
        }
        let slot = &mut out[field.offset..field.offset + field.size];
        match field.value_kind() {
            Some(ValueKind::Count) => {
                let cur = read_unsigned(slot, DataType::U64);
                write_unsigned(slot, DataType::U64, cur.wrapping_add(1));
            }
            Some(ValueKind::Sum) => {
                let Some(FieldSource { enterprise, element_id }) = field.source else {
                    continue;
                };
                let Some(wire) = lookup(reader, record, (enterprise, element_id), find_flags) else {
                    continue;
                };
                if field.data_type.is_signed() {
                    let Some(v) = wire.as_i64() else { continue };
                    let cur = read_signed(slot, field.data_type);
                    write_signed(slot, field.data_type, cur.wrapping_add(v));
                } else {
                    let Some(v) = wire.as_u64() else { continue };
                    let cur = read_unsigned(slot, field.data_type);
                    write_unsigned(slot, field.data_type, cur.wrapping_add(v));
                }
            }
            Some(ValueKind::Min) => {
                let Some(FieldSource { enterprise, element_id }) = field.source else {
                    continue;
                };
                let Some(wire) = lookup(reader, record, (enterprise, element_id), find_flags) else {
                    continue;
                };
                if field.data_type.is_signed() {
                    let Some(v) = wire.as_i64() else { continue };
                    if v < read_signed(slot, field.data_type) {
                        write_signed(slot, field.data_type, v);
                    }
                } else {
                    let Some(v) = wire.as_u64() else { continue };
                    if v < read_unsigned(slot, field.data_type) {
                        write_unsigned(slot, field.data_type, v);
                    }
                }
            }
            Some(ValueKind::Max) => {
                let Some(FieldSource { enterprise, element_id }) = field.source else {
                    continue;
                };
                let Some(wire) = lookup(reader, record, (enterprise, element_id), find_flags) else {
                    continue;
                };
                if field.data_type.is_signed() {
                    let Some(v) = wire.as_i64() else { continue };
                    if v > read_signed(slot, field.data_type) {
                        write_signed(slot, field.data_type, v);
                    }
                } else {
                    let Some(v) = wire.as_u64() else { continue };
                    if v > read_unsigned(slot, field.data_type) {
                        write_unsigned(slot, field.data_type, v);
                    }
                }
            }
            None => {}
        }
    }
}

/// Fold `src`'s value tuple into `dst`'s, field by field, using the same
/// reducer each field already uses against a wire value (spec §4.8
/// "Merging values"): Sum/Count add, Min/Max keep the extremum. Used by the
/// threshold-algorithm merge to consolidate matching keys across workers.
pub fn merge_values(view: &ViewDefinition, dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), view.values_size);
    debug_assert_eq!(src.len(), view.values_size);
    for field in &view.values {
        let d = &mut dst[field.offset..field.offset + field.size];
        let s = &src[field.offset..field.offset + field.size];
        match field.value_kind() {
            Some(ValueKind::Sum | ValueKind::Count) => {
                if field.data_type.is_signed() {
                    let a = read_signed(d, field.data_type);
                    let b = read_signed(s, field.data_type);
                    write_signed(d, field.data_type, a.wrapping_add(b));
                } else {
                    let a = read_unsigned(d, field.data_type);
                    let b = read_unsigned(s, field.data_type);
                    write_unsigned(d, field.data_type, a.wrapping_add(b));
                }
            }
            Some(ValueKind::Min) => {
                if field.data_type.is_signed() {
                    if read_signed(s, field.data_type) < read_signed(d, field.data_type) {
                        d.copy_from_slice(s);
                    }
                } else if read_unsigned(s, field.data_type) < read_unsigned(d, field.data_type) {
                    d.copy_from_slice(s);
                }
            }
            Some(ValueKind::Max) => {
                if field.data_type.is_signed() {
                    if read_signed(s, field.data_type) > read_signed(d, field.data_type) {
                        d.copy_from_slice(s);
                    }
                } else if read_unsigned(s, field.data_type) > read_unsigned(d, field.data_type) {
                    d.copy_from_slice(s);
                }
            }
            None => {}
        }
    }
}

/// Resolve the direction a value field's `direction_filter` is actually
/// matched against (spec §4.3, §4.4). The `direction` dimension (src/dst
/// key-swap) and `find_flags` dimension (which half of a biflow record
/// supplied the data) are independent per spec §4.3, but a schema that
/// isn't `bidirectional` never produces a non-`Any` `direction` — for
/// those events `find_flags` is the only signal distinguishing the
/// forward-lookup event from the reverse-lookup one (spec §8.5 S3), so it
/// stands in for `direction` whenever the key-swap dimension is inert.
fn effective_direction(direction: EventDirection, find_flags: FindFlags) -> EventDirection {
    match direction {
        EventDirection::Forward | EventDirection::Reverse => direction,
        EventDirection::Any => match find_flags {
            FindFlags::Forward => EventDirection::Forward,
            FindFlags::Reverse => EventDirection::Reverse,
            FindFlags::None => EventDirection::Any,
        },
    }
}

fn direction_matches(filter: crate::view::DirectionFilter, direction: EventDirection) -> bool {
    use crate::view::DirectionFilter as D;
    match filter {
        D::Any => true,
        D::FwdOnly => matches!(direction, EventDirection::Any | EventDirection::Forward),
        D::RevOnly => matches!(direction, EventDirection::Reverse),
    }
}

/// Resolve an information element by name through the dictionary; a thin
/// re-export kept here so codec callers don't need a separate import for
/// the one-off lookups view compilation doesn't already cover (spec §6.3).
#[must_use]
pub fn resolve_ie(dict: &dyn IeDictionary, name: &str) -> Option<crate::ie::IeDescriptor> {
    dict.find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{DirectionFilter, FieldKind};

    fn field(name: &str, data_type: DataType, offset: usize, kind: FieldKind) -> ViewField {
        ViewField {
            name: name.to_string(),
            data_type,
            size: data_type.size(),
            offset,
            kind,
            direction_filter: DirectionFilter::Any,
            source: None,
        }
    }

    #[test]
    fn init_sum_is_zero_and_min_is_extreme() {
        let values = vec![
            field("bytes", DataType::U64, 0, FieldKind::Value(ValueKind::Sum)),
            field("minttl", DataType::U8, 8, FieldKind::Value(ValueKind::Min)),
        ];
        let view = ViewDefinition {
            keys: vec![],
            values,
            keys_size: 0,
            values_size: 9,
            bidirectional: false,
            biflow_enabled: false,
        };
        let mut buf = vec![0xFFu8; 9];
        init_values(&view, &mut buf);
        assert_eq!(&buf[0..8], &[0u8; 8]);
        assert_eq!(buf[8], u8::MAX);
    }

    #[test]
    fn mask_bytes_zeroes_below_prefix() {
        let mut addr = [0xFFu8; 4];
        mask_bytes(&mut addr, 20);
        assert_eq!(addr, [0xFF, 0xFF, 0xF0, 0x00]);
    }

    #[test]
    fn mask_bytes_full_prefix_keeps_all() {
        let mut addr = [0xABu8; 4];
        mask_bytes(&mut addr, 32);
        assert_eq!(addr, [0xAB; 4]);
    }

    #[test]
    fn effective_direction_falls_back_to_find_flags_when_direction_is_any() {
        assert_eq!(
            effective_direction(EventDirection::Any, FindFlags::Forward),
            EventDirection::Forward
        );
        assert_eq!(
            effective_direction(EventDirection::Any, FindFlags::Reverse),
            EventDirection::Reverse
        );
        assert_eq!(
            effective_direction(EventDirection::Any, FindFlags::None),
            EventDirection::Any
        );
    }

    #[test]
    fn effective_direction_keeps_the_key_swap_dimension_when_active() {
        // A bidirectional schema's own Forward/Reverse events always win,
        // regardless of which half of a biflow record supplied the data.
        assert_eq!(
            effective_direction(EventDirection::Forward, FindFlags::Reverse),
            EventDirection::Forward
        );
        assert_eq!(
            effective_direction(EventDirection::Reverse, FindFlags::Forward),
            EventDirection::Reverse
        );
    }

    #[test]
    fn non_bidirectional_biflow_record_splits_in_and_out_by_find_flags() {
        let dict = crate::ie::StaticDictionary::new();
        let view = crate::view::compile_view("srcip", "inflows,outflows", &dict).unwrap();
        let mut values = vec![0u8; view.values_size];
        init_values(&view, &mut values);

        let reader = crate::testing::ClosureLookup(|_: &DecodedRecord, _e: u32, _id: u16, _f: FindFlags| None);
        let r = crate::testing::record(crate::ipfix::TemplateKind::Biflow, 1);

        update_values(&view, &reader, &r, EventDirection::Any, FindFlags::Forward, &mut values);
        update_values(&view, &reader, &r, EventDirection::Any, FindFlags::Reverse, &mut values);

        let inflows = u64::from_ne_bytes(values[0..8].try_into().unwrap());
        let outflows = u64::from_ne_bytes(values[8..16].try_into().unwrap());
        assert_eq!(inflows, 1);
        assert_eq!(outflows, 1);
    }
}
