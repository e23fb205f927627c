//! Key extraction and value accumulator tests (spec §4.2, §4.4, §8.5).

use flowagg::codec::{extract_key, init_values, merge_values, update_values};
use flowagg::ie::StaticDictionary;
use flowagg::ipfix::{FindFlags, TemplateKind};
use flowagg::testing::{record, ClosureLookup, FlowFixture};
use flowagg::view::{compile_view, EventDirection};

fn lookup_for(fx: FlowFixture) -> ClosureLookup<impl Fn(&flowagg::ipfix::DecodedRecord, u32, u16, FindFlags) -> Option<flowagg::types::WireValue>> {
    ClosureLookup(move |_rec: &flowagg::ipfix::DecodedRecord, e, id, _f| fx.find(e, id))
}

#[test]
fn verbatim_missing_field_drops_the_whole_key() {
    let dict = StaticDictionary::new();
    let view = compile_view("proto", "bytes", &dict).unwrap();
    let reader = lookup_for(FlowFixture::new()); // no proto set

    let r = record(TemplateKind::Unidirectional, 1);
    let mut key = vec![0u8; view.keys_size];
    let ok = extract_key(&view, &reader, &r, EventDirection::Any, FindFlags::None, &mut key);
    assert!(!ok);
}

#[test]
fn bidi_ip_swaps_source_and_destination_by_direction() {
    let dict = StaticDictionary::new();
    let view = compile_view("ip", "bytes", &dict).unwrap();
    let reader = lookup_for(FlowFixture::new().with_addresses([1, 1, 1, 1], [2, 2, 2, 2]));
    let r = record(TemplateKind::Unidirectional, 1);

    let mut fwd_key = vec![0u8; view.keys_size];
    assert!(extract_key(
        &view,
        &reader,
        &r,
        EventDirection::Forward,
        FindFlags::None,
        &mut fwd_key,
    ));

    let mut rev_key = vec![0u8; view.keys_size];
    assert!(extract_key(
        &view,
        &reader,
        &r,
        EventDirection::Reverse,
        FindFlags::None,
        &mut rev_key,
    ));

    assert_ne!(fwd_key, rev_key);
    assert_eq!(&fwd_key[1..5], &[1, 1, 1, 1]);
    assert_eq!(&rev_key[1..5], &[2, 2, 2, 2]);
}

#[test]
fn subnet_key_masks_low_bits() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcipv4/24", "bytes", &dict).unwrap();
    let reader = lookup_for(FlowFixture::new().with_addresses([192, 168, 1, 77], [0, 0, 0, 0]));
    let r = record(TemplateKind::Unidirectional, 1);

    let mut key = vec![0u8; view.keys_size];
    assert!(extract_key(&view, &reader, &r, EventDirection::Any, FindFlags::None, &mut key));
    assert_eq!(key, vec![192, 168, 1, 0]);
}

#[test]
fn ipv6_subnet_key_masks_low_bits() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcipv6/48", "bytes", &dict).unwrap();
    let mut addr = [0u8; 16];
    addr[0..6].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0x00, 0x01]);
    addr[6] = 0xAB;
    let reader = lookup_for(FlowFixture::new().with_ipv6_addresses(addr, [0; 16]));
    let r = record(TemplateKind::Unidirectional, 1);

    let mut key = vec![0u8; view.keys_size];
    assert!(extract_key(&view, &reader, &r, EventDirection::Any, FindFlags::None, &mut key));
    let mut expected = [0u8; 16];
    expected[0..6].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0x00, 0x01]);
    assert_eq!(key, expected.to_vec());
}

#[test]
fn bidi_ipv4_subnet_key_masks_low_bits_and_swaps_by_direction() {
    let dict = StaticDictionary::new();
    let view = compile_view("ipv4/24", "bytes", &dict).unwrap();
    let reader = lookup_for(FlowFixture::new().with_addresses([192, 168, 1, 77], [10, 0, 0, 200]));
    let r = record(TemplateKind::Unidirectional, 1);

    let mut fwd_key = vec![0u8; view.keys_size];
    assert!(extract_key(
        &view,
        &reader,
        &r,
        EventDirection::Forward,
        FindFlags::None,
        &mut fwd_key,
    ));
    assert_eq!(fwd_key, vec![192, 168, 1, 0]);

    let mut rev_key = vec![0u8; view.keys_size];
    assert!(extract_key(
        &view,
        &reader,
        &r,
        EventDirection::Reverse,
        FindFlags::None,
        &mut rev_key,
    ));
    assert_eq!(rev_key, vec![10, 0, 0, 0]);
}

#[test]
fn sum_accumulates_and_min_max_track_extrema() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcip", "bytes,minprotocolIdentifier,maxprotocolIdentifier", &dict).unwrap();

    let mut values = vec![0u8; view.values_size];
    init_values(&view, &mut values);

    for (b, proto) in [(100u64, 6u8), (50, 17), (25, 1)] {
        let reader = lookup_for(FlowFixture::new().with_counts(0, b).with_proto(proto));
        let r = record(TemplateKind::Unidirectional, 1);
        update_values(&view, &reader, &r, EventDirection::Any, FindFlags::None, &mut values);
    }

    let bytes_sum = u64::from_ne_bytes(values[0..8].try_into().unwrap());
    assert_eq!(bytes_sum, 175);
    assert_eq!(values[8], 1); // min proto
    assert_eq!(values[9], 17); // max proto
}

#[test]
fn merge_values_combines_two_accumulators() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcip", "bytes,minprotocolIdentifier,maxprotocolIdentifier", &dict).unwrap();

    let mut a = vec![0u8; view.values_size];
    init_values(&view, &mut a);
    a[0..8].copy_from_slice(&100u64.to_ne_bytes());
    a[8] = 6;
    a[9] = 6;

    let mut b = vec![0u8; view.values_size];
    init_values(&view, &mut b);
    b[0..8].copy_from_slice(&50u64.to_ne_bytes());
    b[8] = 1;
    b[9] = 17;

    merge_values(&view, &mut a, &b);

    assert_eq!(u64::from_ne_bytes(a[0..8].try_into().unwrap()), 150);
    assert_eq!(a[8], 1);
    assert_eq!(a[9], 17);
}
