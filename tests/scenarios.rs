//! Concrete end-to-end scenarios from the design's testable-properties
//! section (spec §8.5).

use flowagg::aggregator::Aggregator;
use flowagg::comparator::{compare_slots, resolve_sort_spec};
use flowagg::ie::StaticDictionary;
use flowagg::ipfix::TemplateKind;
use flowagg::merge::threshold_merge;
use flowagg::table::Table;
use flowagg::testing::{record, BiflowFixture, ClosureLookup, FlowFixture};
use flowagg::view::compile_view;

fn ipv4(a: u8, b: u8, c: u8, d: u8) -> [u8; 4] {
    [a, b, c, d]
}

/// S1 — Single-thread sum: `-a srcip -s bytes`.
#[test]
fn s1_single_thread_sum() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcip", "bytes", &dict).unwrap();
    let mut agg = Aggregator::new(&view);

    let stream = [
        (ipv4(10, 0, 0, 1), 100u64),
        (ipv4(10, 0, 0, 2), 50),
        (ipv4(10, 0, 0, 1), 200),
    ];
    for (src, bytes) in stream {
        let fx = FlowFixture::new().with_addresses(src, ipv4(0, 0, 0, 0)).with_counts(0, bytes);
        let reader = ClosureLookup(move |_r: &_, e, id, _f| fx.find(e, id));
        let r = record(TemplateKind::Unidirectional, 1);
        agg.ingest_record(&reader, &r, &flowagg::filter::AcceptAll);
    }

    assert_eq!(agg.table().len(), 2);
    let spec = resolve_sort_spec(&view, &[("bytes", false)]).unwrap();
    let mut table = agg.into_table();
    table.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));

    let totals: Vec<u64> = table
        .items()
        .iter()
        .map(|&slot| u64::from_ne_bytes(table.value_bytes(slot).try_into().unwrap()))
        .collect();
    assert_eq!(totals, vec![300, 50]);
}

/// S2 — Bidi expansion: `-a ip -s flows`.
#[test]
fn s2_bidi_expansion() {
    let dict = StaticDictionary::new();
    let view = compile_view("ip", "flows", &dict).unwrap();
    let mut agg = Aggregator::new(&view);

    let fx = FlowFixture::new().with_addresses(ipv4(1, 1, 1, 1), ipv4(2, 2, 2, 2));
    let reader = ClosureLookup(move |_r: &_, e, id, _f| fx.find(e, id));
    let r = record(TemplateKind::Unidirectional, 1);
    agg.ingest_record(&reader, &r, &flowagg::filter::AcceptAll);

    assert_eq!(agg.table().len(), 2);
    for &slot in agg.table().items() {
        let flows = u64::from_ne_bytes(agg.table().value_bytes(slot).try_into().unwrap());
        assert_eq!(flows, 1);
    }
}

/// S3 — Direction-filtered counters: `-a srcip -s inflows,outflows`, one
/// biflow record `src=A dst=B`.
#[test]
fn s3_direction_filtered_counters() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcip", "inflows,outflows", &dict).unwrap();
    let mut agg = Aggregator::new(&view);

    let bf = BiflowFixture {
        forward: FlowFixture::new().with_addresses(ipv4(10, 0, 0, 1), ipv4(10, 0, 0, 2)),
        reverse: FlowFixture::new(),
    };
    let reader = ClosureLookup(move |_r: &_, e, id, f| bf.find(e, id, f));
    let r = record(TemplateKind::Biflow, 1);
    agg.ingest_record(&reader, &r, &flowagg::filter::AcceptAll);

    assert_eq!(agg.table().len(), 1);
    let slot = agg.table().items()[0];
    let mut expected_key = vec![0u8; 17];
    expected_key[0] = 4;
    expected_key[1..5].copy_from_slice(&[10, 0, 0, 1]);
    assert_eq!(agg.table().key_bytes(slot), expected_key.as_slice());
    let values = agg.table().value_bytes(slot);
    let inflows = u64::from_ne_bytes(values[0..8].try_into().unwrap());
    let outflows = u64::from_ne_bytes(values[8..16].try_into().unwrap());
    assert_eq!(inflows, 1);
    assert_eq!(outflows, 1);
}

/// S4 — Subnet key: `-a srcipv4/24 -s packets`.
#[test]
fn s4_subnet_key() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcipv4/24", "packets", &dict).unwrap();
    let mut agg = Aggregator::new(&view);

    for (src, packets) in [
        (ipv4(10, 0, 0, 7), 3u64),
        (ipv4(10, 0, 0, 99), 5),
        (ipv4(10, 0, 1, 1), 4),
    ] {
        let fx = FlowFixture::new().with_addresses(src, ipv4(0, 0, 0, 0)).with_counts(packets, 0);
        let reader = ClosureLookup(move |_r: &_, e, id, _f| fx.find(e, id));
        let r = record(TemplateKind::Unidirectional, 1);
        agg.ingest_record(&reader, &r, &flowagg::filter::AcceptAll);
    }

    assert_eq!(agg.table().len(), 2);
    let spec = resolve_sort_spec(&view, &[("packets", false)]).unwrap();
    let mut table = agg.into_table();
    table.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));

    let rows: Vec<(Vec<u8>, u64)> = table
        .items()
        .iter()
        .map(|&slot| {
            (
                table.key_bytes(slot).to_vec(),
                u64::from_ne_bytes(table.value_bytes(slot).try_into().unwrap()),
            )
        })
        .collect();
    assert_eq!(rows[0], (vec![10, 0, 0, 0], 8));
    assert_eq!(rows[1], (vec![10, 0, 1, 0], 4));
}

/// S5 — Two-worker top-1 threshold merge: `-a srcip -s bytes`, k=1.
#[test]
fn s5_two_worker_threshold_merge() {
    let dict = StaticDictionary::new();
    let view = compile_view("srcip", "bytes", &dict).unwrap();
    let spec = resolve_sort_spec(&view, &[("bytes", false)]).unwrap();

    let x = [9u8, 9, 9, 9];
    let y = [8u8, 8, 8, 8];
    let z = [7u8, 7, 7, 7];

    let mut w1 = Table::new(4, 8);
    let (sx, _) = w1.find_or_create(&x);
    w1.value_bytes_mut(sx).copy_from_slice(&100u64.to_ne_bytes());
    let (sy, _) = w1.find_or_create(&y);
    w1.value_bytes_mut(sy).copy_from_slice(&80u64.to_ne_bytes());

    let mut w2 = Table::new(4, 8);
    let (sy2, _) = w2.find_or_create(&y);
    w2.value_bytes_mut(sy2).copy_from_slice(&30u64.to_ne_bytes());
    let (sz, _) = w2.find_or_create(&z);
    w2.value_bytes_mut(sz).copy_from_slice(&25u64.to_ne_bytes());

    w1.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));
    w2.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));

    let top = threshold_merge(&view, &spec, &[w1, w2], 1);
    assert_eq!(top.len(), 1);
    assert_eq!(&top[0][0..4], &y[..]);
    assert_eq!(u64::from_ne_bytes(top[0][4..12].try_into().unwrap()), 110);
}

/// S6 — Load-factor resize: starting from a single 16-lane block, 14
/// inserts hold exactly at the 7/8 load factor (14*8 = 112, not > 112) and
/// must not resize; the 15th (15*8 = 120 > 112) crosses it and triggers a
/// resize to 2 blocks. Every key remains findable afterward.
#[test]
fn s6_load_factor_resize() {
    let mut t = Table::with_blocks(4, 0, 1);
    for i in 0u32..14 {
        let (_, created) = t.find_or_create(&i.to_ne_bytes());
        assert!(created);
    }
    assert_eq!(t.num_blocks(), 1, "14 entries must not yet trigger a resize");

    let (_, created) = t.find_or_create(&14u32.to_ne_bytes());
    assert!(created);
    assert_eq!(t.num_blocks(), 2, "the 15th insert must trigger a resize");

    assert_eq!(t.len(), 15);
    assert!(t.check_invariants());
    for i in 0u32..15 {
        assert!(t.find(&i.to_ne_bytes()).is_some());
    }
}
