//! Distributed top-N merge: the threshold algorithm over N pre-sorted
//! per-worker tables (spec §4.8).
//!
//! Grounded on the original `fdsdump` coordinator's `make_top_n`
//! (`aggregator.cpp`): walk the sorted lists in lockstep, consolidate a key
//! across every worker the first time it's seen, and stop as soon as no
//! later position could still unseat the current k-th best.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::codec;
use crate::comparator::{compare_slots, SortSpec};
use crate::table::Table;
use crate::view::ViewDefinition;

/// A bounded sorted collection of the best `k` slots seen so far, ordered
/// ascending by the sort spec (index 0 = best, last = worst-of-the-kept —
/// the "top of the inverse max-heap" in spec §4.8).
struct TopK<'a, 'v> {
    view: &'v ViewDefinition,
    spec: &'a SortSpec,
    capacity: usize,
    items: Vec<Vec<u8>>,
}

impl<'a, 'v> TopK<'a, 'v> {
    fn new(view: &'v ViewDefinition, spec: &'a SortSpec, capacity: usize) -> Self {
        Self {
            view,
            spec,
            capacity,
            items: Vec::with_capacity(capacity.min(1024)),
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// The current worst-kept entry, if the set is full (the threshold
    /// candidate must beat this to be worth keeping).
    fn worst(&self) -> Option<&[u8]> {
        self.items.last().map(Vec::as_slice)
    }

    fn push(&mut self, record: Vec<u8>) {
        let pos = self
            .items
            .binary_search_by(|existing| compare_slots(self.view, self.spec, existing, &record))
            .unwrap_or_else(|i| i);
        self.items.insert(pos, record);
        if self.items.len() > self.capacity {
            self.items.pop();
        }
    }
}

/// Run the threshold algorithm over `tables`, whose `items()` must already
/// be sorted descending by `spec` (via [`crate::table::Table::sort_items_by`]
/// with [`compare_slots`]). Returns up to `k` winning slot byte-strings
/// (`keys_size + values_size` each), globally top-k in descending order.
#[must_use]
pub fn threshold_merge(view: &ViewDefinition, spec: &SortSpec, tables: &[Table], k: usize) -> Vec<Vec<u8>> {
    if k == 0 || tables.is_empty() {
        return Vec::new();
    }

    let mut heap = TopK::new(view, spec, k);
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut idx = 0usize;

    loop {
        if heap.is_full() {
            let mut threshold = vec![0u8; view.keys_size + view.values_size];
            codec::init_values(view, &mut threshold[view.keys_size..]);

            let mut any_present = false;
            for table in tables {
                if let Some(&slot) = table.items().get(idx) {
                    any_present = true;
                    codec::merge_values(view, &mut threshold[view.keys_size..], table.value_bytes(slot));
                }
            }
            if !any_present {
                break;
            }

            // `compare_slots` ranks "better" as `Less` (it already accounts
            // for ascending/descending per field), so a worst-kept entry
            // that still has strictly more room to fall (i.e. is
            // numerically worse than the threshold) compares `Greater`
            // here. Anything else means no later position can unseat it.
            let worst = heap.worst().expect("heap is full");
            if compare_slots(view, spec, worst, &threshold) != Ordering::Greater {
                break;
            }
        }

        let mut any_advanced = false;
        for (i, table) in tables.iter().enumerate() {
            let Some(&slot) = table.items().get(idx) else {
                continue;
            };
            any_advanced = true;

            let key = table.key_bytes(slot).to_vec();
            if !seen.insert(key.clone()) {
                continue;
            }

            let mut merged = table.slot_bytes(slot).to_vec();
            for (j, other) in tables.iter().enumerate() {
                if i == j {
                    continue;
                }
                if let Some(other_slot) = other.find(&key) {
                    codec::merge_values(view, &mut merged[view.keys_size..], other.value_bytes(other_slot));
                }
            }
            heap.push(merged);
        }

        if !any_advanced {
            break;
        }
        idx += 1;
    }

    // `heap.items` is already best-first (index 0 = best, matching
    // `compare_slots`'s descending-by-default convention), i.e. already in
    // the descending order the caller wants — no reversal needed.
    heap.items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::resolve_sort_spec;
    use crate::ie::StaticDictionary;
    use crate::view::compile_view;

    fn table_with(view: &ViewDefinition, entries: &[(u8, u64)]) -> Table {
        let mut t = Table::new(view.keys_size, view.values_size);
        for &(key, bytes) in entries {
            let (slot, created) = t.find_or_create(&[key]);
            assert!(created);
            t.value_bytes_mut(slot).copy_from_slice(&bytes.to_ne_bytes());
        }
        t
    }

    #[test]
    fn merges_matching_keys_across_workers() {
        let dict = StaticDictionary::new();
        let view = compile_view("proto", "bytes", &dict).unwrap();
        let spec = resolve_sort_spec(&view, &[("bytes", false)]).unwrap();

        let mut t1 = table_with(&view, &[(1, 100), (2, 50)]);
        let mut t2 = table_with(&view, &[(1, 20), (3, 200)]);
        t1.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));
        t2.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));

        let top = threshold_merge(&view, &spec, &[t1, t2], 3);
        let values: Vec<u64> = top
            .iter()
            .map(|slot| u64::from_ne_bytes(slot[view.keys_size..].try_into().unwrap()))
            .collect();

        // key 1: 100 + 20 = 120; key 3: 200; key 2: 50.
        assert_eq!(values, vec![200, 120, 50]);
    }

    #[test]
    fn respects_k_limit() {
        let dict = StaticDictionary::new();
        let view = compile_view("proto", "bytes", &dict).unwrap();
        let spec = resolve_sort_spec(&view, &[("bytes", false)]).unwrap();

        let mut t1 = table_with(&view, &[(1, 10), (2, 20), (3, 30)]);
        t1.sort_items_by(|a, b| compare_slots(&view, &spec, a, b));

        let top = threshold_merge(&view, &spec, &[t1], 2);
        assert_eq!(top.len(), 2);
    }
}
