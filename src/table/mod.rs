//! Block-based open-addressing hash table (spec §3.4, §4.5).
//!
//! Grounded on the original `fdsdump` `hash_table_t` (`hashtable.hpp`):
//! fixed-size blocks of 16 lanes, a 1-byte secondary-hash tag per lane for
//! a cheap pre-filter before the full key compare, and a dense `items`
//! vector so sort/iterate passes never have to walk empty lanes.

pub mod block;

use block::{Block, EMPTY_TAG, LANES};
use xxhash_rust::xxh3::xxh3_64;

/// Resize when `items.len() * 8 > num_blocks * 16 * 7` (load factor > 7/8,
/// spec §4.5; spec §8.5 S6: 14 entries in a 1-block table must not resize,
/// 112 > 112 is false — the 15th entry, 120 > 112, must).
fn needs_resize(items: usize, num_blocks: usize) -> bool {
    items.saturating_mul(8) > num_blocks.saturating_mul(LANES).saturating_mul(7)
}

/// Owns the slot arena, the block array, and the insertion-ordered `items`
/// index. One instance per worker thread (spec §3.5); never shared.
#[derive(Clone, Debug)]
pub struct Table {
    blocks: Vec<Block>,
    items: Vec<u32>,
    arena: Vec<u8>,
    keys_size: usize,
    values_size: usize,
}

impl Table {
    /// Number of blocks a fresh table starts with. Small enough that an
    /// empty run allocates almost nothing, large enough that the first
    /// handful of inserts don't immediately trigger a resize.
    const INITIAL_BLOCKS: usize = 4;

    #[must_use]
    pub fn new(keys_size: usize, values_size: usize) -> Self {
        Self::with_blocks(keys_size, values_size, Self::INITIAL_BLOCKS)
    }

    /// Construct a table starting from an explicit block count, rather than
    /// the default [`Self::INITIAL_BLOCKS`]. Mainly for tests that need to
    /// exercise a specific load-factor/resize boundary deterministically
    /// (spec §8.5 S6 starts from a single 16-lane block).
    #[must_use]
    pub fn with_blocks(keys_size: usize, values_size: usize, num_blocks: usize) -> Self {
        Self {
            blocks: vec![Block::default(); num_blocks.max(1)],
            items: Vec::new(),
            arena: Vec::new(),
            keys_size,
            values_size,
        }
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn keys_size(&self) -> usize {
        self.keys_size
    }

    #[must_use]
    pub fn values_size(&self) -> usize {
        self.values_size
    }

    #[must_use]
    fn slot_size(&self) -> usize {
        self.keys_size + self.values_size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insertion-ordered slot indices of every live entry (spec §3.4). Used
    /// by the sort pass and by the merge coordinator to read out rows.
    #[must_use]
    pub fn items(&self) -> &[u32] {
        &self.items
    }

    #[must_use]
    pub fn key_bytes(&self, slot: u32) -> &[u8] {
        let start = slot as usize * self.slot_size();
        &self.arena[start..start + self.keys_size]
    }

    #[must_use]
    pub fn value_bytes(&self, slot: u32) -> &[u8] {
        let start = slot as usize * self.slot_size() + self.keys_size;
        &self.arena[start..start + self.values_size]
    }

    pub fn value_bytes_mut(&mut self, slot: u32) -> &mut [u8] {
        let slot_size = self.slot_size();
        let start = slot as usize * slot_size + self.keys_size;
        &mut self.arena[start..start + self.values_size]
    }

    #[must_use]
    pub fn slot_bytes(&self, slot: u32) -> &[u8] {
        let slot_size = self.slot_size();
        let start = slot as usize * slot_size;
        &self.arena[start..start + slot_size]
    }

    fn hash_key(key: &[u8]) -> u64 {
        xxh3_64(key)
    }

    fn locate(&self, hash: u64) -> (usize, u8) {
        let block_index = ((hash >> 8) as usize) % self.blocks.len();
        let tag = block::normalize_tag((hash & 0xFF) as u8);
        (block_index, tag)
    }

    /// Hit-or-miss probe; never allocates (spec §4.5 `find`).
    #[must_use]
    pub fn find(&self, key: &[u8]) -> Option<u32> {
        debug_assert_eq!(key.len(), self.keys_size);
        let hash = Self::hash_key(key);
        let (start, tag) = self.locate(hash);

        for offset in 0..self.blocks.len() {
            let block_index = (start + offset) % self.blocks.len();
            let block = &self.blocks[block_index];
            for lane in block.matching_lanes(tag) {
                let slot = block.slots[lane];
                if self.key_bytes(slot) == key {
                    return Some(slot);
                }
            }
            if block.first_empty_lane().is_some() {
                return None;
            }
        }
        None
    }

    /// Probe, inserting a new slot for `key` if absent (spec §4.5
    /// `find_or_create`). Returns the slot index and whether it was newly
    /// created; the caller is responsible for initializing the value bytes
    /// of a freshly created slot.
    pub fn find_or_create(&mut self, key: &[u8]) -> (u32, bool) {
        debug_assert_eq!(key.len(), self.keys_size);
        let hash = Self::hash_key(key);
        let (start, tag) = self.locate(hash);

        let mut block_index = start;
        loop {
            {
                let block = &self.blocks[block_index];
                for lane in block.matching_lanes(tag) {
                    let slot = block.slots[lane];
                    if self.key_bytes(slot) == key {
                        return (slot, false);
                    }
                }
            }
            if self.blocks[block_index].first_empty_lane().is_some() {
                break;
            }
            block_index = (block_index + 1) % self.blocks.len();
        }

        let slot = self.allocate_slot(key);
        let lane = self.blocks[block_index]
            .first_empty_lane()
            .expect("checked above");
        self.blocks[block_index].occupy(lane, tag, slot);
        self.items.push(slot);

        if needs_resize(self.items.len(), self.blocks.len()) {
            self.resize();
        }

        (slot, true)
    }

    fn allocate_slot(&mut self, key: &[u8]) -> u32 {
        let slot_size = self.slot_size();
        let slot = (self.arena.len() / slot_size) as u32;
        self.arena.extend(key.iter().copied());
        self.arena.extend(std::iter::repeat(0u8).take(self.values_size));
        slot
    }

    /// Double the block count and rehash every live slot (spec §4.5
    /// `Resize`). Slot bytes are never moved — only the block/lane
    /// placement changes.
    fn resize(&mut self) {
        let new_block_count = self.blocks.len() * 2;
        let mut new_blocks = vec![Block::default(); new_block_count];

        for &slot in &self.items {
            let hash = Self::hash_key(self.key_bytes(slot));
            let block_index = ((hash >> 8) as usize) % new_block_count;
            let tag = block::normalize_tag((hash & 0xFF) as u8);

            let mut idx = block_index;
            loop {
                if let Some(lane) = new_blocks[idx].first_empty_lane() {
                    new_blocks[idx].occupy(lane, tag, slot);
                    break;
                }
                idx = (idx + 1) % new_block_count;
            }
        }

        self.blocks = new_blocks;
    }

    /// Sort `items` in place by `cmp`, which receives two full slot
    /// byte-strings (spec §4.6 "after all files: sort table.items[]").
    pub fn sort_items_by(&mut self, mut cmp: impl FnMut(&[u8], &[u8]) -> std::cmp::Ordering) {
        let slot_size = self.slot_size();
        let arena = &self.arena;
        self.items.sort_by(|&a, &b| {
            let sa = &arena[a as usize * slot_size..a as usize * slot_size + slot_size];
            let sb = &arena[b as usize * slot_size..b as usize * slot_size + slot_size];
            cmp(sa, sb)
        });
    }

    /// True iff every non-empty lane's tag matches the low byte of its
    /// slot key's hash, and every live slot is reachable by probing from
    /// its natural block (spec §3.4 invariants). Used in tests, not on
    /// the hot path.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        if self.items.len()
            != self
                .blocks
                .iter()
                .flat_map(|b| b.tags.iter())
                .filter(|&&t| t != EMPTY_TAG)
                .count()
        {
            return false;
        }
        for &slot in &self.items {
            let key = self.key_bytes(slot);
            if self.find(key) != Some(slot) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find_same_key_is_a_hit() {
        let mut t = Table::new(4, 8);
        let key = [1u8, 2, 3, 4];
        let (slot, created) = t.find_or_create(&key);
        assert!(created);
        let (slot2, created2) = t.find_or_create(&key);
        assert!(!created2);
        assert_eq!(slot, slot2);
        assert_eq!(t.find(&key), Some(slot));
    }

    #[test]
    fn distinct_keys_get_distinct_slots() {
        let mut t = Table::new(4, 8);
        let (a, _) = t.find_or_create(&[1, 0, 0, 0]);
        let (b, _) = t.find_or_create(&[2, 0, 0, 0]);
        assert_ne!(a, b);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn resize_preserves_all_entries() {
        let mut t = Table::new(4, 0);
        let mut keys = Vec::new();
        for i in 0u32..500 {
            let key = i.to_ne_bytes();
            let (_, created) = t.find_or_create(&key);
            assert!(created);
            keys.push(key);
        }
        assert_eq!(t.len(), 500);
        assert!(t.check_invariants());
        for key in &keys {
            assert!(t.find(key).is_some());
        }
    }

    #[test]
    fn value_bytes_round_trip() {
        let mut t = Table::new(4, 4);
        let (slot, _) = t.find_or_create(&[9, 9, 9, 9]);
        t.value_bytes_mut(slot).copy_from_slice(&42u32.to_ne_bytes());
        assert_eq!(u32::from_ne_bytes(t.value_bytes(slot).try_into().unwrap()), 42);
    }
}
