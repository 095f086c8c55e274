//! Purpose: Track free space and free region-table slots for one target.
//! Exports: `Allocator`, `Allocation`, `align8`.
//! Role: Pure bookkeeping used by `target`; performs no I/O.
//! Invariants: Free extents never overlap and are coalesced with their neighbours.
//! Invariants: Extent offsets and lengths are multiples of 8 (data-area relative).
//! Invariants: Retired slots are never handed out again.
use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::{Error, ErrorKind};

pub const REGION_ALIGN: u64 = 8;

pub fn align8(value: u64) -> Option<u64> {
    value.checked_add(REGION_ALIGN - 1).map(|v| v & !(REGION_ALIGN - 1))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Allocation {
    pub slot: u32,
    pub offset: u64,
}

#[derive(Debug)]
pub struct Allocator {
    capacity: u64,
    free_extents: BTreeMap<u64, u64>,
    free_slots: BTreeSet<u32>,
    used: u64,
}

impl Allocator {
    pub fn new(capacity: u64, slot_count: u32) -> Self {
        let capacity = capacity & !(REGION_ALIGN - 1);
        let mut free_extents = BTreeMap::new();
        if capacity > 0 {
            free_extents.insert(0, capacity);
        }
        Self {
            capacity,
            free_extents,
            free_slots: (0..slot_count).collect(),
            used: 0,
        }
    }

    /// Rebuilds free space from the extents of live regions found on open.
    /// `live` yields `(slot, offset, size)`; `free_slots` are the slots open for reuse.
    pub fn from_live(
        capacity: u64,
        free_slots: impl IntoIterator<Item = u32>,
        live: impl IntoIterator<Item = (u32, u64, u64)>,
    ) -> Result<Self, Error> {
        let capacity = capacity & !(REGION_ALIGN - 1);
        let mut extents: Vec<(u64, u64, u32)> = Vec::new();
        for (slot, offset, size) in live {
            if size == 0 {
                continue;
            }
            let len = align8(size).ok_or_else(|| corrupt_slot(slot, "region size overflow"))?;
            let end = offset
                .checked_add(len)
                .ok_or_else(|| corrupt_slot(slot, "region end overflow"))?;
            if offset % REGION_ALIGN != 0 || end > capacity {
                return Err(corrupt_slot(slot, "region outside data area"));
            }
            extents.push((offset, len, slot));
        }
        extents.sort_unstable();

        let mut free_extents = BTreeMap::new();
        let mut cursor = 0u64;
        let mut used = 0u64;
        for (offset, len, slot) in extents {
            if offset < cursor {
                return Err(corrupt_slot(slot, "region overlaps another region"));
            }
            if offset > cursor {
                free_extents.insert(cursor, offset - cursor);
            }
            cursor = offset + len;
            used += len;
        }
        if cursor < capacity {
            free_extents.insert(cursor, capacity - cursor);
        }

        Ok(Self {
            capacity,
            free_extents,
            free_slots: free_slots.into_iter().collect(),
            used,
        })
    }

    /// Reserves a slot and `size` bytes (first fit). Zero-size regions take a slot only.
    pub fn allocate(&mut self, size: u64) -> Result<Allocation, Error> {
        let Some(&slot) = self.free_slots.iter().next() else {
            return Err(Error::new(ErrorKind::OutOfSpace)
                .with_message("region table is full")
                .with_hint("Remove unused regions or create the pool with more --max-regions."));
        };
        let offset = if size == 0 {
            0
        } else {
            let len = align8(size).ok_or_else(|| {
                Error::new(ErrorKind::InvalidArgument).with_message("region size overflow")
            })?;
            self.take_extent(len).ok_or_else(|| {
                Error::new(ErrorKind::OutOfSpace).with_message(format!(
                    "no free extent of {len} bytes (free: {}, largest: {})",
                    self.free_bytes(),
                    self.largest_free()
                ))
            })?
        };
        self.free_slots.remove(&slot);
        Ok(Allocation { slot, offset })
    }

    /// Returns an allocation. `retire` keeps the slot out of circulation for good.
    pub fn release(&mut self, slot: u32, offset: u64, size: u64, retire: bool) {
        if !retire {
            self.free_slots.insert(slot);
        }
        if size == 0 {
            return;
        }
        let Some(len) = align8(size) else {
            return;
        };
        self.used = self.used.saturating_sub(len);
        self.insert_extent(offset, len);
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    pub fn free_bytes(&self) -> u64 {
        self.capacity - self.used
    }

    pub fn largest_free(&self) -> u64 {
        self.free_extents.values().copied().max().unwrap_or(0)
    }

    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    fn take_extent(&mut self, len: u64) -> Option<u64> {
        let (&offset, &extent_len) = self.free_extents.iter().find(|(_, l)| **l >= len)?;
        self.free_extents.remove(&offset);
        if extent_len > len {
            self.free_extents.insert(offset + len, extent_len - len);
        }
        self.used += len;
        Some(offset)
    }

    fn insert_extent(&mut self, mut offset: u64, mut len: u64) {
        if let Some((&prev_off, &prev_len)) = self.free_extents.range(..offset).next_back() {
            if prev_off + prev_len == offset {
                self.free_extents.remove(&prev_off);
                offset = prev_off;
                len += prev_len;
            }
        }
        if let Some(&next_len) = self.free_extents.get(&(offset + len)) {
            self.free_extents.remove(&(offset + len));
            len += next_len;
        }
        self.free_extents.insert(offset, len);
    }
}

fn corrupt_slot(slot: u32, message: &str) -> Error {
    Error::new(ErrorKind::Corrupt).with_message(format!("region table slot {slot}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::{Allocator, align8};
    use crate::core::error::ErrorKind;

    #[test]
    fn align8_rounds_up() {
        assert_eq!(align8(0), Some(0));
        assert_eq!(align8(1), Some(8));
        assert_eq!(align8(8), Some(8));
        assert_eq!(align8(100), Some(104));
        assert_eq!(align8(u64::MAX), None);
    }

    #[test]
    fn first_fit_and_coalescing() {
        let mut alloc = Allocator::new(64, 8);
        let a = alloc.allocate(16).expect("a");
        let b = alloc.allocate(16).expect("b");
        let c = alloc.allocate(16).expect("c");
        assert_eq!((a.offset, b.offset, c.offset), (0, 16, 32));
        assert_eq!(alloc.free_bytes(), 16);

        alloc.release(a.slot, a.offset, 16, false);
        alloc.release(c.slot, c.offset, 16, false);
        assert_eq!(alloc.largest_free(), 32);

        alloc.release(b.slot, b.offset, 16, false);
        assert_eq!(alloc.largest_free(), 64);
        assert_eq!(alloc.used_bytes(), 0);
        assert_eq!(alloc.free_slot_count(), 8);
    }

    #[test]
    fn exhaustion_reports_out_of_space() {
        let mut alloc = Allocator::new(32, 8);
        alloc.allocate(24).expect("fits");
        let err = alloc.allocate(16).expect_err("full");
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
        // failed allocation must not leak a slot
        assert_eq!(alloc.free_slot_count(), 7);

        let mut slots = Allocator::new(1024, 1);
        slots.allocate(0).expect("zero-size takes a slot");
        let err = slots.allocate(0).expect_err("no slot");
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
    }

    #[test]
    fn retired_slots_are_not_reused() {
        let mut alloc = Allocator::new(64, 1);
        let a = alloc.allocate(8).expect("a");
        alloc.release(a.slot, a.offset, 8, true);
        assert_eq!(alloc.free_slot_count(), 0);
        assert_eq!(alloc.free_bytes(), 64);
    }

    #[test]
    fn from_live_rebuilds_gaps_and_rejects_overlap() {
        let alloc = Allocator::from_live(64, [2u32], [(0, 0, 8), (1, 32, 10)]).expect("rebuild");
        assert_eq!(alloc.used_bytes(), 24);
        assert_eq!(alloc.largest_free(), 24);
        assert_eq!(alloc.free_slot_count(), 1);

        let err = Allocator::from_live(64, [], [(0, 0, 16), (1, 8, 8)]).expect_err("overlap");
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let err = Allocator::from_live(64, [], [(0, 60, 16)]).expect_err("past end");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
