//! Arena storage for atoms.
//!
//! Provides `Handle` (a dense, total-orderable atom identifier) and
//! `AtomArena` (contiguous storage with free-list reuse). The arena is
//! generic over the stored record so the store can keep whatever per-atom
//! bookkeeping it needs next to the atom itself.
//!
//! # Determinism
//! - `Handle` ordering is by its inner `u32`, which is allocation order for
//!   a store that never removes atoms.
//! - Iteration order over slots is by index (0..capacity).
//! - Free-list reuse is LIFO: the most recently freed slot is reused first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense identifier of an atom inside one `AtomSpace`.
///
/// `Handle(u32)` is `Copy`, `Eq`, `Ord`, `Hash`. Two handles from the same
/// store are equal iff they name the same atom, so handle equality is atom
/// identity.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u32);

impl Handle {
    /// Creates a handle from a raw slot index.
    ///
    /// Handles built this way are only meaningful for the store whose arena
    /// owns that slot.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw slot index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    data: Option<T>,
    next_free: Option<u32>,
}

/// Contiguous atom storage with free-list reuse.
#[derive(Debug, Clone)]
pub struct AtomArena<T> {
    slots: Vec<Slot<T>>,
    free_list_head: Option<u32>,
    live_count: usize,
}

impl<T> AtomArena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list_head: None,
            live_count: 0,
        }
    }

    /// Stores `data` and returns its handle, reusing a freed slot if one
    /// is available.
    pub fn allocate(&mut self, data: T) -> Handle {
        self.live_count += 1;
        if let Some(idx) = self.free_list_head {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(slot.data.is_none(), "free slot should have no data");
            self.free_list_head = slot.next_free;
            slot.data = Some(data);
            slot.next_free = None;
            return Handle(idx);
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            data: Some(data),
            next_free: None,
        });
        Handle(idx)
    }

    /// Frees the slot behind `handle` and returns what it held.
    ///
    /// Returns `None` if the handle is out of range or already free.
    pub fn deallocate(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        let data = slot.data.take()?;
        slot.next_free = self.free_list_head;
        self.free_list_head = Some(handle.0);
        self.live_count -= 1;
        Some(data)
    }

    /// Returns the record stored at `handle`, if live.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle.index()).and_then(|slot| slot.data.as_ref())
    }

    /// Returns a mutable reference to the record stored at `handle`, if live.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .and_then(|slot| slot.data.as_mut())
    }

    /// Number of live atoms.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Total number of slots, free ones included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.data.as_ref().map(|data| (Handle(idx as u32), data)))
    }
}

impl<T> Default for AtomArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
