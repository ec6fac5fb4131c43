// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Rate table arena
//!
//! Tables live in generational slots. The channel that created a table is
//! its owner and the only one allowed to mutate or tear it down; copies hold
//! the same [`TableId`] as sharers. Once the owner releases a table its slot
//! generation moves on, so ids still held by copies resolve to nothing.

use tracing::{debug, warn};

use crate::error::{ChannelError, Result};
use crate::ids::{ChannelId, TableId};
use crate::rate_table::{RatePair, RateTable};

#[derive(Debug)]
struct TableEntry {
    table: RateTable,
    owner: ChannelId,
    sharers: usize,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<TableEntry>,
}

/// Outcome of releasing a table reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The owner released the table; it no longer exists
    TornDown {
        /// Copies still holding the (now stale) id
        orphaned: usize,
    },
    /// A sharer dropped its reference
    Unshared { remaining: usize },
}

/// Arena of rate tables addressed by generational ids
#[derive(Debug, Default)]
pub struct RateTableArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl RateTableArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a table owned by `owner`
    pub fn create(&mut self, owner: ChannelId, table: RateTable) -> TableId {
        let entry = TableEntry {
            table,
            owner,
            sharers: 0,
        };
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            TableId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            TableId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        };
        debug!(target: "biokinetics-channels", "{} created for {}", id, owner);
        id
    }

    fn entry(&self, id: TableId) -> Option<&TableEntry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, id: TableId) -> Option<&mut TableEntry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Register another reference to a live table
    pub fn share(&mut self, id: TableId) -> Result<TableId> {
        let entry = self.entry_mut(id).ok_or(ChannelError::StaleTable(id))?;
        entry.sharers += 1;
        Ok(id)
    }

    /// Drop a reference held by `by`
    ///
    /// The owner's release tears the table down regardless of sharers.
    pub fn release(&mut self, id: TableId, by: ChannelId) -> Result<Release> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or(ChannelError::StaleTable(id))?;
        let entry = slot.entry.as_mut().ok_or(ChannelError::StaleTable(id))?;

        if entry.owner != by {
            entry.sharers = entry.sharers.saturating_sub(1);
            return Ok(Release::Unshared {
                remaining: entry.sharers,
            });
        }

        let orphaned = entry.sharers;
        if orphaned > 0 {
            warn!(
                target: "biokinetics-channels",
                "{} torn down by its owner {} while {} copies still reference it",
                id, by, orphaned
            );
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        debug!(target: "biokinetics-channels", "{} torn down", id);
        Ok(Release::TornDown { orphaned })
    }

    pub fn table(&self, id: TableId) -> Option<&RateTable> {
        self.entry(id).map(|e| &e.table)
    }

    /// Mutable access, granted to the owner only
    pub fn table_mut(&mut self, id: TableId, requester: ChannelId) -> Result<&mut RateTable> {
        let entry = self.entry_mut(id).ok_or(ChannelError::StaleTable(id))?;
        if entry.owner != requester {
            return Err(ChannelError::NotOwner {
                table: id,
                requester,
            });
        }
        Ok(&mut entry.table)
    }

    #[inline]
    pub fn lookup(&self, id: TableId, x: f64, y: f64) -> Option<RatePair> {
        self.entry(id).map(|e| e.table.lookup(x, y))
    }

    pub fn owner(&self, id: TableId) -> Option<ChannelId> {
        self.entry(id).map(|e| e.owner)
    }

    pub fn is_live(&self, id: TableId) -> bool {
        self.entry(id).is_some()
    }

    /// Owner plus sharers; zero once torn down
    pub fn ref_count(&self, id: TableId) -> usize {
        self.entry(id).map_or(0, |e| 1 + e.sharers)
    }

    pub fn live_tables(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let mut arena = RateTableArena::new();
        let id = arena.create(ChannelId(1), RateTable::default());
        assert!(arena.is_live(id));
        assert_eq!(arena.ref_count(id), 1);
        assert_eq!(arena.lookup(id, 0.0, 0.0), Some(RatePair::ZERO));
        assert_eq!(arena.owner(id), Some(ChannelId(1)));
    }

    #[test]
    fn test_only_owner_mutates() {
        let mut arena = RateTableArena::new();
        let id = arena.create(ChannelId(1), RateTable::default());
        arena.share(id).unwrap();
        assert!(arena.table_mut(id, ChannelId(1)).is_ok());
        assert!(matches!(
            arena.table_mut(id, ChannelId(2)),
            Err(ChannelError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_sharer_release_only_decrements() {
        let mut arena = RateTableArena::new();
        let id = arena.create(ChannelId(1), RateTable::default());
        arena.share(id).unwrap();
        arena.share(id).unwrap();
        assert_eq!(arena.ref_count(id), 3);
        assert_eq!(
            arena.release(id, ChannelId(2)).unwrap(),
            Release::Unshared { remaining: 1 }
        );
        assert!(arena.is_live(id));
    }

    #[test]
    fn test_owner_release_invalidates_copies() {
        let mut arena = RateTableArena::new();
        let id = arena.create(ChannelId(1), RateTable::default());
        arena.share(id).unwrap();
        assert_eq!(
            arena.release(id, ChannelId(1)).unwrap(),
            Release::TornDown { orphaned: 1 }
        );
        assert!(!arena.is_live(id));
        assert_eq!(arena.lookup(id, 0.0, 0.0), None);
        assert_eq!(arena.ref_count(id), 0);
        assert!(matches!(arena.share(id), Err(ChannelError::StaleTable(_))));

        // The slot is reused under a new generation
        let reused = arena.create(ChannelId(3), RateTable::default());
        assert_eq!(reused.index, id.index);
        assert_ne!(reused.generation, id.generation);
        assert!(!arena.is_live(id));
        assert_eq!(arena.live_tables(), 1);
    }
}
