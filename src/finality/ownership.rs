//! Queue ID Ownership
//!
//! A queue id is polled by exactly one tracker at a time. Ownership moves
//! at most once, from the foreground tracker to the background
//! supervisor, and never back.
//!
//! ```text
//! (none) ──claim──▶ Foreground ──hand_off──▶ Background
//!                        │                        │
//!                     release                  release
//!                        ▼                        ▼
//!                     (none)                   (none)
//! ```

use std::fmt;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core_types::QueueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Foreground,
    Background,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Foreground => write!(f, "FOREGROUND"),
            Owner::Background => write!(f, "BACKGROUND"),
        }
    }
}

/// Registry of queue ids currently being polled
#[derive(Default)]
pub struct OwnershipRegistry {
    owners: DashMap<QueueId, Owner>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
        }
    }

    /// Take foreground ownership; returns the current owner on conflict
    pub fn claim(&self, queue_id: &QueueId) -> Result<(), Owner> {
        match self.owners.entry(queue_id.clone()) {
            Entry::Occupied(e) => Err(*e.get()),
            Entry::Vacant(e) => {
                e.insert(Owner::Foreground);
                Ok(())
            }
        }
    }

    /// Move ownership to the background
    ///
    /// Returns false if the background already owns the queue id.
    pub fn hand_off(&self, queue_id: &QueueId) -> bool {
        match self.owners.entry(queue_id.clone()) {
            Entry::Occupied(mut e) => {
                if *e.get() == Owner::Background {
                    return false;
                }
                e.insert(Owner::Background);
                true
            }
            Entry::Vacant(e) => {
                e.insert(Owner::Background);
                true
            }
        }
    }

    pub fn release(&self, queue_id: &QueueId) {
        self.owners.remove(queue_id);
    }

    pub fn owner(&self, queue_id: &QueueId) -> Option<Owner> {
        self.owners.get(queue_id).map(|o| *o)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
