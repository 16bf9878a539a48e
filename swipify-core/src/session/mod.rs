//! Swipe session state and the engine that mutates it.
//!
//! `SessionState` is plain data: the queue, the ledger, the undo history,
//! the named collection references and a few counters. It is owned by the
//! caller and passed by `&mut` into every `SwipeEngine` operation, so there
//! is exactly one writer at a time. It serializes verbatim for snapshots.

mod engine;
mod stats;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use swipify_common::{CollectionRole, SwipeQueue};

use crate::ledger::{Ledger, UndoStack};

pub use engine::{Applied, Head, SessionError, SwipeEngine, UndoOutcome};
pub use stats::{format_eta, SessionStats};

pub const DEFAULT_PRIMARY_NAME: &str = "💚 Keepers (Swpify)";
pub const DEFAULT_SECONDARY_NAME: &str = "⭐ Favourites (Swpify)";

/// A named collection and, once resolved, its remote ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub name: String,
    pub id: Option<String>,
}

impl CollectionRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRefs {
    pub primary: CollectionRef,
    pub secondary: CollectionRef,
}

impl Default for CollectionRefs {
    fn default() -> Self {
        Self {
            primary: CollectionRef::named(DEFAULT_PRIMARY_NAME),
            secondary: CollectionRef::named(DEFAULT_SECONDARY_NAME),
        }
    }
}

impl CollectionRefs {
    pub fn new(primary_name: &str, secondary_name: &str) -> Self {
        Self {
            primary: CollectionRef::named(primary_name),
            secondary: CollectionRef::named(secondary_name),
        }
    }

    pub fn get_mut(&mut self, role: CollectionRole) -> &mut CollectionRef {
        match role {
            CollectionRole::Primary => &mut self.primary,
            CollectionRole::Secondary => &mut self.secondary,
        }
    }

    /// Rename a role. A new name forgets the cached remote ID.
    /// Returns whether anything changed.
    pub fn rename(&mut self, role: CollectionRole, name: &str) -> bool {
        let entry = self.get_mut(role);
        if entry.name == name {
            return false;
        }
        *entry = CollectionRef::named(name);
        true
    }
}

/// Finalized decisions per UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeCounter {
    pub day: NaiveDate,
    pub count: u32,
}

impl Default for SwipeCounter {
    fn default() -> Self {
        Self {
            day: Utc::now().date_naive(),
            count: 0,
        }
    }
}

impl SwipeCounter {
    fn roll_over(&mut self, today: NaiveDate) {
        if self.day != today {
            self.day = today;
            self.count = 0;
        }
    }

    pub fn bump(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.count += 1;
    }

    pub fn unbump(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.count = self.count.saturating_sub(1);
    }

    pub fn on(&self, today: NaiveDate) -> u32 {
        if self.day == today {
            self.count
        } else {
            0
        }
    }
}

/// Bookkeeping from the last queue build, for progress and pace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProgress {
    /// Queue length plus ledger size at build time
    pub built_total: usize,
    pub built_at: Option<DateTime<Utc>>,
    /// Finalized decisions since the build, net of undos
    pub decided_since_build: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub queue: SwipeQueue,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub undo: UndoStack,
    #[serde(default)]
    pub collections: CollectionRefs,
    #[serde(default)]
    pub counter: SwipeCounter,
    #[serde(default)]
    pub progress: BuildProgress,
}

impl SessionState {
    pub fn new(collections: CollectionRefs, undo_depth: usize) -> Self {
        Self {
            collections,
            undo: UndoStack::with_depth(undo_depth),
            ..Self::default()
        }
    }
}
