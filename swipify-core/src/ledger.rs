//! Per-item outcomes and the undo history.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swipify_common::{CollectionRole, Decision};

/// Finalized decision for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub decision: Decision,
    pub at: DateTime<Utc>,
}

/// Items that have been finalized, keyed by item ID.
///
/// An ID is present if and only if its item has been finalized; skips never
/// land here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: HashMap<String, Outcome>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the outcome for `item_id`. Skips are ignored.
    /// Returns whether the ledger changed.
    pub fn record(&mut self, item_id: &str, decision: Decision, at: DateTime<Utc>) -> bool {
        if !decision.is_finalizing() {
            return false;
        }
        self.entries
            .insert(item_id.to_string(), Outcome { decision, at });
        true
    }

    pub fn erase(&mut self, item_id: &str) -> Option<Outcome> {
        self.entries.remove(item_id)
    }

    pub fn get(&self, item_id: &str) -> Option<&Outcome> {
        self.entries.get(item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Entries ordered by decision time, then ID.
    pub fn chronological(&self) -> Vec<(&str, &Outcome)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.1.at.cmp(&b.1.at).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The remote side effect a finalized decision had, so undo can reverse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffectTarget {
    /// `keep` touches nothing remote
    None,
    /// The item was un-liked
    Root,
    /// The item was filed into a named collection
    Collection {
        role: CollectionRole,
        collection_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub item_id: String,
    pub decision: Decision,
    pub target: SideEffectTarget,
}

pub const DEFAULT_UNDO_DEPTH: usize = 1;

fn default_depth() -> usize {
    DEFAULT_UNDO_DEPTH
}

/// Bounded LIFO of finalized decisions. Pushing past `depth` drops the
/// oldest entry; popped entries are gone for good (no redo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    #[serde(default = "default_depth")]
    depth: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_depth(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoStack {
    pub fn with_depth(depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            depth,
        }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        if self.depth == 0 {
            return;
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    /// Change the bound, dropping the oldest entries if it shrank.
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(id: &str, decision: Decision) -> UndoEntry {
        UndoEntry {
            item_id: id.to_string(),
            decision,
            target: SideEffectTarget::None,
        }
    }

    #[test]
    fn record_overwrites_previous_outcome() {
        let mut ledger = Ledger::new();
        let t0 = Utc::now();
        assert!(ledger.record("a", Decision::Keep, t0));
        assert!(ledger.record("a", Decision::Remove, t0 + Duration::seconds(1)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("a").unwrap().decision, Decision::Remove);
    }

    #[test]
    fn skip_never_touches_the_ledger() {
        let mut ledger = Ledger::new();
        assert!(!ledger.record("a", Decision::Skip, Utc::now()));
        assert!(ledger.is_empty());
    }

    #[test]
    fn erase_removes_entry() {
        let mut ledger = Ledger::new();
        ledger.record("a", Decision::Keep, Utc::now());
        assert!(ledger.erase("a").is_some());
        assert!(!ledger.contains("a"));
        assert!(ledger.erase("a").is_none());
    }

    #[test]
    fn chronological_orders_by_time_then_id() {
        let mut ledger = Ledger::new();
        let t0 = Utc::now();
        ledger.record("late", Decision::Keep, t0 + Duration::seconds(5));
        ledger.record("b", Decision::Keep, t0);
        ledger.record("a", Decision::Remove, t0);
        let ids: Vec<_> = ledger.chronological().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b", "late"]);
    }

    #[test]
    fn default_stack_keeps_only_the_latest_entry() {
        let mut stack = UndoStack::default();
        stack.push(entry("a", Decision::Keep));
        stack.push(entry("b", Decision::Remove));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop().unwrap().item_id, "b");
        assert!(stack.pop().is_none());
    }

    #[test]
    fn deeper_stack_is_lifo() {
        let mut stack = UndoStack::with_depth(3);
        for id in ["a", "b", "c", "d"] {
            stack.push(entry(id, Decision::Keep));
        }
        assert_eq!(stack.pop().unwrap().item_id, "d");
        assert_eq!(stack.pop().unwrap().item_id, "c");
        assert_eq!(stack.pop().unwrap().item_id, "b");
        assert!(stack.pop().is_none());
    }

    #[test]
    fn zero_depth_disables_undo() {
        let mut stack = UndoStack::with_depth(0);
        stack.push(entry("a", Decision::Keep));
        assert!(stack.is_empty());
    }

    #[test]
    fn shrinking_depth_drops_oldest() {
        let mut stack = UndoStack::with_depth(3);
        for id in ["a", "b", "c"] {
            stack.push(entry(id, Decision::Keep));
        }
        stack.set_depth(1);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek().unwrap().item_id, "c");
    }

    #[test]
    fn side_effect_target_serializes_tagged() {
        let target = SideEffectTarget::Collection {
            role: CollectionRole::Secondary,
            collection_id: "pl1".into(),
        };
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"collection","role":"secondary","collection_id":"pl1"}"#
        );
    }
}
