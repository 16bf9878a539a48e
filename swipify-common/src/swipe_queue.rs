use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Pure data structure for the swipe work queue.
///
/// Holds item IDs in presentation order. FIFO for normal progression, with a
/// rotate-to-tail for skips and a push-to-head for undo. No ID ever appears
/// twice: every way of adding IDs drops duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SwipeQueue {
    queue: VecDeque<String>,
}

impl From<Vec<String>> for SwipeQueue {
    fn from(ids: Vec<String>) -> Self {
        let mut q = SwipeQueue::new();
        q.replace(ids);
        q
    }
}

impl From<SwipeQueue> for Vec<String> {
    fn from(q: SwipeQueue) -> Self {
        q.queue.into_iter().collect()
    }
}

impl SwipeQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Replace the entire queue contents. Later duplicates of an ID are dropped.
    pub fn replace(&mut self, ids: Vec<String>) {
        let mut seen = HashSet::with_capacity(ids.len());
        self.queue = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
    }

    /// Peek at the head of the queue.
    pub fn front(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    /// Move the head to the tail. Returns the rotated ID.
    pub fn rotate_head_to_tail(&mut self) -> Option<&str> {
        let head = self.queue.pop_front()?;
        self.queue.push_back(head);
        self.queue.back().map(String::as_str)
    }

    /// Put an ID at the head, removing any other occurrence first.
    pub fn push_front(&mut self, id: String) {
        self.remove(&id);
        self.queue.push_front(id);
    }

    /// Remove an ID wherever it is. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.queue.iter().position(|q| q == id) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current queue contents, head first.
    pub fn ids(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
