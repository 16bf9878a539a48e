use serde::{Deserialize, Serialize};

/// What the user decided for the item at the head of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Keep,
    /// Un-like: drop the item from the root liked collection
    Remove,
    FilePrimary,
    FileSecondary,
    /// Rotate the head to the tail without finalizing it
    Skip,
}

impl Decision {
    /// Whether this decision finalizes the item (writes the ledger, pops the queue).
    pub fn is_finalizing(self) -> bool {
        !matches!(self, Decision::Skip)
    }

    /// The named collection this decision files into, if any.
    pub fn collection_role(self) -> Option<CollectionRole> {
        match self {
            Decision::FilePrimary => Some(CollectionRole::Primary),
            Decision::FileSecondary => Some(CollectionRole::Secondary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Keep => "keep",
            Decision::Remove => "remove",
            Decision::FilePrimary => "file-primary",
            Decision::FileSecondary => "file-secondary",
            Decision::Skip => "skip",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical role of a named sub-collection ("keepers", "favourites")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionRole {
    Primary,
    Secondary,
}
