use chrono::Utc;
use swipify_common::{CollectionRole, Decision};
use tracing::{info, warn};

use super::{SessionState, SessionStats};
use crate::config::SwipifyConfig;
use crate::filter::TrackFilter;
use crate::ledger::{SideEffectTarget, UndoEntry};
use crate::queue_builder::{self, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::remote::{LibraryRemote, ListSource, Membership, RemoteCollectionClient, Track};
use crate::retry::CallFailed;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("the queue is empty")]
    EmptyQueue,
    #[error(transparent)]
    Remote(#[from] CallFailed),
    /// Looking up the head failed after unavailable items had already been
    /// dropped from the queue.
    #[error("{source} (after dropping {} unavailable item(s))", .dropped.len())]
    HeadLookup {
        dropped: Vec<String>,
        #[source]
        source: CallFailed,
    },
}

impl SessionError {
    /// IDs removed from the queue before the error surfaced.
    pub fn dropped(&self) -> &[String] {
        match self {
            SessionError::HeadLookup { dropped, .. } => dropped,
            _ => &[],
        }
    }
}

/// The item at the head of the queue, plus any IDs dropped on the way
/// because the remote no longer knows them.
#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub track: Option<Track>,
    pub dropped: Vec<String>,
}

/// A decision that took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub item_id: String,
    pub decision: Decision,
}

#[derive(Debug)]
pub enum UndoOutcome {
    NothingToUndo,
    /// The item is back at the head of the queue. `reversal_error` is set
    /// when the remote side effect could not be reversed; local state was
    /// rolled back anyway.
    Restored {
        item_id: String,
        decision: Decision,
        reversal_error: Option<CallFailed>,
    },
}

/// Applies swipe decisions to a `SessionState` and the remote library.
///
/// Finalizing decisions are all-or-nothing: the remote side effect has to
/// succeed before the queue, ledger or undo history change.
pub struct SwipeEngine<R> {
    client: RemoteCollectionClient<R>,
    batch_size: usize,
}

impl<R: LibraryRemote> SwipeEngine<R> {
    pub fn new(client: RemoteCollectionClient<R>) -> Self {
        Self {
            client,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Page and batch sizes are held to `1..=50`, the Web API's limits.
    pub fn from_config(remote: R, config: &SwipifyConfig) -> Self {
        let client = RemoteCollectionClient::new(remote, config.backoff_policy())
            .with_page_size(config.page_size);
        Self {
            client,
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn client(&self) -> &RemoteCollectionClient<R> {
        &self.client
    }

    pub fn remote(&self) -> &R {
        self.client.remote()
    }

    /// Replace the queue with every liked item not yet in the ledger that
    /// passes `filter`. Returns the new queue length.
    pub async fn build_queue(
        &mut self,
        state: &mut SessionState,
        filter: &TrackFilter,
        shuffle: bool,
    ) -> Result<usize, SessionError> {
        let ids = queue_builder::build_queue(
            &self.client,
            &state.ledger,
            filter,
            shuffle,
            self.batch_size,
        )
        .await?;

        state.queue.replace(ids);
        state.progress.built_total = state.queue.len() + state.ledger.len();
        state.progress.built_at = Some(Utc::now());
        state.progress.decided_since_build = 0;
        Ok(state.queue.len())
    }

    /// Rebuild a shuffled queue holding only items by `contributor`.
    pub async fn build_queue_for_contributor(
        &mut self,
        state: &mut SessionState,
        contributor: &str,
    ) -> Result<usize, SessionError> {
        self.build_queue(state, &TrackFilter::contributor(contributor), true)
            .await
    }

    /// Metadata for the head of the queue.
    ///
    /// Items the remote no longer has are dropped from the queue, without
    /// being finalized, until a resolvable head is found or the queue runs out.
    pub async fn current_head(&mut self, state: &mut SessionState) -> Result<Head, SessionError> {
        let mut dropped = Vec::new();
        while let Some(id) = state.queue.front().map(str::to_string) {
            let found = match self.client.fetch_one(&id).await {
                Ok(found) => found,
                Err(source) if dropped.is_empty() => return Err(source.into()),
                Err(source) => return Err(SessionError::HeadLookup { dropped, source }),
            };
            match found {
                Some(track) => {
                    return Ok(Head {
                        track: Some(track),
                        dropped,
                    })
                }
                None => {
                    warn!("Item {} could not be loaded, dropping it from the queue", id);
                    state.queue.remove(&id);
                    dropped.push(id);
                }
            }
        }
        Ok(Head {
            track: None,
            dropped,
        })
    }

    /// Apply `decision` to the head of the queue.
    pub async fn apply_decision(
        &mut self,
        state: &mut SessionState,
        decision: Decision,
    ) -> Result<Applied, SessionError> {
        let item_id = state
            .queue
            .front()
            .map(str::to_string)
            .ok_or(SessionError::EmptyQueue)?;

        if !decision.is_finalizing() {
            state.queue.rotate_head_to_tail();
            info!("Skipped {}", item_id);
            return Ok(Applied { item_id, decision });
        }

        let target = self.perform(state, &item_id, decision).await?;

        let now = Utc::now();
        state.ledger.record(&item_id, decision, now);
        state.undo.push(UndoEntry {
            item_id: item_id.clone(),
            decision,
            target,
        });
        state.queue.remove(&item_id);
        state.counter.bump(now.date_naive());
        state.progress.decided_since_build += 1;

        info!("{} {}", decision, item_id);
        Ok(Applied { item_id, decision })
    }

    /// Run the remote side effect of a finalizing decision.
    async fn perform(
        &mut self,
        state: &mut SessionState,
        item_id: &str,
        decision: Decision,
    ) -> Result<SideEffectTarget, CallFailed> {
        if let Some(role) = decision.collection_role() {
            let collection_id = self.ensure_collection(state, role).await?;
            self.client
                .apply_membership(&collection_id, item_id, Membership::Add)
                .await?;
            return Ok(SideEffectTarget::Collection {
                role,
                collection_id,
            });
        }

        match decision {
            Decision::Remove => {
                self.client
                    .toggle_root_membership(item_id, Membership::Remove)
                    .await?;
                Ok(SideEffectTarget::Root)
            }
            _ => Ok(SideEffectTarget::None),
        }
    }

    /// Remote ID for `role`, looked up or created on first use and kept in
    /// the session state.
    async fn ensure_collection(
        &mut self,
        state: &mut SessionState,
        role: CollectionRole,
    ) -> Result<String, CallFailed> {
        let entry = state.collections.get_mut(role);
        if let Some(id) = &entry.id {
            self.client.remember_named_collection(&entry.name, id);
            return Ok(id.clone());
        }
        let id = self.client.ensure_named_collection(&entry.name).await?;
        entry.id = Some(id.clone());
        Ok(id)
    }

    /// Reverse the most recent finalized decision.
    pub async fn undo(&mut self, state: &mut SessionState) -> Result<UndoOutcome, SessionError> {
        let Some(entry) = state.undo.pop() else {
            info!("Nothing to undo");
            return Ok(UndoOutcome::NothingToUndo);
        };

        let reversal = match &entry.target {
            SideEffectTarget::None => Ok(()),
            SideEffectTarget::Root => {
                self.client
                    .toggle_root_membership(&entry.item_id, Membership::Add)
                    .await
            }
            SideEffectTarget::Collection { collection_id, .. } => {
                self.client
                    .apply_membership(collection_id, &entry.item_id, Membership::Remove)
                    .await
            }
        };
        let reversal_error = reversal.err();
        if let Some(e) = &reversal_error {
            warn!("Could not reverse {} of {}: {}", entry.decision, entry.item_id, e);
        }

        state.ledger.erase(&entry.item_id);
        state.queue.push_front(entry.item_id.clone());
        state.counter.unbump(Utc::now().date_naive());
        state.progress.decided_since_build = state.progress.decided_since_build.saturating_sub(1);

        info!("Undid {} of {}", entry.decision, entry.item_id);
        Ok(UndoOutcome::Restored {
            item_id: entry.item_id,
            decision: entry.decision,
            reversal_error,
        })
    }

    /// Point `role` at a differently named collection. The new collection is
    /// resolved lazily on the next filing decision.
    pub fn set_collection_name(&mut self, state: &mut SessionState, role: CollectionRole, name: &str) {
        if state.collections.rename(role, name) {
            info!("{:?} collection is now '{}'", role, name);
        }
    }

    /// ID of the account the remote acts for.
    pub async fn current_user(&mut self) -> Result<String, SessionError> {
        Ok(self.client.current_user_id().await?)
    }

    pub fn stats(&self, state: &SessionState) -> SessionStats {
        SessionStats::compute(state, Utc::now())
    }

    /// Size of the liked collection, from a single one-item page.
    pub async fn estimate_library_size(&self) -> Result<usize, SessionError> {
        Ok(self.client.count(&ListSource::Root).await?)
    }
}
