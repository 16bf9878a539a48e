//! In-process `LibraryRemote`.
//!
//! Holds a track catalog, the liked collection and named collections in
//! memory. Faults can be scripted per operation and every call is counted,
//! which makes it the backend for engine tests and offline runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CollectionSummary, LibraryRemote, ListSource, Page, RemoteError, Track};

/// Largest batch `tracks` accepts, matching the Web API.
pub const MAX_BATCH: usize = 50;

/// Operations of `LibraryRemote`, for fault scripting and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    ListPage,
    Track,
    Tracks,
    CurrentUser,
    CollectionsPage,
    CreateCollection,
    AddToCollection,
    RemoveFromCollection,
    SaveToRoot,
    RemoveFromRoot,
}

struct Collection {
    id: String,
    name: String,
    owner_id: String,
    items: Vec<String>,
}

struct Inner {
    user_id: String,
    catalog: HashMap<String, Track>,
    liked: Vec<String>,
    collections: Vec<Collection>,
    unavailable: HashSet<String>,
    /// Listed in collections but null in metadata lookups
    restricted: HashSet<String>,
    faults: HashMap<RemoteOp, VecDeque<RemoteError>>,
    calls: HashMap<RemoteOp, usize>,
    next_collection: usize,
}

impl Inner {
    /// Count the call and pop a scripted fault, if any.
    fn record(&mut self, op: RemoteOp) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resolve(&self, id: &str) -> Option<Track> {
        if self.unavailable.contains(id) {
            return None;
        }
        self.catalog.get(id).cloned()
    }

    /// Metadata as `track`/`tracks` see it.
    fn lookup(&self, id: &str) -> Option<Track> {
        if self.restricted.contains(id) {
            return None;
        }
        self.resolve(id)
    }

    fn collection_mut(&mut self, id: &str) -> Result<&mut Collection, RemoteError> {
        self.collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("collection {id}")))
    }
}

pub struct InMemoryRemote {
    inner: Mutex<Inner>,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder metadata for an ID.
pub fn sample_track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Track {id}"),
        artists: vec![format!("Artist {id}")],
        album: format!("Album {id}"),
        release_date: Some("2020-01-01".to_string()),
        duration_ms: 180_000,
        popularity: Some(50),
        preview_url: None,
        external_url: Some(format!("https://open.spotify.com/track/{id}")),
        artwork_url: None,
    }
}

impl InMemoryRemote {
    /// Empty library for user `me`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                user_id: "me".to_string(),
                catalog: HashMap::new(),
                liked: Vec::new(),
                collections: Vec::new(),
                unavailable: HashSet::new(),
                restricted: HashSet::new(),
                faults: HashMap::new(),
                calls: HashMap::new(),
                next_collection: 1,
            }),
        }
    }

    /// Library whose liked collection holds `ids`, in order, with placeholder metadata.
    pub fn with_liked<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_tracks(ids.into_iter().map(|id| sample_track(id.as_ref())))
    }

    /// Library whose liked collection holds `tracks`, in order.
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let remote = Self::new();
        {
            let mut inner = remote.inner();
            for track in tracks {
                inner.liked.push(track.id.clone());
                inner.catalog.insert(track.id.clone(), track);
            }
        }
        remote
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep the ID listed but make its metadata unresolvable.
    pub fn make_unavailable(&self, id: &str) {
        self.inner().unavailable.insert(id.to_string());
    }

    /// Keep the ID listed with full metadata, but have single and batch
    /// lookups resolve it to null, like a region-restricted track.
    pub fn restrict(&self, id: &str) {
        self.inner().restricted.insert(id.to_string());
    }

    /// Create a collection directly, returning its ID.
    pub fn insert_collection(&self, name: &str, owner_id: &str) -> String {
        let mut inner = self.inner();
        let id = format!("pl{}", inner.next_collection);
        inner.next_collection += 1;
        inner.collections.push(Collection {
            id: id.clone(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            items: Vec::new(),
        });
        id
    }

    /// Make the next call to `op` fail with `err`. Faults queue up in order.
    pub fn fail_next(&self, op: RemoteOp, err: RemoteError) {
        self.inner().faults.entry(op).or_default().push_back(err);
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: RemoteOp) -> usize {
        self.inner().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn liked_ids(&self) -> Vec<String> {
        self.inner().liked.clone()
    }

    pub fn is_liked(&self, id: &str) -> bool {
        self.inner().liked.iter().any(|l| l == id)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.inner()
            .collections
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn collection_items(&self, collection_id: &str) -> Vec<String> {
        self.inner()
            .collections
            .iter()
            .find(|c| c.id == collection_id)
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }
}

fn check_limit(limit: usize) -> Result<(), RemoteError> {
    if limit > MAX_BATCH {
        return Err(RemoteError::BadRequest(format!(
            "limit {limit} exceeds {MAX_BATCH}"
        )));
    }
    Ok(())
}

fn page_of<T>(all: &[String], offset: usize, limit: usize, resolve: impl Fn(&str) -> Option<T>) -> Page<T> {
    let items = all
        .iter()
        .skip(offset)
        .take(limit)
        .map(|id| resolve(id))
        .collect();
    Page {
        items,
        total: all.len(),
    }
}

#[async_trait]
impl LibraryRemote for InMemoryRemote {
    async fn list_page(
        &self,
        source: &ListSource,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Track>, RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::ListPage)?;
        check_limit(limit)?;
        let ids = match source {
            ListSource::Root => inner.liked.clone(),
            ListSource::Collection(id) => inner.collection_mut(id)?.items.clone(),
        };
        Ok(page_of(&ids, offset, limit, |id| inner.resolve(id)))
    }

    async fn track(&self, id: &str) -> Result<Track, RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::Track)?;
        if id.is_empty() {
            return Err(RemoteError::BadRequest("invalid id".to_string()));
        }
        inner
            .lookup(id)
            .ok_or_else(|| RemoteError::NotFound(format!("track {id}")))
    }

    async fn tracks(&self, ids: &[String]) -> Result<Vec<Option<Track>>, RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::Tracks)?;
        if ids.len() > MAX_BATCH {
            return Err(RemoteError::BadRequest(format!(
                "too many ids: {} > {}",
                ids.len(),
                MAX_BATCH
            )));
        }
        Ok(ids.iter().map(|id| inner.lookup(id)).collect())
    }

    async fn current_user_id(&self) -> Result<String, RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::CurrentUser)?;
        Ok(inner.user_id.clone())
    }

    async fn collections_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CollectionSummary>, RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::CollectionsPage)?;
        check_limit(limit)?;
        let items = inner
            .collections
            .iter()
            .skip(offset)
            .take(limit)
            .map(|c| {
                Some(CollectionSummary {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    owner_id: c.owner_id.clone(),
                })
            })
            .collect();
        Ok(Page {
            items,
            total: inner.collections.len(),
        })
    }

    async fn create_collection(&self, owner_id: &str, name: &str) -> Result<String, RemoteError> {
        {
            let mut inner = self.inner();
            inner.record(RemoteOp::CreateCollection)?;
            if owner_id != inner.user_id {
                return Err(RemoteError::Unauthorized(format!(
                    "cannot create collections for {owner_id}"
                )));
            }
        }
        Ok(self.insert_collection(name, owner_id))
    }

    async fn add_to_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<(), RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::AddToCollection)?;
        inner
            .collection_mut(collection_id)?
            .items
            .push(item_id.to_string());
        Ok(())
    }

    async fn remove_from_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<(), RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::RemoveFromCollection)?;
        inner
            .collection_mut(collection_id)?
            .items
            .retain(|i| i != item_id);
        Ok(())
    }

    async fn save_to_root(&self, item_id: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::SaveToRoot)?;
        if !inner.liked.iter().any(|l| l == item_id) {
            inner.liked.insert(0, item_id.to_string());
        }
        Ok(())
    }

    async fn remove_from_root(&self, item_id: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner();
        inner.record(RemoteOp::RemoveFromRoot)?;
        inner.liked.retain(|l| l != item_id);
        Ok(())
    }
}
