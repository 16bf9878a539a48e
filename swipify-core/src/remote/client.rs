use std::collections::{HashMap, HashSet};
use std::future::Future;

use tracing::{debug, info};

use super::{LibraryRemote, ListSource, Page, RemoteError, Track};
use crate::retry::{self, BackoffPolicy, CallFailed};

pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest `limit` the Web API accepts for paged listings.
pub const MAX_PAGE_SIZE: usize = 50;

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Add,
    Remove,
}

/// Capability operations over a `LibraryRemote`, every call routed through
/// the backoff executor.
pub struct RemoteCollectionClient<R> {
    remote: R,
    policy: BackoffPolicy,
    page_size: usize,
    user_id: Option<String>,
    /// Named collections already looked up or created, by exact name.
    collections: HashMap<String, String>,
}

impl<R: LibraryRemote> RemoteCollectionClient<R> {
    pub fn new(remote: R, policy: BackoffPolicy) -> Self {
        Self {
            remote,
            policy,
            page_size: DEFAULT_PAGE_SIZE,
            user_id: None,
            collections: HashMap::new(),
        }
    }

    /// Page size for listings, held to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Drain every page of `source`, in server order.
    ///
    /// Stops when the reported total is reached or a page comes back empty.
    /// Unresolvable entries are skipped and an ID seen on an earlier page is
    /// not repeated.
    pub async fn list_all(&self, source: &ListSource) -> Result<Vec<Track>, CallFailed> {
        let remote = &self.remote;
        let pages = drain_pages(&self.policy, "list page", self.page_size, |offset, limit| {
            remote.list_page(source, offset, limit)
        })
        .await?;

        let mut seen = HashSet::new();
        let tracks: Vec<Track> = pages
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        info!("Listed {} item(s) from {:?}", tracks.len(), source);
        Ok(tracks)
    }

    /// Total item count of `source` as reported by a one-item page.
    pub async fn count(&self, source: &ListSource) -> Result<usize, CallFailed> {
        let remote = &self.remote;
        let page = retry::execute(&self.policy, "count", || remote.list_page(source, 0, 1)).await?;
        Ok(page.total)
    }

    /// Metadata for one item. `None` when the item is gone or the ID is invalid.
    pub async fn fetch_one(&self, id: &str) -> Result<Option<Track>, CallFailed> {
        let remote = &self.remote;
        match retry::execute(&self.policy, "track", || remote.track(id)).await {
            Ok(track) => Ok(Some(track)),
            Err(e) if e.is_missing() => {
                debug!("Item {} is no longer available: {}", id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Metadata for a batch of items, positionally aligned with `ids`.
    pub async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Option<Track>>, CallFailed> {
        let remote = &self.remote;
        retry::execute(&self.policy, "tracks", || remote.tracks(ids)).await
    }

    /// ID of a collection owned by the current user named exactly `name`,
    /// creating a private one if none exists.
    ///
    /// The result is cached per name, so repeated calls within a session
    /// issue at most one lookup and one create.
    pub async fn ensure_named_collection(&mut self, name: &str) -> Result<String, CallFailed> {
        if let Some(id) = self.collections.get(name) {
            return Ok(id.clone());
        }

        let user_id = self.current_user_id().await?;
        let id = match self.find_owned_collection(&user_id, name).await? {
            Some(id) => {
                info!("Found collection '{}' ({})", name, id);
                id
            }
            None => {
                let remote = &self.remote;
                let id = retry::execute(&self.policy, "create collection", || {
                    remote.create_collection(&user_id, name)
                })
                .await?;
                info!("Created collection '{}' ({})", name, id);
                id
            }
        };

        self.collections.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// Seed the cache with a collection ID known from an earlier session.
    pub fn remember_named_collection(&mut self, name: &str, id: &str) {
        self.collections.insert(name.to_string(), id.to_string());
    }

    /// Add an item to, or remove every occurrence of it from, a collection.
    pub async fn apply_membership(
        &self,
        collection_id: &str,
        item_id: &str,
        membership: Membership,
    ) -> Result<(), CallFailed> {
        let remote = &self.remote;
        match membership {
            Membership::Add => {
                retry::execute(&self.policy, "add to collection", || {
                    remote.add_to_collection(collection_id, item_id)
                })
                .await
            }
            Membership::Remove => {
                retry::execute(&self.policy, "remove from collection", || {
                    remote.remove_from_collection(collection_id, item_id)
                })
                .await
            }
        }
    }

    /// Like or un-like an item.
    pub async fn toggle_root_membership(
        &self,
        item_id: &str,
        membership: Membership,
    ) -> Result<(), CallFailed> {
        let remote = &self.remote;
        match membership {
            Membership::Add => {
                retry::execute(&self.policy, "save item", || remote.save_to_root(item_id)).await
            }
            Membership::Remove => {
                retry::execute(&self.policy, "unsave item", || {
                    remote.remove_from_root(item_id)
                })
                .await
            }
        }
    }

    /// ID of the account the remote acts for, fetched once.
    pub async fn current_user_id(&mut self) -> Result<String, CallFailed> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }
        let remote = &self.remote;
        let id = retry::execute(&self.policy, "current user", || remote.current_user_id()).await?;
        self.user_id = Some(id.clone());
        Ok(id)
    }

    async fn find_owned_collection(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<String>, CallFailed> {
        let remote = &self.remote;
        let mut offset = 0;
        loop {
            let page = retry::execute(&self.policy, "list collections", || {
                remote.collections_page(offset, self.page_size)
            })
            .await?;
            if page.items.is_empty() {
                return Ok(None);
            }
            offset += page.items.len();
            let found = page
                .items
                .into_iter()
                .flatten()
                .find(|c| c.name == name && c.owner_id == user_id);
            if let Some(collection) = found {
                return Ok(Some(collection.id));
            }
            if offset >= page.total {
                return Ok(None);
            }
        }
    }
}

/// Fetch pages from offset 0 until the reported total is reached or a page
/// is empty. Each page fetch is retried independently.
async fn drain_pages<T, F, Fut>(
    policy: &BackoffPolicy,
    label: &str,
    page_size: usize,
    fetch: F,
) -> Result<Vec<T>, CallFailed>
where
    F: Fn(usize, usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, RemoteError>>,
{
    let mut items = Vec::new();
    let mut offset = 0;
    loop {
        let page = retry::execute(policy, label, || fetch(offset, page_size)).await?;
        if page.items.is_empty() {
            break;
        }
        offset += page.items.len();
        debug!("{}: {}/{}", label, offset, page.total);
        items.extend(page.items.into_iter().flatten());
        if offset >= page.total {
            break;
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{InMemoryRemote, RemoteOp};

    fn client(remote: InMemoryRemote) -> RemoteCollectionClient<InMemoryRemote> {
        RemoteCollectionClient::new(remote, BackoffPolicy::default()).with_page_size(3)
    }

    #[tokio::test]
    async fn list_all_drains_every_page_in_order() {
        let remote = InMemoryRemote::with_liked((1..=10).map(|i| format!("t{i}")));
        let client = client(remote);

        let tracks = client.list_all(&ListSource::Root).await.unwrap();

        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        let expected: Vec<String> = (1..=10).map(|i| format!("t{i}")).collect();
        assert_eq!(ids, expected);
        // 3 + 3 + 3 + 1
        assert_eq!(client.remote().calls(RemoteOp::ListPage), 4);
    }

    #[tokio::test]
    async fn list_all_of_empty_source() {
        let client = client(InMemoryRemote::new());
        let tracks = client.list_all(&ListSource::Root).await.unwrap();
        assert!(tracks.is_empty());
        assert_eq!(client.remote().calls(RemoteOp::ListPage), 1);
    }

    #[tokio::test]
    async fn list_all_skips_unresolvable_entries() {
        let remote = InMemoryRemote::with_liked(["t1", "t2", "t3", "t4"]);
        remote.make_unavailable("t2");
        let client = client(remote);

        let tracks = client.list_all(&ListSource::Root).await.unwrap();

        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3", "t4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn list_all_retries_a_failed_page() {
        let remote = InMemoryRemote::with_liked((1..=5).map(|i| format!("t{i}")));
        remote.fail_next(RemoteOp::ListPage, RemoteError::Server { status: 502 });
        let client = client(remote);

        let tracks = client.list_all(&ListSource::Root).await.unwrap();

        assert_eq!(tracks.len(), 5);
        assert_eq!(client.remote().calls(RemoteOp::ListPage), 3);
    }

    #[tokio::test]
    async fn fetch_one_returns_none_for_missing_item() {
        let client = client(InMemoryRemote::with_liked(["t1"]));
        assert!(client.fetch_one("t1").await.unwrap().is_some());
        assert!(client.fetch_one("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_one_surfaces_auth_failure() {
        let remote = InMemoryRemote::with_liked(["t1"]);
        remote.fail_next(RemoteOp::Track, RemoteError::Unauthorized("expired".into()));
        let client = client(remote);

        let err = client.fetch_one("t1").await.unwrap_err();
        assert!(matches!(err.source, RemoteError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn ensure_named_collection_creates_once() {
        let mut client = client(InMemoryRemote::new());

        let first = client.ensure_named_collection("Keepers").await.unwrap();
        let second = client.ensure_named_collection("Keepers").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.remote().calls(RemoteOp::CreateCollection), 1);
        assert_eq!(client.remote().collection_names(), vec!["Keepers"]);
    }

    #[tokio::test]
    async fn ensure_named_collection_finds_owned_collection_on_later_page() {
        let remote = InMemoryRemote::new();
        for i in 0..7 {
            remote.insert_collection(&format!("other {i}"), "me");
        }
        remote.insert_collection("Keepers", "someone-else");
        let existing = remote.insert_collection("Keepers", "me");
        let mut client = client(remote);

        let id = client.ensure_named_collection("Keepers").await.unwrap();

        assert_eq!(id, existing);
        assert_eq!(client.remote().calls(RemoteOp::CreateCollection), 0);
        assert_eq!(client.remote().calls(RemoteOp::CurrentUser), 1);
    }

    #[tokio::test]
    async fn remove_membership_drops_every_occurrence() {
        let remote = InMemoryRemote::with_liked(["t1"]);
        let playlist = remote.insert_collection("Keepers", "me");
        let client = client(remote);

        client
            .apply_membership(&playlist, "t1", Membership::Add)
            .await
            .unwrap();
        client
            .apply_membership(&playlist, "t1", Membership::Add)
            .await
            .unwrap();
        assert_eq!(client.remote().collection_items(&playlist), vec!["t1", "t1"]);

        client
            .apply_membership(&playlist, "t1", Membership::Remove)
            .await
            .unwrap();
        assert!(client.remote().collection_items(&playlist).is_empty());
    }

    #[tokio::test]
    async fn toggle_root_membership_round_trips() {
        let client = client(InMemoryRemote::with_liked(["t1", "t2"]));

        client
            .toggle_root_membership("t1", Membership::Remove)
            .await
            .unwrap();
        assert_eq!(client.remote().liked_ids(), vec!["t2"]);

        client
            .toggle_root_membership("t1", Membership::Add)
            .await
            .unwrap();
        assert!(client.remote().is_liked("t1"));
    }

    #[tokio::test]
    async fn count_reads_reported_total() {
        let client = client(InMemoryRemote::with_liked((1..=42).map(|i| format!("t{i}"))));
        assert_eq!(client.count(&ListSource::Root).await.unwrap(), 42);
        assert_eq!(client.remote().calls(RemoteOp::ListPage), 1);
    }
}
