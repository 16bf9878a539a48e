use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::filter::TrackFilter;
use crate::ledger::Ledger;
use crate::remote::{LibraryRemote, ListSource, RemoteCollectionClient};
use crate::retry::CallFailed;

/// Items per metadata lookup while filtering.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Most IDs the Web API accepts in one metadata lookup.
pub const MAX_BATCH_SIZE: usize = 50;

/// Compute a fresh swipe queue from the current liked collection.
///
/// Items already in `seen` are left out. When `filter` has any criterion,
/// metadata is fetched in batches of `batch_size` and only matching items
/// survive; entries the remote cannot resolve are dropped. The result is in
/// server order unless `shuffle` is set.
pub async fn build_queue<R: LibraryRemote>(
    client: &RemoteCollectionClient<R>,
    seen: &Ledger,
    filter: &TrackFilter,
    shuffle: bool,
    batch_size: usize,
) -> Result<Vec<String>, CallFailed> {
    let listed = client.list_all(&ListSource::Root).await?;
    let listed_count = listed.len();

    let mut ids: Vec<String> = listed
        .into_iter()
        .map(|t| t.id)
        .filter(|id| !seen.contains(id))
        .collect();
    debug!(
        "{} of {} liked item(s) not yet decided",
        ids.len(),
        listed_count
    );

    if !filter.is_empty() {
        ids = filter_ids(client, ids, filter, batch_size).await?;
    }

    if shuffle {
        shuffle_ids(&mut ids, &mut rand::rng());
    }

    info!(
        "Built queue of {} item(s) (filter: {:?}, shuffle: {})",
        ids.len(),
        filter,
        shuffle
    );
    Ok(ids)
}

async fn filter_ids<R: LibraryRemote>(
    client: &RemoteCollectionClient<R>,
    ids: Vec<String>,
    filter: &TrackFilter,
    batch_size: usize,
) -> Result<Vec<String>, CallFailed> {
    let mut kept = Vec::new();
    for chunk in ids.chunks(batch_size.max(1)) {
        let tracks = client.fetch_many(chunk).await?;
        kept.extend(
            tracks
                .into_iter()
                .flatten()
                .filter(|t| filter.matches(t))
                .map(|t| t.id),
        );
    }
    Ok(kept)
}

/// Uniform random permutation.
pub fn shuffle_ids<G: Rng + ?Sized>(ids: &mut [String], rng: &mut G) {
    ids.shuffle(rng);
}
