//! Swipe-style triage of a remote liked-items library.
//!
//! Build a queue of undecided items, then keep, remove, file or skip them
//! one at a time. Remote side effects run through a retrying client and
//! every finalized decision can be undone.

pub mod config;
pub mod export;
pub mod filter;
pub mod ledger;
pub mod queue_builder;
pub mod remote;
pub mod retry;
pub mod session;
pub mod snapshot;

pub use config::{ConfigError, SwipifyConfig};
pub use filter::TrackFilter;
pub use ledger::{Ledger, Outcome};
pub use remote::{LibraryRemote, RemoteCollectionClient, RemoteError, Track};
pub use retry::{BackoffPolicy, CallFailed, RetryMode};
pub use session::{SessionError, SessionState, SessionStats, SwipeEngine};
pub use swipify_common::{CollectionRole, Decision};
