//! Session state persistence as a pretty-printed JSON file.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::SwipifyConfig;
use crate::session::SessionState;
use swipify_common::CollectionRole;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Write `state` to `path`, creating parent directories. The file is
/// replaced atomically so a crash never leaves a half-written snapshot.
pub fn save_state(path: &Path, state: &SessionState) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a snapshot from `path`.
pub fn read_state(path: &Path) -> Result<SessionState, SnapshotError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Restore the session at `path`. A missing or unreadable snapshot yields
/// `fallback` instead of an error.
pub fn load_state(path: &Path, fallback: SessionState) -> SessionState {
    if !path.exists() {
        info!("No session snapshot at {}, starting fresh", path.display());
        return fallback;
    }
    match read_state(path) {
        Ok(state) => {
            info!(
                "Restored session from {} ({} queued, {} decided)",
                path.display(),
                state.queue.len(),
                state.ledger.len()
            );
            state
        }
        Err(e) => {
            warn!(
                "Discarding unreadable session snapshot {}: {}",
                path.display(),
                e
            );
            fallback
        }
    }
}

/// Session for `config`: the snapshot at `config.state_path` if there is
/// one, brought in line with the configured collection names and undo
/// depth. A role keeps its cached remote ID only while its name matches.
pub fn restore_session(config: &SwipifyConfig) -> SessionState {
    let fallback = SessionState::new(config.collection_refs(), config.undo_depth);
    let mut state = load_state(&config.state_path, fallback);
    for (role, name) in [
        (CollectionRole::Primary, &config.primary_collection_name),
        (CollectionRole::Secondary, &config.secondary_collection_name),
    ] {
        if state.collections.rename(role, name) {
            info!("{:?} collection renamed to '{}' by config", role, name);
        }
    }
    state.undo.set_depth(config.undo_depth);
    state
}

/// Delete the snapshot for `config` and return an empty session.
pub fn reset_session(config: &SwipifyConfig) -> Result<SessionState, SnapshotError> {
    match std::fs::remove_file(&config.state_path) {
        Ok(()) => info!("Removed session snapshot {}", config.state_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(SessionState::new(config.collection_refs(), config.undo_depth))
}
