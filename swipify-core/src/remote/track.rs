use serde::{Deserialize, Serialize};

/// Read-only snapshot of an item's display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, as the remote reports it
    pub release_date: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    pub popularity: Option<u32>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
    pub artwork_url: Option<String>,
}

impl Track {
    /// Contributor names joined the way they are shown and filtered on.
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// First four characters of the release date, if any.
    pub fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
    }

    /// `m:ss`
    pub fn duration_display(&self) -> String {
        let mins = self.duration_ms / 60_000;
        let secs = (self.duration_ms % 60_000) / 1000;
        format!("{}:{:02}", mins, secs)
    }
}
