//! Spotify Web API `LibraryRemote`.
//!
//! Requests carry a bearer token obtained elsewhere; this client never
//! refreshes or stores credentials. Non-success responses are mapped to
//! `RemoteError` so the backoff executor can tell transient failures from
//! permanent ones.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{CollectionSummary, LibraryRemote, ListSource, Page, RemoteError, Track};

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
const COLLECTION_DESCRIPTION: &str = "Saved via Swpify";

// -- Wire types --

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Paging<T> {
    #[serde(default)]
    items: Vec<Option<T>>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct SavedItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    /// Local files have no ID
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
    #[serde(default)]
    duration_ms: u64,
    popularity: Option<u32>,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    #[serde(default)]
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[serde(default)]
    tracks: Vec<Option<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    owner: ApiUser,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

impl ApiTrack {
    fn into_track(self) -> Option<Track> {
        let id = self.id?;
        let (album, release_date, artwork_url) = match self.album {
            Some(album) => (
                album.name,
                album.release_date,
                album.images.into_iter().next().map(|i| i.url),
            ),
            None => (String::new(), None, None),
        };
        Some(Track {
            id,
            title: self.name,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
            album,
            release_date,
            duration_ms: self.duration_ms,
            popularity: self.popularity,
            preview_url: self.preview_url,
            external_url: self.external_urls.get("spotify").cloned(),
            artwork_url,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))
}

fn parse_saved_page(body: &str) -> Result<Page<Track>, RemoteError> {
    let paging: Paging<SavedItem> = decode(body)?;
    Ok(Page {
        items: paging
            .items
            .into_iter()
            .map(|item| item.and_then(|i| i.track).and_then(ApiTrack::into_track))
            .collect(),
        total: paging.total,
    })
}

fn parse_tracks(body: &str) -> Result<Vec<Option<Track>>, RemoteError> {
    let response: TracksResponse = decode(body)?;
    Ok(response
        .tracks
        .into_iter()
        .map(|t| t.and_then(ApiTrack::into_track))
        .collect())
}

fn parse_track(body: &str) -> Result<Track, RemoteError> {
    let track: ApiTrack = decode(body)?;
    track
        .into_track()
        .ok_or_else(|| RemoteError::Decode("track has no id".to_string()))
}

fn parse_playlists_page(body: &str) -> Result<Page<CollectionSummary>, RemoteError> {
    let paging: Paging<ApiPlaylist> = decode(body)?;
    Ok(Page {
        items: paging
            .items
            .into_iter()
            .map(|p| {
                p.map(|p| CollectionSummary {
                    id: p.id,
                    name: p.name,
                    owner_id: p.owner.id,
                })
            })
            .collect(),
        total: paging.total,
    })
}

/// Map a non-success response to a `RemoteError`.
fn classify_status(status: StatusCode, retry_after: Option<&str>, body: &str) -> RemoteError {
    match status.as_u16() {
        429 => RemoteError::RateLimited {
            retry_after: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        500 | 502 | 503 | 504 => RemoteError::Server {
            status: status.as_u16(),
        },
        400 => RemoteError::BadRequest(body.to_string()),
        401 | 403 => RemoteError::Unauthorized(body.to_string()),
        404 => RemoteError::NotFound(body.to_string()),
        _ => RemoteError::Other(format!("{status}: {body}")),
    }
}

fn track_uri(id: &str) -> String {
    format!("spotify:track:{id}")
}

pub struct SpotifyRemote {
    base_url: String,
    access_token: String,
    client: Client,
}

impl SpotifyRemote {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(DEFAULT_API_BASE_URL.to_string(), access_token)
    }

    pub fn with_base_url(base_url: String, access_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let resp = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            debug!("Spotify API returned {}: {}", status, body);
            Err(classify_status(status, retry_after.as_deref(), &body))
        }
    }

    async fn get_paged(&self, path: &str, offset: usize, limit: usize) -> Result<String, RemoteError> {
        let request = self.client.get(self.url(path)).query(&[
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        self.send(request).await
    }
}

#[async_trait]
impl LibraryRemote for SpotifyRemote {
    async fn list_page(
        &self,
        source: &ListSource,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Track>, RemoteError> {
        let path = match source {
            ListSource::Root => "/me/tracks".to_string(),
            ListSource::Collection(id) => format!("/playlists/{}/tracks", urlencoding::encode(id)),
        };
        let body = self.get_paged(&path, offset, limit).await?;
        parse_saved_page(&body)
    }

    async fn track(&self, id: &str) -> Result<Track, RemoteError> {
        let url = self.url(&format!("/tracks/{}", urlencoding::encode(id)));
        let body = self.send(self.client.get(url)).await?;
        parse_track(&body)
    }

    async fn tracks(&self, ids: &[String]) -> Result<Vec<Option<Track>>, RemoteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .client
            .get(self.url("/tracks"))
            .query(&[("ids", ids.join(","))]);
        let body = self.send(request).await?;
        parse_tracks(&body)
    }

    async fn current_user_id(&self) -> Result<String, RemoteError> {
        let body = self.send(self.client.get(self.url("/me"))).await?;
        let user: ApiUser = decode(&body)?;
        Ok(user.id)
    }

    async fn collections_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<CollectionSummary>, RemoteError> {
        let body = self.get_paged("/me/playlists", offset, limit).await?;
        parse_playlists_page(&body)
    }

    async fn create_collection(&self, owner_id: &str, name: &str) -> Result<String, RemoteError> {
        let url = self.url(&format!("/users/{}/playlists", urlencoding::encode(owner_id)));
        let request = self.client.post(url).json(&json!({
            "name": name,
            "public": false,
            "description": COLLECTION_DESCRIPTION,
        }));
        let body = self.send(request).await?;
        let created: CreatedPlaylist = decode(&body)?;
        Ok(created.id)
    }

    async fn add_to_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(collection_id)
        ));
        let request = self
            .client
            .post(url)
            .json(&json!({ "uris": [track_uri(item_id)] }));
        self.send(request).await.map(|_| ())
    }

    async fn remove_from_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<(), RemoteError> {
        // Without positions the API removes every occurrence.
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(collection_id)
        ));
        let request = self
            .client
            .delete(url)
            .json(&json!({ "tracks": [{ "uri": track_uri(item_id) }] }));
        self.send(request).await.map(|_| ())
    }

    async fn save_to_root(&self, item_id: &str) -> Result<(), RemoteError> {
        let request = self
            .client
            .put(self.url("/me/tracks"))
            .json(&json!({ "ids": [item_id] }));
        self.send(request).await.map(|_| ())
    }

    async fn remove_from_root(&self, item_id: &str) -> Result<(), RemoteError> {
        let request = self
            .client
            .delete(self.url("/me/tracks"))
            .json(&json!({ "ids": [item_id] }));
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK_JSON: &str = r#"{
        "id": "4uLU6hMCjMI75M1A2tKUQC",
        "name": "Never Gonna Give You Up",
        "artists": [{"name": "Rick Astley"}],
        "album": {
            "name": "Whenever You Need Somebody",
            "release_date": "1987-11-12",
            "images": [{"url": "https://i.scdn.co/image/large"}, {"url": "https://i.scdn.co/image/small"}]
        },
        "duration_ms": 213573,
        "popularity": 77,
        "preview_url": null,
        "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"}
    }"#;

    #[test]
    fn page_without_items_is_empty() {
        let page = parse_saved_page(r#"{"total": 0}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);

        let playlists = parse_playlists_page(r#"{"total": 3}"#).unwrap();
        assert!(playlists.items.is_empty());
        assert_eq!(playlists.total, 3);
    }

    #[test]
    fn parses_track_metadata() {
        let track = parse_track(TRACK_JSON).unwrap();
        assert_eq!(track.id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(track.artists, vec!["Rick Astley"]);
        assert_eq!(track.album, "Whenever You Need Somebody");
        assert_eq!(track.release_year(), Some("1987"));
        assert_eq!(track.duration_display(), "3:33");
        assert_eq!(track.popularity, Some(77));
        assert_eq!(track.preview_url, None);
        assert_eq!(
            track.external_url.as_deref(),
            Some("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(
            track.artwork_url.as_deref(),
            Some("https://i.scdn.co/image/large")
        );
    }

    #[test]
    fn saved_page_keeps_slots_for_unresolvable_entries() {
        let body = format!(
            r#"{{"items": [{{"track": {TRACK_JSON}}}, {{"track": null}}, {{"track": {{"id": null, "name": "local file"}}}}], "total": 120}}"#
        );
        let page = parse_saved_page(&body).unwrap();
        assert_eq!(page.total, 120);
        assert_eq!(page.items.len(), 3);
        assert!(page.items[0].is_some());
        assert!(page.items[1].is_none());
        assert!(page.items[2].is_none());
    }

    #[test]
    fn batch_lookup_keeps_null_positions() {
        let body = format!(r#"{{"tracks": [null, {TRACK_JSON}]}}"#);
        let tracks = parse_tracks(&body).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_none());
        assert_eq!(tracks[1].as_ref().unwrap().title, "Never Gonna Give You Up");
    }

    #[test]
    fn parses_playlist_page() {
        let body = r#"{"items": [{"id": "p1", "name": "Keepers", "owner": {"id": "me"}}], "total": 1}"#;
        let page = parse_playlists_page(body).unwrap();
        assert_eq!(
            page.items[0],
            Some(CollectionSummary {
                id: "p1".into(),
                name: "Keepers".into(),
                owner_id: "me".into(),
            })
        );
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            parse_saved_page("<html>"),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn classifies_rate_limit_with_hint() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("3"), "");
        assert!(matches!(
            err,
            RemoteError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));

        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("soon"), "");
        assert!(matches!(err, RemoteError::RateLimited { retry_after: None }));
    }

    #[test]
    fn classifies_server_and_client_errors() {
        for status in [500, 502, 503, 504] {
            let err = classify_status(StatusCode::from_u16(status).unwrap(), None, "");
            assert!(matches!(err, RemoteError::Server { .. }), "{status}");
        }
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "invalid id"),
            RemoteError::BadRequest(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, ""),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::from_u16(501).unwrap(), None, ""),
            RemoteError::Other(_)
        ));
    }

    #[test]
    fn base_url_is_normalised() {
        let remote = SpotifyRemote::with_base_url("http://localhost:9000/v1/".into(), "t".into());
        assert_eq!(remote.url("/me"), "http://localhost:9000/v1/me");
    }
}
