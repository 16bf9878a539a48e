use serde::{Deserialize, Serialize};

use crate::remote::Track;

/// Criteria for narrowing the swipe queue. Absent criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFilter {
    /// Case-insensitive substring of title, artists or album
    pub text: Option<String>,
    /// Case-insensitive substring of the joined artist names
    pub contributor: Option<String>,
    /// Exact release year, e.g. `2020`
    pub year: Option<String>,
}

/// Blank criteria count as absent.
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TrackFilter {
    pub fn new(text: Option<String>, contributor: Option<String>, year: Option<String>) -> Self {
        Self {
            text: normalize(text),
            contributor: normalize(contributor),
            year: normalize(year),
        }
    }

    pub fn contributor(name: &str) -> Self {
        Self::new(None, Some(name.to_string()), None)
    }

    /// True when no criterion is set; callers skip metadata lookups entirely.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.contributor.is_none() && self.year.is_none()
    }

    /// All present criteria must hold.
    pub fn matches(&self, track: &Track) -> bool {
        let artists = track.artist_line();

        if let Some(text) = &self.text {
            let blob = format!("{} {} {}", track.title, artists, track.album).to_lowercase();
            if !blob.contains(&text.to_lowercase()) {
                return false;
            }
        }

        if let Some(contributor) = &self.contributor {
            if !artists
                .to_lowercase()
                .contains(&contributor.to_lowercase())
            {
                return false;
            }
        }

        if let Some(year) = &self.year {
            if track.release_year() != Some(year.as_str()) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::sample_track;

    fn track(title: &str, artists: &[&str], album: &str, release_date: &str) -> Track {
        Track {
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: album.to_string(),
            release_date: Some(release_date.to_string()),
            ..sample_track("t1")
        }
    }

    fn text_and_year(text: &str, year: &str) -> TrackFilter {
        TrackFilter::new(Some(text.into()), None, Some(year.into()))
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TrackFilter::new(Some("  ".into()), Some(String::new()), None);
        assert!(filter.is_empty());
        assert!(filter.matches(&track("x", &[], "", "")));
    }

    #[test]
    fn text_matches_title_artist_or_album_case_insensitively() {
        let t = track("Foolish Games", &["Jewel"], "Pieces of You", "1995-02-28");
        assert!(TrackFilter::new(Some("FOOL".into()), None, None).matches(&t));
        assert!(TrackFilter::new(Some("jewel".into()), None, None).matches(&t));
        assert!(TrackFilter::new(Some("pieces".into()), None, None).matches(&t));
        assert!(!TrackFilter::new(Some("zz".into()), None, None).matches(&t));
    }

    #[test]
    fn contributor_matches_joined_artist_names() {
        let t = track("Song", &["Daft Punk", "Pharrell Williams"], "RAM", "2013");
        assert!(TrackFilter::contributor("pharrell").matches(&t));
        assert!(TrackFilter::contributor("Daft Punk, Pharrell").matches(&t));
        assert!(!TrackFilter::contributor("Nile").matches(&t));
    }

    #[test]
    fn contributor_does_not_look_at_title() {
        let t = track("Daft Punk Is Playing At My House", &["LCD Soundsystem"], "", "2005");
        assert!(!TrackFilter::contributor("daft punk").matches(&t));
    }

    #[test]
    fn year_is_exact_prefix_match() {
        let t = track("Song", &["A"], "B", "2020-06-01");
        assert!(TrackFilter::new(None, None, Some(" 2020 ".into())).matches(&t));
        assert!(!TrackFilter::new(None, None, Some("202".into())).matches(&t));
        assert!(!TrackFilter::new(None, None, Some("2021".into())).matches(&t));

        let undated = Track {
            release_date: None,
            ..t
        };
        assert!(!TrackFilter::new(None, None, Some("2020".into())).matches(&undated));
    }

    #[test]
    fn criteria_are_conjunctive() {
        let both = track("foo fighters live", &["X"], "Y", "2020-01-01");
        let text_only = track("foo", &["X"], "Y", "2019-01-01");
        let year_only = track("bar", &["X"], "Y", "2020-01-01");

        let filter = text_and_year("foo", "2020");
        assert!(filter.matches(&both));
        assert!(!filter.matches(&text_only));
        assert!(!filter.matches(&year_only));

        // Blank text degrades to the year condition alone
        let year_filter = text_and_year("", "2020");
        assert!(year_filter.matches(&year_only));
        assert!(!year_filter.matches(&text_only));

        // Blank year degrades to the text condition alone
        let text_filter = text_and_year("foo", "");
        assert!(text_filter.matches(&text_only));
        assert!(!text_filter.matches(&year_only));
    }
}
