//! YouTube URL → [`VideoId`] extraction.

use url::Url;

use crate::types::VideoId;

const WATCH_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];
const SHORT_HOST: &str = "youtu.be";

/// Extract the video id from a YouTube URL.
///
/// Accepted forms: `youtu.be/<id>`, `youtube.com/watch?v=<id>` (also on
/// `www.` and `m.`), `youtube.com/shorts/<id>` and `youtube.com/embed/<id>`.
/// Anything else yields `None`.
#[must_use]
pub fn extract_video_id(raw: &str) -> Option<VideoId> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let candidate = if host == SHORT_HOST {
        url.path_segments()?.next().map(str::to_string)
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts" | "embed") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate
        .filter(|id| is_plausible_id(id))
        .map(VideoId::from)
}

/// `true` when `url` points at a video already present in `existing`.
///
/// URLs without an extractable id are never duplicates.
#[must_use]
pub fn is_duplicate_url<S: AsRef<str>>(url: &str, existing: &[S]) -> bool {
    let Some(id) = extract_video_id(url) else {
        return false;
    };
    existing
        .iter()
        .filter_map(|other| extract_video_id(other.as_ref()))
        .any(|other| other == id)
}

fn is_plausible_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
