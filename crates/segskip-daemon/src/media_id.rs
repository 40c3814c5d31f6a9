//! Pull the video id out of whatever mpv reports as its `path`.

use reqwest::Url;

const YOUTUBE_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "www.youtube-nocookie.com",
];

/// Path prefixes that carry the id as their next segment.
const ID_PATHS: [&str; 4] = ["shorts", "embed", "live", "v"];

pub fn extract_media_id(path: &str) -> Option<String> {
    let url = Url::parse(path).ok()?;
    let host = url.host_str()?;

    let candidate = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        from_youtube_url(&url)
    } else {
        None
    };
    candidate.filter(|id| is_valid_id(id))
}

fn from_youtube_url(url: &Url) -> Option<String> {
    if let Some(id) = query_v(url) {
        return Some(id);
    }

    let mut segments = url.path_segments()?;
    if let (Some(kind), Some(id)) = (segments.next(), segments.next()) {
        if ID_PATHS.contains(&kind) {
            return Some(id.to_string());
        }
    }

    // single-page app routes: https://www.youtube.com/#/watch?v=<id>
    let fragment = url.fragment()?;
    let route = url.join(fragment).ok()?;
    query_v(&route)
}

fn query_v(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
