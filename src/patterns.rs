//! Text patterns shared by every discovery technique
//!
//! ## Patterns
//!
//! - **Playlist URL**: `https?://…​.m3u8…` including any query string or
//!   trailing path, stopping at whitespace, quotes and angle brackets
//! - **Turboviplay CDN**: `https?://cdn….turboviplay….m3u8…`, a player
//!   CDN that embeds its playlist directly in inline scripts
//! - **API endpoint**: `https?://…/api/…`, endpoints worth probing for a
//!   JSON body that names a playlist

use std::sync::LazyLock;

use regex::Regex;

/// Marker every playlist reference contains.
pub const M3U8_MARKER: &str = ".m3u8";

static PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.m3u8[^\s"'<>]*"#).expect("playlist pattern is valid")
});

static TURBOVIPLAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)https?://cdn[0-9a-z._-]*\.(?:turboviplay|turboviplay\.com|turboviplay\.net)[^\s"']*\.m3u8[^\s"']*"#,
    )
    .expect("turboviplay pattern is valid")
});

static API_ENDPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"']+/api/[^\s"']+"#).expect("api endpoint pattern is valid")
});

/// All absolute playlist URLs in `text`, in order of appearance.
#[must_use]
pub fn playlist_urls(text: &str) -> Vec<&str> {
    PLAYLIST_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Turboviplay CDN playlist URLs in `text`.
#[must_use]
pub fn turboviplay_urls(text: &str) -> Vec<&str> {
    TURBOVIPLAY_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// `/api/` endpoints referenced in `text`.
#[must_use]
pub fn api_endpoints(text: &str) -> Vec<&str> {
    API_ENDPOINT_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Case-insensitive check for [`M3U8_MARKER`].
#[must_use]
pub fn mentions_playlist(text: &str) -> bool {
    text.to_ascii_lowercase().contains(M3U8_MARKER)
}
