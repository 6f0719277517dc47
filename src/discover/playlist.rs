//! Playlist resolution
//!
//! Fetches every playlist found so far and pulls out the playlists it
//! references:
//! - Absolute `.m3u8` URLs anywhere in the body
//! - The URI line following each `#EXT-X-STREAM-INF` (variant streams)
//! - `URI` attributes of `#EXT-X-MEDIA` and `#EXT-X-I-FRAME-STREAM-INF`
//!   (alternate renditions, trick-play playlists)

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::browser::BrowserSession;
use crate::normalize::normalize;
use crate::patterns::{playlist_urls, M3U8_MARKER};

const STREAM_INF: &str = "#EXT-X-STREAM-INF";
const URI_TAGS: [&str; 2] = ["#EXT-X-MEDIA:", "#EXT-X-I-FRAME-STREAM-INF:"];

/// Resolve nested playlists, `depth` levels deep.
///
/// Level one fetches every URL already in `agg`; each further level
/// fetches what the previous level added. A URL is fetched at most once.
pub async fn resolve(
    session: &dyn BrowserSession,
    agg: &mut Aggregator,
    timeout: Duration,
    depth: usize,
) -> StageReport {
    let mut report = StageReport::new(Stage::Playlists);
    let mut fetched = HashSet::new();
    let mut frontier: Vec<String> = agg.records().iter().map(|r| r.url.clone()).collect();

    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in frontier {
            if !fetched.insert(parent.clone()) {
                continue;
            }
            match session.fetch_text(&parent, timeout).await {
                Ok(body) => {
                    for url in extract_playlist_urls(&body, &parent) {
                        if agg.add(&url, &Technique::PlaylistParse, &parent) {
                            report.added += 1;
                            next.push(url);
                        }
                    }
                }
                Err(e) => report.note(format!("{parent}: {e}")),
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    report
}

/// Playlist references in `body`, resolved against `playlist_url`,
/// deduplicated in order of appearance.
#[must_use]
pub fn extract_playlist_urls(body: &str, playlist_url: &str) -> Vec<String> {
    let mut found: Vec<String> = playlist_urls(body)
        .into_iter()
        .filter_map(|m| normalize(m, playlist_url))
        .collect();

    let lines: Vec<&str> = body.lines().map(str::trim).collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with(STREAM_INF) {
            let variant = lines[i + 1..].iter().find(|l| !l.is_empty());
            if let Some(candidate) = variant.filter(|c| looks_like_playlist(c)) {
                found.extend(normalize(candidate, playlist_url));
            }
        } else if let Some(attrs) = URI_TAGS.iter().find_map(|tag| line.strip_prefix(tag)) {
            let uri = parse_attributes(attrs).remove("URI");
            if let Some(uri) = uri.filter(|u| looks_like_playlist(u)) {
                found.extend(normalize(&uri, playlist_url));
            }
        }
    }

    let mut seen = HashSet::new();
    found.retain(|url| seen.insert(url.clone()));
    found
}

fn looks_like_playlist(reference: &str) -> bool {
    reference.contains(M3U8_MARKER) || reference.starts_with('/')
}

/// Parse an HLS attribute list (`KEY=value,KEY="quoted, value"`).
fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        if key.trim().is_empty() {
            break;
        }

        let value: String = if chars.peek() == Some(&'"') {
            chars.next();
            let quoted = chars.by_ref().take_while(|&c| c != '"').collect();
            // Separator after the closing quote
            chars.next();
            quoted
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}
