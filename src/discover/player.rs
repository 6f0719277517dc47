//! Player-global probes
//!
//! Well-known web video players keep their source list on a global object.
//! Each probe is a self-contained snippet that serializes that state to a
//! string (cycles and functions dropped) and returns `null` instead of
//! throwing.

use serde_json::Value;

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::browser::BrowserSession;
use crate::patterns::playlist_urls;

/// JSON serializer available to every probe body as `dump(value)`.
const DUMP_FN: &str = "var seen = []; \
function dump(v) { \
  if (v === null || v === undefined) return null; \
  if (typeof v === 'string') return v; \
  return JSON.stringify(v, function (k, x) { \
    if (typeof x === 'function') return undefined; \
    if (x && typeof x === 'object') { if (seen.indexOf(x) !== -1) return undefined; seen.push(x); } \
    return x; \
  }); \
}";

/// Probe names and bodies, in execution order.
const PROBES: [(&str, &str); 5] = [
    (
        "jwplayer",
        "if (typeof jwplayer === 'undefined') return null; \
         var j = jwplayer(); \
         return dump(j && j.getPlaylist ? j.getPlaylist() : j);",
    ),
    (
        "videojs",
        "if (typeof videojs === 'undefined') return null; \
         var all = videojs.getAll ? videojs.getAll() : \
           (videojs.getPlayers ? Object.values(videojs.getPlayers()) : null); \
         if (!all) return null; \
         return dump(all.filter(Boolean).map(function (p) { \
           return { src: p.currentSrc ? p.currentSrc() : null, \
                    sources: p.currentSources ? p.currentSources() : null }; \
         }));",
    ),
    (
        "hlsjs",
        "if (typeof Hls === 'undefined') return null; \
         var h = window.hls || window._hls || null; \
         return dump({ present: true, url: h && h.url ? h.url : null });",
    ),
    (
        "window_player",
        "return dump(window.player || window._player || window.playerConfig || window._playerConfig || null);",
    ),
    (
        "html5_video",
        "var els = Array.from(document.querySelectorAll('video, video source, audio, audio source')); \
         var srcs = els.map(function (e) { return e.currentSrc || e.src || ''; }).filter(Boolean); \
         return srcs.length ? dump(srcs) : null;",
    ),
];

/// Full script for the probe called `name`.
#[must_use]
pub fn probe_script(name: &str) -> Option<String> {
    PROBES
        .iter()
        .find(|(probe, _)| *probe == name)
        .map(|(_, body)| wrap(body))
}

/// Names of all probes, in execution order.
pub fn probe_names() -> impl Iterator<Item = &'static str> {
    PROBES.iter().map(|(name, _)| *name)
}

fn wrap(body: &str) -> String {
    format!("(function () {{ {DUMP_FN} try {{ {body} }} catch (e) {{ return null; }} }})()")
}

/// Run every probe and scan what they return.
pub async fn probe(session: &dyn BrowserSession, target: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::PlayerGlobals);
    for (name, body) in PROBES {
        match session.evaluate(&wrap(body)).await {
            Ok(Some(value)) => {
                let Some(text) = probe_text(&value) else {
                    continue;
                };
                let technique = Technique::PlayerGlobal(name);
                for found in playlist_urls(&text) {
                    report.count(agg.offer(found, target, &technique, target));
                }
            }
            Ok(None) => {}
            Err(e) => report.note(format!("{name}: {e}")),
        }
    }
    report
}

/// Text to scan from a probe result; `None` for falsy JS values.
fn probe_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
