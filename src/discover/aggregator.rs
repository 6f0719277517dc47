//! Deduplicating, order-preserving result collection

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// Which heuristic found a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Technique {
    DomMainHtml,
    DomFrameHtml,
    /// A player-global probe, by probe name (`jwplayer`, `videojs`, ...).
    PlayerGlobal(&'static str),
    ScriptTurboviplay,
    ScriptInline,
    ApiProbe,
    NetworkRequest,
    NetworkResponseUrl,
    NetworkResponseBody,
    ConsoleLog,
    PlaylistParse,
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomMainHtml => f.write_str("dom-main-html"),
            Self::DomFrameHtml => f.write_str("dom-frame-html"),
            Self::PlayerGlobal(name) => write!(f, "js-eval-{name}"),
            Self::ScriptTurboviplay => f.write_str("script-inline-turboviplay"),
            Self::ScriptInline => f.write_str("script-inline-m3u8"),
            Self::ApiProbe => f.write_str("api-probe"),
            Self::NetworkRequest => f.write_str("network-request"),
            Self::NetworkResponseUrl => f.write_str("network-response-response-url"),
            Self::NetworkResponseBody => f.write_str("network-response-response-body"),
            Self::ConsoleLog => f.write_str("console-log"),
            Self::PlaylistParse => f.write_str("playlist-parse"),
        }
    }
}

/// One discovered playlist URL and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    pub discovered_by: String,
    pub context: String,
}

/// Seen-set plus the ordered records, shared by every technique of a run.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: HashSet<String>,
    records: Vec<ResultRecord>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an already normalized `url`. Returns `false` if it was seen
    /// before, in which case the first record keeps its provenance.
    pub fn add(&mut self, url: &str, technique: &Technique, context: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.records.push(ResultRecord {
            url: url.to_string(),
            discovered_by: technique.to_string(),
            context: context.to_string(),
        });
        true
    }

    /// Normalize `candidate` against `base`, then [`add`](Self::add) it.
    pub fn offer(&mut self, candidate: &str, base: &str, technique: &Technique, context: &str) -> bool {
        normalize(candidate, base).is_some_and(|url| self.add(&url, technique, context))
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }
}
