//! Multi-technique playlist discovery
//!
//! One run drives a [`BrowserSession`] through a fixed sequence of
//! independent heuristics, merging everything into one [`Aggregator`]:
//!
//! 1. Main document HTML
//! 2. Every frame's HTML
//! 3. Player globals (JW Player, Video.js, hls.js, `window.player`, `<video>`)
//! 4. Inline scripts, plus probing the `/api/` endpoints they mention
//! 5. Network requests seen while the page loaded
//! 6. Network responses (URL and body)
//! 7. Console output
//! 8. Fetching every playlist found so far for variant playlists
//!
//! The order decides which technique is credited when several find the
//! same URL. Every stage isolates its own failures into a [`StageReport`];
//! nothing short of a browser that cannot be launched or closed fails the
//! run.

pub mod aggregator;
pub mod console;
pub mod dom;
pub mod network;
pub mod player;
pub mod playlist;
pub mod scripts;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::DiscoveryConfig;

pub use aggregator::{Aggregator, ResultRecord, Technique};
pub use network::{NetworkObserver, ObservedTraffic};

/// Discovery stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DomMain,
    Frames,
    PlayerGlobals,
    InlineScripts,
    NetworkRequests,
    NetworkResponses,
    Console,
    Playlists,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DomMain => "dom",
            Self::Frames => "frames",
            Self::PlayerGlobals => "player-globals",
            Self::InlineScripts => "inline-scripts",
            Self::NetworkRequests => "network-requests",
            Self::NetworkResponses => "network-responses",
            Self::Console => "console",
            Self::Playlists => "playlists",
        };
        f.write_str(name)
    }
}

/// Outcome of one stage: how many new URLs it contributed and the
/// failures it swallowed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub added: usize,
    pub diagnostics: Vec<String>,
}

impl StageReport {
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            added: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Record a swallowed failure.
    pub fn note(&mut self, diagnostic: impl Into<String>) {
        let diagnostic = diagnostic.into();
        debug!(stage = %self.stage, "{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    /// Count an [`Aggregator`] insertion.
    pub fn count(&mut self, inserted: bool) {
        if inserted {
            self.added += 1;
        }
    }

    /// `true` if nothing failed in this stage.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub target_url: String,
    /// Set when navigation failed; the run still scanned whatever loaded.
    pub navigation_error: Option<String>,
    pub records: Vec<ResultRecord>,
    pub stages: Vec<StageReport>,
}

impl DiscoveryReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Report for `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Runs the discovery sequence against a browser session.
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Run every technique once against `session`.
    ///
    /// The session is left open; closing it is the caller's job.
    pub async fn run(&self, session: Arc<dyn BrowserSession>) -> DiscoveryReport {
        let target = self.config.target_url.as_str();
        let mut agg = Aggregator::new();
        let mut stages = Vec::with_capacity(8);

        // Listeners go in before navigation or early traffic is lost
        let observer = match session.subscribe().await {
            Ok(events) => Some(NetworkObserver::spawn(
                events,
                Arc::clone(&session),
                self.config.max_response_body_chars,
            )),
            Err(e) => {
                warn!("Event subscription failed, network techniques disabled: {}", e);
                None
            }
        };
        let subscribe_failed = observer.is_none();

        info!(url = %target, "Navigating");
        let navigation_error = match session
            .navigate(target, self.config.navigation_timeout())
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!("Navigation failed, scanning whatever loaded: {}", e);
                Some(e.to_string())
            }
        };

        debug!(delay_ms = self.config.settle_delay_ms, "Waiting for players to settle");
        tokio::time::sleep(self.config.settle_delay()).await;

        let probe_timeout = self.config.probe_timeout();
        stages.push(dom::scan_main(session.as_ref(), target, &mut agg).await);
        stages.push(dom::scan_frames(session.as_ref(), target, &mut agg).await);
        stages.push(player::probe(session.as_ref(), target, &mut agg).await);
        stages.push(scripts::scan(session.as_ref(), target, probe_timeout, &mut agg).await);

        let mut traffic = match observer {
            Some(observer) => observer.finish().await,
            None => ObservedTraffic::default(),
        };
        if subscribe_failed {
            traffic
                .diagnostics
                .push("event subscription failed".to_string());
        }
        stages.push(network::merge_requests(&traffic, target, &mut agg));
        stages.push(network::merge_responses(&traffic, target, &mut agg));
        stages.push(console::scan(&traffic.console, target, &mut agg));

        stages.push(
            playlist::resolve(
                session.as_ref(),
                &mut agg,
                probe_timeout,
                self.config.playlist_depth,
            )
            .await,
        );

        for stage in &stages {
            debug!(
                stage = %stage.stage,
                added = stage.added,
                failures = stage.diagnostics.len(),
                "Stage finished"
            );
        }
        info!(found = agg.len(), "Discovery finished");

        DiscoveryReport {
            target_url: target.to_string(),
            navigation_error,
            records: agg.into_records(),
            stages,
        }
    }
}
