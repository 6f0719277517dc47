//! Network observer
//!
//! Consumes the session's [`PageEvent`] stream on its own task from before
//! navigation until the main sequence asks for the results. The task owns
//! everything it collects and hands it back by value, so no state is
//! shared while the page is running.
//!
//! Response bodies are only complete once loading has finished, so
//! textual responses are parked until their `LoadingFinished` event and
//! read then. Responses still parked when observation stops get one last
//! read attempt.

use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::browser::{BrowserSession, EventStream, PageEvent};
use crate::patterns::{mentions_playlist, playlist_urls, M3U8_MARKER};

/// Content types whose bodies are worth reading.
const TEXTUAL_CONTENT_TYPES: [&str; 4] = ["mpegurl", "text", "json", "application"];

/// A playlist reference seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCandidate {
    pub url: String,
    pub technique: Technique,
    /// Resource type for requests, content type for responses.
    pub context: String,
}

/// Everything the observer collected.
#[derive(Debug, Default, Clone)]
pub struct ObservedTraffic {
    pub requests: Vec<ObservedCandidate>,
    pub responses: Vec<ObservedCandidate>,
    /// Console lines, verbatim.
    pub console: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// A textual response waiting for its body.
#[derive(Debug)]
struct PendingBody {
    request_id: String,
    url: String,
    content_type: String,
}

/// Observer task state.
struct Recorder {
    session: Arc<dyn BrowserSession>,
    max_body_chars: usize,
    pending: Vec<PendingBody>,
    traffic: ObservedTraffic,
}

impl Recorder {
    fn new(session: Arc<dyn BrowserSession>, max_body_chars: usize) -> Self {
        Self {
            session,
            max_body_chars,
            pending: Vec::new(),
            traffic: ObservedTraffic::default(),
        }
    }

    async fn record(&mut self, event: PageEvent) {
        match event {
            PageEvent::Request { url, resource_type } => {
                if mentions_playlist(&url) {
                    self.traffic.requests.push(ObservedCandidate {
                        url,
                        technique: Technique::NetworkRequest,
                        context: resource_type,
                    });
                }
            }
            PageEvent::Response {
                request_id,
                url,
                content_type,
            } => {
                if mentions_playlist(&url) {
                    self.traffic.responses.push(ObservedCandidate {
                        url,
                        technique: Technique::NetworkResponseUrl,
                        context: content_type,
                    });
                } else if is_textual(&content_type) {
                    self.pending.push(PendingBody {
                        request_id,
                        url,
                        content_type,
                    });
                }
            }
            PageEvent::LoadingFinished { request_id } => {
                if let Some(pending) = self.take_pending(&request_id) {
                    self.read_body(pending).await;
                }
            }
            PageEvent::LoadingFailed { request_id } => {
                self.take_pending(&request_id);
            }
            PageEvent::Console { text } => self.traffic.console.push(text),
        }
    }

    fn take_pending(&mut self, request_id: &str) -> Option<PendingBody> {
        let idx = self
            .pending
            .iter()
            .position(|p| p.request_id == request_id)?;
        Some(self.pending.remove(idx))
    }

    async fn read_body(&mut self, pending: PendingBody) {
        let body = match self.session.response_body(&pending.request_id).await {
            Ok(body) => truncate_chars(body, self.max_body_chars),
            Err(e) => {
                self.traffic
                    .diagnostics
                    .push(format!("body of {}: {e}", pending.url));
                return;
            }
        };
        if body.contains(M3U8_MARKER) {
            for found in playlist_urls(&body) {
                self.traffic.responses.push(ObservedCandidate {
                    url: found.to_string(),
                    technique: Technique::NetworkResponseBody,
                    context: pending.content_type.clone(),
                });
            }
        }
    }

    /// Last attempt at bodies whose loading never reported finishing.
    async fn flush(mut self) -> ObservedTraffic {
        for pending in std::mem::take(&mut self.pending) {
            self.read_body(pending).await;
        }
        self.traffic
    }
}

/// Background task collecting [`ObservedTraffic`].
pub struct NetworkObserver {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<ObservedTraffic>,
}

impl NetworkObserver {
    /// Start consuming `events`. Response bodies are read through `session`.
    pub fn spawn(events: EventStream, session: Arc<dyn BrowserSession>, max_body_chars: usize) -> Self {
        let (shutdown, mut stop) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut events = events;
            let mut recorder = Recorder::new(session, max_body_chars);

            loop {
                tokio::select! {
                    biased;
                    event = events.next() => match event {
                        Some(event) => recorder.record(event).await,
                        None => break,
                    },
                    _ = &mut stop => break,
                }
            }

            // Whatever is already buffered still counts
            while let Some(Some(event)) = events.next().now_or_never() {
                recorder.record(event).await;
            }
            recorder.flush().await
        });

        Self { shutdown, task }
    }

    /// Stop observing and return what was collected.
    pub async fn finish(self) -> ObservedTraffic {
        // The task may already have ended with its stream
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(traffic) => traffic,
            Err(e) => ObservedTraffic {
                diagnostics: vec![format!("network observer failed: {e}")],
                ..ObservedTraffic::default()
            },
        }
    }
}

/// Merge captured requests.
pub fn merge_requests(traffic: &ObservedTraffic, base: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::NetworkRequests);
    for candidate in &traffic.requests {
        report.count(agg.offer(&candidate.url, base, &candidate.technique, &candidate.context));
    }
    report
}

/// Merge captured responses. Observer failures are reported here.
pub fn merge_responses(traffic: &ObservedTraffic, base: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::NetworkResponses);
    for candidate in &traffic.responses {
        report.count(agg.offer(&candidate.url, base, &candidate.technique, &candidate.context));
    }
    for diagnostic in &traffic.diagnostics {
        report.note(diagnostic.clone());
    }
    report
}

fn is_textual(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    TEXTUAL_CONTENT_TYPES
        .iter()
        .any(|kind| content_type.contains(kind))
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ScriptedSession;

    fn response(id: &str, url: &str, content_type: &str) -> PageEvent {
        PageEvent::Response {
            request_id: id.to_string(),
            url: url.to_string(),
            content_type: content_type.to_string(),
        }
    }

    async fn observe(session: ScriptedSession, max_body_chars: usize) -> ObservedTraffic {
        let session = Arc::new(session);
        let events = session.subscribe().await.unwrap();
        NetworkObserver::spawn(events, session, max_body_chars)
            .finish()
            .await
    }

    #[test]
    fn textual_content_types() {
        assert!(is_textual("application/vnd.apple.mpegurl"));
        assert!(is_textual("Text/HTML; charset=utf-8"));
        assert!(is_textual("application/json"));
        assert!(!is_textual("image/png"));
        assert!(!is_textual("video/mp2t"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé");
        assert_eq!(truncate_chars("short".to_string(), 100), "short");
    }

    #[tokio::test]
    async fn request_urls_are_matched_case_insensitively() {
        let session = ScriptedSession::new()
            .with_event(PageEvent::Request {
                url: "https://cdn.test/Live/MASTER.M3U8".into(),
                resource_type: "xhr".into(),
            })
            .with_event(PageEvent::Request {
                url: "https://cdn.test/app.js".into(),
                resource_type: "script".into(),
            });

        let traffic = observe(session, 1000).await;
        assert_eq!(traffic.requests.len(), 1);
        assert_eq!(traffic.requests[0].context, "xhr");
    }

    #[tokio::test]
    async fn response_url_short_circuits_body_read() {
        let session = ScriptedSession::new()
            .with_event(response("1", "https://cdn.test/index.m3u8", "application/vnd.apple.mpegurl"))
            .with_failing_body("1", "must not be read");

        let traffic = observe(session, 1000).await;
        assert_eq!(traffic.responses.len(), 1);
        assert_eq!(traffic.responses[0].technique, Technique::NetworkResponseUrl);
        assert!(traffic.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn body_matches_are_collected() {
        let session = ScriptedSession::new()
            .with_event(response("7", "https://api.test/source", "application/json"))
            .with_body(
                "7",
                r#"{"sources":[{"file":"https://cdn.test/a.m3u8?t=1"},{"file":"https://cdn.test/b.m3u8"}]}"#,
            )
            .with_event(response("8", "https://cdn.test/poster.jpg", "image/jpeg"))
            .with_body("8", "https://cdn.test/never.m3u8");

        let traffic = observe(session, 1000).await;
        let urls: Vec<_> = traffic.responses.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, ["https://cdn.test/a.m3u8?t=1", "https://cdn.test/b.m3u8"]);
        assert!(traffic
            .responses
            .iter()
            .all(|c| c.technique == Technique::NetworkResponseBody && c.context == "application/json"));
    }

    #[tokio::test]
    async fn body_beyond_limit_is_ignored() {
        let body = format!("{}https://cdn.test/late.m3u8", "x".repeat(50));
        let session = ScriptedSession::new()
            .with_event(response("1", "https://api.test/big", "text/plain"))
            .with_body("1", &body);

        assert!(observe(session, 40).await.responses.is_empty());
    }

    #[tokio::test]
    async fn failed_body_read_is_a_diagnostic() {
        let session = ScriptedSession::new()
            .with_event(response("1", "https://api.test/a", "application/json"))
            .with_failing_body("1", "No resource with given identifier found")
            .with_event(response("2", "https://api.test/b", "application/json"))
            .with_body("2", "https://cdn.test/ok.m3u8");

        let traffic = observe(session, 1000).await;
        assert_eq!(traffic.diagnostics.len(), 1);
        assert_eq!(traffic.responses.len(), 1);
        assert_eq!(traffic.responses[0].url, "https://cdn.test/ok.m3u8");
    }

    #[tokio::test]
    async fn bodies_are_read_when_loading_finishes() {
        let finished = |id: &str| PageEvent::LoadingFinished {
            request_id: id.to_string(),
        };
        let session = Arc::new(
            ScriptedSession::new()
                .with_event(response("1", "https://api.test/slow", "application/json"))
                .with_event(response("2", "https://api.test/fast", "application/json"))
                .with_event(finished("2"))
                .with_event(finished("1"))
                .with_body("1", "https://cdn.test/slow.m3u8")
                .with_body("2", "https://cdn.test/fast.m3u8"),
        );
        let events = session.subscribe().await.unwrap();
        let traffic = NetworkObserver::spawn(events, session.clone(), 1000)
            .finish()
            .await;

        assert_eq!(
            session.calls(),
            ["subscribe", "response_body:2", "response_body:1"]
        );
        let urls: Vec<_> = traffic.responses.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, ["https://cdn.test/fast.m3u8", "https://cdn.test/slow.m3u8"]);
    }

    #[tokio::test]
    async fn failed_loads_are_never_read() {
        let session = Arc::new(
            ScriptedSession::new()
                .with_event(response("1", "https://api.test/a", "application/json"))
                .with_event(PageEvent::LoadingFailed {
                    request_id: "1".into(),
                })
                .with_failing_body("1", "No data found for resource with given identifier"),
        );
        let events = session.subscribe().await.unwrap();
        let traffic = NetworkObserver::spawn(events, session.clone(), 1000)
            .finish()
            .await;

        assert!(traffic.diagnostics.is_empty());
        assert!(!session.calls().iter().any(|c| c.starts_with("response_body")));
    }

    #[tokio::test]
    async fn console_lines_are_kept_verbatim() {
        let session = ScriptedSession::new().with_event(PageEvent::Console {
            text: "player: loading https://cdn.test/x.m3u8".into(),
        });
        let traffic = observe(session, 1000).await;
        assert_eq!(traffic.console, ["player: loading https://cdn.test/x.m3u8"]);
    }

    #[test]
    fn requests_merge_before_responses() {
        let traffic = ObservedTraffic {
            requests: vec![ObservedCandidate {
                url: "https://cdn.test/a.m3u8".into(),
                technique: Technique::NetworkRequest,
                context: "media".into(),
            }],
            responses: vec![ObservedCandidate {
                url: "https://cdn.test/a.m3u8".into(),
                technique: Technique::NetworkResponseUrl,
                context: "application/x-mpegurl".into(),
            }],
            console: vec![],
            diagnostics: vec!["body of x: gone".into()],
        };

        let mut agg = Aggregator::new();
        let requests = merge_requests(&traffic, "https://page.test/", &mut agg);
        let responses = merge_responses(&traffic, "https://page.test/", &mut agg);

        assert_eq!(requests.added, 1);
        assert_eq!(responses.added, 0);
        assert_eq!(responses.diagnostics.len(), 1);
        assert_eq!(agg.records()[0].discovered_by, "network-request");
    }
}
