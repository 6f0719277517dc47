//! End-to-end discovery runs against scripted page state.
//!
//! No browser is launched: [`ScriptedSession`] replays events, HTML,
//! evaluation results and HTTP bodies, so every run is deterministic.

use std::sync::Arc;

use m3u8scout::discover::player::probe_script;
use m3u8scout::discover::scripts::SCRIPT_TEXTS_JS;
use m3u8scout::{Discovery, DiscoveryConfig, PageEvent, ScriptedSession, Stage};
use serde_json::json;

const PAGE: &str = "https://page.test/watch/42";

fn config() -> DiscoveryConfig {
    DiscoveryConfig {
        settle_delay_ms: 0,
        ..DiscoveryConfig::for_url(PAGE)
    }
}

/// A page that leaks one playlist through every technique.
fn busy_page() -> ScriptedSession {
    ScriptedSession::new()
        .with_html(r#"<html><body><video src="https://cdn.test/dom.m3u8"></video></body></html>"#)
        .with_frame(
            "https://embed.test/p/1",
            r#"<source src="https://cdn.test/frame.m3u8"><source src="https://cdn.test/dom.m3u8">"#,
        )
        .with_evaluation(
            &probe_script("videojs").unwrap(),
            json!(r#"[{"src":"https://cdn.test/vjs.m3u8","sources":null}]"#),
        )
        .with_evaluation(
            SCRIPT_TEXTS_JS,
            json!([
                "",
                "var a='https://cdn.turboviplay.com/t/master.m3u8'; var api='https://player.test/api/v2/source';"
            ]),
        )
        .with_remote("https://player.test/api/v2/source", r#"{"file":"https://cdn.test/api.m3u8"}"#)
        .with_event(PageEvent::Request {
            url: "https://cdn.test/req.m3u8".into(),
            resource_type: "xhr".into(),
        })
        .with_event(PageEvent::Request {
            url: "https://cdn.test/dom.m3u8".into(),
            resource_type: "media".into(),
        })
        .with_event(PageEvent::Response {
            request_id: "r1".into(),
            url: "https://cdn.test/resp.m3u8".into(),
            content_type: "application/vnd.apple.mpegurl".into(),
        })
        .with_event(PageEvent::Response {
            request_id: "r2".into(),
            url: "https://player.test/config".into(),
            content_type: "application/json".into(),
        })
        .with_event(PageEvent::LoadingFinished {
            request_id: "r2".into(),
        })
        .with_body("r2", r#"{"hls":"https://cdn.test/body.m3u8"}"#)
        .with_event(PageEvent::Console {
            text: "hls.js: loading https://cdn.test/console.m3u8".into(),
        })
        .with_remote(
            "https://cdn.test/dom.m3u8",
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n",
        )
}

#[tokio::test]
async fn techniques_are_credited_in_execution_order() {
    let report = Discovery::new(config())
        .run(Arc::new(busy_page()))
        .await;

    let found: Vec<(&str, &str)> = report
        .records
        .iter()
        .map(|r| (r.url.as_str(), r.discovered_by.as_str()))
        .collect();
    assert_eq!(
        found,
        [
            ("https://cdn.test/dom.m3u8", "dom-main-html"),
            ("https://cdn.test/frame.m3u8", "dom-frame-html"),
            ("https://cdn.test/vjs.m3u8", "js-eval-videojs"),
            ("https://cdn.turboviplay.com/t/master.m3u8", "script-inline-turboviplay"),
            ("https://cdn.test/api.m3u8", "api-probe"),
            ("https://cdn.test/req.m3u8", "network-request"),
            ("https://cdn.test/resp.m3u8", "network-response-response-url"),
            ("https://cdn.test/body.m3u8", "network-response-response-body"),
            ("https://cdn.test/console.m3u8", "console-log"),
            ("https://cdn.test/low/index.m3u8", "playlist-parse"),
        ]
    );

    let contexts: Vec<&str> = report.records.iter().map(|r| r.context.as_str()).collect();
    assert_eq!(contexts[0], PAGE);
    assert_eq!(contexts[1], "https://embed.test/p/1");
    assert_eq!(contexts[4], "https://player.test/api/v2/source");
    assert_eq!(contexts[5], "xhr");
    assert_eq!(contexts[6], "application/vnd.apple.mpegurl");
    assert_eq!(contexts[8], "hls.js: loading https://cdn.test/console.m3u8");
    assert_eq!(contexts[9], "https://cdn.test/dom.m3u8");

    assert!(report.navigation_error.is_none());
    assert_eq!(report.stages.len(), 8);
    assert!(report.stage(Stage::DomMain).unwrap().is_clean());
}

#[tokio::test]
async fn events_are_subscribed_before_navigation() {
    let session = Arc::new(busy_page());
    let report = Discovery::new(config()).run(session.clone()).await;

    let calls = session.calls();
    assert_eq!(calls[..2], ["subscribe", "navigate"]);
    assert!(calls.contains(&"response_body:r2".to_string()));
    assert!(report
        .records
        .iter()
        .any(|r| r.discovered_by == "network-request"));
}

#[tokio::test]
async fn runs_are_deterministic() {
    let first = Discovery::new(config()).run(Arc::new(busy_page())).await;
    let second = Discovery::new(config()).run(Arc::new(busy_page())).await;
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn single_turboviplay_script_yields_one_record() {
    let session = ScriptedSession::new().with_evaluation(
        SCRIPT_TEXTS_JS,
        json!([r#"jwplayer("v").setup({ file: "https://cdn.turboviplay.com/abc/master.m3u8" });"#]),
    );

    let report = Discovery::new(config()).run(Arc::new(session)).await;
    assert_eq!(report.len(), 1);
    assert_eq!(report.records[0].url, "https://cdn.turboviplay.com/abc/master.m3u8");
    assert_eq!(report.records[0].discovered_by, "script-inline-turboviplay");
}

#[tokio::test]
async fn failing_body_read_does_not_abort_the_run() {
    let session = busy_page().with_failing_body("r2", "Network.getResponseBody: No data found");

    let report = Discovery::new(config()).run(Arc::new(session)).await;

    assert!(report
        .records
        .iter()
        .all(|r| r.discovered_by != "network-response-response-body"));
    assert_eq!(report.len(), 9);
    let responses = report.stage(Stage::NetworkResponses).unwrap();
    assert!(!responses.is_clean());
    assert_eq!(responses.diagnostics.len(), 1);
    assert!(responses.diagnostics[0].contains("No data found"));
}

#[tokio::test]
async fn navigation_failure_still_scans_the_page() {
    let session = busy_page().with_navigation_error("net::ERR_TIMED_OUT");

    let report = Discovery::new(config()).run(Arc::new(session)).await;
    assert!(report
        .navigation_error
        .as_deref()
        .is_some_and(|e| e.contains("ERR_TIMED_OUT")));
    assert_eq!(report.len(), 10);
}

#[tokio::test]
async fn zero_depth_skips_playlist_fetches() {
    let session = Arc::new(
        ScriptedSession::new()
            .with_html("https://cdn.test/only.m3u8")
            .with_remote("https://cdn.test/only.m3u8", "#EXT-X-STREAM-INF:BANDWIDTH=1\nv.m3u8\n"),
    );
    let config = DiscoveryConfig {
        playlist_depth: 0,
        ..config()
    };

    let report = Discovery::new(config).run(session.clone()).await;
    assert_eq!(report.len(), 1);
    assert!(session.fetched().is_empty());
}

#[tokio::test]
async fn run_leaves_session_open() {
    let session = Arc::new(ScriptedSession::new());
    let report = Discovery::new(config()).run(session.clone()).await;

    assert!(report.is_empty());
    assert!(!session.is_closed());
    assert!(report.stages.iter().all(|s| s.added == 0));
}
