//! Inline `<script>` scanning and `/api/` endpoint probing

use std::collections::HashSet;
use std::time::Duration;

use scraper::{Html, Selector};
use serde_json::Value;

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::browser::BrowserSession;
use crate::patterns::{api_endpoints, playlist_urls, turboviplay_urls};

/// Collects the text of every `<script>` in the live DOM.
pub const SCRIPT_TEXTS_JS: &str =
    "Array.from(document.querySelectorAll('script')).map(function (s) { return s.textContent || ''; })";

/// Context recorded for matches taken straight from a script body.
const INLINE_CONTEXT: &str = "inline_script";

/// Scan inline scripts, probing any `/api/` endpoints they reference.
pub async fn scan(
    session: &dyn BrowserSession,
    target: &str,
    probe_timeout: Duration,
    agg: &mut Aggregator,
) -> StageReport {
    let mut report = StageReport::new(Stage::InlineScripts);
    let scripts = script_texts(session, &mut report).await;
    let mut probed = HashSet::new();

    for text in scripts.iter().filter(|t| !t.trim().is_empty()) {
        // Vendor pattern first so it gets the credit over the generic one
        for found in turboviplay_urls(text) {
            report.count(agg.offer(found, target, &Technique::ScriptTurboviplay, INLINE_CONTEXT));
        }
        for found in playlist_urls(text) {
            report.count(agg.offer(found, target, &Technique::ScriptInline, INLINE_CONTEXT));
        }

        for api in api_endpoints(text) {
            if !probed.insert(api.to_string()) {
                continue;
            }
            match session.fetch_text(api, probe_timeout).await {
                Ok(body) => {
                    for found in playlist_urls(&body) {
                        report.count(agg.offer(found, api, &Technique::ApiProbe, api));
                    }
                }
                Err(e) => report.note(format!("api probe {api}: {e}")),
            }
        }
    }
    report
}

/// Script bodies from the live DOM, or parsed out of the serialized page
/// when evaluation is unavailable.
async fn script_texts(session: &dyn BrowserSession, report: &mut StageReport) -> Vec<String> {
    match session.evaluate(SCRIPT_TEXTS_JS).await {
        Ok(Some(Value::Array(items))) => {
            return items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    _ => String::new(),
                })
                .collect();
        }
        Ok(_) => {}
        Err(e) => report.note(format!("script enumeration: {e}")),
    }

    match session.content().await {
        Ok(html) => inline_scripts_from_html(&html),
        Err(e) => {
            report.note(format!("page content: {e}"));
            Vec::new()
        }
    }
}

/// Text content of every `<script>` element in `html`.
#[must_use]
pub fn inline_scripts_from_html(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .collect()
}
