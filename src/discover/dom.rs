//! Main document and frame HTML scanning

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::browser::BrowserSession;
use crate::patterns::playlist_urls;

/// Scan the main document's HTML, resolving against the target URL.
pub async fn scan_main(session: &dyn BrowserSession, target: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::DomMain);
    match session.content().await {
        Ok(html) => {
            for found in playlist_urls(&html) {
                report.count(agg.offer(found, target, &Technique::DomMainHtml, target));
            }
        }
        Err(e) => report.note(format!("page content: {e}")),
    }
    report
}

/// Scan every attached frame, each against its own URL.
pub async fn scan_frames(session: &dyn BrowserSession, target: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::Frames);
    let frames = match session.frames().await {
        Ok(frames) => frames,
        Err(e) => {
            report.note(format!("frame list: {e}"));
            return report;
        }
    };

    for frame in &frames {
        let base = if frame.url.is_empty() { target } else { frame.url.as_str() };
        match session.frame_content(frame).await {
            Ok(html) => {
                for found in playlist_urls(&html) {
                    report.count(agg.offer(found, base, &Technique::DomFrameHtml, base));
                }
            }
            Err(e) => report.note(format!("frame {base}: {e}")),
        }
    }
    report
}
