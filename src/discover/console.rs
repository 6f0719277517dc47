//! Console output scanning. Players often log the playlist they load.

use super::aggregator::{Aggregator, Technique};
use super::{Stage, StageReport};
use crate::patterns::playlist_urls;

/// Scan recorded console lines; the whole line is kept as context.
pub fn scan(lines: &[String], base: &str, agg: &mut Aggregator) -> StageReport {
    let mut report = StageReport::new(Stage::Console);
    for line in lines {
        for found in playlist_urls(line) {
            report.count(agg.offer(found, base, &Technique::ConsoleLog, line));
        }
    }
    report
}
