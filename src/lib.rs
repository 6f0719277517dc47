//! `m3u8scout` - find HLS playlists on dynamically rendered pages
//!
//! # Features
//!
//! - **Real browser**: Chromium over the DevTools protocol, so players run
//!   and issue their own requests
//! - **Multi-technique**: DOM, frames, player globals, inline scripts,
//!   `/api/` probes, network traffic, console output
//! - **Variant expansion**: master playlists are fetched and their variant
//!   and rendition playlists added
//! - **Provenance**: every URL records which technique found it first
//!
//! # Example
//!
//! ```rust,no_run
//! use m3u8scout::DiscoveryConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DiscoveryConfig::for_url("https://example.com/watch/42");
//!     let report = m3u8scout::find_playlists(&config).await?;
//!     for record in &report.records {
//!         println!("{} ({})", record.url, record.discovered_by);
//!     }
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod discover;
pub mod error;
pub mod normalize;
pub mod output;
pub mod patterns;

use std::sync::Arc;

pub use browser::{BrowserSession, ChromeSession, FrameInfo, PageEvent, ScriptedSession};
pub use config::DiscoveryConfig;
pub use discover::{Discovery, DiscoveryReport, ResultRecord, Stage, StageReport, Technique};
pub use error::{DiscoveryError, Result};
pub use normalize::normalize;

/// Version of m3u8scout
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Launch Chromium, run discovery against `config.target_url`, close the
/// browser.
///
/// The browser is closed whatever the techniques did; a failure to close
/// it is returned as an error.
pub async fn find_playlists(config: &DiscoveryConfig) -> Result<DiscoveryReport> {
    config.validate()?;

    let session = Arc::new(ChromeSession::launch(config).await?);
    let report = Discovery::new(config.clone())
        .run(Arc::clone(&session) as Arc<dyn BrowserSession>)
        .await;
    session.close().await?;

    Ok(report)
}
