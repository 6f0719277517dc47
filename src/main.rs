//! `m3u8scout` CLI - find the HLS playlists a page loads

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use m3u8scout::output::{format_summary, write_results};
use m3u8scout::{find_playlists, DiscoveryConfig};

#[derive(Parser)]
#[command(name = "m3u8scout")]
#[command(about = "Find HLS playlists on a page by driving a real browser")]
#[command(version)]
struct Cli {
    /// Page to inspect
    url: String,

    /// Config file (default: <config dir>/m3u8scout/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the JSON results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Milliseconds to wait after load for players to start
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Characters of each response body to scan
    #[arg(long)]
    max_body_chars: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Navigation timeout in seconds
    #[arg(long)]
    nav_timeout_secs: Option<u64>,

    /// Timeout in seconds for each API probe and playlist fetch
    #[arg(long)]
    probe_timeout_secs: Option<u64>,

    /// Levels of nested playlists to resolve (0 disables fetching)
    #[arg(long)]
    playlist_depth: Option<usize>,

    /// Chromium executable to launch
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// User-Agent for API probes and playlist fetches
    #[arg(long)]
    user_agent: Option<String>,

    /// Print results as JSON on stdout (progress goes to stderr)
    #[arg(long)]
    json: bool,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Config file values with command-line overrides applied.
    fn to_config(&self) -> Result<DiscoveryConfig> {
        let mut config = DiscoveryConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;

        config.target_url.clone_from(&self.url);
        if let Some(path) = &self.output {
            config.output_file.clone_from(path);
        }
        if let Some(ms) = self.settle_ms {
            config.settle_delay_ms = ms;
        }
        if let Some(chars) = self.max_body_chars {
            config.max_response_body_chars = chars;
        }
        if self.headful {
            config.headless = false;
        }
        if let Some(secs) = self.nav_timeout_secs {
            config.navigation_timeout_secs = secs;
        }
        if let Some(secs) = self.probe_timeout_secs {
            config.probe_timeout_secs = secs;
        }
        if let Some(depth) = self.playlist_depth {
            config.playlist_depth = depth;
        }
        if let Some(chrome) = &self.chrome {
            config.chrome_executable = Some(chrome.clone());
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = Some(ua.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.to_config()?;
    let say = |line: &str| {
        if cli.json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };

    say(&format!("🔁 Navigating to: {}", config.target_url));
    let report = find_playlists(&config).await?;

    if let Some(err) = &report.navigation_error {
        say(&format!("⚠️  Navigation failed: {err}"));
    }

    if report.is_empty() {
        say("❌ No m3u8 URLs discovered.");
    } else {
        say(&format!(
            "🎉 Discovered {} m3u8 candidate(s). Saving to {}",
            report.len(),
            config.output_file.display()
        ));
        write_results(&report.records, &config.output_file).with_context(|| {
            format!("failed to write {}", config.output_file.display())
        })?;
        say(&format_summary(&report.records));
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,chromiumoxide=error,m3u8scout={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
