//! Outbound HTTP for API probes and playlist fetches
//!
//! Requests are sent outside the browser but impersonate it: same
//! User-Agent, the page's cookies for the target URL, and the page as
//! Referer. That is enough for most players that gate their playlist
//! endpoints on a session cookie.

use std::time::Duration;

use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{DiscoveryError, Result};

/// HTTP client that replays a browser session's identity
#[derive(Debug, Clone)]
pub struct SessionHttp {
    client: Client,
    user_agent: Option<String>,
}

impl SessionHttp {
    /// Create a client, optionally sending `user_agent` on every request.
    pub fn new(user_agent: Option<String>) -> Result<Self> {
        let client = Client::builder()
            // Keep connections alive for reuse across probes
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, user_agent })
    }

    /// Replace the User-Agent sent with requests.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = Some(user_agent.into());
    }

    /// User-Agent currently sent with requests.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// GET `url` and return the body as text.
    ///
    /// Non-2xx responses are errors, as is exceeding `timeout`.
    #[instrument(skip(self, cookie_header), fields(url = %url))]
    pub async fn get_text(
        &self,
        url: &str,
        cookie_header: Option<&str>,
        referer: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let mut req = self.client.get(url).timeout(timeout);
        if let Some(ua) = &self.user_agent {
            req = req.header(USER_AGENT, ua.as_str());
        }
        if let Some(cookies) = cookie_header.filter(|c| !c.is_empty()) {
            req = req.header(COOKIE, cookies);
        }
        if let Some(referer) = referer.filter(|r| r.starts_with("http")) {
            req = req.header(REFERER, referer);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout(timeout)
            } else {
                DiscoveryError::Http(e)
            }
        })?;

        let status = response.status();
        debug!(%status, "Probe response received");
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Join cookies into a `Cookie` header value.
pub fn cookie_header<'a, I>(cookies: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cookies
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
