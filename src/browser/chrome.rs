//! Chromium-backed [`BrowserSession`] over the DevTools protocol
//!
//! One browser process, one page. The `chromiumoxide` handler is driven on
//! its own task for the lifetime of the session; [`ChromeSession::close`]
//! shuts the process down and stops that task.
//!
//! Site isolation is switched off so cross-origin iframes (embedded
//! players, almost always) share the page's renderer: their network and
//! console events arrive on the page's own session and their documents
//! are reachable through the page's frame tree.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived, GetCookiesParams, GetResponseBodyParams, RequestId, Response,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, FrameId, FrameTree, GetFrameTreeParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    EnableParams as RuntimeEnableParams, EvaluateParams, EventConsoleApiCalled,
    ExecutionContextId, RemoteObject,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::http::{cookie_header, SessionHttp};
use super::{BrowserSession, EventStream, FrameInfo, PageEvent};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};

const FRAME_HTML_SCRIPT: &str =
    "document.documentElement ? document.documentElement.outerHTML : ''";

/// Extra Chromium switches.
///
/// `--disable-features` replaces chromiumoxide's default value rather
/// than adding to it, so `TranslateUI` is repeated here.
const LAUNCH_ARGS: [&str; 3] = [
    "--autoplay-policy=no-user-gesture-required",
    "--disable-features=TranslateUI,IsolateOrigins,site-per-process",
    "--disable-site-isolation-trials",
];

/// Name of the isolated world used to read frame HTML.
const WORLD_NAME: &str = "m3u8scout";

/// A live Chromium process with a single page
pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: Mutex<Option<JoinHandle<()>>>,
    http: SessionHttp,
}

impl ChromeSession {
    /// Launch Chromium and open a blank page.
    ///
    /// Network and Runtime domains are enabled up front so request,
    /// response and console events flow as soon as a subscriber exists.
    pub async fn launch(config: &DiscoveryConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(config.navigation_timeout())
            .args(LAUNCH_ARGS);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(DiscoveryError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(NetworkEnableParams::default()).await?;
        page.execute(RuntimeEnableParams::default()).await?;

        let mut session = Self {
            browser: Mutex::new(browser),
            page,
            handler: Mutex::new(Some(handler)),
            http: SessionHttp::new(config.user_agent.clone())?,
        };

        if session.http.user_agent().is_none() {
            let browser_ua = session.evaluate_in(None, "navigator.userAgent").await;
            if let Ok(Some(Value::String(ua))) = browser_ua {
                // Probes go out over plain HTTP; don't advertise headless mode
                session.http.set_user_agent(ua.replace("HeadlessChrome", "Chrome"));
            }
        }

        info!(headless = config.headless, "Browser launched");
        Ok(session)
    }

    async fn evaluate_in(
        &self,
        context_id: Option<ExecutionContextId>,
        script: &str,
    ) -> Result<Option<Value>> {
        let mut builder = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true);
        if let Some(id) = context_id {
            builder = builder.context_id(id);
        }
        let params = builder.build().map_err(DiscoveryError::Script)?;

        let evaluated = self.page.execute(params).await?.result;
        if let Some(details) = evaluated.exception_details {
            return Err(DiscoveryError::Script(details.text));
        }
        Ok(evaluated.result.value)
    }

    async fn cookies_for(&self, url: &str) -> Result<String> {
        let params = GetCookiesParams {
            urls: Some(vec![url.to_string()]),
        };
        let cookies = self.page.execute(params).await?.result.cookies;
        Ok(cookie_header(
            cookies.iter().map(|c| (c.name.as_str(), c.value.as_str())),
        ))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn subscribe(&self) -> Result<EventStream> {
        let requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|ev| PageEvent::Request {
                url: ev.request.url.clone(),
                resource_type: ev
                    .r#type
                    .as_ref()
                    .map_or_else(|| "other".to_string(), |t| format!("{t:?}").to_lowercase()),
            });

        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await?
            .map(|ev| PageEvent::Response {
                request_id: ev.request_id.inner().clone(),
                url: ev.response.url.clone(),
                content_type: content_type(&ev.response),
            });

        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|ev| PageEvent::LoadingFinished {
                request_id: ev.request_id.inner().clone(),
            });

        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await?
            .map(|ev| PageEvent::LoadingFailed {
                request_id: ev.request_id.inner().clone(),
            });

        let console = self
            .page
            .event_listener::<EventConsoleApiCalled>()
            .await?
            .map(|ev| PageEvent::Console {
                text: console_text(&ev.args),
            });

        Ok(futures::stream::select_all([
            requests.boxed(),
            responses.boxed(),
            finished.boxed(),
            failed.boxed(),
            console.boxed(),
        ])
        .boxed())
    }

    #[instrument(skip(self))]
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DiscoveryError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DiscoveryError::Timeout(timeout)),
        }
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn frames(&self) -> Result<Vec<FrameInfo>> {
        let tree = self
            .page
            .execute(GetFrameTreeParams::default())
            .await?
            .result
            .frame_tree;

        let mut frames = Vec::new();
        flatten_frames(&tree, &mut frames);
        Ok(frames)
    }

    #[instrument(skip(self), fields(frame = %frame.url))]
    async fn frame_content(&self, frame: &FrameInfo) -> Result<String> {
        let params = CreateIsolatedWorldParams::builder()
            .frame_id(FrameId::new(frame.id.clone()))
            .world_name(WORLD_NAME)
            .build()
            .map_err(DiscoveryError::Browser)?;
        let world = self.page.execute(params).await?.result;

        match self
            .evaluate_in(Some(world.execution_context_id), FRAME_HTML_SCRIPT)
            .await?
        {
            Some(Value::String(html)) => Ok(html),
            _ => Ok(String::new()),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        self.evaluate_in(None, script).await
    }

    async fn response_body(&self, request_id: &str) -> Result<String> {
        let body = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await?
            .result;

        if body.base64_encoded {
            let bytes = STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| DiscoveryError::Browser(format!("invalid base64 body: {e}")))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.body)
        }
    }

    #[instrument(skip(self))]
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        let cookies = self.cookies_for(url).await.unwrap_or_else(|e| {
            debug!("Cookie lookup failed: {}", e);
            String::new()
        });
        let referer = self.page.url().await.ok().flatten();

        self.http
            .get_text(url, Some(&cookies), referer.as_deref(), timeout)
            .await
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await?;
        browser.wait().await?;

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        info!("Browser closed");
        Ok(())
    }
}

fn flatten_frames(tree: &FrameTree, out: &mut Vec<FrameInfo>) {
    out.push(FrameInfo {
        id: tree.frame.id.inner().clone(),
        url: tree.frame.url.clone(),
    });
    for child in tree.child_frames.iter().flatten() {
        flatten_frames(child, out);
    }
}

/// `Content-Type` header when present, else the MIME type Chromium sniffed.
fn content_type(response: &Response) -> String {
    response
        .headers
        .inner()
        .as_object()
        .and_then(|headers| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        })
        .and_then(|(_, value)| value.as_str())
        .map_or_else(|| response.mime_type.clone(), str::to_string)
        .to_lowercase()
}

fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match &arg.value {
            Some(Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
