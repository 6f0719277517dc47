//! Browser session abstraction
//!
//! The discovery pipeline only needs a handful of primitives from a real
//! browser: navigate, read page and frame HTML, evaluate script, observe
//! network/console events, and issue HTTP requests that carry the page's
//! cookies. [`BrowserSession`] captures exactly that surface so the
//! pipeline can run against Chromium ([`ChromeSession`]) or canned page
//! state ([`ScriptedSession`]).

pub mod chrome;
pub mod http;
pub mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

pub use chrome::ChromeSession;
pub use http::SessionHttp;
pub use scripted::ScriptedSession;

/// An event observed on the page while it loads and runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Outgoing request.
    Request {
        url: String,
        /// Lowercase resource type (`document`, `xhr`, `media`, ...).
        resource_type: String,
    },
    /// Response headers received. The body is read on demand through
    /// [`BrowserSession::response_body`] once [`PageEvent::LoadingFinished`]
    /// arrives for the same request.
    Response {
        request_id: String,
        url: String,
        content_type: String,
    },
    /// The response body is complete and can be read.
    LoadingFinished { request_id: String },
    /// The request failed; no body will follow.
    LoadingFailed { request_id: String },
    /// A console API call, arguments joined into one line.
    Console { text: String },
}

/// Live stream of [`PageEvent`]s.
pub type EventStream = BoxStream<'static, PageEvent>;

/// A frame attached to the page (the main frame included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub id: String,
    pub url: String,
}

/// Primitives the discovery pipeline needs from a browser.
///
/// All methods take `&self` so a session can be shared between the main
/// discovery sequence and the network observer task.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Start receiving page events. Must be called before [`navigate`]
    /// to see early network activity.
    ///
    /// [`navigate`]: BrowserSession::navigate
    async fn subscribe(&self) -> Result<EventStream>;

    /// Navigate the page, failing after `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Serialized HTML of the main document.
    async fn content(&self) -> Result<String>;

    /// Every frame currently attached to the page.
    async fn frames(&self) -> Result<Vec<FrameInfo>>;

    /// Serialized HTML of one frame.
    async fn frame_content(&self, frame: &FrameInfo) -> Result<String>;

    /// Evaluate `script` in the page and return its JSON value
    /// (`None` for `undefined`).
    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>>;

    /// Body text of a response seen in a [`PageEvent::Response`]. Only
    /// reliable after its [`PageEvent::LoadingFinished`].
    async fn response_body(&self, request_id: &str) -> Result<String>;

    /// GET `url` with the page's cookies, failing on non-2xx or after
    /// `timeout`.
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Tear the browser down.
    async fn close(&self) -> Result<()>;
}
