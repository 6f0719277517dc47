//! Offline [`BrowserSession`] replaying canned page state
//!
//! Used to exercise the discovery pipeline deterministically: events are
//! replayed in order, evaluations are looked up by exact script text, and
//! HTTP fetches are served from a URL map.
//!
//! Like a real page, events fire while the page loads: a subscription
//! opened after [`BrowserSession::navigate`] receives nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use super::{BrowserSession, EventStream, FrameInfo, PageEvent};
use crate::error::{DiscoveryError, Result};

/// A browser session with scripted answers
#[derive(Debug, Default)]
pub struct ScriptedSession {
    events: Vec<PageEvent>,
    html: String,
    frames: Vec<(FrameInfo, std::result::Result<String, String>)>,
    evaluations: HashMap<String, std::result::Result<Value, String>>,
    bodies: HashMap<String, std::result::Result<String, String>>,
    remote: HashMap<String, String>,
    navigation_error: Option<String>,
    fetched: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    navigated: AtomicBool,
    closed: AtomicBool,
}

impl ScriptedSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Main document HTML.
    #[must_use]
    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    /// An attached frame and its HTML.
    #[must_use]
    pub fn with_frame(mut self, url: &str, html: &str) -> Self {
        let id = format!("frame-{}", self.frames.len());
        self.frames
            .push((FrameInfo { id, url: url.to_string() }, Ok(html.to_string())));
        self
    }

    /// An attached frame whose HTML cannot be read.
    #[must_use]
    pub fn with_unreadable_frame(mut self, url: &str) -> Self {
        let id = format!("frame-{}", self.frames.len());
        self.frames.push((
            FrameInfo { id, url: url.to_string() },
            Err("frame detached".to_string()),
        ));
        self
    }

    /// Event replayed to subscribers, in insertion order.
    #[must_use]
    pub fn with_event(mut self, event: PageEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Result of evaluating exactly `script`. Unknown scripts yield `undefined`.
    #[must_use]
    pub fn with_evaluation(mut self, script: &str, value: Value) -> Self {
        self.evaluations.insert(script.to_string(), Ok(value));
        self
    }

    /// Make evaluating `script` throw.
    #[must_use]
    pub fn with_failing_evaluation(mut self, script: &str, error: &str) -> Self {
        self.evaluations
            .insert(script.to_string(), Err(error.to_string()));
        self
    }

    /// Body of the response with `request_id`.
    #[must_use]
    pub fn with_body(mut self, request_id: &str, body: &str) -> Self {
        self.bodies
            .insert(request_id.to_string(), Ok(body.to_string()));
        self
    }

    /// Make reading the body of `request_id` fail.
    #[must_use]
    pub fn with_failing_body(mut self, request_id: &str, error: &str) -> Self {
        self.bodies
            .insert(request_id.to_string(), Err(error.to_string()));
        self
    }

    /// Serve `body` for GETs of `url`. Anything else is a 404.
    #[must_use]
    pub fn with_remote(mut self, url: &str, body: &str) -> Self {
        self.remote.insert(url.to_string(), body.to_string());
        self
    }

    /// Make navigation fail.
    #[must_use]
    pub fn with_navigation_error(mut self, reason: &str) -> Self {
        self.navigation_error = Some(reason.to_string());
        self
    }

    /// URLs requested through [`BrowserSession::fetch_text`], in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    /// Session calls in order: `subscribe`, `navigate` and
    /// `response_body:<request id>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn log(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Whether [`BrowserSession::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn subscribe(&self) -> Result<EventStream> {
        self.log("subscribe".to_string());
        let events = if self.navigated.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            self.events.clone()
        };
        Ok(futures::stream::iter(events).boxed())
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.log("navigate".to_string());
        self.navigated.store(true, Ordering::SeqCst);
        match &self.navigation_error {
            Some(reason) => Err(DiscoveryError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn frames(&self) -> Result<Vec<FrameInfo>> {
        Ok(self.frames.iter().map(|(frame, _)| frame.clone()).collect())
    }

    async fn frame_content(&self, frame: &FrameInfo) -> Result<String> {
        match self.frames.iter().find(|(f, _)| f.id == frame.id) {
            Some((_, Ok(html))) => Ok(html.clone()),
            Some((_, Err(e))) => Err(DiscoveryError::Browser(e.clone())),
            None => Err(DiscoveryError::Browser(format!("no frame {}", frame.id))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        match self.evaluations.get(script) {
            Some(Ok(value)) => Ok(Some(value.clone())),
            Some(Err(e)) => Err(DiscoveryError::Script(e.clone())),
            None => Ok(None),
        }
    }

    async fn response_body(&self, request_id: &str) -> Result<String> {
        self.log(format!("response_body:{request_id}"));
        match self.bodies.get(request_id) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(e)) => Err(DiscoveryError::Browser(e.clone())),
            None => Err(DiscoveryError::Browser(format!(
                "no body for request {request_id}"
            ))),
        }
    }

    async fn fetch_text(&self, url: &str, _timeout: Duration) -> Result<String> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }
        self.remote
            .get(url)
            .cloned()
            .ok_or_else(|| DiscoveryError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
