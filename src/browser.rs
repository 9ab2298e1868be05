//! Browser automation seam used by the speech synthesizer.
//!
//! A session is an exclusive, external resource: whoever opens one must call
//! [`BrowserSession::quit`] once the batch that needed it is over, whether the
//! batch succeeded or not.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Id(String),
    XPath(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::XPath(xpath.into())
    }
}

/// Opaque handle to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    /// Another element would have received the click.
    Intercepted,
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// `Ok(None)` when nothing matches.
    async fn find(&self, locator: &Locator) -> Result<Option<ElementRef>>;

    async fn clear(&self, element: &ElementRef) -> Result<()>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()>;

    async fn click(&self, element: &ElementRef) -> Result<ClickOutcome>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;

    async fn quit(&self) -> Result<()>;

    /// Polls [`find`](Self::find) until the element shows up or `timeout` elapses.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<Option<ElementRef>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(locator).await? {
                return Ok(Some(element));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
