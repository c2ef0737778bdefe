//! Page-automation capability.
//!
//! The listing pipeline only ever talks to a browser through these traits, so
//! the rendering engine behind them can be swapped (CDP in production, a
//! scripted double in tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// How to find an element on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Locator {
    /// CSS selector, may contain a selector list (`a.x, button.x`).
    Css { selector: String },
    /// Raw XPath expression.
    #[serde(rename = "xpath")]
    XPath { expr: String },
    /// First `tag` element whose normalized text contains `contains`.
    Text { tag: String, contains: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath { expr: expr.into() }
    }

    pub fn text(tag: impl Into<String>, contains: impl Into<String>) -> Self {
        Self::Text {
            tag: tag.into(),
            contains: contains.into(),
        }
    }

    /// Text locators are evaluated as XPath.
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Self::Css { .. } => None,
            Self::XPath { expr } => Some(expr.clone()),
            Self::Text { tag, contains } => Some(format!(
                "//{}[contains(normalize-space(.), {})]",
                tag,
                xpath_literal(contains)
            )),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "css({})", selector),
            Self::XPath { expr } => write!(f, "xpath({})", expr),
            Self::Text { tag, contains } => write!(f, "text({} ~ '{}')", tag, contains),
        }
    }
}

/// Quote a string for use inside an XPath expression.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Opaque reference to an element on a live page. Only valid for the page
/// that produced it and only until that page navigates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// One live page in an automation session.
#[async_trait]
pub trait Page: Send {
    /// Navigate and wait for the load event.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>>;

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    /// Poll until the element exists, is displayed and is enabled.
    /// Returns `Error::Timeout` when `timeout` elapses first.
    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle>;

    /// Poll until the element exists and is displayed.
    async fn wait_until_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle>;

    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    /// Rendered text of the element.
    async fn text(&mut self, element: &ElementHandle) -> Result<String>;

    /// Property (falling back to attribute) value, `None` when unset.
    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    async fn is_displayed(&mut self, element: &ElementHandle) -> Result<bool>;

    async fn clear(&mut self, element: &ElementHandle) -> Result<()>;

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Release the session backing this page.
    async fn close(self: Box<Self>);
}

/// Source of automation sessions. Each `open` yields an independent page the
/// caller must `close`.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, session_name: &str) -> Result<Box<dyn Page>>;
}
