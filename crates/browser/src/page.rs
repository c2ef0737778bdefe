//! `Page`/`Browser` implementations backed by CDP.
//!
//! Elements are addressed through remote object ids obtained from
//! `Runtime.evaluate`; all interactions go through `Runtime.callFunctionOn`
//! with `this` bound to the element.

use async_trait::async_trait;
use rentwatch_core::config::BrowserConfig;
use rentwatch_core::{Browser, ElementHandle, Error, Locator, Page, Paths, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::session::BrowserSession;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

const JS_IS_DISPLAYED: &str = concat!(
    "function() { var r = this.getBoundingClientRect();",
    " var s = window.getComputedStyle(this);",
    " return !!(r.width || r.height) && s.visibility !== 'hidden' && s.display !== 'none'; }"
);

const JS_IS_CLICKABLE: &str = concat!(
    "function() { var r = this.getBoundingClientRect();",
    " var s = window.getComputedStyle(this);",
    " return !!(r.width || r.height) && s.visibility !== 'hidden' && s.display !== 'none'",
    " && !this.disabled && s.pointerEvents !== 'none'; }"
);

const JS_CLICK: &str =
    "function() { this.scrollIntoView({block: 'center'}); this.click(); return true; }";

const JS_TEXT: &str = "function() { return this.innerText || this.textContent || ''; }";

const JS_ATTRIBUTE: &str = concat!(
    "function(name) { var v = this[name];",
    " if (v === undefined || v === null || typeof v === 'object' || typeof v === 'function') v = this.getAttribute(name);",
    " return (v === undefined || v === null) ? null : String(v); }"
);

const JS_CLEAR: &str = concat!(
    "function() { if ('value' in this) { this.value = ''; } else { this.textContent = ''; }",
    " this.dispatchEvent(new Event('input', {bubbles: true})); }"
);

const JS_FOCUS: &str = "function() { this.scrollIntoView({block: 'center'}); this.focus(); }";

const JS_DISPATCH_INPUT: &str = concat!(
    "function() { this.dispatchEvent(new Event('input', {bubbles: true}));",
    " this.dispatchEvent(new Event('change', {bubbles: true})); }"
);

/// JS expression evaluating to an array of the elements matched by `locator`.
fn locator_list_js(locator: &Locator) -> String {
    match locator {
        Locator::Css { selector } => format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(selector)
        ),
        other => {
            let xpath = other.to_xpath().unwrap_or_default();
            format!(
                concat!(
                    "(function() {{ var r = document.evaluate({}, document, null,",
                    " XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); var out = [];",
                    " for (var i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i));",
                    " return out; }})()"
                ),
                js_string(&xpath)
            )
        }
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn cdp_err(e: String) -> Error {
    Error::Automation(format!("CDP: {}", e))
}

/// Calls on a handle whose node was garbage-collected or navigated away.
fn element_err(element: &ElementHandle, e: String) -> Error {
    if e.contains("Could not find object with given id") {
        Error::ElementNotFound(format!("stale element handle {}", element.0))
    } else {
        cdp_err(e)
    }
}

/// One CDP-controlled page, owning its session.
pub struct CdpPage {
    session: BrowserSession,
    page_load_timeout: Duration,
}

impl CdpPage {
    pub fn new(session: BrowserSession, page_load_timeout: Duration) -> Self {
        Self {
            session,
            page_load_timeout,
        }
    }

    async fn call(&self, element: &ElementHandle, function: &str, args: Vec<Value>) -> Result<Value> {
        self.session
            .cdp
            .call_function_on(&element.0, function, args)
            .await
            .map_err(|e| element_err(element, e))
    }

    async fn check(&self, element: &ElementHandle, function: &str) -> Result<bool> {
        Ok(self.call(element, function, vec![]).await?.as_bool().unwrap_or(false))
    }

    async fn locate(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let js = format!("({})[0] || null", locator_list_js(locator));
        let object_id = self
            .session
            .cdp
            .evaluate_handle(&js)
            .await
            .map_err(cdp_err)?;
        Ok(object_id.map(ElementHandle))
    }

    /// First match of `locator` if it currently satisfies `condition`.
    async fn ready(&self, locator: &Locator, condition: &str) -> Result<Option<ElementHandle>> {
        let Some(element) = self.locate(locator).await? else {
            return Ok(None);
        };
        if self.check(&element, condition).await? {
            Ok(Some(element))
        } else {
            Ok(None)
        }
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
        condition: &str,
    ) -> Result<ElementHandle> {
        poll_until(locator, timeout, move || self.ready(locator, condition)).await
    }
}

/// Run `attempt` every `POLL_INTERVAL` until it yields an element or
/// `timeout` elapses. A slow attempt is cut off at the deadline, and an
/// element that goes stale mid-check counts as not ready yet.
async fn poll_until<T, F, Fut>(locator: &Locator, timeout: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, attempt()).await {
            Ok(Ok(Some(found))) => return Ok(found),
            Ok(Ok(None)) | Err(_) => {}
            Ok(Err(e)) if e.is_element_miss() => {
                debug!(locator = %locator, error = %e, "Element went stale while waiting");
            }
            Ok(Err(e)) => return Err(e),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout(format!(
                "{} not ready after {}ms",
                locator,
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.session
            .cdp
            .navigate(url, self.page_load_timeout)
            .await
            .map_err(Error::Navigation)
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
        self.locate(locator).await
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let list = locator_list_js(locator);
        let count = self
            .session
            .cdp
            .evaluate_js(&format!("({}).length", list))
            .await
            .map_err(cdp_err)?
            .as_u64()
            .unwrap_or(0);

        let mut elements = Vec::with_capacity(count as usize);
        for i in 0..count {
            let js = format!("({})[{}] || null", list, i);
            if let Some(id) = self.session.cdp.evaluate_handle(&js).await.map_err(cdp_err)? {
                elements.push(ElementHandle(id));
            }
        }
        debug!(locator = %locator, count = elements.len(), "Located elements");
        Ok(elements)
    }

    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        self.wait_for(locator, timeout, JS_IS_CLICKABLE).await
    }

    async fn wait_until_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        self.wait_for(locator, timeout, JS_IS_DISPLAYED).await
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.call(element, JS_CLICK, vec![]).await?;
        Ok(())
    }

    async fn text(&mut self, element: &ElementHandle) -> Result<String> {
        let value = self.call(element, JS_TEXT, vec![]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self.call(element, JS_ATTRIBUTE, vec![json!(name)]).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn is_displayed(&mut self, element: &ElementHandle) -> Result<bool> {
        self.check(element, JS_IS_DISPLAYED).await
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<()> {
        self.call(element, JS_CLEAR, vec![]).await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.call(element, JS_FOCUS, vec![]).await?;
        self.session.cdp.insert_text(text).await.map_err(cdp_err)?;
        // Dispatch input event for frameworks
        self.call(element, JS_DISPATCH_INPUT, vec![]).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        self.session.close().await;
    }
}

/// Opens one CDP session per `open` call, attaching to a running browser when
/// `debuggerAddress` is configured and launching a private one otherwise.
pub struct CdpBrowser {
    config: BrowserConfig,
    paths: Paths,
}

impl CdpBrowser {
    pub fn new(config: BrowserConfig, paths: Paths) -> Self {
        Self { config, paths }
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn open(&self, session_name: &str) -> Result<Box<dyn Page>> {
        let session = match &self.config.debugger_address {
            Some(address) => BrowserSession::attach(session_name, &self.config, address).await,
            None => {
                let profile = self.paths.browser_profile_dir(session_name);
                BrowserSession::launch(session_name, &self.config, &profile).await
            }
        }
        .map_err(cdp_err)?;

        Ok(Box::new(CdpPage::new(
            session,
            self.config.page_load_timeout(),
        )))
    }
}
