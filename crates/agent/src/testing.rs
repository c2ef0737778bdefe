//! Scripted in-memory automation double.

use async_trait::async_trait;
use rentwatch_core::{Browser, ElementHandle, Error, Locator, Page, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub id: String,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub hidden: bool,
}

impl FakeElement {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub open_error: bool,
    pub navigate_error: bool,
    pub elements: HashMap<Locator, Vec<FakeElement>>,
    /// Lookups of these locators fail with an automation error.
    pub broken: HashSet<Locator>,
    /// Clicking these element ids fails.
    pub broken_clicks: HashSet<String>,
    pub calls: Vec<String>,
    pub opened: usize,
    pub closed: usize,
}

impl FakeState {
    fn element_mut(&mut self, id: &str) -> Result<&mut FakeElement> {
        self.elements
            .values_mut()
            .flat_map(|v| v.iter_mut())
            .find(|e| e.id == id)
            .ok_or_else(|| Error::ElementNotFound(format!("stale element {}", id)))
    }

    fn lookup(&mut self, locator: &Locator) -> Result<Vec<FakeElement>> {
        if self.broken.contains(locator) {
            return Err(Error::Automation(format!("lookup of {} blew up", locator)));
        }
        Ok(self.elements.get(locator).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, locator: Locator, element: FakeElement) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .entry(locator)
            .or_default()
            .push(element);
        self
    }

    pub fn without(self, locator: &Locator) -> Self {
        self.state.lock().unwrap().elements.remove(locator);
        self
    }

    pub fn broken(self, locator: Locator) -> Self {
        self.state.lock().unwrap().broken.insert(locator);
        self
    }

    pub fn broken_click(self, id: &str) -> Self {
        self.state.lock().unwrap().broken_clicks.insert(id.to_string());
        self
    }

    pub fn navigate_fails(self) -> Self {
        self.state.lock().unwrap().navigate_error = true;
        self
    }

    pub fn open_fails(self) -> Self {
        self.state.lock().unwrap().open_error = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn value_of(&self, id: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        state
            .element_mut(id)
            .ok()
            .and_then(|e| e.attrs.get("value").cloned())
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self, session_name: &str) -> Result<Box<dyn Page>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("open:{}", session_name));
        if state.open_error {
            return Err(Error::Automation("connection refused".to_string()));
        }
        state.opened += 1;
        Ok(Box::new(FakePage {
            state: self.state.clone(),
        }))
    }
}

pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    fn wait_until(&mut self, kind: &str, locator: &Locator) -> Result<ElementHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{}:{}", kind, locator));
        let found = state.lookup(locator)?;
        match found.into_iter().find(|e| !e.hidden) {
            Some(e) => Ok(ElementHandle(e.id)),
            None => Err(Error::Timeout(format!("{} not ready", locator))),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("navigate:{}", url));
        if state.navigate_error {
            return Err(Error::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {}", url)));
        }
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("find:{}", locator));
        let found = state.lookup(locator)?;
        Ok(found.into_iter().next().map(|e| ElementHandle(e.id)))
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("find_all:{}", locator));
        let found = state.lookup(locator)?;
        Ok(found.into_iter().map(|e| ElementHandle(e.id)).collect())
    }

    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<ElementHandle> {
        self.wait_until("clickable", locator)
    }

    async fn wait_until_visible(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<ElementHandle> {
        self.wait_until("visible", locator)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click:{}", element.0));
        if state.broken_clicks.contains(&element.0) {
            return Err(Error::Automation(format!("{} is detached", element.0)));
        }
        Ok(())
    }

    async fn text(&mut self, element: &ElementHandle) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        Ok(state.element_mut(&element.0)?.text.clone())
    }

    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.element_mut(&element.0)?.attrs.get(name).cloned())
    }

    async fn is_displayed(&mut self, element: &ElementHandle) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(!state.element_mut(&element.0)?.hidden)
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("clear:{}", element.0));
        state
            .element_mut(&element.0)?
            .attrs
            .insert("value".to_string(), String::new());
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("send_keys:{}", element.0));
        let el = state.element_mut(&element.0)?;
        let current = el.attrs.get("value").cloned().unwrap_or_default();
        el.attrs
            .insert("value".to_string(), format!("{}{}", current, text));
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("close".to_string());
        state.closed += 1;
    }
}
