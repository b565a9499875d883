//! In-memory page used by the controller and pipeline tests.
//!
//! Elements form a flat arena with parent links. Clicking an element applies
//! its scripted actions (cycling through the script on repeated clicks), so
//! tests can model disclosures, lightboxes and "next" controls.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_capture::renderer::{
    text_contains, ElementHandle, Locator, NavigationResult, PageDriver, PdfOptions, Renderer,
    Selector,
};
use listing_capture::DriverError;

/// A state change triggered by a click.
#[derive(Debug, Clone)]
pub enum Action {
    Show(usize),
    Hide(usize),
    SetAttr(usize, String, String),
    RemoveAttr(usize, String),
    Remove(usize),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub visible: bool,
    pub parent: Option<usize>,
    pub removed: bool,
    pub on_click: Vec<Vec<Action>>,
    pub clicks: usize,
    /// Detached right after a query returns it.
    pub detach_on_query: bool,
    /// Detached right after a visibility check reports it visible.
    pub detach_on_check: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            parent: None,
            removed: false,
            on_click: Vec::new(),
            clicks: 0,
            detach_on_query: false,
            detach_on_check: false,
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child_of(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Models a re-render between finding an element and reading it.
    pub fn detached_on_query(mut self) -> Self {
        self.detach_on_query = true;
        self
    }

    /// Models a re-render between the visibility check and the click.
    pub fn detached_on_check(mut self) -> Self {
        self.detach_on_check = true;
        self
    }

    fn attribute(&self, name: &str) -> Option<String> {
        if name == "class" {
            return (!self.classes.is_empty()).then(|| self.classes.join(" "));
        }
        self.attrs.get(name).cloned()
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub elements: Vec<FakeElement>,
    pub navigations: Vec<String>,
    pub fail_navigation: bool,
    pub queries: usize,
    /// Element indexes in click order.
    pub clicked: Vec<usize>,
    pub keys: Vec<String>,
    pub styles: Vec<String>,
    pub waits: Vec<Duration>,
    pub media_emulated: bool,
    pub closed: bool,
}

impl FakeState {
    fn matches(&self, idx: usize, selector: &Selector) -> bool {
        let el = &self.elements[idx];
        if el.removed {
            return false;
        }
        if let Some(tag) = &selector.tag {
            if &el.tag != tag {
                return false;
            }
        }
        if let Some(id) = &selector.id {
            if el.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if let Some(class) = &selector.class {
            if !el.classes.iter().any(|c| c == class) {
                return false;
            }
        }
        if !selector
            .attrs
            .iter()
            .all(|f| f.matches(el.attribute(&f.name).as_deref()))
        {
            return false;
        }
        if let Some(text) = &selector.text {
            if !text_contains(&self.text_content(idx), text) {
                return false;
            }
        }
        if let Some(scope) = &selector.within {
            let mut ancestor = el.parent;
            let mut found = false;
            while let Some(a) = ancestor {
                if self.matches(a, scope) {
                    found = true;
                    break;
                }
                ancestor = self.elements[a].parent;
            }
            if !found {
                return false;
            }
        }
        true
    }

    fn text_content(&self, idx: usize) -> String {
        let mut parts = vec![self.elements[idx].text.clone()];
        for (child, el) in self.elements.iter().enumerate() {
            if el.parent == Some(idx) && !el.removed {
                parts.push(self.text_content(child));
            }
        }
        parts.join(" ")
    }

    fn visible(&self, idx: usize) -> bool {
        let el = &self.elements[idx];
        if el.removed || !el.visible {
            return false;
        }
        match el.parent {
            Some(parent) => self.visible(parent),
            None => true,
        }
    }

    fn resolve(&self, handle: &ElementHandle) -> Result<usize, DriverError> {
        let idx: usize = handle
            .id()
            .parse()
            .map_err(|_| DriverError::Backend(format!("bad handle {}", handle.id())))?;
        match self.elements.get(idx) {
            Some(el) if !el.removed => Ok(idx),
            _ => Err(DriverError::StaleElement),
        }
    }

    fn apply(&mut self, action: &Action) {
        match action {
            Action::Show(i) => self.elements[*i].visible = true,
            Action::Hide(i) => self.elements[*i].visible = false,
            Action::SetAttr(i, name, value) => {
                self.elements[*i].attrs.insert(name.clone(), value.clone());
            }
            Action::RemoveAttr(i, name) => {
                self.elements[*i].attrs.remove(name);
            }
            Action::Remove(i) => self.elements[*i].removed = true,
        }
    }
}

/// Cloneable handle to one in-memory page. Clones share state.
#[derive(Clone, Default)]
pub struct FakePage {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element and return its index.
    pub fn add(&self, el: FakeElement) -> usize {
        let mut state = self.state.lock().unwrap();
        state.elements.push(el);
        state.elements.len() - 1
    }

    /// Script what happens on successive clicks of `idx`.
    pub fn on_click(&self, idx: usize, script: Vec<Vec<Action>>) {
        self.state.lock().unwrap().elements[idx].on_click = script;
    }

    pub fn fail_navigation(&self) {
        self.state.lock().unwrap().fail_navigation = true;
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicked.len()
    }

    pub fn clicks_on(&self, idx: usize) -> usize {
        self.state.lock().unwrap().elements[idx].clicks
    }

    pub fn queries(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn styles(&self) -> Vec<String> {
        self.state.lock().unwrap().styles.clone()
    }

    pub fn attr(&self, idx: usize, name: &str) -> Option<String> {
        self.state.lock().unwrap().elements[idx].attribute(name)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn boxed(&self) -> Box<dyn PageDriver> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.fail_navigation {
            return Err(DriverError::Timeout(timeout));
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        let found: Vec<usize> = (0..state.elements.len())
            .filter(|&i| locator.any_of.iter().any(|s| state.matches(i, s)))
            .collect();
        for &i in &found {
            if state.elements[i].detach_on_query {
                state.elements[i].removed = true;
            }
        }
        Ok(found
            .into_iter()
            .map(|i| ElementHandle::new(i.to_string()))
            .collect())
    }

    async fn attribute(
        &self,
        el: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.state.lock().unwrap();
        let idx = state.resolve(el)?;
        Ok(state.elements[idx].attribute(name))
    }

    async fn text(&self, el: &ElementHandle) -> Result<String, DriverError> {
        let state = self.state.lock().unwrap();
        let idx = state.resolve(el)?;
        Ok(state.text_content(idx))
    }

    async fn is_visible(&self, el: &ElementHandle, _timeout: Duration) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();
        let idx = state.resolve(el)?;
        let visible = state.visible(idx);
        if visible && state.elements[idx].detach_on_check {
            state.elements[idx].removed = true;
        }
        Ok(visible)
    }

    async fn click(&self, el: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let idx = state.resolve(el)?;
        state.clicked.push(idx);
        let n = state.elements[idx].clicks;
        state.elements[idx].clicks += 1;
        let script = &state.elements[idx].on_click;
        if !script.is_empty() {
            let actions = script[n % script.len()].clone();
            for action in &actions {
                state.apply(action);
            }
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    async fn add_style(&self, css: &str) -> Result<(), DriverError> {
        self.state.lock().unwrap().styles.push(css.to_string());
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        self.state.lock().unwrap().waits.push(duration);
    }

    async fn emulate_screen_media(&self) -> Result<(), DriverError> {
        self.state.lock().unwrap().media_emulated = true;
        Ok(())
    }

    async fn pdf(&self, _options: &PdfOptions) -> Result<Vec<u8>, DriverError> {
        Ok(b"%PDF-1.4 fake".to_vec())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, DriverError> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Renderer handing out one shared [`FakePage`].
pub struct FakeRenderer {
    pub page: FakePage,
    pub fail_new_page: bool,
    pub shut_down: Arc<AtomicBool>,
    pub opened: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            fail_new_page: false,
            shut_down: Arc::new(AtomicBool::new(false)),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if self.fail_new_page {
            return Err(DriverError::Backend("no browser".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.boxed())
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn active_pages(&self) -> usize {
        if self.page.is_closed() {
            0
        } else {
            self.opened.load(Ordering::SeqCst)
        }
    }
}
