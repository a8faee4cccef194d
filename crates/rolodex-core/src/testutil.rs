//! Test utilities: mock implementations of the browser and geocoder seams.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::session::BrowserSession;
use crate::traits::{Coordinates, Geocoder};

// ---------------------------------------------------------------------------
// MockElement / MockPage
// ---------------------------------------------------------------------------

/// A fake DOM element: text, attributes, and descendants keyed by selector.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub children: HashMap<String, MockElement>,
}

impl MockElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, selector: &str, child: MockElement) -> Self {
        self.children.insert(selector.to_string(), child);
        self
    }
}

/// A fake page: elements matched by exact selector string.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    elements: HashMap<String, Vec<MockElement>>,
    /// Clicking the selector navigates to the URL.
    click_targets: HashMap<String, String>,
    /// `goto` on this page lands somewhere else.
    redirect: Option<String>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element matching `selector`. Repeated calls add more matches.
    pub fn element(mut self, selector: &str, element: MockElement) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }

    pub fn on_click(mut self, selector: &str, url: &str) -> Self {
        self.click_targets
            .insert(selector.to_string(), url.to_string());
        let matches = self.elements.entry(selector.to_string()).or_default();
        if matches.is_empty() {
            matches.push(MockElement::default());
        }
        self
    }

    pub fn redirect_to(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    fn matches(&self, selector: &str) -> &[MockElement] {
        self.elements
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// MockSession
// ---------------------------------------------------------------------------

/// Mock browser tab over a set of [`MockPage`]s keyed by URL.
///
/// `evaluate` answers `document.readyState` with `complete` and any script
/// mentioning `scrollHeight` with the next configured height (the last one
/// repeats). Other scripts return `null`.
#[derive(Clone, Default)]
pub struct MockSession {
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    current: Arc<Mutex<Option<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    heights: Arc<Mutex<Vec<i64>>>,
    pub visits: Arc<Mutex<Vec<String>>>,
    pub clicks: Arc<Mutex<Vec<String>>>,
    pub typed: Arc<Mutex<Vec<(String, String)>>>,
    pub scripts: Arc<Mutex<Vec<String>>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: MockPage) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), page);
        self
    }

    /// Make `goto(url)` fail with a navigation error.
    pub fn failing(self, url: &str) -> Self {
        self.failing.lock().unwrap().insert(url.to_string());
        self
    }

    /// Page heights reported to scroll scripts, in call order.
    pub fn with_heights(self, heights: Vec<i64>) -> Self {
        *self.heights.lock().unwrap() = heights;
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    fn with_current<T>(
        &self,
        f: impl FnOnce(&MockPage) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let current = self.current.lock().unwrap().clone();
        let url = current.ok_or_else(|| AppError::BrowserError("no page loaded".into()))?;
        let pages = self.pages.lock().unwrap();
        match pages.get(&url) {
            Some(page) => f(page),
            None => f(&MockPage::default()),
        }
    }

    fn first(&self, selector: &str) -> Result<MockElement, AppError> {
        self.with_current(|page| {
            page.matches(selector)
                .first()
                .cloned()
                .ok_or_else(|| AppError::ElementNotFound(selector.to_string()))
        })
    }

    fn next_height(&self) -> i64 {
        let mut heights = self.heights.lock().unwrap();
        match heights.len() {
            0 => 1000,
            1 => heights[0],
            _ => heights.remove(0),
        }
    }
}

impl BrowserSession for MockSession {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        self.visits.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(AppError::NavigationError(format!(
                "net::ERR_CONNECTION_RESET at {url}"
            )));
        }
        let landing = self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .and_then(|p| p.redirect.clone())
            .unwrap_or_else(|| url.to_string());
        *self.current.lock().unwrap() = Some(landing);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::BrowserError("no page loaded".into()))
    }

    async fn text(&self, selector: &str) -> Result<String, AppError> {
        self.first(selector).map(|e| e.text)
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, AppError> {
        self.with_current(|page| {
            Ok(page
                .matches(selector)
                .iter()
                .map(|e| e.text.clone())
                .collect())
        })
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, AppError> {
        self.first(selector).map(|e| e.attributes.get(name).cloned())
    }

    async fn child_texts(
        &self,
        container: &str,
        child: &str,
    ) -> Result<Vec<Option<String>>, AppError> {
        self.with_current(|page| {
            Ok(page
                .matches(container)
                .iter()
                .map(|e| e.children.get(child).map(|c| c.text.clone()))
                .collect())
        })
    }

    async fn child_attributes(
        &self,
        container: &str,
        child: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, AppError> {
        self.with_current(|page| {
            Ok(page
                .matches(container)
                .iter()
                .map(|e| {
                    e.children
                        .get(child)
                        .and_then(|c| c.attributes.get(name).cloned())
                })
                .collect())
        })
    }

    async fn click(&self, selector: &str) -> Result<(), AppError> {
        let target = self.with_current(|page| {
            if page.matches(selector).is_empty() {
                return Err(AppError::ElementNotFound(selector.to_string()));
            }
            Ok(page.click_targets.get(selector).cloned())
        })?;
        self.clicks.lock().unwrap().push(selector.to_string());
        if let Some(url) = target {
            *self.current.lock().unwrap() = Some(url);
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AppError> {
        self.first(selector)?;
        self.typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        self.with_current(|_| Ok(()))?;
        self.scripts.lock().unwrap().push(script.to_string());
        if script.contains("readyState") {
            Ok(serde_json::json!("complete"))
        } else if script.contains("scrollHeight") {
            Ok(serde_json::json!(self.next_height()))
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(5)
    }
}

// ---------------------------------------------------------------------------
// MockGeocoder
// ---------------------------------------------------------------------------

/// Mock geocoder with canned answers per location string.
#[derive(Clone, Default)]
pub struct MockGeocoder {
    answers: Arc<Mutex<HashMap<String, Coordinates>>>,
    /// Errors returned (once each, in order) before answering normally.
    errors: Arc<Mutex<Vec<AppError>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, location: &str, coords: Coordinates) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(location.to_string(), coords);
        self
    }

    pub fn with_errors(self, errors: Vec<AppError>) -> Self {
        *self.errors.lock().unwrap() = errors;
        self
    }
}

impl Geocoder for MockGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, AppError> {
        self.calls.lock().unwrap().push(location.to_string());
        {
            let mut errors = self.errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }
        Ok(self.answers.lock().unwrap().get(location).copied())
    }
}
