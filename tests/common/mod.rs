//! In-memory page used to drive the pipeline without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use formpilot::{BrowserSurface, ElementHandle, Error, Result};
use serde_json::{json, Value};

pub type Validator = Arc<dyn Fn(&HashMap<String, String>) -> Vec<String> + Send + Sync>;

const UNFILLABLE_TYPES: &[&str] = &["checkbox", "radio", "file", "image", "reset", "submit", "button"];

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Default)]
pub struct Control {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub enclosing_label: Option<String>,
    pub options: Vec<String>,
}

impl Control {
    pub fn input(name: &str, html_type: &str) -> Self {
        Self::bare("input").attr("name", name).attr("type", html_type)
    }

    pub fn select(name: &str, options: &[&str]) -> Self {
        let mut control = Self::bare("select").attr("name", name);
        control.options = options.iter().map(|o| o.to_string()).collect();
        control
    }

    pub fn bare(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn readonly(self) -> Self {
        self.attr("readonly", "")
    }

    pub fn within_label(mut self, text: &str) -> Self {
        self.enclosing_label = Some(text.to_string());
        self
    }

    fn get(&self, key: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Next,
    Submit,
    Plain,
}

#[derive(Debug, Clone)]
pub struct Button {
    pub text: Option<String>,
    pub value: Option<String>,
    pub submit_input: bool,
    pub kind: ButtonKind,
}

impl Button {
    pub fn next() -> Self {
        Self::labelled("Next", ButtonKind::Next)
    }

    pub fn submit() -> Self {
        Self::labelled("Submit", ButtonKind::Submit)
    }

    /// `<input type=submit value=...>`
    pub fn submit_input(value: &str) -> Self {
        Self {
            text: None,
            value: Some(value.to_string()),
            submit_input: true,
            kind: ButtonKind::Submit,
        }
    }

    pub fn labelled(text: &str, kind: ButtonKind) -> Self {
        Self {
            text: Some(text.to_string()),
            value: None,
            submit_input: false,
            kind,
        }
    }
}

#[derive(Default, Clone)]
pub struct Step {
    pub controls: Vec<Control>,
    pub buttons: Vec<Button>,
}

struct State {
    steps: Vec<Step>,
    step: usize,
    labels: Vec<(String, String)>,
    validator: Validator,
    filled: HashMap<String, String>,
    errors: Vec<String>,
    url: String,
    url_on_success: Option<String>,
    selector_on_success: Option<String>,
    present: Vec<String>,
    navigations: Vec<String>,
    submit_clicks: usize,
}

#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<State>>,
}

impl FakePage {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                steps,
                step: 0,
                labels: Vec::new(),
                validator: Arc::new(|_| Vec::new()),
                filled: HashMap::new(),
                errors: Vec::new(),
                url: "about:blank".to_string(),
                url_on_success: None,
                selector_on_success: None,
                present: Vec::new(),
                navigations: Vec::new(),
                submit_clicks: 0,
            })),
        }
    }

    /// One step holding `controls` and a "Submit" button.
    pub fn single(controls: Vec<Control>) -> Self {
        Self::new(vec![Step {
            controls,
            buttons: vec![Button::submit()],
        }])
    }

    pub fn with_label(self, for_id: &str, text: &str) -> Self {
        self.lock().labels.push((for_id.to_string(), text.to_string()));
        self
    }

    /// Messages rendered in red after each submit, given the current values.
    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&HashMap<String, String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.lock().validator = Arc::new(validator);
        self
    }

    pub fn on_success_show(self, selector: &str) -> Self {
        self.lock().selector_on_success = Some(selector.to_string());
        self
    }

    pub fn on_success_go_to(self, url: &str) -> Self {
        self.lock().url_on_success = Some(url.to_string());
        self
    }

    pub fn submit_clicks(&self) -> usize {
        self.lock().submit_clicks
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn value_of(&self, name: &str) -> Option<String> {
        self.lock().filled.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake page lock poisoned")
    }

    fn element(&self, kind: Kind) -> FakeElement {
        FakeElement {
            state: Arc::clone(&self.state),
            kind,
        }
    }
}

#[derive(Clone)]
enum Kind {
    Control(Control),
    Label(String),
    Button(Button),
}

#[derive(Clone)]
pub struct FakeElement {
    state: Arc<Mutex<State>>,
    kind: Kind,
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(match &self.kind {
            Kind::Control(c) => c.get(name),
            Kind::Button(b) if name == "value" => b.value.clone(),
            _ => None,
        })
    }

    async fn inner_text(&self) -> Result<Option<String>> {
        Ok(match &self.kind {
            Kind::Label(text) => Some(text.clone()),
            Kind::Button(b) => b.text.clone(),
            Kind::Control(_) => None,
        })
    }

    async fn evaluate(&self, function: &str) -> Result<Value> {
        let Kind::Control(c) = &self.kind else {
            return Ok(Value::Null);
        };
        if function.contains("tagName") {
            return Ok(json!(c.tag));
        }
        if function.contains("closest") {
            return Ok(c.enclosing_label.clone().map_or(Value::Null, Value::String));
        }
        Err(Error::JsError(format!("unsupported script: {function}")))
    }

    async fn click(&self) -> Result<()> {
        let Kind::Button(button) = &self.kind else {
            return Ok(());
        };
        let mut state = self.state.lock().expect("fake page lock poisoned");
        match button.kind {
            ButtonKind::Next => {
                state.step += 1;
                state.errors.clear();
            }
            ButtonKind::Submit => {
                state.submit_clicks += 1;
                let errors = (state.validator)(&state.filled);
                if errors.is_empty() {
                    if let Some(selector) = state.selector_on_success.clone() {
                        state.present.push(selector);
                    }
                    if let Some(url) = state.url_on_success.clone() {
                        state.url = url;
                    }
                }
                state.errors = errors;
            }
            ButtonKind::Plain => {}
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSurface for FakePage {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn screenshot_to_file(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, PNG_MAGIC).await?;
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<FakeElement>> {
        let state = self.lock();
        if let Some(id) = quoted_after(selector, "label[for=") {
            let label = state
                .labels
                .iter()
                .find(|(for_id, _)| *for_id == id)
                .map(|(_, text)| Kind::Label(text.clone()));
            return Ok(label.map(|kind| self.element(kind)));
        }
        if selector == "input[type=submit]" {
            let button = current(&state)
                .buttons
                .iter()
                .find(|b| b.submit_input)
                .cloned();
            return Ok(button.map(|b| self.element(Kind::Button(b))));
        }
        Ok(None)
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<FakeElement>> {
        let state = self.lock();
        let step = current(&state);
        if selector == "input, select, textarea" {
            return Ok(step
                .controls
                .iter()
                .cloned()
                .map(|c| self.element(Kind::Control(c)))
                .collect());
        }
        if selector.starts_with("button") {
            return Ok(step
                .buttons
                .iter()
                .cloned()
                .map(|b| self.element(Kind::Button(b)))
                .collect());
        }
        Ok(Vec::new())
    }

    async fn eval_on_selector_all(&self, selector: &str, function: &str) -> Result<Value> {
        let state = self.lock();
        if selector == "body *" {
            return Ok(json!(state.errors));
        }
        if selector.starts_with("button") {
            let needle = quoted_after(function, "const needle = ")
                .ok_or_else(|| Error::JsError(format!("unsupported script: {function}")))?;
            let index = current(&state).buttons.iter().position(|b| {
                let shown = b
                    .text
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| b.value.clone())
                    .unwrap_or_default();
                shown.to_lowercase().contains(&needle)
            });
            return Ok(index.map_or(json!(-1), |i| json!(i)));
        }
        if selector.ends_with(" option") {
            let name = quoted_after(selector, "name=").unwrap_or_default();
            let options = current(&state)
                .controls
                .iter()
                .find(|c| c.get("name").as_deref() == Some(name.as_str()))
                .map(|c| c.options.clone())
                .unwrap_or_default();
            return Ok(json!(options));
        }
        Ok(json!([]))
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let control = find_control(&state, selector)?;
        if control.get("readonly").is_some() {
            return Err(Error::JsError("Element is read-only".into()));
        }
        let html_type = control.get("type").unwrap_or_default();
        if control.tag == "input" && UNFILLABLE_TYPES.contains(&html_type.as_str()) {
            return Err(Error::JsError(format!("Input of type {html_type} cannot be filled")));
        }
        let name = control.get("name").unwrap_or_default();
        state.filled.insert(name, value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let control = find_control(&state, selector)?;
        if !control.options.iter().any(|o| o == value) {
            return Err(Error::JsError(format!("No option with value {value}")));
        }
        let name = control.get("name").unwrap_or_default();
        state.filled.insert(name, value.to_string());
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.lock().present.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(Error::Timeout(format!("Timed out waiting for selector: {selector}")))
        }
    }
}

fn current(state: &State) -> &Step {
    static EMPTY: Step = Step {
        controls: Vec::new(),
        buttons: Vec::new(),
    };
    state.steps.get(state.step).unwrap_or(&EMPTY)
}

fn find_control(state: &State, selector: &str) -> Result<Control> {
    let name = quoted_after(selector, "name=")
        .ok_or_else(|| Error::ElementNotFound(selector.to_string()))?;
    current(state)
        .controls
        .iter()
        .find(|c| c.get("name").as_deref() == Some(name.as_str()))
        .cloned()
        .ok_or_else(|| Error::ElementNotFound(selector.to_string()))
}

/// The double-quoted value following `marker`, e.g. `name="email"`.
fn quoted_after(selector: &str, marker: &str) -> Option<String> {
    let start = selector.find(marker)? + marker.len();
    let rest = selector[start..].strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}
