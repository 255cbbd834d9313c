//! The browser capabilities the fill pipeline consumes.
//!
//! [`crate::Page`] implements these on top of chromiumoxide; tests drive the
//! pipeline with in-memory fakes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A located DOM element.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Value of an attribute, `None` when the attribute is absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Rendered text of the element.
    async fn inner_text(&self) -> Result<Option<String>>;

    /// Call a JavaScript function declaration with `this` bound to the element.
    async fn evaluate(&self, function: &str) -> Result<Value>;

    async fn click(&self) -> Result<()>;
}

/// A live page.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    type Element: ElementHandle;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn screenshot_to_file(&self, path: &Path) -> Result<()>;

    /// First element matching `selector`, if any.
    async fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Call `function` with the array of elements matching `selector`.
    async fn eval_on_selector_all(&self, selector: &str, function: &str) -> Result<Value>;

    /// Evaluate a page-level expression.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Replace the value of the control matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    async fn url(&self) -> Result<String>;

    /// Wait up to `timeout` for `selector` to match.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;
}

/// Attribute selector `tag[attr="value"]` with the value quoted for CSS.
/// Pass an empty `tag` to match any element.
pub fn attr_selector(tag: &str, attr: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{tag}[{attr}=\"{escaped}\"]")
}
