use async_trait::async_trait;
use chromiumoxide::element::Element as CrElement;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::surface::ElementHandle;

/// Wrapper around a chromiumoxide Element.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying chromiumoxide Element.
    pub fn inner(&self) -> &CrElement {
        &self.inner
    }
}

#[async_trait]
impl ElementHandle for Element {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.inner.attribute(name).await.map_err(Error::CdpError)
    }

    async fn inner_text(&self) -> Result<Option<String>> {
        self.inner.inner_text().await.map_err(Error::CdpError)
    }

    async fn evaluate(&self, function: &str) -> Result<Value> {
        let returns = self
            .inner
            .call_js_fn(function, false)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(returns.result.value.unwrap_or(Value::Null))
    }

    /// Scrolls into view first.
    async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(Error::CdpError)?;
        Ok(())
    }
}
