use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use serde_json::Value;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::surface::BrowserSurface;

/// Input types that cannot take typed text.
const UNFILLABLE_INPUT_TYPES: &str =
    "['checkbox', 'radio', 'file', 'image', 'reset', 'submit', 'button']";

/// Wrapper around a chromiumoxide Page exposing the [`BrowserSurface`]
/// capabilities.
pub struct Page {
    inner: CrPage,
}

impl Page {
    pub(crate) fn new(inner: CrPage) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        let els = self
            .inner
            .find_elements(selector)
            .await
            .map_err(|e| Error::ElementNotFound(format!("{selector}: {e}")))?;
        Ok(els.into_iter().map(Element::new).collect())
    }

    /// Run a control-mutating script; the script throws when the control is
    /// missing or cannot take input.
    async fn mutate_control(&self, selector: &str, value: &str, body: &str) -> Result<()> {
        let selector_js = js_string(selector)?;
        let value_js = js_string(value)?;
        let js = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector_js});
                if (!el) throw new Error('Element not found: ' + {selector_js});
                if (el.disabled) throw new Error('Element is disabled');
                if (el.readOnly) throw new Error('Element is read-only');
                if (el.type === 'hidden' || el.getClientRects().length === 0) {{
                    throw new Error('Element is not visible');
                }}
                const value = {value_js};
                {body}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }})()
            "#,
        );
        self.inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSurface for Page {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    async fn screenshot_to_file(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.inner
            .save_screenshot(params, path)
            .await
            .map_err(|e| Error::ScreenshotError(e.to_string()))?;
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        self.find_elements(selector).await
    }

    async fn eval_on_selector_all(&self, selector: &str, function: &str) -> Result<Value> {
        let selector_js = js_string(selector)?;
        let js = format!(
            "(() => {{ const f = ({function}); \
             return f(Array.from(document.querySelectorAll({selector_js}))); }})()"
        );
        self.evaluate(&js).await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Rejects inputs whose value is not typed text (checkboxes, buttons, ...).
    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let body = format!(
            "if (el.tagName === 'INPUT' && {UNFILLABLE_INPUT_TYPES}.includes(el.type)) {{ \
                 throw new Error('Input of type ' + el.type + ' cannot be filled'); \
             }} \
             el.focus(); el.value = value;"
        );
        self.mutate_control(selector, value, &body).await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.mutate_control(
            selector,
            value,
            "if (!Array.from(el.options || []).some(o => o.value === value)) { \
                 throw new Error('No option with value ' + value); \
             } \
             el.value = value;",
        )
        .await
    }

    async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Waits for a visible match, polling every 100ms.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let interval = Duration::from_millis(100);
        let start = Instant::now();
        let js = format!(
            "Array.from(document.querySelectorAll({})).some(el => \
                 el.getClientRects().length > 0 && getComputedStyle(el).visibility !== 'hidden')",
            js_string(selector)?
        );

        loop {
            let visible = self
                .evaluate(&js)
                .await
                .map(|v| v.as_bool().unwrap_or(false))
                .unwrap_or(false);
            if visible {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::Timeout(format!(
                    "Timed out waiting for selector: {selector}"
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }
}

fn js_string(raw: &str) -> Result<String> {
    Ok(serde_json::to_string(raw)?)
}
