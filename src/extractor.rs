//! Reads the fillable controls of the current document.

use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{FieldSchema, FormSchema};
use crate::surface::{attr_selector, BrowserSurface, ElementHandle};

pub const CONTROL_SELECTOR: &str = "input, select, textarea";

pub(crate) const TAG_NAME_JS: &str = "function() { return this.tagName.toLowerCase(); }";
pub(crate) const CLOSEST_LABEL_JS: &str =
    "function() { const l = this.closest('label'); return l ? l.textContent : null; }";
const FORM_ACTION_JS: &str = "document.forms[0] ? document.forms[0].action : null";

/// Extract a [`FormSchema`] from the page. Any failure aborts the extraction.
pub async fn extract_form_schema<S: BrowserSurface>(page: &S) -> Result<FormSchema> {
    let elements = page
        .query_selector_all(CONTROL_SELECTOR)
        .await
        .map_err(extraction)?;

    let mut fields = Vec::with_capacity(elements.len());
    for el in &elements {
        fields.push(inspect(page, el).await.map_err(extraction)?);
    }

    let action = page
        .evaluate(FORM_ACTION_JS)
        .await
        .map_err(extraction)?
        .as_str()
        .map(str::to_string);

    debug!(fields = fields.len(), ?action, "form schema extracted");
    Ok(FormSchema { action, fields })
}

async fn inspect<S: BrowserSurface>(page: &S, el: &S::Element) -> Result<FieldSchema> {
    let tag = el
        .evaluate(TAG_NAME_JS)
        .await?
        .as_str()
        .map(str::to_lowercase)
        .ok_or_else(|| Error::ExtractionError("element has no tag name".into()))?;

    let html_type = non_empty(el.attribute("type").await?).unwrap_or_else(|| tag.clone());
    let id = non_empty(el.attribute("id").await?);
    let name = match non_empty(el.attribute("name").await?) {
        Some(name) => name,
        None => id.clone().unwrap_or_else(|| tag.clone()),
    };
    let label = find_label(page, el, id.as_deref()).await?;

    Ok(FieldSchema {
        name,
        label,
        html_type,
        tag,
        constraints: Default::default(),
    })
}

/// `label[for=id]`, then `aria-label`, then the enclosing `<label>`.
async fn find_label<S: BrowserSurface>(
    page: &S,
    el: &S::Element,
    id: Option<&str>,
) -> Result<Option<String>> {
    if let Some(id) = id {
        if let Some(label) = page.query_selector(&attr_selector("label", "for", id)).await? {
            if let Some(text) = trimmed(label.inner_text().await?) {
                return Ok(Some(text));
            }
        }
    }

    if let Some(aria) = trimmed(el.attribute("aria-label").await?) {
        return Ok(Some(aria));
    }

    let enclosing = el.evaluate(CLOSEST_LABEL_JS).await?;
    Ok(trimmed(enclosing.as_str().map(str::to_string)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn extraction(e: Error) -> Error {
    match e {
        Error::ExtractionError(_) => e,
        other => Error::ExtractionError(other.to_string()),
    }
}
