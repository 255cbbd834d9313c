use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Constraint key holding the live option values of a `<select>`.
pub const OPTIONS: &str = "options";

/// A constraint value: a single hint or an enumerated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Text(String),
    List(Vec<String>),
}

/// One discovered form control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field identifier: name attribute, else id, else tag name.
    pub name: String,
    pub label: Option<String>,
    pub html_type: String,
    /// `input`, `select` or `textarea`.
    pub tag: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, html_type: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            html_type: html_type.into(),
            tag: tag.into(),
            constraints: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_options(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_options(&mut self, options: Vec<String>) {
        self.constraints.insert(OPTIONS.to_string(), Constraint::List(options));
    }

    /// Enumerated select options, empty when none were recorded.
    pub fn options(&self) -> &[String] {
        match self.constraints.get(OPTIONS) {
            Some(Constraint::List(options)) => options,
            _ => &[],
        }
    }
}

/// Snapshot of the fillable controls on one page or wizard step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub action: Option<String>,
    pub fields: Vec<FieldSchema>,
}

/// Values written during a run, keyed by field identifier. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillLog(BTreeMap<String, String>);

impl FillLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write the log as a pretty-printed JSON object.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_round_through_constraints() {
        let field = FieldSchema::new("country", "select", "select").with_options(["de", "fr"]);
        assert_eq!(field.options(), ["de".to_string(), "fr".to_string()]);
        assert!(FieldSchema::new("x", "text", "input").options().is_empty());
    }

    #[test]
    fn fill_log_serializes_as_flat_object() {
        let mut log = FillLog::new();
        log.record("email", "first@example.com");
        log.record("email", "second@example.com");
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json, serde_json::json!({"email": "second@example.com"}));
    }
}
