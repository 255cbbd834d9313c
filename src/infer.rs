//! Field type inference.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::FieldSchema;

/// Semantic classification of a field, driving value synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Email,
    Phone,
    Name,
    Date,
    Zip,
    Password,
    Select,
    Text,
}

impl LogicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalType::Email => "email",
            LogicalType::Phone => "phone",
            LogicalType::Name => "name",
            LogicalType::Date => "date",
            LogicalType::Zip => "zip",
            LogicalType::Password => "password",
            LogicalType::Select => "select",
            LogicalType::Text => "text",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name/label patterns, tested in this order. The patterns overlap
/// ("username" vs "name"), so the order is part of the contract.
static TYPE_PATTERNS: Lazy<Vec<(LogicalType, Regex)>> = Lazy::new(|| {
    [
        (LogicalType::Email, r"(?i)email"),
        (LogicalType::Phone, r"(?i)phone|tel|mobile"),
        (LogicalType::Name, r"(?i)name"),
        (LogicalType::Date, r"(?i)date"),
        (LogicalType::Zip, r"(?i)zip|postal"),
        (LogicalType::Password, r"(?i)password"),
    ]
    .into_iter()
    .map(|(ty, pattern)| (ty, Regex::new(pattern).expect("static pattern")))
    .collect()
});

/// Classify `field`. Total and deterministic.
pub fn infer_type(field: &FieldSchema) -> LogicalType {
    match field.html_type.to_lowercase().as_str() {
        "email" => return LogicalType::Email,
        "tel" => return LogicalType::Phone,
        "date" => return LogicalType::Date,
        "password" => return LogicalType::Password,
        _ => {}
    }

    let haystack = [Some(field.name.as_str()), field.label.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if let Some((ty, _)) = TYPE_PATTERNS.iter().find(|(_, re)| re.is_match(&haystack)) {
        return *ty;
    }

    if field.tag == "select" {
        return LogicalType::Select;
    }
    LogicalType::Text
}
