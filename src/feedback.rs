//! Turns validation messages rendered by the target page into corrected
//! field values.
//!
//! Three message shapes are understood, tried in order for each message:
//!
//! - `"<Field> must match <template>"`, where `#` in the template is one digit
//! - `"<Field> must be at most <N> characters"`
//! - `"<Field> must be <N> digits"`
//!
//! Anything else is ignored.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::generate::ValueGenerator;
use crate::schema::FillLog;
use crate::surface::{attr_selector, BrowserSurface};

const PATTERN_TOKEN: &str = "must match";

/// Longest value a correction may produce. Lengths and templates read from
/// the page above this are rejected.
pub const MAX_CORRECTION_LEN: usize = 1024;

/// Texts of the outermost elements rendered in pure red.
const ERROR_TEXT_JS: &str = r#"els => {
    const red = el => getComputedStyle(el).color === 'rgb(255, 0, 0)';
    return els
        .filter(el => red(el) && !(el.parentElement && red(el.parentElement)))
        .map(el => el.innerText || el.textContent || '');
}"#;

static MAX_LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?P<field>.+?)\s+must be at most\s+(?P<n>\d+)\s+characters?\b")
        .expect("static pattern")
});

static DIGIT_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?P<field>.+?)\s+must be\s+(?P<n>\d+)\s+digits?\b").expect("static pattern")
});

/// What a validation message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Template where `#` stands for one digit.
    Pattern(String),
    MaxLength(usize),
    DigitCount(usize),
}

/// One parsed validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field_name: String,
    pub violation: Violation,
}

/// Parse a single rendered message. `None` when no rule recognizes it.
pub fn parse_message(message: &str) -> Option<ValidationError> {
    let message = message.trim();
    if message.is_empty() {
        return None;
    }

    if let Some((field, template)) = message.split_once(PATTERN_TOKEN) {
        return Some(ValidationError {
            field_name: field_key(field),
            violation: Violation::Pattern(template.trim().to_string()),
        });
    }

    if let Some((field, n)) = capture(&MAX_LENGTH, message) {
        return Some(ValidationError {
            field_name: field,
            violation: Violation::MaxLength(n),
        });
    }

    if let Some((field, n)) = capture(&DIGIT_COUNT, message) {
        return Some(ValidationError {
            field_name: field,
            violation: Violation::DigitCount(n),
        });
    }

    None
}

fn capture(re: &Regex, message: &str) -> Option<(String, usize)> {
    let caps = re.captures(message)?;
    let n = caps.name("n")?.as_str().parse().ok()?;
    Some((field_key(caps.name("field")?.as_str()), n))
}

/// "Zip Code" -> "zip_code"
fn field_key(words: &str) -> String {
    words.trim().to_lowercase().replace(' ', "_")
}

/// Anchored regex for a `#` template: `#` is a digit, the rest is literal.
pub fn template_regex(template: &str) -> std::result::Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for c in template.chars() {
        if c == '#' {
            pattern.push_str(r"\d");
        } else {
            pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

/// Produce a value satisfying `error`.
pub fn synthesize<R: Rng>(error: &ValidationError, gen: &mut ValueGenerator<R>) -> Result<String> {
    let fail = |reason: String| Error::CorrectionError {
        field: error.field_name.clone(),
        reason,
    };

    if error.field_name.is_empty() {
        return Err(fail("message names no field".into()));
    }

    match &error.violation {
        Violation::Pattern(template) => {
            if template.is_empty() {
                return Err(fail("empty pattern".into()));
            }
            bounded(template.chars().count()).map_err(fail)?;
            let re = template_regex(template).map_err(|e| fail(e.to_string()))?;
            let value = gen.from_template(template);
            if !re.is_match(&value) {
                return Err(fail(format!("'{value}' does not match {}", re.as_str())));
            }
            Ok(value)
        }
        Violation::MaxLength(n) => Ok(gen.letters(bounded(*n).map_err(fail)?)),
        Violation::DigitCount(n) => Ok(gen.digits(bounded(*n).map_err(fail)?)),
    }
}

fn bounded(len: usize) -> std::result::Result<usize, String> {
    if len > MAX_CORRECTION_LEN {
        return Err(format!("requested length {len} exceeds {MAX_CORRECTION_LEN}"));
    }
    Ok(len)
}

/// Read every message currently rendered as an error, one entry per
/// non-empty line.
pub async fn collect_error_texts<S: BrowserSurface>(page: &S) -> Result<Vec<String>> {
    let raw = page.eval_on_selector_all("body *", ERROR_TEXT_JS).await?;
    let texts = match raw {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(Error::JsError(format!("unexpected error text payload: {other}")));
        }
    };
    Ok(texts
        .iter()
        .filter_map(Value::as_str)
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Apply corrections for `messages` through the page and record them in
/// `log`. Returns whether at least one field was corrected.
///
/// Corrections that cannot be synthesized or filled are dropped.
pub async fn apply_feedback<S, R>(
    page: &S,
    messages: &[String],
    log: &mut FillLog,
    gen: &mut ValueGenerator<R>,
) -> bool
where
    S: BrowserSurface,
    R: Rng + Send,
{
    let mut changed = false;

    for message in messages {
        let Some(error) = parse_message(message) else {
            debug!(%message, "unrecognized validation message");
            continue;
        };

        let value = match synthesize(&error, gen) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "dropping correction");
                continue;
            }
        };

        let selector = attr_selector("", "name", &error.field_name);
        match page.fill(&selector, &value).await {
            Ok(()) => {
                debug!(field = %error.field_name, violation = ?error.violation, %value, "corrected");
                log.record(error.field_name, value);
                changed = true;
            }
            Err(e) => {
                let e = Error::CorrectionError {
                    field: error.field_name,
                    reason: e.to_string(),
                };
                warn!(error = %e, "dropping correction");
            }
        }
    }

    changed
}
