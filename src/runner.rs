//! Drives a full run: navigate, fill (plus one "Next" step), submit,
//! correct from rendered validation errors, assert, write artifacts.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::config::{Assertions, BrowserConfig, RunConfig, RunOptions};
use crate::error::{Error, Result};
use crate::extractor::extract_form_schema;
use crate::feedback::{apply_feedback, collect_error_texts};
use crate::generate::ValueGenerator;
use crate::infer::{infer_type, LogicalType};
use crate::schema::{FieldSchema, FillLog};
use crate::surface::{attr_selector, BrowserSurface, ElementHandle};

pub const BEFORE_SNAPSHOT: &str = "before.png";
pub const AFTER_SNAPSHOT: &str = "after.png";
pub const LOG_FILE: &str = "log.json";

/// Controls searched when looking for a control by its visible text.
const CLICKABLE_SELECTOR: &str =
    "button, a, [role=button], input[type=submit], input[type=button]";
const SUBMIT_INPUT_SELECTOR: &str = "input[type=submit]";
const OPTION_VALUES_JS: &str = "opts => opts.map(o => o.value)";

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Navigated,
    StepFilled { step: u32 },
    SubmitAttempted { attempt: u32 },
    CorrectionRetry { attempt: u32 },
    Asserted,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Navigated => write!(f, "navigated"),
            RunState::StepFilled { step } => write!(f, "step {step} filled"),
            RunState::SubmitAttempted { attempt } => write!(f, "submit attempt {attempt}"),
            RunState::CorrectionRetry { attempt } => write!(f, "correction retry {attempt}"),
            RunState::Asserted => write!(f, "asserted"),
            RunState::Done => write!(f, "done"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of one best-effort field fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled(String),
    Skipped(String),
}

/// Runs the fill/submit/correct pipeline against one target.
pub struct FillRunner<R = StdRng> {
    options: RunOptions,
    values: ValueGenerator<R>,
    state: RunState,
    submit_clicks: u32,
}

impl FillRunner<StdRng> {
    pub fn new(options: RunOptions) -> Self {
        Self::with_rng(options, StdRng::from_entropy())
    }

    /// Deterministic values for a given seed.
    pub fn seeded(options: RunOptions, seed: u64) -> Self {
        Self::with_rng(options, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> FillRunner<R> {
    pub fn with_rng(options: RunOptions, rng: R) -> Self {
        Self {
            options,
            values: ValueGenerator::new(rng),
            state: RunState::Idle,
            submit_clicks: 0,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Submit clicks performed by the last run.
    pub fn submit_clicks(&self) -> u32 {
        self.submit_clicks
    }

    /// Launch Chrome, run against it, and close it again on every path.
    pub async fn run(&mut self, config: &RunConfig, browser_config: BrowserConfig) -> Result<FillLog> {
        let result = self.launch_and_run(config, browser_config).await;
        if result.is_err() {
            self.state = RunState::Aborted;
        }
        result
    }

    async fn launch_and_run(&mut self, config: &RunConfig, browser_config: BrowserConfig) -> Result<FillLog> {
        // refuse before a browser process exists
        config.validate_target()?;

        let browser = Browser::launch(browser_config).await?;
        let result = match browser.new_page().await {
            Ok(page) => self.run_on(&page, config).await,
            Err(e) => Err(e),
        };
        browser.close().await;
        result
    }

    /// Run against an already open page.
    pub async fn run_on<S: BrowserSurface>(&mut self, page: &S, config: &RunConfig) -> Result<FillLog> {
        self.state = RunState::Idle;
        self.submit_clicks = 0;

        let result = self.drive(page, config).await;
        if let Err(ref e) = result {
            warn!(error = %e, state = %self.state, "run aborted");
            self.state = RunState::Aborted;
        }
        result
    }

    async fn drive<S: BrowserSurface>(&mut self, page: &S, config: &RunConfig) -> Result<FillLog> {
        let target = config.validate_target()?;
        let artifacts = self.options.artifacts_dir.clone();
        tokio::fs::create_dir_all(&artifacts).await?;

        info!(url = %target, "navigating");
        page.goto(target).await?;
        page.screenshot_to_file(&artifacts.join(BEFORE_SNAPSHOT)).await?;
        self.transition(RunState::Navigated);

        let mut log = FillLog::new();
        self.fill_step(page, &mut log).await?;
        self.transition(RunState::StepFilled { step: 0 });

        if let Some(next) = find_by_text(page, "Next").await? {
            info!("following 'Next' to a second step");
            next.click().await?;
            self.fill_step(page, &mut log).await?;
            self.transition(RunState::StepFilled { step: 1 });
        }

        self.submit_with_corrections(page, &mut log).await?;

        if let Err(e) = self.check_assertions(page, &config.assertions).await {
            // after.png and log.json are only written for passing runs
            warn!(log = ?log, "fill log at assertion failure");
            return Err(e);
        }
        self.transition(RunState::Asserted);

        page.screenshot_to_file(&artifacts.join(AFTER_SNAPSHOT)).await?;
        log.write_to(artifacts.join(LOG_FILE)).await?;
        self.transition(RunState::Done);

        info!(fields = log.len(), submits = self.submit_clicks, "run complete");
        Ok(log)
    }

    /// Extract, infer, generate and fill every control of the current step.
    async fn fill_step<S: BrowserSurface>(&mut self, page: &S, log: &mut FillLog) -> Result<()> {
        let mut schema = extract_form_schema(page).await?;

        for field in schema.fields.iter_mut() {
            let ty = infer_type(field);
            let selector = field_selector(field);

            if field.tag == "select" {
                let options = option_values(page, &selector).await;
                field.set_options(options);
            }

            match self.fill_field(page, field, ty, &selector).await {
                FillOutcome::Filled(value) => {
                    debug!(field = %field.name, %ty, %value, "filled");
                    log.record(field.name.clone(), value);
                }
                FillOutcome::Skipped(reason) => {
                    debug!(field = %field.name, %ty, %reason, "skipped");
                }
            }
        }
        Ok(())
    }

    async fn fill_field<S: BrowserSurface>(
        &mut self,
        page: &S,
        field: &FieldSchema,
        ty: LogicalType,
        selector: &str,
    ) -> FillOutcome {
        let Some(value) = self.values.generate(ty, field) else {
            return FillOutcome::Skipped("no value to choose".into());
        };

        let filled = if field.tag == "select" {
            page.select_option(selector, &value).await
        } else {
            page.fill(selector, &value).await
        };

        match filled {
            Ok(()) => FillOutcome::Filled(value),
            Err(e) => {
                let e = Error::FillError {
                    field: field.name.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %e, "leaving field unset");
                FillOutcome::Skipped(e.to_string())
            }
        }
    }

    /// Click submit, then keep correcting and resubmitting while the page
    /// reports fixable errors, up to `max_retries` extra clicks.
    async fn submit_with_corrections<S: BrowserSurface>(&mut self, page: &S, log: &mut FillLog) -> Result<()> {
        let Some(mut submit) = find_submit(page).await? else {
            info!("no submit control found");
            return Ok(());
        };

        let mut retries = 0;
        loop {
            submit.click().await?;
            self.submit_clicks += 1;
            self.transition(RunState::SubmitAttempted {
                attempt: self.submit_clicks,
            });

            let messages = collect_error_texts(page).await?;
            if !messages.is_empty() {
                debug!(?messages, "validation messages");
            }
            let changed = apply_feedback(page, &messages, log, &mut self.values).await;
            if !changed {
                break;
            }
            if retries >= self.options.max_retries {
                info!(retries, "correction budget exhausted");
                break;
            }

            retries += 1;
            self.transition(RunState::CorrectionRetry { attempt: retries });
            // the form may have re-rendered
            match find_submit(page).await? {
                Some(again) => submit = again,
                None => break,
            }
        }
        Ok(())
    }

    async fn check_assertions<S: BrowserSurface>(&self, page: &S, assertions: &Assertions) -> Result<()> {
        if let Some(selector) = assertions.selector.as_deref() {
            page.wait_for_selector(selector, self.options.assertion_timeout)
                .await
                .map_err(|e| {
                    Error::AssertionFailure(format!("selector '{selector}' did not appear: {e}"))
                })?;
        }

        if let Some(fragment) = assertions.url_contains.as_deref() {
            let url = page.url().await?;
            if !url.contains(fragment) {
                return Err(Error::AssertionFailure(format!(
                    "Expected '{fragment}' in {url}"
                )));
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "state");
        self.state = next;
    }
}

/// Convenience wrapper: a fresh runner with entropy-seeded values.
pub async fn run(config: &RunConfig, options: RunOptions, browser_config: BrowserConfig) -> Result<FillLog> {
    FillRunner::new(options).run(config, browser_config).await
}

fn field_selector(field: &FieldSchema) -> String {
    attr_selector(&field.tag, "name", &field.name)
}

/// Live option values of a select. A failed lookup leaves the field without
/// options, which makes generation skip it.
async fn option_values<S: BrowserSurface>(page: &S, selector: &str) -> Vec<String> {
    match page
        .eval_on_selector_all(&format!("{selector} option"), OPTION_VALUES_JS)
        .await
    {
        Ok(Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!(%selector, error = %e, "cannot read select options");
            Vec::new()
        }
    }
}

/// Prefer a control reading "Submit", else the first submit input.
async fn find_submit<S: BrowserSurface>(page: &S) -> Result<Option<S::Element>> {
    if let Some(el) = find_by_text(page, "Submit").await? {
        return Ok(Some(el));
    }
    page.query_selector(SUBMIT_INPUT_SELECTOR).await
}

/// First clickable control whose text (or `value`, for inputs) contains
/// `text`, ignoring case. The match runs in the page, so only the hit is
/// fetched as a handle.
async fn find_by_text<S: BrowserSurface>(page: &S, text: &str) -> Result<Option<S::Element>> {
    let needle = serde_json::to_string(&text.to_lowercase())?;
    let function = format!(
        "els => {{ const needle = {needle}; return els.findIndex(el => {{ \
             const shown = (el.innerText || '').trim() || el.value || ''; \
             return shown.toLowerCase().includes(needle); }}); }}"
    );
    let index = match page.eval_on_selector_all(CLICKABLE_SELECTOR, &function).await? {
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    let Some(index) = index.and_then(|i| usize::try_from(i).ok()) else {
        return Ok(None);
    };
    Ok(page
        .query_selector_all(CLICKABLE_SELECTOR)
        .await?
        .into_iter()
        .nth(index))
}
