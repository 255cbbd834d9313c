use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::Browser;
use crate::error::{Error, Result};

/// Default number of correction rounds after the first submit.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default wait budget for the success-assertion selector.
pub const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_secs(5);

// ── Target configuration ────────────────────────────────────────────

/// The run target as read from `config/target.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub assertions: Assertions,
}

/// Success conditions checked after the last submit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assertions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_contains: Option<String>,
}

impl RunConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn allow(mut self, host: impl Into<String>) -> Self {
        self.allowlist.push(host.into());
        self
    }

    pub fn expect_selector(mut self, selector: impl Into<String>) -> Self {
        self.assertions.selector = Some(selector.into());
        self
    }

    pub fn expect_url_contains(mut self, fragment: impl Into<String>) -> Self {
        self.assertions.url_contains = Some(fragment.into());
        self
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::ConfigError(format!("invalid config: {e}")))
    }

    /// Check the target against the allowlist and return the URL to open.
    ///
    /// This is the navigation security boundary: nothing is opened unless the
    /// host is listed verbatim.
    pub fn validate_target(&self) -> Result<&str> {
        let target = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::ConfigError("missing 'url'".into()))?;
        let parsed = url::Url::parse(target)
            .map_err(|e| Error::ConfigError(format!("invalid url '{target}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::ConfigError(format!("url '{target}' has no host")))?;
        if !self.allowlist.iter().any(|allowed| allowed == host) {
            return Err(Error::ConfigError(format!("Host '{host}' not in allowlist")));
        }
        Ok(target)
    }
}

// ── Run options ─────────────────────────────────────────────────────

/// Knobs for a single run that are not part of the target config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub artifacts_dir: PathBuf,
    /// Extra submit attempts allowed after the first one.
    pub max_retries: u32,
    pub assertion_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            max_retries: DEFAULT_MAX_RETRIES,
            assertion_timeout: DEFAULT_ASSERTION_TIMEOUT,
        }
    }
}

impl RunOptions {
    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn assertion_timeout(mut self, timeout: Duration) -> Self {
        self.assertion_timeout = timeout;
        self
    }
}

// ── Browser launch ──────────────────────────────────────────────────

pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Timeout for each browser protocol request (default: 30s).
    pub default_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 1024,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<Browser> {
        Browser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
