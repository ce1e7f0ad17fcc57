//! Session configuration.
//!
//! Defaults can be overridden with environment variables using the `KMAP_` prefix:
//! - `KMAP_API_URL` → `api_base_url`
//! - `KMAP_API_TOKEN` → `api_token`
//! - `KMAP_REQUEST_TIMEOUT_SECS` → `request_timeout`
//! - `KMAP_AUTOSAVE_DELAY_MS` → `autosave_delay`
//! - `KMAP_LAYOUT_DELAY_MS` → `layout_delay`
//! - `KMAP_VIEWPORT_WIDTH` / `KMAP_VIEWPORT_HEIGHT` → `viewport`
//! - `KMAP_LOG_LEVEL` → `log_level`

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;
const DEFAULT_LAYOUT_DELAY_MS: u64 = 100;

/// Rectangle in which positions are synthesized for nodes that arrive without one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 300.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the knowledge-map API.
    pub api_base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    /// Per-request timeout. Map generation can be slow.
    pub request_timeout: Duration,
    /// Quiet period after the last edit before the map is persisted.
    pub autosave_delay: Duration,
    /// Delay before the one-shot layout request after a map is applied.
    pub layout_delay: Duration,
    pub viewport: Viewport,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            autosave_delay: Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS),
            layout_delay: Duration::from_millis(DEFAULT_LAYOUT_DELAY_MS),
            viewport: Viewport::default(),
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults with `KMAP_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KMAP_API_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("KMAP_API_TOKEN") {
            self.api_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "KMAP_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KMAP_AUTOSAVE_DELAY_MS")? {
            self.autosave_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KMAP_LAYOUT_DELAY_MS")? {
            self.layout_delay = Duration::from_millis(ms);
        }
        if let Some(w) = parse_var::<f64>(&lookup, "KMAP_VIEWPORT_WIDTH")? {
            self.viewport.width = w;
        }
        if let Some(h) = parse_var::<f64>(&lookup, "KMAP_VIEWPORT_HEIGHT")? {
            self.viewport.height = h;
        }
        if let Some(v) = lookup("KMAP_LOG_LEVEL") {
            self.log_level = v;
        }

        if !(self.viewport.width > 0.0 && self.viewport.height > 0.0) {
            anyhow::bail!(
                "Viewport must have a positive size, got {}x{}",
                self.viewport.width,
                self.viewport.height
            );
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
