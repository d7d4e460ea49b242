use std::{collections::HashMap, fs, io, path::Path, time::Duration};

use anyhow::Context;
use client_core::normalize_base_url;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub manager_base_url: String,
    pub trade_base_url: String,
    pub page_size: u32,
    pub request_timeout_ms: u64,
    pub max_visible_pages: u32,
    pub auth_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manager_base_url: "http://localhost:8080".into(),
            trade_base_url: "http://localhost:8181".into(),
            page_size: 10,
            request_timeout_ms: 3000,
            max_visible_pages: 10,
            auth_token: None,
        }
    }
}

impl Settings {
    /// `None` when the timeout is disabled with `0`.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Normalizes base URLs and clamps numeric knobs. Fails on base URLs that
    /// cannot be parsed as absolute URLs.
    pub fn validated(mut self) -> anyhow::Result<Self> {
        self.manager_base_url = normalize_base_url(&self.manager_base_url)
            .context("invalid manager base url")?
            .to_string();
        self.trade_base_url = normalize_base_url(&self.trade_base_url)
            .context("invalid trade base url")?
            .to_string();
        self.page_size = self.page_size.max(1);
        self.max_visible_pages = self.max_visible_pages.max(3);
        self.auth_token = self
            .auth_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Ok(self)
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    let vars: HashMap<String, String> = std::env::vars().collect();
    resolve_settings(raw.as_deref(), &vars)
        .with_context(|| format!("failed to load settings from '{}'", path.display()))
}

pub fn resolve_settings(
    file: Option<&str>,
    vars: &HashMap<String, String>,
) -> anyhow::Result<Settings> {
    let mut settings = match file {
        Some(raw) => toml::from_str::<Settings>(raw).context("malformed console settings")?,
        None => Settings::default(),
    };

    if let Some(v) = vars.get("CSM_API_BASE_URL") {
        settings.manager_base_url = v.clone();
    }
    if let Some(v) = vars.get("CONSOLE__MANAGER_BASE_URL") {
        settings.manager_base_url = v.clone();
    }

    if let Some(v) = vars.get("CSA_API_BASE_URL") {
        settings.trade_base_url = v.clone();
    }
    if let Some(v) = vars.get("CONSOLE__TRADE_BASE_URL") {
        settings.trade_base_url = v.clone();
    }

    if let Some(v) = vars.get("CONSOLE__PAGE_SIZE") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.page_size = parsed;
        }
    }
    if let Some(v) = vars.get("CONSOLE__REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }
    if let Some(v) = vars.get("CONSOLE__MAX_VISIBLE_PAGES") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.max_visible_pages = parsed;
        }
    }
    if let Some(v) = vars.get("CONSOLE__AUTH_TOKEN") {
        settings.auth_token = Some(v.clone());
    }

    settings.validated()
}
