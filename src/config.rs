use crate::bench::escalation::EscalationPolicy;
use crate::bench::probe::PayloadUrls;
use crate::error::{Result, ScraperError};
use crate::types::Protocol;
use directories::ProjectDirs;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Include the defaults at compile time
const DEFAULT_SETTINGS: &str = include_str!("../assets/default_settings.toml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub country: String,
    pub protocol: Protocol,
    pub base_timeout_ms: u64,
    pub start_level: u32,
    pub max_rounds: u32,
    pub ranking_count: usize,
    pub workers: usize,
    pub payload_url: String,
    pub payload_variants: u32,
    pub sources: SourceSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub proxifly_url: String,
    pub fresh_url: String,
}

/// 命令行覆盖项，优先级最高
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub country: Option<String>,
    pub protocol: Option<Protocol>,
    pub base_timeout_ms: Option<u64>,
    pub max_rounds: Option<u32>,
    pub ranking_count: Option<usize>,
    pub workers: Option<usize>,
}

impl Settings {
    /// Built-in defaults only.
    #[cfg(test)]
    pub fn defaults() -> Result<Self> {
        Self::from_layers(DEFAULT_SETTINGS, None)
    }

    /// 加载配置
    /// Strategy:
    /// 1. Built-in assets/default_settings.toml
    /// 2. `path` if given (must exist), otherwise ~/.config/sockscraper/settings.toml if present
    /// 3. Command-line overrides
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let user_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => user_settings_path().filter(|p| p.exists()),
        };

        let user = match user_path {
            Some(ref p) => {
                let content = fs::read_to_string(p)?;
                info!("Loaded settings from {:?}", p);
                Some(content)
            }
            None => None,
        };

        let mut settings = Self::from_layers(DEFAULT_SETTINGS, user.as_deref())?;
        settings.apply(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn from_layers(defaults: &str, user: Option<&str>) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(defaults)?;
        if let Some(user) = user {
            let user: toml::Table = toml::from_str(user)?;
            merge_tables(&mut merged, user);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(ref country) = overrides.country {
            self.country = country.clone();
        }
        if let Some(protocol) = overrides.protocol {
            self.protocol = protocol;
        }
        if let Some(ms) = overrides.base_timeout_ms {
            self.base_timeout_ms = ms;
        }
        if let Some(max) = overrides.max_rounds {
            self.max_rounds = max;
        }
        if let Some(count) = overrides.ranking_count {
            self.ranking_count = count;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
    }

    /// Fails fast on the first bad key. Normalizes the country code to upper case.
    pub fn validate(&mut self) -> Result<()> {
        let invalid = |key: &'static str, reason: &str| ScraperError::InvalidSettings {
            key,
            reason: reason.to_string(),
        };

        let country_re = Regex::new(r"^[A-Za-z]{2}$")?;
        if !country_re.is_match(self.country.trim()) {
            return Err(invalid("country", "expected a two-letter country code"));
        }
        self.country = self.country.trim().to_ascii_uppercase();

        if self.base_timeout_ms == 0 {
            return Err(invalid("base_timeout_ms", "must be greater than 0"));
        }
        if self.start_level == 0 {
            return Err(invalid("start_level", "must be at least 1"));
        }
        if self.ranking_count == 0 {
            return Err(invalid("ranking_count", "must be at least 1"));
        }
        if self.payload_variants == 0 {
            return Err(invalid("payload_variants", "must be at least 1"));
        }
        if !is_http_url(&self.payload_url) || !self.payload_url.contains("{size}") {
            return Err(invalid("payload_url", "must be an http(s) URL containing {size}"));
        }
        if !is_http_url(&self.sources.proxifly_url) || !self.sources.proxifly_url.contains("{country}") {
            return Err(invalid(
                "sources.proxifly_url",
                "must be an http(s) URL containing {country}",
            ));
        }
        if !is_http_url(&self.sources.fresh_url) {
            return Err(invalid("sources.fresh_url", "must be an http(s) URL"));
        }
        Ok(())
    }

    pub fn policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            base_timeout: Duration::from_millis(self.base_timeout_ms),
            start_level: self.start_level,
            max_rounds: (self.max_rounds > 0).then_some(self.max_rounds),
        }
    }

    /// 0 means one worker per available core.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Picks one mirrored copy of the test files for this run.
    pub fn payload_urls<R: Rng>(&self, rng: &mut R) -> PayloadUrls {
        let variant = rng.gen_range(0..self.payload_variants.max(1));
        PayloadUrls::new(&self.payload_url, variant)
    }
}

fn user_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sockscraper").map(|dirs| dirs.config_dir().join("settings.toml"))
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Recursively overlays `overlay` onto `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}
