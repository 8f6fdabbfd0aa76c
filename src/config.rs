//! Cache handler settings and settings file parsing.

use crate::error::{AddContext, HttpCacheError};
use crate::http::Method;
use crate::log_debug;
use crate::Result;
use regex::Regex;
use std::io::Read;
use std::sync::Arc;

pub const ENABLE_CONDITIONAL_PUT: &str = "enable_conditional_put";
pub const ENABLE_CONDITIONAL_PATCH: &str = "enable_conditional_patch";
pub const ENABLE_CLEAR_RELATED_AFTER_PUT: &str = "enable_clear_related_after_put";
pub const ENABLE_CLEAR_RELATED_AFTER_PATCH: &str = "enable_clear_related_after_patch";
pub const FORCE_REVALIDATION_OF_STALE_ENTRIES: &str = "force_revalidation_of_stale_entries";

/// Switches consumed by the cache handler. Everything is enabled by default
/// except forced revalidation.
pub trait HandlerSettings {
    fn enable_conditional_put(&self) -> bool {
        true
    }
    fn enable_conditional_patch(&self) -> bool {
        true
    }
    fn enable_clear_related_after_put(&self) -> bool {
        true
    }
    fn enable_clear_related_after_patch(&self) -> bool {
        true
    }
    /// Revalidate stale entries even if they do not declare must-revalidate.
    fn force_revalidation_of_stale_entries(&self) -> bool {
        false
    }

    /// Whether If-Match/If-Unmodified-Since are sent along a mutation.
    fn conditional_mutation(&self, method: &Method) -> bool {
        match method {
            Method::PUT => self.enable_conditional_put(),
            Method::PATCH => self.enable_conditional_patch(),
            _ => false,
        }
    }

    /// Whether a successful mutation purges the cached variants of the
    /// resource.
    fn clear_related(&self, method: &Method) -> bool {
        match method {
            Method::PUT => self.enable_clear_related_after_put(),
            Method::PATCH => self.enable_clear_related_after_patch(),
            _ => false,
        }
    }
}

#[derive(Builder, Clone, Debug, PartialEq)]
pub struct Settings {
    #[builder(default = "true")]
    conditional_put: bool,
    #[builder(default = "true")]
    conditional_patch: bool,
    #[builder(default = "true")]
    clear_related_after_put: bool,
    #[builder(default = "true")]
    clear_related_after_patch: bool,
    #[builder(default = "false")]
    force_revalidation: bool,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            conditional_put: true,
            conditional_patch: true,
            clear_related_after_put: true,
            clear_related_after_patch: true,
            force_revalidation: false,
        }
    }
}

impl HandlerSettings for Settings {
    fn enable_conditional_put(&self) -> bool {
        self.conditional_put
    }

    fn enable_conditional_patch(&self) -> bool {
        self.conditional_patch
    }

    fn enable_clear_related_after_put(&self) -> bool {
        self.clear_related_after_put
    }

    fn enable_clear_related_after_patch(&self) -> bool {
        self.clear_related_after_patch
    }

    fn force_revalidation_of_stale_entries(&self) -> bool {
        self.force_revalidation
    }
}

impl<T: HandlerSettings> HandlerSettings for Arc<T> {
    fn enable_conditional_put(&self) -> bool {
        self.as_ref().enable_conditional_put()
    }

    fn enable_conditional_patch(&self) -> bool {
        self.as_ref().enable_conditional_patch()
    }

    fn enable_clear_related_after_put(&self) -> bool {
        self.as_ref().enable_clear_related_after_put()
    }

    fn enable_clear_related_after_patch(&self) -> bool {
        self.as_ref().enable_clear_related_after_patch()
    }

    fn force_revalidation_of_stale_entries(&self) -> bool {
        self.as_ref().force_revalidation_of_stale_entries()
    }
}

lazy_static! {
    static ref SETTING_LINE: Regex =
        Regex::new(r"^(?P<key>[A-Za-z_]+)\s*=\s*(?P<value>\S*)\s*$").unwrap();
}

pub struct Config;

impl Config {
    /// Load settings out of `key=value` lines. Keys not present keep their
    /// defaults.
    pub fn new<T: Read>(mut reader: T) -> Result<Settings> {
        let mut config_data = String::new();
        reader
            .read_to_string(&mut config_data)
            .err_context("Unable to read settings")?;
        let mut settings = Settings::default();
        for (number, line) in config_data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let captured = SETTING_LINE.captures(line).ok_or_else(|| {
                HttpCacheError::ConfigurationError(format!(
                    "Line {}: expected key=value, found: {}",
                    number + 1,
                    line
                ))
            })?;
            let key = &captured["key"];
            let value = parse_bool(key, &captured["value"])?;
            match key {
                ENABLE_CONDITIONAL_PUT => settings.conditional_put = value,
                ENABLE_CONDITIONAL_PATCH => settings.conditional_patch = value,
                ENABLE_CLEAR_RELATED_AFTER_PUT => settings.clear_related_after_put = value,
                ENABLE_CLEAR_RELATED_AFTER_PATCH => settings.clear_related_after_patch = value,
                FORCE_REVALIDATION_OF_STALE_ENTRIES => settings.force_revalidation = value,
                _ => {
                    return Err(HttpCacheError::ConfigurationError(format!(
                        "Unknown setting: {}",
                        key
                    ))
                    .into())
                }
            }
        }
        log_debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(HttpCacheError::ConfigurationError(format!(
            "Setting {} expects true or false, found: {}",
            key, value
        ))
        .into()),
    }
}
