//! Layered settings loading.
//!
//! Three layers, later ones winning:
//!
//! 1. [`CorticalSettings::default()`]
//! 2. `~/.cortical/settings.json`, merged key by key over the defaults
//!    (objects recurse, arrays and scalars replace, `null` leaves the default)
//! 3. `CORTICAL_*` environment variables
//!
//! The merged result is validated once, after the last layer.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{CorticalSettings, LogFormat};

/// `~/.cortical/settings.json`, or `/tmp/.cortical/settings.json` without `HOME`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    home.join(".cortical").join("settings.json")
}

/// Load from [`settings_path`] plus the environment.
pub fn load_settings() -> Result<CorticalSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` plus the environment.
///
/// A missing file is not an error. Unreadable files, malformed JSON and
/// settings that fail [`CorticalSettings::validate`] are.
pub fn load_settings_from_path(path: &Path) -> Result<CorticalSettings> {
    load_settings_with(path, env_var)
}

/// Load from `path`, reading overrides through `lookup` instead of the process
/// environment.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<CorticalSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = read_file_layer(path)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Like [`load_settings_from_path`], but never fails.
///
/// When the file layer is unusable the defaults stand in for it and the
/// environment still applies on top. The error is handed back for the caller
/// to report once logging is up.
pub fn load_settings_or_defaults(path: &Path) -> (CorticalSettings, Option<SettingsError>) {
    load_or_defaults_with(path, env_var)
}

fn load_or_defaults_with<F>(path: &Path, lookup: F) -> (CorticalSettings, Option<SettingsError>)
where
    F: Fn(&str) -> Option<String>,
{
    match load_settings_with(path, &lookup) {
        Ok(settings) => (settings, None),
        Err(e) => {
            let mut settings = CorticalSettings::default();
            apply_overrides(&mut settings, &lookup);
            if settings.validate().is_err() {
                settings = CorticalSettings::default();
            }
            (settings, Some(e))
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn read_file_layer(path: &Path) -> Result<CorticalSettings> {
    let mut merged = serde_json::to_value(CorticalSettings::default())?;
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            debug!(path = %path.display(), "merging settings file");
            merge_layer(&mut merged, serde_json::from_str(&raw)?);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(serde_json::from_value(merged)?)
}

/// Merge `layer` into `base` in place.
///
/// Objects merge per key; any other `layer` value replaces what is in `base`.
/// `null` in `layer` is skipped so a file can spell out a key without
/// overriding its default.
pub fn merge_layer(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(&key) {
                    Some(slot) => merge_layer(slot, value),
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, layer) => *base = layer,
    }
}

/// Apply `CORTICAL_*` variables from the process environment.
pub fn apply_env_overrides(settings: &mut CorticalSettings) {
    apply_overrides(settings, env_var);
}

/// Apply `CORTICAL_*` overrides read through `lookup`.
///
/// Values that do not parse, or fall outside their range, are logged and
/// ignored; the earlier layer's value stays.
pub fn apply_overrides<F>(settings: &mut CorticalSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = Overrides { lookup };
    let server = &mut settings.server;
    env.set_string("CORTICAL_HOST", &mut server.host);
    env.set_number("CORTICAL_PORT", 0..=u16::MAX, &mut server.port);
    env.set_string("CORTICAL_STATIC_DIR", &mut server.static_dir);
    env.set_number("CORTICAL_FANOUT_LAG", 0..=4096, &mut server.fanout_lag);
    env.set_number("CORTICAL_MAX_CONSECUTIVE_ERRORS", 1..=10_000, &mut server.max_consecutive_errors);
    env.set_number("CORTICAL_DRAIN_TIMEOUT_MS", 0..=600_000, &mut server.drain_timeout_ms);
    env.set_number("CORTICAL_MAX_MESSAGE_SIZE", 1024..=(256 << 20), &mut server.max_message_size);

    let logging = &mut settings.logging;
    env.set_string("CORTICAL_LOG_LEVEL", &mut logging.level);
    if let Some(raw) = env.get("CORTICAL_LOG_FORMAT") {
        match parse_log_format(&raw) {
            Some(format) => logging.format = format,
            None => warn!(key = "CORTICAL_LOG_FORMAT", value = %raw, "unknown log format, ignoring"),
        }
    }

    let cortexes = &mut settings.cortexes;
    if let Some(raw) = env.get("CORTICAL_CORTEXES") {
        cortexes.enabled = parse_list(&raw);
    }
    env.set_number("CORTICAL_PING_INTERVAL_MS", 1..=3_600_000, &mut cortexes.ping.interval_ms);
    env.set_string("CORTICAL_MEMORY_PATH", &mut cortexes.memory.path);
    env.set_string("CORTICAL_CLASSIFIER_URL", &mut cortexes.classifier.url);
}

/// Parse `raw` as a `T` inside `range`.
pub fn parse_in_range<T>(raw: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse().ok().filter(|n| range.contains(n))
}

/// `compact`/`text` or `json`, any case.
pub fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Comma-separated names; blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

struct Overrides<F> {
    lookup: F,
}

impl<F> Overrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn set_string(&self, key: &str, slot: &mut String) {
        if let Some(v) = self.get(key) {
            *slot = v;
        }
    }

    fn set_number<T>(&self, key: &str, range: RangeInclusive<T>, slot: &mut T)
    where
        T: FromStr + PartialOrd,
    {
        let Some(raw) = self.get(key) else { return };
        match parse_in_range(&raw, range) {
            Some(n) => *slot = n,
            None => warn!(key, value = %raw, "out-of-range or non-numeric override, ignoring"),
        }
    }
}
