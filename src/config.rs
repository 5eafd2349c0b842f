//! Scheduling parameters: static defaults, the live override store, and the
//! two-level resolver that combines them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

use crate::engine::ValidationError;
use crate::limits::*;

pub const SLOT_DURATION_KEY: &str = "slot_duration_minutes";
pub const BUSINESS_START_KEY: &str = "business_hours_start";
pub const BUSINESS_END_KEY: &str = "business_hours_end";
pub const OPERATOR_COUNT_KEY: &str = "operator_count";

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Static fallbacks used when the override store has no (valid) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub slot_minutes: u32,
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
    pub operator_capacity: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            slot_minutes: 30,
            business_start: hm(7, 0),
            business_end: hm(23, 0),
            operator_capacity: 2,
        }
    }
}

impl Defaults {
    /// Read `CREASE_*` variables, keeping the built-in value for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            slot_minutes: env_parsed("CREASE_SLOT_MINUTES", parse_slot_minutes)
                .unwrap_or(base.slot_minutes),
            business_start: env_parsed("CREASE_BUSINESS_START", parse_time_of_day)
                .unwrap_or(base.business_start),
            business_end: env_parsed("CREASE_BUSINESS_END", parse_time_of_day)
                .unwrap_or(base.business_end),
            operator_capacity: env_parsed("CREASE_OPERATORS", parse_operator_count)
                .unwrap_or(base.operator_capacity),
        }
    }
}

fn env_parsed<T>(var: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!("ignoring {var}={raw:?}: not a valid value");
    }
    parsed
}

/// Process-level settings for the engine and the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub defaults: Defaults,
    pub data_dir: PathBuf,
    pub lock_timeout: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Settings {
    pub fn from_env() -> Self {
        let lock_timeout = std::env::var("CREASE_LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT);
        let compact_threshold = std::env::var("CREASE_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);
        Self {
            defaults: Defaults::from_env(),
            data_dir: PathBuf::from(
                std::env::var("CREASE_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            ),
            lock_timeout,
            compact_threshold,
            metrics_port: std::env::var("CREASE_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.journal")
    }
}

// ── Override store ───────────────────────────────────────────────

/// Read side of the live override store.
pub trait OverrideSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl OverrideSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Live overrides held by the engine. Writes are journaled by the engine
/// before they land here.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    values: DashMap<String, String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: String, value: String) {
        self.values.insert(key, value);
    }

    /// All overrides, sorted by key.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self
            .values
            .iter()
            .map(|e| ConfigEntry {
                key: e.key().clone(),
                value: e.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

impl OverrideSource for ConfigOverrides {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

// ── Resolution ───────────────────────────────────────────────────

/// Parameters in force for one engine call. Computed fresh every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub slot_minutes: u32,
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
    pub operator_capacity: u32,
}

impl EffectiveConfig {
    pub fn business_start_minute(&self) -> u32 {
        minute_of_day(self.business_start)
    }

    pub fn business_end_minute(&self) -> u32 {
        minute_of_day(self.business_end)
    }
}

pub fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Each parameter independently takes the override if present and parsable,
/// otherwise the default.
pub fn resolve(overrides: &impl OverrideSource, defaults: &Defaults) -> EffectiveConfig {
    EffectiveConfig {
        slot_minutes: lookup(overrides, SLOT_DURATION_KEY, parse_slot_minutes)
            .unwrap_or(defaults.slot_minutes),
        business_start: lookup(overrides, BUSINESS_START_KEY, parse_time_of_day)
            .unwrap_or(defaults.business_start),
        business_end: lookup(overrides, BUSINESS_END_KEY, parse_time_of_day)
            .unwrap_or(defaults.business_end),
        operator_capacity: lookup(overrides, OPERATOR_COUNT_KEY, parse_operator_count)
            .unwrap_or(defaults.operator_capacity),
    }
}

fn lookup<T>(
    overrides: &impl OverrideSource,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = overrides.get(key)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!("override {key}={raw:?} is malformed, using default");
    }
    parsed
}

fn parse_slot_minutes(s: &str) -> Option<u32> {
    s.trim().parse().ok().filter(|m| *m > 0 && *m <= 24 * 60)
}

fn parse_operator_count(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Check an override before it is written. Unknown keys are stored as-is.
pub fn validate_override(key: &str, value: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.len() > MAX_CONFIG_KEY_LEN || value.len() > MAX_CONFIG_VALUE_LEN {
        return Err(ValidationError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    let ok = match key {
        SLOT_DURATION_KEY => parse_slot_minutes(value).is_some(),
        BUSINESS_START_KEY | BUSINESS_END_KEY => parse_time_of_day(value).is_some(),
        OPERATOR_COUNT_KEY => parse_operator_count(value).is_some(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
