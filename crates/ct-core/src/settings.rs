//! Versioned settings record
//!
//! The record is the only persisted entity. Every path that brings a record
//! in from outside (storage, import) goes through [`migrate`], which fills
//! missing fields from defaults and rewrites the schema version.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FeatureId, PageCategory};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Message shown in the overlay until the user sets their own.
pub const DEFAULT_CUSTOM_MESSAGE: &str = "Nothing to watch here. Search for what you came for.";

/// Error type for settings coercion.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings must be a JSON object")]
    NotAnObject,
    #[error("Invalid field '{field}': expected {expected}")]
    InvalidField { field: String, expected: &'static str },
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// Feature Map
// =============================================================================

/// Fixed-shape feature-id to boolean map.
///
/// Always holds a value for every feature-id; serialized as a JSON object
/// in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMap([bool; FeatureId::COUNT]);

impl FeatureMap {
    /// Per-feature defaults.
    pub const DEFAULTS: FeatureMap = FeatureMap([
        true,  // hideShorts
        true,  // hideHomeFeed
        true,  // hideEndCards
        false, // hideComments
        false, // hideSidebar
        false, // searchOnly
    ]);

    #[inline]
    pub fn get(&self, feature: FeatureId) -> bool {
        self.0[feature.index()]
    }

    #[inline]
    pub fn set(&mut self, feature: FeatureId, value: bool) {
        self.0[feature.index()] = value;
    }

    pub fn with(mut self, feature: FeatureId, value: bool) -> Self {
        self.set(feature, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, bool)> + '_ {
        FeatureId::ALL.into_iter().map(|id| (id, self.get(id)))
    }

    /// Overlay a partial override on top of this map.
    pub fn overlaid(mut self, overrides: &FeatureOverrides) -> Self {
        for (&feature, &value) in overrides {
            self.set(feature, value);
        }
        self
    }
}

impl Default for FeatureMap {
    fn default() -> Self {
        Self::DEFAULTS
    }
}

impl Serialize for FeatureMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FeatureId::COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.as_str(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeatureMapVisitor;

        impl<'de> Visitor<'de> for FeatureMapVisitor {
            type Value = FeatureMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of feature-id to boolean")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FeatureMap, A::Error> {
                // Missing ids keep their default, unknown ids are dropped
                let mut features = FeatureMap::DEFAULTS;
                while let Some((key, value)) = access.next_entry::<String, bool>()? {
                    if let Some(feature) = FeatureId::from_name(&key) {
                        features.set(feature, value);
                    }
                }
                Ok(features)
            }
        }

        deserializer.deserialize_map(FeatureMapVisitor)
    }
}

/// Partial feature map used by per-page overrides.
pub type FeatureOverrides = BTreeMap<FeatureId, bool>;

/// Per-category overrides.
pub type PerPath = BTreeMap<PageCategory, FeatureOverrides>;

// =============================================================================
// Settings Record
// =============================================================================

/// The persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub schema_version: u32,
    /// Master switch; suppresses every feature when false
    pub enabled: bool,
    pub custom_message: String,
    /// Presentation-only accessibility flag
    pub reduced_motion: bool,
    pub features: FeatureMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_path: PerPath,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            enabled: true,
            custom_message: DEFAULT_CUSTOM_MESSAGE.to_string(),
            reduced_motion: false,
            features: FeatureMap::DEFAULTS,
            per_path: PerPath::new(),
        }
    }
}

impl SettingsRecord {
    /// Effective settings for a page category.
    ///
    /// Global features overlaid with the category override. `enabled` always
    /// comes from the global record.
    pub fn effective(&self, category: PageCategory) -> EffectiveSettings {
        let features = match self.per_path.get(&category) {
            Some(overrides) => self.features.overlaid(overrides),
            None => self.features,
        };
        EffectiveSettings {
            category,
            enabled: self.enabled,
            features,
        }
    }

    /// Pretty-printed portable form.
    pub fn to_json_pretty(&self) -> String {
        // Serializing plain structs and string-keyed maps cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Per-category view of the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub category: PageCategory,
    pub enabled: bool,
    pub features: FeatureMap,
}

impl EffectiveSettings {
    /// Feature wanted on this category, gated by the master switch.
    #[inline]
    pub fn is_active(&self, feature: FeatureId) -> bool {
        self.enabled && self.features.get(feature)
    }
}

// =============================================================================
// Patches
// =============================================================================

/// Shallow patch over the top-level fields of a record.
///
/// Nested maps are replaced wholesale; callers that change one feature must
/// start from the current map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub custom_message: Option<String>,
    pub reduced_motion: Option<bool>,
    pub features: Option<FeatureMap>,
    pub per_path: Option<PerPath>,
}

impl SettingsPatch {
    pub fn enabled(value: bool) -> Self {
        Self {
            enabled: Some(value),
            ..Self::default()
        }
    }

    pub fn features(features: FeatureMap) -> Self {
        Self {
            features: Some(features),
            ..Self::default()
        }
    }

    /// Merge onto a record and stamp the current schema version.
    pub fn apply_to(self, record: &mut SettingsRecord) {
        if let Some(enabled) = self.enabled {
            record.enabled = enabled;
        }
        if let Some(message) = self.custom_message {
            record.custom_message = message;
        }
        if let Some(reduced_motion) = self.reduced_motion {
            record.reduced_motion = reduced_motion;
        }
        if let Some(features) = self.features {
            record.features = features;
        }
        if let Some(per_path) = self.per_path {
            record.per_path = per_path;
        }
        record.schema_version = CURRENT_SCHEMA_VERSION;
    }
}

// =============================================================================
// Migration
// =============================================================================

/// Parse and migrate serialized settings text.
pub fn parse_and_migrate(text: &str) -> Result<SettingsRecord, SettingsError> {
    let value: Value = serde_json::from_str(text)?;
    migrate(&value)
}

/// Coerce a stored value into a current-version record.
///
/// Stored fields win over defaults, missing fields come from defaults and the
/// schema version is rewritten to current. Known fields with the wrong JSON
/// type are rejected rather than guessed at.
pub fn migrate(value: &Value) -> Result<SettingsRecord, SettingsError> {
    let obj = value.as_object().ok_or(SettingsError::NotAnObject)?;
    let mut record = SettingsRecord::default();

    let stored_version = match obj.get("schemaVersion") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| invalid("schemaVersion", "a non-negative integer"))?,
    };
    if stored_version > u64::from(CURRENT_SCHEMA_VERSION) {
        log::warn!(
            "settings schema version {} is newer than supported {}; coercing known fields",
            stored_version,
            CURRENT_SCHEMA_VERSION
        );
    } else if stored_version < u64::from(CURRENT_SCHEMA_VERSION) {
        log::info!(
            "migrating settings from schema version {} to {}",
            stored_version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if let Some(v) = obj.get("enabled") {
        record.enabled = expect_bool(v, "enabled")?;
    }
    if let Some(v) = obj.get("customMessage") {
        record.custom_message = v
            .as_str()
            .ok_or_else(|| invalid("customMessage", "a string"))?
            .to_string();
    }
    if let Some(v) = obj.get("reducedMotion") {
        record.reduced_motion = expect_bool(v, "reducedMotion")?;
    }
    if let Some(v) = obj.get("features") {
        let map = expect_object(v, "features")?;
        for (feature, value) in coerce_features(map, "features")? {
            record.features.set(feature, value);
        }
    }
    if let Some(v) = obj.get("perPath") {
        let map = expect_object(v, "perPath")?;
        for (key, overrides) in map {
            let Some(category) = PageCategory::from_name(key) else {
                log::debug!("dropping override for unknown page category '{}'", key);
                continue;
            };
            let field = format!("perPath.{key}");
            let overrides = expect_object(overrides, &field)?;
            let coerced: FeatureOverrides = coerce_features(overrides, &field)?.into_iter().collect();
            if !coerced.is_empty() {
                record.per_path.insert(category, coerced);
            }
        }
    }

    record.schema_version = CURRENT_SCHEMA_VERSION;
    Ok(record)
}

fn coerce_features(map: &Map<String, Value>, field: &str) -> Result<Vec<(FeatureId, bool)>, SettingsError> {
    let mut out = Vec::with_capacity(map.len());
    for (key, value) in map {
        match FeatureId::from_name(key) {
            Some(feature) => out.push((feature, expect_bool(value, &format!("{field}.{key}"))?)),
            None => log::debug!("dropping unknown feature '{}' in {}", key, field),
        }
    }
    Ok(out)
}

fn expect_bool(value: &Value, field: &str) -> Result<bool, SettingsError> {
    value.as_bool().ok_or_else(|| invalid(field, "a boolean"))
}

fn expect_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, SettingsError> {
    value.as_object().ok_or_else(|| invalid(field, "an object"))
}

fn invalid(field: &str, expected: &'static str) -> SettingsError {
    SettingsError::InvalidField {
        field: field.to_string(),
        expected,
    }
}
