//! Typed decoding of Home Assistant `shared_attrs` payloads
//!
//! The recorder keeps entity attributes as a JSON object. Only a handful of
//! fields matter for export, so the payload is decoded into a fixed field bag
//! where every field has its own coercion rule:
//!
//! - descriptive fields accept non-empty JSON strings only
//! - coordinate fields accept JSON numbers or numeric strings
//!
//! Anything else decodes as absent. A payload that is not a JSON object at all
//! is an error; callers treat that as corrupt data and abort.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("unmarshal shared_attrs: {0}")]
    Json(#[from] serde_json::Error),
    #[error("shared_attrs is not a JSON object")]
    NotAnObject,
}

/// Descriptive metadata attached to energy rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyMetadata {
    pub unit: Option<String>,
    pub device_class: Option<String>,
    pub state_class: Option<String>,
    /// Home Assistant `friendly_name`
    pub label: Option<String>,
}

/// Coordinates carried by device-tracker style entities
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Coordinates {
    /// Latitude and longitude, only when both are present
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SharedAttributes {
    #[serde(default, deserialize_with = "lenient_string")]
    unit_of_measurement: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    device_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    state_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    friendly_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    gps_accuracy: Option<f64>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric(&s),
        _ => None,
    })
}

fn decode(raw: &str) -> Result<Option<SharedAttributes>, AttributeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    if !value.is_object() {
        return Err(AttributeError::NotAnObject);
    }

    Ok(Some(serde_json::from_value(value)?))
}

/// Parse a recorder state or attribute string as a finite float
///
/// Empty strings, non-numeric text (`unavailable`, `unknown`) and non-finite
/// spellings (`nan`, `inf`) are all absent.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Pull unit, device/state class and friendly name out of `shared_attrs`
pub fn extract_energy_metadata(raw: &str) -> Result<EnergyMetadata, AttributeError> {
    let Some(attrs) = decode(raw)? else {
        return Ok(EnergyMetadata::default());
    };

    Ok(EnergyMetadata {
        unit: attrs.unit_of_measurement,
        device_class: attrs.device_class,
        state_class: attrs.state_class,
        label: attrs.friendly_name,
    })
}

/// Pull latitude, longitude and GPS accuracy out of `shared_attrs`
pub fn extract_coordinates(raw: &str) -> Result<Coordinates, AttributeError> {
    let Some(attrs) = decode(raw)? else {
        return Ok(Coordinates::default());
    };

    Ok(Coordinates {
        latitude: attrs.latitude,
        longitude: attrs.longitude,
        accuracy: attrs.gps_accuracy,
    })
}
