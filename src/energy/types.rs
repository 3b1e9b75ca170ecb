use chrono::{DateTime, Utc};

use crate::attributes::EnergyMetadata;

/// One recorder state, decoded and ready for routing
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub source_row_id: i64,
    pub entity_id: String,
    pub raw_value: String,
    pub numeric_value: Option<f64>,
    pub metadata: EnergyMetadata,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Row destined for `energy_points`
///
/// Either a reading passed through unchanged or a minute average, in which
/// case `source_row_id` is the id of the group's representative reading.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRow {
    pub source_row_id: i64,
    pub entity_id: String,
    pub value: String,
    pub numeric_value: Option<f64>,
    pub metadata: EnergyMetadata,
    pub observed_at: Option<DateTime<Utc>>,
}

impl From<Reading> for EnergyRow {
    fn from(reading: Reading) -> Self {
        Self {
            source_row_id: reading.source_row_id,
            entity_id: reading.entity_id,
            value: reading.raw_value,
            numeric_value: reading.numeric_value,
            metadata: reading.metadata,
            observed_at: reading.observed_at,
        }
    }
}

/// A reading with both a numeric value and a timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub reading: Reading,
}

impl Sample {
    pub fn from_reading(reading: Reading) -> Result<Self, Reading> {
        match (reading.numeric_value, reading.observed_at) {
            (Some(value), Some(observed_at)) => Ok(Self {
                value,
                observed_at,
                reading,
            }),
            _ => Err(reading),
        }
    }
}
