use super::types::EnergyRow;
use crate::sink::{SqlValue, UpsertTable};

/// `energy_points`, keyed on `(entity_id, source_state_id)`
pub struct EnergyTable;

impl UpsertTable for EnergyTable {
    type Row = EnergyRow;

    const TABLE: &'static str = "energy_points";

    const COLUMNS: &'static [&'static str] = &[
        "source_state_id",
        "entity_id",
        "state",
        "numeric_state",
        "unit",
        "device_class",
        "state_class",
        "friendly_name",
        "last_updated",
    ];

    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "state",
        "numeric_state",
        "unit",
        "device_class",
        "state_class",
        "friendly_name",
        "last_updated",
    ];

    fn bind(row: &EnergyRow, args: &mut Vec<SqlValue>) {
        args.push(SqlValue::Int(Some(row.source_row_id)));
        args.push(SqlValue::Text(Some(row.entity_id.clone())));
        args.push(SqlValue::Text(Some(row.value.clone())));
        args.push(SqlValue::Float(row.numeric_value));
        args.push(SqlValue::Text(row.metadata.unit.clone()));
        args.push(SqlValue::Text(row.metadata.device_class.clone()));
        args.push(SqlValue::Text(row.metadata.state_class.clone()));
        args.push(SqlValue::Text(row.metadata.label.clone()));
        args.push(SqlValue::DateTime(row.observed_at.map(|ts| ts.naive_utc())));
    }
}
