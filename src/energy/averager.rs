//! Per-minute averaging of high-frequency signals
//!
//! Input must arrive ordered by `(entity_id, observed_at)`: a group is closed
//! as soon as a sample for another entity or another minute shows up, so
//! unordered input produces several partial averages for the same minute.

use chrono::{DateTime, Utc};

use super::types::{EnergyRow, Sample};
use crate::recorder::minute_bucket;

struct MinuteGroup {
    entity_id: String,
    minute: DateTime<Utc>,
    /// Running mean; stays finite for any finite input
    mean: f64,
    count: u32,
    representative: Option<Sample>,
}

impl MinuteGroup {
    fn open(entity_id: &str, minute: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            minute,
            mean: 0.0,
            count: 0,
            representative: None,
        }
    }

    fn accepts(&self, entity_id: &str, minute: DateTime<Utc>) -> bool {
        self.entity_id == entity_id && self.minute == minute
    }

    fn include(&mut self, value: f64) {
        self.count += 1;
        let n = f64::from(self.count);
        self.mean += value / n - self.mean / n;
    }

    /// Latest observation wins; the larger source row id breaks ties
    fn offer(&mut self, sample: Sample) {
        let replace = match &self.representative {
            None => true,
            Some(current) => {
                sample.observed_at > current.observed_at
                    || (sample.observed_at == current.observed_at
                        && sample.reading.source_row_id > current.reading.source_row_id)
            }
        };
        if replace {
            self.representative = Some(sample);
        }
    }

    fn into_row(self) -> Option<EnergyRow> {
        if self.count == 0 {
            return None;
        }
        let representative = self.representative?;
        let average = self.mean;

        Some(EnergyRow {
            source_row_id: representative.reading.source_row_id,
            entity_id: self.entity_id,
            value: format_average(average),
            numeric_value: Some(average),
            metadata: representative.reading.metadata,
            observed_at: Some(representative.observed_at),
        })
    }
}

/// Shortest decimal that round-trips, never in exponent form
fn format_average(value: f64) -> String {
    format!("{}", value)
}

/// Folds samples of one entity and minute into a single averaged row
#[derive(Default)]
pub struct MinuteAverager {
    group: Option<MinuteGroup>,
}

impl MinuteAverager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample, returning the previous group's row if this one closed it
    pub fn add(&mut self, sample: Sample) -> Option<EnergyRow> {
        let minute = minute_bucket(sample.observed_at);

        let boundary = self
            .group
            .as_ref()
            .is_some_and(|group| !group.accepts(&sample.reading.entity_id, minute));
        let closed = if boundary { self.flush() } else { None };

        let group = self
            .group
            .get_or_insert_with(|| MinuteGroup::open(&sample.reading.entity_id, minute));
        group.include(sample.value);
        group.offer(sample);

        closed
    }

    /// Close the open group, if any
    ///
    /// Always leaves the averager idle. A group without samples is dropped.
    pub fn flush(&mut self) -> Option<EnergyRow> {
        self.group.take().and_then(MinuteGroup::into_row)
    }

    pub fn is_idle(&self) -> bool {
        self.group.is_none()
    }
}
