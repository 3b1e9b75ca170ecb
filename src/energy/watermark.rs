//! Per-entity high-water marks
//!
//! A watermark is the newest `last_updated` already present in the sink for
//! an entity. Source readings at or before it are skipped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::sink::SinkError;

/// Sink-side lookup of the newest timestamp stored per entity
#[async_trait]
pub trait WatermarkQuery: Send {
    async fn latest_per_entity(&mut self) -> Result<Vec<(String, Option<DateTime<Utc>>)>, SinkError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watermarks {
    marks: HashMap<String, DateTime<Utc>>,
}

impl Watermarks {
    /// Load watermarks from the sink; entities without a timestamp are left out
    pub async fn load<Q: WatermarkQuery + ?Sized>(query: &mut Q) -> Result<Self, SinkError> {
        let marks: Self = query
            .latest_per_entity()
            .await?
            .into_iter()
            .filter_map(|(entity_id, ts)| ts.map(|ts| (entity_id, ts)))
            .collect();

        log::info!("🔖 Loaded watermarks for {} entities", marks.len());
        Ok(marks)
    }

    pub fn get(&self, entity_id: &str) -> Option<DateTime<Utc>> {
        self.marks.get(entity_id).copied()
    }

    /// True when `ts` is not newer than what the sink already holds
    pub fn is_synced(&self, entity_id: &str, ts: DateTime<Utc>) -> bool {
        self.get(entity_id).is_some_and(|mark| ts <= mark)
    }

    /// Move the entity's mark forward; older timestamps are ignored
    pub fn advance(&mut self, entity_id: &str, ts: DateTime<Utc>) {
        match self.marks.get_mut(entity_id) {
            Some(mark) if ts > *mark => *mark = ts,
            Some(_) => {}
            None => {
                self.marks.insert(entity_id.to_string(), ts);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

impl FromIterator<(String, DateTime<Utc>)> for Watermarks {
    fn from_iter<I: IntoIterator<Item = (String, DateTime<Utc>)>>(iter: I) -> Self {
        let mut marks = Watermarks::default();
        for (entity_id, ts) in iter {
            marks.advance(&entity_id, ts);
        }
        marks
    }
}
