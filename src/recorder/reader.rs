//! SQLite recorder reader with keyset paging
//!
//! Reads the Home Assistant recorder schema (`states`, `states_meta`,
//! `state_attributes`) one page at a time. Each scan keeps its own keyset
//! cursor so a page fetch never re-reads or skips a row.
//!
//! Entity scans come back ordered by `(entity_id, last_updated_ts, state_id)`.
//! The minute averager depends on that ordering to detect group boundaries.

use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One `states` row joined with its entity id and attribute payload
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderRow {
    pub state_id: i64,
    pub entity_id: String,
    pub state: String,
    pub last_updated_ts: Option<f64>,
    pub shared_attrs: String,
}

impl RecorderRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            state_id: row.get(0)?,
            entity_id: row.get(1)?,
            state: row.get(2)?,
            last_updated_ts: row.get(3)?,
            shared_attrs: row.get(4)?,
        })
    }

    /// Sort key used by entity scans; NULL timestamps sort first
    fn entity_key(&self) -> (String, f64, i64) {
        (
            self.entity_id.clone(),
            self.last_updated_ts.unwrap_or(-1.0),
            self.state_id,
        )
    }
}

/// Keyset position of an entity scan
#[derive(Debug, Clone)]
pub struct EntityScan {
    pattern: String,
    after: Option<(String, f64, i64)>,
    exhausted: bool,
}

impl EntityScan {
    /// Scan every entity whose id contains `slug`
    pub fn matching(slug: &str) -> Self {
        Self {
            pattern: format!("%{}%", slug),
            after: None,
            exhausted: false,
        }
    }
}

/// Keyset position of a coordinate scan
#[derive(Debug, Clone, Default)]
pub struct CoordinateScan {
    after_state_id: i64,
    exhausted: bool,
}

const ENTITY_SELECT: &str = "
SELECT
    s.state_id,
    sm.entity_id,
    COALESCE(s.state, ''),
    s.last_updated_ts,
    COALESCE(sa.shared_attrs, '')
FROM states s
JOIN states_meta sm ON s.metadata_id = sm.metadata_id
LEFT JOIN state_attributes sa ON s.attributes_id = sa.attributes_id
";

const ENTITY_ORDER: &str = "
ORDER BY sm.entity_id, COALESCE(s.last_updated_ts, -1), s.state_id
LIMIT ?";

const COORDINATE_QUERY: &str = "
SELECT
    s.state_id,
    sm.entity_id,
    COALESCE(s.state, ''),
    s.last_updated_ts,
    COALESCE(sa.shared_attrs, '')
FROM states s
JOIN state_attributes sa ON s.attributes_id = sa.attributes_id
JOIN states_meta sm ON s.metadata_id = sm.metadata_id
WHERE sa.shared_attrs LIKE '%\"latitude\"%'
  AND sa.shared_attrs LIKE '%\"longitude\"%'
  AND s.state_id > ?1
ORDER BY s.state_id
LIMIT ?2";

/// Read-only handle on a Home Assistant recorder database
pub struct RecorderReader {
    conn: Connection,
    page_size: usize,
}

impl RecorderReader {
    /// Open the recorder database read-only
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_with_flags(
            db_path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Home Assistant may be writing while we read
        conn.busy_timeout(Duration::from_secs(5))?;

        log::info!("📥 Recorder database opened: {}", db_path.as_ref().display());

        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection (used for in-memory databases)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the number of rows fetched per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the next page of an entity scan
    ///
    /// Returns an empty page once the scan is exhausted.
    pub fn next_entity_page(&mut self, scan: &mut EntityScan) -> Result<Vec<RecorderRow>, rusqlite::Error> {
        if scan.exhausted {
            return Ok(Vec::new());
        }

        let limit = self.page_size as i64;
        let page = match &scan.after {
            None => {
                let sql = format!("{}WHERE sm.entity_id LIKE ?{}", ENTITY_SELECT, ENTITY_ORDER);
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params![scan.pattern, limit], RecorderRow::from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            Some((entity_id, ts, state_id)) => {
                let sql = format!(
                    "{}WHERE sm.entity_id LIKE ?
  AND (sm.entity_id, COALESCE(s.last_updated_ts, -1), s.state_id) > (?, ?, ?){}",
                    ENTITY_SELECT, ENTITY_ORDER
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(
                    params![scan.pattern, entity_id, ts, state_id, limit],
                    RecorderRow::from_row,
                )?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        match page.last() {
            Some(last) => scan.after = Some(last.entity_key()),
            None => scan.exhausted = true,
        }
        if page.len() < self.page_size {
            scan.exhausted = true;
        }

        log::debug!("📥 Read {} recorder rows (entity scan)", page.len());
        Ok(page)
    }

    /// Fetch the next page of states whose attributes carry coordinates
    pub fn next_coordinate_page(&mut self, scan: &mut CoordinateScan) -> Result<Vec<RecorderRow>, rusqlite::Error> {
        if scan.exhausted {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(COORDINATE_QUERY)?;
        let page = stmt
            .query_map(
                params![scan.after_state_id, self.page_size as i64],
                RecorderRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        match page.last() {
            Some(last) => scan.after_state_id = last.state_id,
            None => scan.exhausted = true,
        }
        if page.len() < self.page_size {
            scan.exhausted = true;
        }

        log::debug!("📥 Read {} recorder rows (coordinate scan)", page.len());
        Ok(page)
    }
}
