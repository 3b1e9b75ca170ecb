//! End-to-end energy export against a temporary recorder database
//!
//! Covers paging, minute averaging, idempotent re-runs and incremental
//! catch-up through watermarks loaded back from the sink.

mod common;

#[cfg(test)]
mod energy_sync_tests {
    use super::common::{MemorySink, RecorderFixture};
    use chrono::{NaiveDate, NaiveDateTime};
    use hass_export::energy::{EnergySync, Watermarks};
    use hass_export::recorder::RecorderReader;
    use hass_export::{EnergySyncConfig, SyncError};
    use tokio_util::sync::CancellationToken;

    // 2024-05-01 10:00:00 UTC
    const BASE: f64 = 1_714_557_600.0;

    const VOLTAGE_ATTRS: &str = r#"{"unit_of_measurement": "V", "device_class": "voltage", "friendly_name": "Office Plug Voltage"}"#;
    const POWER_ATTRS: &str = r#"{"unit_of_measurement": "W", "state_class": "measurement"}"#;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn fixture() -> RecorderFixture {
        let recorder = RecorderFixture::new();
        recorder.insert(1, "sensor.office_plug_voltage", "230", Some(BASE + 5.0), Some(VOLTAGE_ATTRS));
        recorder.insert(2, "sensor.office_plug_voltage", "232", Some(BASE + 40.0), Some(VOLTAGE_ATTRS));
        recorder.insert(3, "sensor.office_plug_voltage", "229", Some(BASE + 70.0), Some(VOLTAGE_ATTRS));
        recorder.insert(4, "sensor.office_plug_power", "12.5", Some(BASE + 5.0), Some(POWER_ATTRS));
        recorder.insert(5, "sensor.office_plug_power", "13", Some(BASE + 65.0), Some(POWER_ATTRS));
        recorder.insert(6, "sensor.office_plug_current", "0.5", Some(BASE + 10.0), None);
        recorder.insert(7, "sensor.office_plug_current", "unavailable", Some(BASE + 20.0), None);
        recorder.insert(8, "sensor.office_plug_current", "0.7", Some(BASE + 30.0), None);
        recorder.insert(9, "sensor.kitchen_temperature", "21", Some(BASE + 1.0), None);
        recorder
    }

    fn config(recorder: &RecorderFixture) -> EnergySyncConfig {
        EnergySyncConfig {
            sqlite_path: recorder.path().to_path_buf(),
            dsn: "ha@tcp(localhost:3306)/ha".to_string(),
            entity: "office_plug".to_string(),
            page_size: 2,
            ..Default::default()
        }
    }

    async fn run_once(
        recorder: &RecorderFixture,
        mut sink: MemorySink,
    ) -> Result<(hass_export::SyncSummary, MemorySink), SyncError> {
        let config = config(recorder);
        let mut reader = RecorderReader::open(recorder.path())?.with_page_size(config.page_size);
        let watermarks = Watermarks::load(&mut sink).await?;

        let mut sync = EnergySync::new(config, watermarks, sink, CancellationToken::new());
        let summary = sync.run(&mut reader).await?;
        Ok((summary, sync.into_sink()))
    }

    #[tokio::test]
    async fn test_first_run_exports_matching_entities() {
        let recorder = fixture();
        let (summary, sink) = run_once(&recorder, MemorySink::default()).await.unwrap();

        assert_eq!(summary.scanned, 8);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.rows_written, 7);
        assert_eq!(summary.emitted_aggregates, 4);
        assert_eq!(sink.energy.len(), 7);
        assert!(sink.energy.keys().all(|(entity, _)| entity.contains("office_plug")));

        // 10:00:05 and 10:00:40 average into one row carried by the later reading
        let minute = sink.energy_point("sensor.office_plug_voltage", 2).unwrap();
        assert_eq!(minute.state, "231");
        assert_eq!(minute.numeric_state, Some(231.0));
        assert_eq!(minute.last_updated, Some(at(10, 0, 40)));
        assert_eq!(minute.friendly_name.as_deref(), Some("Office Plug Voltage"));
        assert!(sink.energy_point("sensor.office_plug_voltage", 1).is_none());
        assert_eq!(sink.energy_point("sensor.office_plug_voltage", 3).unwrap().state, "229");

        // Pass-through rows keep their raw state
        assert_eq!(sink.energy_point("sensor.office_plug_power", 4).unwrap().state, "12.5");

        // An unavailable reading closes the open current group
        assert_eq!(sink.energy_point("sensor.office_plug_current", 6).unwrap().state, "0.5");
        let gap = sink.energy_point("sensor.office_plug_current", 7).unwrap();
        assert_eq!(gap.state, "unavailable");
        assert_eq!(gap.numeric_state, None);
        assert_eq!(sink.energy_point("sensor.office_plug_current", 8).unwrap().state, "0.7");
    }

    #[tokio::test]
    async fn test_rerun_writes_nothing() {
        let recorder = fixture();
        let (_, sink) = run_once(&recorder, MemorySink::default()).await.unwrap();
        let before = sink.energy.clone();

        let (summary, sink) = run_once(&recorder, sink).await.unwrap();

        assert_eq!(summary.scanned, 8);
        assert_eq!(summary.skipped, 8);
        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.statements, 0);
        assert_eq!(sink.updated, 0);
        assert_eq!(sink.energy, before);
    }

    #[tokio::test]
    async fn test_incremental_run_picks_up_new_readings() {
        let recorder = fixture();
        let (_, sink) = run_once(&recorder, MemorySink::default()).await.unwrap();

        recorder.insert(10, "sensor.office_plug_voltage", "231", Some(BASE + 100.0), Some(VOLTAGE_ATTRS));
        recorder.insert(11, "sensor.office_plug_voltage", "233", Some(BASE + 110.0), Some(VOLTAGE_ATTRS));
        recorder.insert(12, "sensor.office_plug_power", "14", Some(BASE + 120.0), Some(POWER_ATTRS));

        let (summary, sink) = run_once(&recorder, sink).await.unwrap();

        assert_eq!(summary.skipped, 8);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(sink.inserted, 9);
        assert_eq!(sink.updated, 0);

        let latest = sink.energy_point("sensor.office_plug_voltage", 11).unwrap();
        assert_eq!(latest.state, "232");
        assert_eq!(latest.last_updated, Some(at(10, 1, 50)));
        assert_eq!(sink.energy_point("sensor.office_plug_power", 12).unwrap().state, "14");
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let recorder = fixture();
        let config = config(&recorder);
        let mut reader = RecorderReader::open(recorder.path()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sync = EnergySync::new(config, Watermarks::default(), MemorySink::default(), cancel);

        let result = sync.run(&mut reader).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert_eq!(sync.sink().statements, 0);
        assert!(sync.watermarks().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_with_fractional_timestamps_keeps_average() {
        let recorder = RecorderFixture::new();
        recorder.insert(1, "sensor.office_plug_voltage", "230", Some(BASE + 5.123456), Some(VOLTAGE_ATTRS));
        recorder.insert(2, "sensor.office_plug_voltage", "232", Some(BASE + 40.654321), Some(VOLTAGE_ATTRS));

        let (first, sink) = run_once(&recorder, MemorySink::default()).await.unwrap();
        assert_eq!(first.rows_written, 1);
        let stored = sink.energy_point("sensor.office_plug_voltage", 2).unwrap().clone();
        assert_eq!(stored.state, "231");

        // The stored watermark has microsecond precision; the newest reading must still match it
        let (second, sink) = run_once(&recorder, sink).await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.rows_written, 0);
        assert_eq!(sink.updated, 0);
        assert_eq!(sink.energy_point("sensor.office_plug_voltage", 2), Some(&stored));
    }

    #[tokio::test]
    async fn test_malformed_payload_aborts_run() {
        let recorder = fixture();
        recorder.insert(20, "sensor.office_plug_power", "15", Some(BASE + 200.0), Some("not json"));

        let err = run_once(&recorder, MemorySink::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::Attributes { state_id: 20, .. }));
    }
}
