//! A configured run over an on-disk catalog and local export storage.

use std::sync::Arc;
use std::time::Duration;

use export_jobs::{JobState, ObjectStoreExportBackend};
use landcover_pipeline::{BatchDriver, CancellationToken, JsonLinesSink, RunConfig, RunMode};
use raster_catalog::{FileCatalog, FrameDocument};
use test_utils::{covering_region, forest_scenario_frame};
use zonal_stats::LocalComputeBackend;

#[tokio::test]
async fn test_configured_run_writes_extracts_and_report() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let export_dir = tempfile::tempdir().unwrap();

    for year in [2001, 2003] {
        FrameDocument::from_frame(&forest_scenario_frame(year))
            .write_to_dir(catalog_dir.path())
            .await
            .unwrap();
    }

    let config_path = catalog_dir.path().join("run.yaml");
    std::fs::write(
        &config_path,
        format!(
            r#"
band: LC_Type1
start_year: 2001
end_year: 2003
mode: both
concurrency: 2
export_destination:
  folder: ${{LC_FILE_RUN_FOLDER:-cerrado}}
  name_prefix: roi
storage:
  type: local
  root: {}
"#,
            export_dir.path().display()
        ),
    )
    .unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    assert_eq!(config.mode, RunMode::Both);

    let exports = Arc::new(ObjectStoreExportBackend::from_target(&config.storage).unwrap());
    let driver = BatchDriver::new(
        Arc::new(FileCatalog::open(catalog_dir.path()).unwrap()),
        Arc::new(LocalComputeBackend::new()),
        exports.clone(),
        config,
    )
    .unwrap();

    let report = driver
        .run_configured(&covering_region(4, 4), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.summary().succeeded, 2);
    assert_eq!(report.summary().skipped, 1);

    for handle in report.job_handles() {
        let state = exports.wait(handle, Duration::from_secs(5)).await.unwrap();
        assert_eq!(state, JobState::Completed);
    }
    assert!(export_dir.path().join("cerrado/roi_2001.tif").is_file());
    assert!(export_dir.path().join("cerrado/roi_2003.tif").is_file());
    assert!(!export_dir.path().join("cerrado/roi_2002.tif").exists());

    let report_path = export_dir.path().join("report.jsonl");
    let file = std::fs::File::create(&report_path).unwrap();
    assert_eq!(JsonLinesSink::new(file).write_report(&report).unwrap(), 3);
    let lines = std::fs::read_to_string(&report_path).unwrap();
    assert_eq!(lines.lines().count(), 3);
    assert!(lines.contains("\"exportOutcome\":{"));
}
