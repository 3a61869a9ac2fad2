//! Land-cover batch runner.
//!
//! Computes yearly class-group areas over a region of interest and/or
//! exports per-year raster extracts:
//! - Frames come from a directory of `*.frame.json` catalog documents
//! - Statistics run on the local compute backend
//! - Extracts are written to the configured object store
//! - One JSON line per year is written to the report (stdout by default)

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use export_jobs::{ExportOptions, ObjectStoreExportBackend, StorageTarget};
use landcover_common::{Region, RegionCatalog};
use landcover_pipeline::{BatchDriver, CancellationToken, JsonLinesSink, RunConfig, RunMode};
use raster_catalog::FileCatalog;
use zonal_stats::LocalComputeBackend;

#[derive(Parser, Debug)]
#[command(name = "landcover")]
#[command(about = "Yearly land-cover statistics and raster exports over a region of interest")]
struct Args {
    /// Run configuration file (YAML)
    #[arg(short, long, env = "LANDCOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing *.frame.json catalog documents
    #[arg(long, env = "LANDCOVER_CATALOG_DIR", default_value = "data/catalog")]
    catalog_dir: PathBuf,

    /// GeoJSON file with the region polygon
    #[arg(long, conflicts_with_all = ["roi_coords", "roi_bbox"])]
    roi: Option<PathBuf>,

    /// Region ring as "lon,lat lon,lat ..."
    #[arg(long, conflicts_with = "roi_bbox", allow_hyphen_values = true)]
    roi_coords: Option<String>,

    /// Rectangular region as "minLon,minLat,maxLon,maxLat"
    #[arg(long, allow_hyphen_values = true)]
    roi_bbox: Option<String>,

    /// analyze, export or both
    #[arg(long)]
    mode: Option<RunMode>,

    /// Band holding the class codes
    #[arg(long)]
    band: Option<String>,

    #[arg(long)]
    start_year: Option<i32>,

    #[arg(long)]
    end_year: Option<i32>,

    /// Years processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Allow the same export name to be submitted twice
    #[arg(long)]
    no_dedupe: bool,

    /// Local directory used as the export object store
    #[arg(long, env = "LANDCOVER_EXPORT_ROOT")]
    export_root: Option<PathBuf>,

    /// Report file (JSON lines); stdout when omitted
    #[arg(long)]
    report: Option<PathBuf>,

    /// Seconds to wait for accepted exports before exiting
    #[arg(long, default_value = "300")]
    export_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so the report can own stdout
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting land-cover batch run");

    let config = build_config(&args)?;
    let region = load_region(&args).await?;

    let catalog = FileCatalog::open(&args.catalog_dir)
        .with_context(|| format!("failed to open catalog {}", args.catalog_dir.display()))?;
    info!(
        root = %args.catalog_dir.display(),
        frames = catalog.len(),
        "Catalog indexed"
    );

    let exports = Arc::new(
        ObjectStoreExportBackend::from_target(&config.storage)
            .context("failed to open export storage")?,
    );

    let driver = BatchDriver::new(
        Arc::new(catalog),
        Arc::new(LocalComputeBackend::new()),
        exports.clone(),
        config,
    )?;

    // Handle Ctrl+C
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, finishing in-flight years");
        cancel_on_signal.cancel();
    });

    let report = driver.run_configured(&region, cancel).await?;

    // Exports run in-process; wait so they are not dropped on exit
    let timeout = Duration::from_secs(args.export_timeout_secs);
    for handle in report.job_handles() {
        let state = exports.wait(handle, timeout).await?;
        if state.is_terminal() {
            info!(job = %handle.name, state = %state, destination = %handle.destination, "Export finished");
        } else {
            warn!(job = %handle.name, state = %state, "Export still running at exit");
        }
    }

    let written = match &args.report {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create report {}", path.display()))?;
            JsonLinesSink::new(BufWriter::new(file)).write_report(&report)?
        }
        None => JsonLinesSink::new(std::io::stdout().lock()).write_report(&report)?,
    };

    let summary = report.summary();
    info!(
        records = written,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        "Run complete"
    );

    Ok(())
}

/// Config file (or defaults), then `LANDCOVER_*` variables, then flags.
fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(band) = &args.band {
        config.band = band.clone();
    }
    if let Some(year) = args.start_year {
        config.start_year = year;
    }
    if let Some(year) = args.end_year {
        config.end_year = year;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.no_dedupe {
        config.dedupe_exports = false;
    }
    if let Some(root) = &args.export_root {
        config.storage = StorageTarget::Local { root: root.clone() };
    }
    if config.mode.exports() && config.export_destination.is_none() {
        info!("No export destination configured, using folder 'landcover'");
        config.export_destination = Some(ExportOptions::new("landcover"));
    }

    config.validate().context("invalid run configuration")?;
    Ok(config)
}

async fn load_region(args: &Args) -> Result<Region> {
    if let Some(path) = &args.roi {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read ROI {}", path.display()))?;
        return Ok(RegionCatalog::from_geojson(&content)?);
    }

    if let Some(coords) = &args.roi_coords {
        return Ok(RegionCatalog::from_coordinate_list(coords)?);
    }

    if let Some(bbox) = &args.roi_bbox {
        return Ok(RegionCatalog::from_bbox_csv(bbox)?);
    }

    bail!("a region is required: pass --roi, --roi-coords or --roi-bbox")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "landcover",
            "--roi-coords",
            "0,0 4,0 4,4 0,4 0,0",
            "--mode",
            "both",
            "--start-year",
            "2003",
            "--end-year",
            "2005",
            "--concurrency",
            "2",
            "--no-dedupe",
            "--export-root",
            "/tmp/lc-exports",
        ])
        .unwrap();

        let config = build_config(&args).unwrap();
        assert_eq!(config.mode, RunMode::Both);
        assert_eq!((config.start_year, config.end_year), (2003, 2005));
        assert_eq!(config.concurrency, 2);
        assert!(!config.dedupe_exports);
        assert!(config.export_destination.is_some());
        assert_eq!(
            config.storage,
            StorageTarget::Local {
                root: PathBuf::from("/tmp/lc-exports")
            }
        );
    }

    #[test]
    fn test_inverted_years_rejected() {
        let args = Args::try_parse_from([
            "landcover",
            "--start-year",
            "2010",
            "--end-year",
            "2001",
        ])
        .unwrap();
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_roi_flags_conflict() {
        let result = Args::try_parse_from([
            "landcover",
            "--roi",
            "roi.geojson",
            "--roi-coords",
            "0,0 1,0 1,1 0,0",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_region_from_bbox_flag() {
        let args = Args::try_parse_from(["landcover", "--roi-bbox", "-60,-24,-41,-2"]).unwrap();
        let region = load_region(&args).await.unwrap();
        assert_eq!(region.bounding_box().as_tuple(), (-60.0, -24.0, -41.0, -2.0));
    }

    #[tokio::test]
    async fn test_missing_region_is_an_error() {
        let args = Args::try_parse_from(["landcover"]).unwrap();
        assert!(load_region(&args).await.is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Args::try_parse_from(["landcover", "--mode", "sideways"]).is_err());
    }
}
