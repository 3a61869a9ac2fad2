//! Export job model and deterministic job naming.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use landcover_common::{CrsCode, LandcoverError, Region};

/// Default naming template: `{prefix}_{year}`.
pub const DEFAULT_NAME_TEMPLATE: &str = "{prefix}_{year}";

/// Output encoding of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    GeoTiff,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoTiff => "tif",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LandcoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geotiff" | "tif" | "tiff" => Ok(ExportFormat::GeoTiff),
            "json" => Ok(ExportFormat::Json),
            other => Err(LandcoverError::config(format!("unknown export format '{}'", other))),
        }
    }
}

/// Where and how per-year extracts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub folder: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_name_template")]
    pub name_template: String,
    #[serde(default)]
    pub crs: CrsCode,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    #[serde(default)]
    pub format: ExportFormat,
}

fn default_name_prefix() -> String {
    "landcover".to_string()
}

fn default_name_template() -> String {
    DEFAULT_NAME_TEMPLATE.to_string()
}

fn default_max_pixels() -> u64 {
    10_000_000_000_000
}

impl ExportOptions {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name_prefix: default_name_prefix(),
            name_template: default_name_template(),
            crs: CrsCode::default(),
            max_pixels: default_max_pixels(),
            format: ExportFormat::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.folder.trim().is_empty() {
            return Err("export.folder must not be empty".to_string());
        }
        if self.max_pixels == 0 {
            return Err("export.max_pixels must be > 0".to_string());
        }
        if self.name_template.trim().is_empty() {
            return Err("export.name_template must not be empty".to_string());
        }
        Ok(())
    }
}

/// Job name from a template.
///
/// Placeholders are `{year}`, `{band}` and `{prefix}`. A template without
/// `{year}` gets `_{year}` appended so per-year names never collide. The
/// result only contains `[A-Za-z0-9_-]`; anything else becomes `_`.
pub fn job_name(template: &str, year: i32, band: &str, prefix: &str) -> String {
    let mut name = template
        .replace("{prefix}", prefix)
        .replace("{band}", band);
    if name.contains("{year}") {
        name = name.replace("{year}", &year.to_string());
    } else {
        name = format!("{}_{}", name, year);
    }

    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Everything an export backend needs to run one job.
#[derive(Debug, Clone)]
pub struct ExportParams {
    pub name: String,
    pub folder: String,
    pub region: Arc<Region>,
    pub scale_meters: f64,
    pub crs: CrsCode,
    pub max_pixels: u64,
    pub format: ExportFormat,
}

impl ExportParams {
    /// Object path of the extract, `{folder}/{name}.{ext}`.
    pub fn output_path(&self) -> String {
        let folder = self.folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}.{}", self.name, self.format.extension())
        } else {
            format!("{}/{}.{}", folder, self.name, self.format.extension())
        }
    }
}

/// Lifecycle of an export job.
///
/// `Created → Submitted` happens in the manager; later transitions are
/// reported by the export backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Created,
    Submitted,
    Running,
    Completed,
    Failed { message: String },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed { .. } | JobState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed { .. } => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a job accepted by the backend, used to poll it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    /// Where the backend will write the extract
    pub destination: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(name: impl Into<String>, year: i32, destination: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            year,
            destination: destination.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// One export request as tracked by the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ExportJob {
    pub name: String,
    pub year: i32,
    pub frame_id: String,
    pub folder: String,
    pub scale_meters: f64,
    pub crs: CrsCode,
    pub max_pixels: u64,
    pub format: ExportFormat,
    pub created_at: DateTime<Utc>,
    state: JobState,
    handle: Option<JobHandle>,
}

impl ExportJob {
    pub fn new(name: String, year: i32, frame_id: String, scale_meters: f64, options: &ExportOptions) -> Self {
        Self {
            name,
            year,
            frame_id,
            folder: options.folder.clone(),
            scale_meters,
            crs: options.crs,
            max_pixels: options.max_pixels,
            format: options.format,
            created_at: Utc::now(),
            state: JobState::Created,
            handle: None,
        }
    }

    pub fn params(&self, region: Arc<Region>) -> ExportParams {
        ExportParams {
            name: self.name.clone(),
            folder: self.folder.clone(),
            region,
            scale_meters: self.scale_meters,
            crs: self.crs,
            max_pixels: self.max_pixels,
            format: self.format,
        }
    }

    /// The only transition owned by the manager.
    pub(crate) fn mark_submitted(&mut self, handle: JobHandle) {
        self.state = JobState::Submitted;
        self.handle = Some(handle);
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn into_handle(self) -> Option<JobHandle> {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_placeholders() {
        assert_eq!(job_name("{prefix}_{year}", 2001, "LC_Type1", "cerrado"), "cerrado_2001");
        assert_eq!(
            job_name("{band}-{year}-{prefix}", 2019, "LC_Type1", "roi"),
            "LC_Type1-2019-roi"
        );
    }

    #[test]
    fn test_job_name_appends_year() {
        assert_eq!(job_name("landcover", 2005, "b", "p"), "landcover_2005");
    }

    #[test]
    fn test_job_name_sanitised() {
        assert_eq!(job_name("my export/{year}.tif", 2003, "b", "p"), "my_export_2003_tif");
    }

    #[test]
    fn test_output_path() {
        let mut options = ExportOptions::new("/exports/lc/");
        options.format = ExportFormat::Json;
        let job = ExportJob::new("lc_2001".into(), 2001, "f".into(), 500.0, &options);
        let params = job.params(Arc::new(
            landcover_common::RegionCatalog::validate_tuples(&[
                (0.0, 0.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (0.0, 0.0),
            ])
            .unwrap(),
        ));
        assert_eq!(params.output_path(), "exports/lc/lc_2001.json");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&JobState::Failed {
            message: "quota".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"failed","message":"quota"}"#);
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Submitted.is_terminal());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("GeoTIFF".parse::<ExportFormat>().unwrap(), ExportFormat::GeoTiff);
        assert!("png".parse::<ExportFormat>().is_err());
    }
}
