//! Run configuration.
//!
//! A run is described by one YAML document. `${VAR}` and `${VAR:-default}`
//! references are expanded from the environment before parsing, and
//! `LANDCOVER_*` variables can override individual fields afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use export_jobs::{ExportOptions, StorageTarget};
use landcover_common::{CodeRange, GroupingScheme, LandcoverError, LandcoverResult, YearRange};
use raster_catalog::DuplicateFramePolicy;
use zonal_stats::ZonalConfig;

use crate::retry::RetryConfig;

/// What a run does with each resolved frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Analyze,
    Export,
    Both,
}

impl RunMode {
    pub fn analyzes(&self) -> bool {
        matches!(self, RunMode::Analyze | RunMode::Both)
    }

    pub fn exports(&self) -> bool {
        matches!(self, RunMode::Export | RunMode::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Analyze => "analyze",
            RunMode::Export => "export",
            RunMode::Both => "both",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = LandcoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analyze" => Ok(RunMode::Analyze),
            "export" => Ok(RunMode::Export),
            "both" => Ok(RunMode::Both),
            other => Err(LandcoverError::config(format!(
                "unknown run mode '{}' (expected analyze, export or both)",
                other
            ))),
        }
    }
}

/// All tunables of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Band holding the class codes
    #[serde(default = "default_band")]
    pub band: String,

    #[serde(default = "default_start_year", alias = "startYear")]
    pub start_year: i32,

    #[serde(default = "default_end_year", alias = "endYear")]
    pub end_year: i32,

    /// Nominal pixel size used for statistics and exports
    #[serde(default = "default_scale_meters", alias = "scaleMeters")]
    pub scale_meters: f64,

    /// Group name to class codes, e.g. `Forest: ["1-5"]`
    #[serde(default = "default_groups")]
    pub groups: BTreeMap<String, Vec<CodeRange>>,

    #[serde(default, alias = "exportDestination")]
    pub export_destination: Option<ExportOptions>,

    /// Where the export backend writes extracts
    #[serde(default)]
    pub storage: StorageTarget,

    #[serde(default)]
    pub mode: RunMode,

    /// Years processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_true", alias = "dedupeExports")]
    pub dedupe_exports: bool,

    #[serde(default)]
    pub compute: ZonalConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub duplicate_frames: DuplicateFramePolicy,
}

fn default_band() -> String {
    "LC_Type1".to_string()
}

fn default_start_year() -> i32 {
    2001
}

fn default_end_year() -> i32 {
    2019
}

fn default_scale_meters() -> f64 {
    500.0
}

fn default_groups() -> BTreeMap<String, Vec<CodeRange>> {
    GroupingScheme::canonical()
        .groups()
        .iter()
        .map(|g| (g.name.clone(), g.ranges.clone()))
        .collect()
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            band: default_band(),
            start_year: default_start_year(),
            end_year: default_end_year(),
            scale_meters: default_scale_meters(),
            groups: default_groups(),
            export_destination: None,
            storage: StorageTarget::default(),
            mode: RunMode::default(),
            concurrency: default_concurrency(),
            dedupe_exports: true,
            compute: ZonalConfig::default(),
            retry: RetryConfig::default(),
            duplicate_frames: DuplicateFramePolicy::default(),
        }
    }
}

impl RunConfig {
    /// Read, expand, parse and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> LandcoverResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LandcoverError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse a YAML document after environment expansion.
    pub fn from_yaml_str(content: &str) -> LandcoverResult<Self> {
        let expanded = expand_env_vars(content)?;
        let config: RunConfig = serde_yaml::from_str(&expanded)
            .map_err(|e| LandcoverError::config(format!("failed to parse run config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `LANDCOVER_*` environment variables.
    ///
    /// Unparseable values are ignored; call [`RunConfig::validate`] afterwards.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LANDCOVER_BAND") {
            if !val.is_empty() {
                self.band = val;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_START_YEAR") {
            if let Ok(year) = val.parse() {
                self.start_year = year;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_END_YEAR") {
            if let Ok(year) = val.parse() {
                self.end_year = year;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_SCALE_METERS") {
            if let Ok(scale) = val.parse() {
                self.scale_meters = scale;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.concurrency = n;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_DEDUPE_EXPORTS") {
            self.dedupe_exports = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("LANDCOVER_MODE") {
            if let Ok(mode) = val.parse() {
                self.mode = mode;
            }
        }

        if let Ok(val) = std::env::var("LANDCOVER_DUPLICATE_FRAMES") {
            if let Ok(policy) = val.parse() {
                self.duplicate_frames = policy;
            }
        }

        self.compute.apply_env_overrides();
    }

    /// Check every field; failures are fatal to the run.
    pub fn validate(&self) -> LandcoverResult<()> {
        if self.band.trim().is_empty() {
            return Err(LandcoverError::config("band must not be empty"));
        }

        self.years()?;

        if !(self.scale_meters.is_finite() && self.scale_meters > 0.0) {
            return Err(LandcoverError::config(format!(
                "scale_meters must be a positive number, got {}",
                self.scale_meters
            )));
        }

        if self.concurrency == 0 {
            return Err(LandcoverError::config("concurrency must be > 0"));
        }

        self.grouping()?;
        self.compute.validate().map_err(LandcoverError::Config)?;
        self.retry.validate().map_err(LandcoverError::Config)?;

        match &self.export_destination {
            Some(export) => export.validate().map_err(LandcoverError::Config)?,
            None if self.mode.exports() => {
                return Err(LandcoverError::config(format!(
                    "mode '{}' requires an export_destination",
                    self.mode
                )));
            }
            None => {}
        }

        Ok(())
    }

    pub fn years(&self) -> LandcoverResult<YearRange> {
        YearRange::new(self.start_year, self.end_year)
    }

    /// The configured groups, checked for overlap.
    pub fn grouping(&self) -> LandcoverResult<GroupingScheme> {
        GroupingScheme::from_map(&self.groups)
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> LandcoverResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut depth = 1;

            while depth > 0 {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(LandcoverError::config(format!(
                            "unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// `VAR` must be set; `VAR:-default` falls back when unset or empty.
fn resolve_var_expr(expr: &str) -> LandcoverResult<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            LandcoverError::config(format!("environment variable {} not set", expr.trim()))
        })
    }
}
