//! Per-year outcomes of a batch run.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use export_jobs::JobHandle;
use landcover_common::{ErrorKind, LandcoverError, RasterFrame};
use zonal_stats::ZonalAnalysis;

/// Step of the per-year pipeline that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Analyze,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Analyze => "analyze",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a year was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The catalog has no frame for the year
    MissingYear,
    /// The run was cancelled before the year started
    Cancelled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingYear => ErrorKind::MissingYear.as_str(),
            SkipReason::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error recorded for a failed year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub message: String,
}

impl FailureReason {
    pub fn new(stage: Stage, error: &LandcoverError) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.message)
    }
}

/// What happened to one requested year.
#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    Analyzed(ZonalAnalysis),
    Exported(JobHandle),
    AnalyzedAndExported {
        analysis: ZonalAnalysis,
        job: JobHandle,
    },
    Skipped(SkipReason),
    /// `analysis` is kept when a `both` run analyzed the year before the
    /// export failed.
    Failed {
        failure: FailureReason,
        analysis: Option<ZonalAnalysis>,
    },
}

impl YearOutcome {
    /// Status label used in reports and the `landcover_years_total` metric.
    pub fn status(&self) -> &'static str {
        match self {
            YearOutcome::Analyzed(_) => "analyzed",
            YearOutcome::Exported(_) => "exported",
            YearOutcome::AnalyzedAndExported { .. } => "analyzed_and_exported",
            YearOutcome::Skipped(_) => "skipped",
            YearOutcome::Failed { .. } => "failed",
        }
    }

    pub fn analysis(&self) -> Option<&ZonalAnalysis> {
        match self {
            YearOutcome::Analyzed(analysis) | YearOutcome::AnalyzedAndExported { analysis, .. } => {
                Some(analysis)
            }
            YearOutcome::Failed { analysis, .. } => analysis.as_ref(),
            _ => None,
        }
    }

    pub fn job(&self) -> Option<&JobHandle> {
        match self {
            YearOutcome::Exported(job) | YearOutcome::AnalyzedAndExported { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            YearOutcome::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            YearOutcome::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, YearOutcome::Skipped(_) | YearOutcome::Failed { .. })
    }
}

/// The frame a year resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: String,
    pub acquired: NaiveDate,
    /// Frames the catalog held for the year; above 1 means the pick was ambiguous
    pub candidates: usize,
}

impl FrameInfo {
    pub fn new(frame: &RasterFrame, candidates: usize) -> Self {
        Self {
            id: frame.id.clone(),
            acquired: frame.acquired,
            candidates,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// One year's entry in a run report.
#[derive(Debug, Clone, PartialEq)]
pub struct YearRecord {
    pub year: i32,
    pub frame: Option<FrameInfo>,
    pub outcome: YearOutcome,
}

impl YearRecord {
    pub fn new(year: i32, frame: Option<FrameInfo>, outcome: YearOutcome) -> Self {
        Self {
            year,
            frame,
            outcome,
        }
    }

    pub fn skipped(year: i32, reason: SkipReason) -> Self {
        Self::new(year, None, YearOutcome::Skipped(reason))
    }

    pub fn failed(year: i32, frame: Option<FrameInfo>, stage: Stage, error: &LandcoverError) -> Self {
        Self::failed_after(year, frame, stage, error, None)
    }

    /// A failure that still carries the analysis computed before it.
    pub fn failed_after(
        year: i32,
        frame: Option<FrameInfo>,
        stage: Stage,
        error: &LandcoverError,
        analysis: Option<ZonalAnalysis>,
    ) -> Self {
        let failure = FailureReason::new(stage, error);
        Self::new(year, frame, YearOutcome::Failed { failure, analysis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_names_stage() {
        let reason = FailureReason::new(Stage::Export, &LandcoverError::submission("bad crs"));
        assert_eq!(reason.kind, ErrorKind::Submission);
        assert_eq!(reason.to_string(), "export failed (SubmissionError): Export submission rejected: bad crs");
    }

    #[test]
    fn test_skip_reason_labels() {
        assert_eq!(SkipReason::MissingYear.as_str(), "MissingYearError");
        let outcome = YearOutcome::Skipped(SkipReason::Cancelled);
        assert_eq!(outcome.status(), "skipped");
        assert!(!outcome.is_success());
        assert!(outcome.analysis().is_none() && outcome.job().is_none());
    }
}
