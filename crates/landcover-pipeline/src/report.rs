//! Run reports and the JSON-lines report sink.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use export_jobs::JobHandle;
use landcover_common::{LandcoverResult, YearRange};

use crate::config::RunMode;
use crate::outcome::{Stage, YearOutcome, YearRecord};

/// Outcome counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Complete per-year outcome report of one batch run, keyed by year.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub years: YearRange,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    records: BTreeMap<i32, YearRecord>,
}

impl RunReport {
    pub fn new(mode: RunMode, years: YearRange, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            years,
            started_at,
            finished_at: None,
            records: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: YearRecord) {
        self.records.insert(record.year, record);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record(&self, year: i32) -> Option<&YearRecord> {
        self.records.get(&year)
    }

    pub fn outcome(&self, year: i32) -> Option<&YearOutcome> {
        self.records.get(&year).map(|r| &r.outcome)
    }

    /// Records in ascending year order.
    pub fn records(&self) -> impl Iterator<Item = &YearRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every requested year has an outcome.
    pub fn is_complete(&self) -> bool {
        self.years.years().all(|y| self.records.contains_key(&y))
    }

    /// Handles of every export accepted during the run.
    pub fn job_handles(&self) -> Vec<&JobHandle> {
        self.records().filter_map(|r| r.outcome.job()).collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.records.len(),
            ..RunSummary::default()
        };
        for record in self.records.values() {
            match record.outcome {
                YearOutcome::Skipped(_) => summary.skipped += 1,
                YearOutcome::Failed { .. } => summary.failed += 1,
                _ => summary.succeeded += 1,
            }
        }
        summary
    }

    /// Flat report records in ascending year order.
    pub fn to_records(&self) -> Vec<ReportRecord> {
        self.records().map(ReportRecord::from_year).collect()
    }
}

/// Export part of a report record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub job_id: String,
    pub job_name: String,
    pub destination: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<&JobHandle> for ExportOutcome {
    fn from(handle: &JobHandle) -> Self {
        Self {
            job_id: handle.id.to_string(),
            job_name: handle.name.clone(),
            destination: handle.destination.clone(),
            submitted_at: handle.submitted_at,
        }
    }
}

/// One JSON line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub year: i32,
    pub status: String,
    pub frame_id: Option<String>,
    pub ambiguous: bool,
    pub histogram: Option<BTreeMap<u8, u64>>,
    pub area_by_group: Option<BTreeMap<String, f64>>,
    pub total_area_km2: Option<f64>,
    pub export_outcome: Option<ExportOutcome>,
    pub reason: Option<String>,
    pub error_kind: Option<String>,
    pub stage: Option<Stage>,
}

impl ReportRecord {
    pub fn from_year(record: &YearRecord) -> Self {
        let outcome = &record.outcome;
        let analysis = outcome.analysis();

        let (reason, error_kind, stage) = match outcome {
            YearOutcome::Skipped(reason) => (Some(reason.to_string()), None, None),
            YearOutcome::Failed { failure, .. } => (
                Some(failure.message.clone()),
                Some(failure.kind.to_string()),
                Some(failure.stage),
            ),
            _ => (None, None, None),
        };

        Self {
            year: record.year,
            status: outcome.status().to_string(),
            frame_id: record.frame.as_ref().map(|f| f.id.clone()),
            ambiguous: record.frame.as_ref().is_some_and(|f| f.is_ambiguous()),
            histogram: analysis.map(|a| a.histogram.counts().clone()),
            area_by_group: analysis.map(|a| a.areas.areas().clone()),
            total_area_km2: analysis.map(|a| a.areas.total_area_km2),
            export_outcome: outcome.job().map(ExportOutcome::from),
            reason,
            error_kind,
            stage,
        }
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write_record(&mut self, record: &ReportRecord) -> LandcoverResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Write every year of `report` and flush. Returns the number of lines.
    pub fn write_report(&mut self, report: &RunReport) -> LandcoverResult<usize> {
        let records = report.to_records();
        for record in &records {
            self.write_record(record)?;
        }
        self.flush()?;
        Ok(records.len())
    }

    pub fn flush(&mut self) -> LandcoverResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Lines written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{FrameInfo, SkipReason};
    use landcover_common::{GroupingScheme, LandcoverError};
    use std::collections::BTreeMap;
    use zonal_stats::{AreaResult, Histogram, ZonalAnalysis};

    fn analysis(year: i32) -> ZonalAnalysis {
        let histogram = Histogram::from_counts(500.0, BTreeMap::from([(2, 6), (7, 3)]));
        let areas = AreaResult::from_histogram(year, &histogram, &GroupingScheme::canonical());
        ZonalAnalysis { histogram, areas }
    }

    fn report() -> RunReport {
        let mut report = RunReport::new(RunMode::Analyze, YearRange::new(2001, 2003).unwrap(), Utc::now());
        let frame = FrameInfo {
            id: "MCD12Q1_2001".into(),
            acquired: chrono::NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            candidates: 1,
        };
        report.insert(YearRecord::new(2001, Some(frame), YearOutcome::Analyzed(analysis(2001))));
        report.insert(YearRecord::skipped(2002, SkipReason::MissingYear));
        report.insert(YearRecord::failed(
            2003,
            None,
            Stage::Analyze,
            &LandcoverError::ComputeLimitExceeded {
                pixels: 10,
                max_pixels: 5,
            },
        ));
        report
    }

    #[test]
    fn test_summary_counts() {
        let report = report();
        assert!(report.is_complete());
        assert_eq!(
            report.summary(),
            RunSummary {
                total: 3,
                succeeded: 1,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_json_lines_one_per_year() {
        let mut sink = JsonLinesSink::new(Vec::new());
        assert_eq!(sink.write_report(&report()).unwrap(), 3);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0]["year"], 2001);
        assert_eq!(lines[0]["status"], "analyzed");
        assert_eq!(lines[0]["histogram"]["2"], 6);
        assert_eq!(lines[0]["areaByGroup"]["Forest"], 1.5);
        assert!(lines[0]["reason"].is_null());

        assert_eq!(lines[1]["status"], "skipped");
        assert_eq!(lines[1]["reason"], "MissingYearError");

        assert_eq!(lines[2]["status"], "failed");
        assert_eq!(lines[2]["errorKind"], "ComputeLimitExceeded");
        assert_eq!(lines[2]["stage"], "analyze");
    }

    #[test]
    fn test_record_roundtrip() {
        let records = report().to_records();
        let json = serde_json::to_string(&records[0]).unwrap();
        let back: ReportRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records[0]);
    }
}
