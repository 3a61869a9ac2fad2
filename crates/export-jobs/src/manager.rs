//! Export job submission with optional session-scoped deduplication.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use metrics::counter;
use tracing::{info, instrument, warn};

use landcover_common::{LandcoverError, LandcoverResult, RasterFrame, Region};

use crate::backend::ExportBackend;
use crate::job::{job_name, ExportJob, ExportOptions, JobHandle, JobState};

/// Names jobs, enqueues them on the export backend and hands back handles
/// without waiting for completion.
///
/// With deduplication enabled, a job name can be submitted at most once per
/// manager; a second attempt fails with `DuplicateJob` before reaching the
/// backend.
pub struct ExportJobManager {
    backend: Arc<dyn ExportBackend>,
    seen: Option<Mutex<HashSet<String>>>,
}

impl ExportJobManager {
    pub fn new(backend: Arc<dyn ExportBackend>, dedupe: bool) -> Self {
        Self {
            backend,
            seen: dedupe.then(|| Mutex::new(HashSet::new())),
        }
    }

    pub fn dedupe_enabled(&self) -> bool {
        self.seen.is_some()
    }

    /// Names submitted so far in this session, sorted.
    pub fn seen_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match &self.seen {
            Some(seen) => seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        names.sort();
        names
    }

    /// Submit an export of `frame` clipped to `region`.
    ///
    /// Returns once the backend has accepted the job. Rejections surface as
    /// `Submission`; a repeated name with dedupe on is `DuplicateJob`.
    #[instrument(skip(self, frame, region, options), fields(frame = %frame.id, year = frame.year()))]
    pub async fn submit(
        &self,
        frame: &RasterFrame,
        region: &Arc<Region>,
        scale_meters: f64,
        options: &ExportOptions,
    ) -> LandcoverResult<ExportJob> {
        if !(scale_meters.is_finite() && scale_meters > 0.0) {
            return Err(LandcoverError::submission(format!(
                "invalid export scale {}",
                scale_meters
            )));
        }

        let name = job_name(
            &options.name_template,
            frame.year(),
            &frame.band,
            &options.name_prefix,
        );
        let mut job = ExportJob::new(name.clone(), frame.year(), frame.id.clone(), scale_meters, options);

        self.reserve(&name)?;

        let handle = match self
            .backend
            .submit_export(frame, &job.params(Arc::clone(region)))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.release(&name);
                warn!(job = %name, error = %e, "Export submission rejected");
                return Err(match e {
                    LandcoverError::Submission(_) => e,
                    other => LandcoverError::submission(other.to_string()),
                });
            }
        };

        info!(job = %name, id = %handle.id, destination = %handle.destination, "Export submitted");
        counter!("landcover_exports_submitted_total").increment(1);
        job.mark_submitted(handle);
        Ok(job)
    }

    /// Current backend state of a submitted job.
    pub async fn status(&self, handle: &JobHandle) -> LandcoverResult<JobState> {
        self.backend.status(handle).await
    }

    /// Ask the backend to cancel a job. Names stay reserved.
    pub async fn cancel(&self, handle: &JobHandle) -> LandcoverResult<()> {
        self.backend.cancel(handle).await
    }

    fn reserve(&self, name: &str) -> LandcoverResult<()> {
        if let Some(seen) = &self.seen {
            let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(name.to_string()) {
                warn!(job = %name, "Duplicate export rejected");
                return Err(LandcoverError::DuplicateJob(name.to_string()));
            }
        }
        Ok(())
    }

    fn release(&self, name: &str) {
        if let Some(seen) = &self.seen {
            seen.lock().unwrap_or_else(|e| e.into_inner()).remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ObjectStoreExportBackend;
    use test_utils::{covering_region, forest_scenario_frame};

    fn manager(dedupe: bool) -> ExportJobManager {
        ExportJobManager::new(Arc::new(ObjectStoreExportBackend::in_memory()), dedupe)
    }

    #[tokio::test]
    async fn test_submit_transitions_to_submitted() {
        let m = manager(true);
        let region = Arc::new(covering_region(4, 4));
        let job = m
            .submit(&forest_scenario_frame(2001), &region, 500.0, &ExportOptions::new("lc"))
            .await
            .unwrap();

        assert_eq!(job.name, "landcover_2001");
        assert_eq!(job.state(), &JobState::Submitted);
        assert!(job.handle().is_some());
        assert_eq!(m.seen_names(), vec!["landcover_2001".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_submission_releases_name() {
        let m = manager(true);
        let region = Arc::new(covering_region(4, 4));
        let mut options = ExportOptions::new("lc");
        options.max_pixels = 1;

        let err = m
            .submit(&forest_scenario_frame(2001), &region, 500.0, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, LandcoverError::Submission(_)));
        assert!(m.seen_names().is_empty());

        options.max_pixels = 1_000;
        assert!(m
            .submit(&forest_scenario_frame(2001), &region, 500.0, &options)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_scale_rejected() {
        let m = manager(false);
        let region = Arc::new(covering_region(4, 4));
        let err = m
            .submit(&forest_scenario_frame(2001), &region, 0.0, &ExportOptions::new("lc"))
            .await
            .unwrap_err();
        assert!(matches!(err, LandcoverError::Submission(_)));
    }
}
