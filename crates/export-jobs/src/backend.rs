//! Export execution backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{path::Path, ObjectStore};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use landcover_common::{LandcoverError, LandcoverResult, RasterFrame};

use crate::extract::RasterExtract;
use crate::geotiff::encode_geotiff;
use crate::job::{ExportFormat, ExportParams, JobHandle, JobState};
use crate::storage::StorageTarget;

/// Backend contract for running export jobs.
///
/// `submit_export` must return as soon as the job is accepted; execution
/// happens elsewhere and is observed through `status`.
#[async_trait]
pub trait ExportBackend: Send + Sync {
    /// Accept a job or reject it with `Submission`.
    async fn submit_export(
        &self,
        frame: &RasterFrame,
        params: &ExportParams,
    ) -> LandcoverResult<JobHandle>;

    async fn status(&self, handle: &JobHandle) -> LandcoverResult<JobState>;

    /// Request cancellation; a no-op for jobs that already finished.
    async fn cancel(&self, handle: &JobHandle) -> LandcoverResult<()>;
}

struct TaskEntry {
    state: Arc<Mutex<JobState>>,
    abort: tokio::task::AbortHandle,
}

fn set_state(state: &Mutex<JobState>, next: JobState) {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    // Cancellation wins over a late completion
    if !guard.is_terminal() {
        *guard = next;
    }
}

fn get_state(state: &Mutex<JobState>) -> JobState {
    state.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Runs each export as a tokio task that renders the extract and writes it
/// to an object store.
pub struct ObjectStoreExportBackend {
    store: Arc<dyn ObjectStore>,
    location: String,
    tasks: Mutex<HashMap<Uuid, TaskEntry>>,
}

impl ObjectStoreExportBackend {
    pub fn new(store: Arc<dyn ObjectStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_target(target: &StorageTarget) -> LandcoverResult<Self> {
        Ok(Self::new(target.build()?, target.describe()))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "memory://")
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Number of jobs accepted so far.
    pub fn job_count(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Poll until the job reaches a terminal state or `timeout` elapses,
    /// returning the last observed state.
    pub async fn wait(&self, handle: &JobHandle, timeout: Duration) -> LandcoverResult<JobState> {
        let start = std::time::Instant::now();

        loop {
            let state = self.status(handle).await?;
            if state.is_terminal() || start.elapsed() > timeout {
                return Ok(state);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn check_submission(frame: &RasterFrame, params: &ExportParams) -> LandcoverResult<()> {
        if params.crs != frame.crs {
            return Err(LandcoverError::submission(format!(
                "reprojection from {} to {} is not supported",
                frame.crs, params.crs
            )));
        }

        let pixels = RasterExtract::pixel_count(frame, &params.region, params.scale_meters)
            .map_err(|e| LandcoverError::submission(e.to_string()))?
            .ok_or_else(|| {
                LandcoverError::submission(format!(
                    "region does not overlap frame {}",
                    frame.id
                ))
            })?;

        if pixels > params.max_pixels {
            return Err(LandcoverError::submission(format!(
                "export of {} pixels exceeds maxPixels {}",
                pixels, params.max_pixels
            )));
        }

        Ok(())
    }
}

/// Render, encode and upload one extract.
async fn run_export(
    store: Arc<dyn ObjectStore>,
    frame: RasterFrame,
    params: ExportParams,
    path: String,
) -> LandcoverResult<usize> {
    let payload = tokio::task::spawn_blocking(move || {
        let extract =
            RasterExtract::render(&params.name, &frame, &params.region, params.scale_meters)?;
        match params.format {
            ExportFormat::GeoTiff => encode_geotiff(&extract),
            ExportFormat::Json => serde_json::to_vec(&extract)
                .map_err(|e| LandcoverError::Io(format!("failed to encode extract: {}", e))),
        }
    })
    .await
    .map_err(|e| LandcoverError::Io(format!("export task failed: {}", e)))??;

    let size = payload.len();
    store
        .put(&Path::from(path.as_str()), Bytes::from(payload))
        .await
        .map_err(|e| LandcoverError::Io(format!("failed to write {}: {}", path, e)))?;

    Ok(size)
}

#[async_trait]
impl ExportBackend for ObjectStoreExportBackend {
    #[instrument(skip(self, frame, params), fields(job = %params.name, location = %self.location))]
    async fn submit_export(
        &self,
        frame: &RasterFrame,
        params: &ExportParams,
    ) -> LandcoverResult<JobHandle> {
        Self::check_submission(frame, params)?;

        let path = params.output_path();
        let handle = JobHandle::new(params.name.clone(), frame.year(), path.clone());
        let state = Arc::new(Mutex::new(JobState::Submitted));

        let task_state = Arc::clone(&state);
        let store = Arc::clone(&self.store);
        let frame = frame.clone();
        let params = params.clone();
        let job_id = handle.id;
        let join = tokio::spawn(async move {
            set_state(&task_state, JobState::Running);
            match run_export(store, frame, params, path.clone()).await {
                Ok(size) => {
                    info!(job = %job_id, path = %path, size, "Export completed");
                    set_state(&task_state, JobState::Completed);
                }
                Err(e) => {
                    error!(job = %job_id, path = %path, error = %e, "Export failed");
                    set_state(
                        &task_state,
                        JobState::Failed {
                            message: e.to_string(),
                        },
                    );
                }
            }
        });

        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).insert(
            handle.id,
            TaskEntry {
                state,
                abort: join.abort_handle(),
            },
        );

        debug!(job = %handle.id, destination = %handle.destination, "Export accepted");
        Ok(handle)
    }

    async fn status(&self, handle: &JobHandle) -> LandcoverResult<JobState> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(&handle.id)
            .map(|entry| get_state(&entry.state))
            .ok_or_else(|| LandcoverError::query(format!("unknown export job {}", handle.id)))
    }

    async fn cancel(&self, handle: &JobHandle) -> LandcoverResult<()> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let entry = tasks
            .get(&handle.id)
            .ok_or_else(|| LandcoverError::query(format!("unknown export job {}", handle.id)))?;

        if !get_state(&entry.state).is_terminal() {
            entry.abort.abort();
            set_state(&entry.state, JobState::Cancelled);
            info!(job = %handle.name, "Export cancelled");
        }
        Ok(())
    }
}
