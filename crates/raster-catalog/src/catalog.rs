//! Raster catalog backends.
//!
//! The [`RasterCatalog`] trait is the only thing the pipeline knows about
//! where frames live. Two implementations ship with the crate:
//!
//! - [`InMemoryCatalog`]: frames held in memory (tests, embedding)
//! - [`FileCatalog`]: a directory tree of `*.frame.json` documents

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use landcover_common::{
    CrsCode, DateRange, GeoTransform, LandcoverError, LandcoverResult, RasterFrame,
};

/// File suffix recognised by [`FileCatalog`].
pub const FRAME_SUFFIX: &str = ".frame.json";

/// Backend contract for querying the raster collection.
#[async_trait]
pub trait RasterCatalog: Send + Sync {
    /// Frames of `band` acquired within `range` (inclusive), ascending by
    /// acquisition date.
    async fn query(&self, band: &str, range: &DateRange) -> LandcoverResult<Vec<RasterFrame>>;
}

/// Catalog backed by a list of frames held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    frames: Vec<RasterFrame>,
}

impl InMemoryCatalog {
    pub fn new(frames: Vec<RasterFrame>) -> Self {
        Self { frames }
    }

    pub fn insert(&mut self, frame: RasterFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[async_trait]
impl RasterCatalog for InMemoryCatalog {
    async fn query(&self, band: &str, range: &DateRange) -> LandcoverResult<Vec<RasterFrame>> {
        let mut frames: Vec<RasterFrame> = self
            .frames
            .iter()
            .filter(|f| f.band == band && range.contains(&f.acquired))
            .cloned()
            .collect();
        frames.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
        Ok(frames)
    }
}

/// On-disk representation of one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDocument {
    pub id: String,
    pub band: String,
    pub acquired: NaiveDate,
    pub scale_meters: f64,
    #[serde(default)]
    pub crs: CrsCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub nodata: Option<u8>,
    /// Row-major class codes
    pub codes: Vec<u8>,
}

impl FrameDocument {
    pub fn from_frame(frame: &RasterFrame) -> Self {
        Self {
            id: frame.id.clone(),
            band: frame.band.clone(),
            acquired: frame.acquired,
            scale_meters: frame.scale_meters,
            crs: frame.crs,
            transform: frame.transform,
            width: frame.width,
            height: frame.height,
            nodata: frame.nodata,
            codes: frame.data().to_vec(),
        }
    }

    pub fn into_frame(self) -> LandcoverResult<RasterFrame> {
        RasterFrame::new(
            self.id,
            self.band,
            self.acquired,
            self.scale_meters,
            self.crs,
            self.transform,
            self.width,
            self.height,
            self.nodata,
            self.codes,
        )
    }

    /// Write this document as `{dir}/{id}.frame.json`.
    pub async fn write_to_dir(&self, dir: &Path) -> LandcoverResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}{}", self.id, FRAME_SUFFIX));
        let json = serde_json::to_vec(self)
            .map_err(|e| LandcoverError::Io(format!("failed to encode frame {}: {}", self.id, e)))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Index entry for a frame document, without the pixel payload.
#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    band: String,
    acquired: NaiveDate,
    id: String,
}

#[derive(Deserialize)]
struct FrameHeader {
    id: String,
    band: String,
    acquired: NaiveDate,
}

/// Catalog over a directory of `*.frame.json` documents.
///
/// The directory is indexed once on [`FileCatalog::open`]; pixel payloads are
/// read on demand for each query.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
    index: Vec<IndexEntry>,
}

impl FileCatalog {
    /// Index every frame document under `root`.
    ///
    /// Unreadable or malformed documents are skipped with a warning.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> LandcoverResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(LandcoverError::query(format!(
                "catalog directory {} does not exist",
                root.display()
            )));
        }

        let mut index = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable catalog entry");
                    continue;
                }
            };
            let path = entry.path();
            let is_frame = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(FRAME_SUFFIX))
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_frame {
                continue;
            }

            match read_header(path) {
                Ok(header) => index.push(IndexEntry {
                    path: path.to_path_buf(),
                    band: header.band,
                    acquired: header.acquired,
                    id: header.id,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed frame document"),
            }
        }

        index.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
        info!(frames = index.len(), "Indexed raster catalog");

        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn read_header(path: &Path) -> LandcoverResult<FrameHeader> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(LandcoverError::from)
}

#[async_trait]
impl RasterCatalog for FileCatalog {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn query(&self, band: &str, range: &DateRange) -> LandcoverResult<Vec<RasterFrame>> {
        let mut frames = Vec::new();
        for entry in self
            .index
            .iter()
            .filter(|e| e.band == band && range.contains(&e.acquired))
        {
            let bytes = tokio::fs::read(&entry.path).await.map_err(|e| {
                LandcoverError::transient_query(format!(
                    "failed to read {}: {}",
                    entry.path.display(),
                    e
                ))
            })?;
            let doc: FrameDocument = serde_json::from_slice(&bytes).map_err(|e| {
                LandcoverError::query(format!("malformed frame {}: {}", entry.path.display(), e))
            })?;
            frames.push(doc.into_frame()?);
        }

        debug!(band = %band, count = frames.len(), "Catalog query complete");
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{frame_for_year, uniform_codes};

    #[tokio::test]
    async fn test_in_memory_query_filters_and_sorts() {
        let catalog = InMemoryCatalog::new(vec![
            frame_for_year(2003, 2, 2, uniform_codes(4, 1)),
            frame_for_year(2001, 2, 2, uniform_codes(4, 1)),
            frame_for_year(2002, 2, 2, uniform_codes(4, 1)),
        ]);

        let range = DateRange::parse("2001-06-01/2003-12-31").unwrap();
        let frames = catalog.query("LC_Type1", &range).await.unwrap();
        let years: Vec<i32> = frames.iter().map(|f| f.year()).collect();
        assert_eq!(years, vec![2002, 2003]);

        let other = catalog.query("LC_Type2", &range).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_file_catalog_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        for year in [2001, 2002] {
            let frame = frame_for_year(year, 2, 2, vec![1, 2, 3, 4]);
            FrameDocument::from_frame(&frame)
                .write_to_dir(&dir.path().join(year.to_string()))
                .await
                .unwrap();
        }
        std::fs::write(dir.path().join("broken.frame.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let catalog = FileCatalog::open(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let frames = catalog
            .query("LC_Type1", &DateRange::for_year(2002).unwrap())
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].year(), 2002);
        assert_eq!(frames[0].data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_file_catalog_missing_dir() {
        let result = FileCatalog::open("/nonexistent/catalog/dir");
        assert!(matches!(result, Err(LandcoverError::BackendQuery { .. })));
    }
}
