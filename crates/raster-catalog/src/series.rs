//! Lazy band/date query over a raster catalog.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use landcover_common::{DateRange, LandcoverError, LandcoverResult, RasterFrame};

use crate::catalog::RasterCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateFilter {
    Unbounded,
    Range(DateRange),
    /// Two filters with no overlap; nothing can match.
    Empty,
}

/// A description of a catalog query.
///
/// Builders return a new series and never touch the backend; the query runs
/// only when [`RasterTimeSeries::materialize`] is awaited.
#[derive(Clone)]
pub struct RasterTimeSeries {
    catalog: Arc<dyn RasterCatalog>,
    band: Option<String>,
    dates: DateFilter,
}

impl RasterTimeSeries {
    pub fn new(catalog: Arc<dyn RasterCatalog>) -> Self {
        Self {
            catalog,
            band: None,
            dates: DateFilter::Unbounded,
        }
    }

    /// Narrow to a single categorical band.
    pub fn select_band(&self, name: impl Into<String>) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            band: Some(name.into()),
            dates: self.dates,
        }
    }

    /// Restrict to the inclusive period `start..=end`.
    ///
    /// Filters compose by intersection.
    pub fn filter_date_range(&self, start: NaiveDate, end: NaiveDate) -> LandcoverResult<Self> {
        Ok(self.with_range(DateRange::new(start, end)?))
    }

    /// Restrict to frames acquired in calendar year `year`.
    pub fn filter_year(&self, year: i32) -> LandcoverResult<Self> {
        Ok(self.with_range(DateRange::for_year(year)?))
    }

    fn with_range(&self, range: DateRange) -> Self {
        let dates = match self.dates {
            DateFilter::Unbounded => DateFilter::Range(range),
            DateFilter::Range(current) => current
                .intersect(&range)
                .map(DateFilter::Range)
                .unwrap_or(DateFilter::Empty),
            DateFilter::Empty => DateFilter::Empty,
        };
        Self {
            catalog: Arc::clone(&self.catalog),
            band: self.band.clone(),
            dates,
        }
    }

    pub fn band(&self) -> Option<&str> {
        self.band.as_deref()
    }

    /// The effective date window, `None` when unbounded or empty.
    pub fn date_range(&self) -> Option<DateRange> {
        match self.dates {
            DateFilter::Range(range) => Some(range),
            _ => None,
        }
    }

    /// Run the query against the catalog.
    ///
    /// Frames come back ascending by acquisition date; anything outside the
    /// band or window that the backend returns is dropped.
    #[instrument(skip(self), fields(band = ?self.band))]
    pub async fn materialize(&self) -> LandcoverResult<Vec<RasterFrame>> {
        let band = self.band.as_deref().ok_or_else(|| {
            LandcoverError::config("time series has no band selected; call select_band first")
        })?;

        let range = match self.dates {
            DateFilter::Empty => {
                debug!("Date filters do not overlap, skipping backend query");
                return Ok(Vec::new());
            }
            DateFilter::Range(range) => range,
            DateFilter::Unbounded => DateRange {
                start: NaiveDate::MIN,
                end: NaiveDate::MAX,
            },
        };

        let mut frames = self.catalog.query(band, &range).await?;
        frames.retain(|f| f.band == band && range.contains(&f.acquired));
        frames.sort_by(|a, b| a.acquired.cmp(&b.acquired));

        debug!(count = frames.len(), "Materialized time series");
        Ok(frames)
    }
}

impl fmt::Debug for RasterTimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterTimeSeries")
            .field("band", &self.band)
            .field("dates", &self.dates)
            .finish()
    }
}
