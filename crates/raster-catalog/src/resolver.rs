//! Per-year frame resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use landcover_common::{LandcoverError, LandcoverResult, RasterFrame};

use crate::series::RasterTimeSeries;

/// What to do when a calendar year holds more than one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateFramePolicy {
    /// Take the earliest frame and flag the resolution as ambiguous.
    #[default]
    First,
    /// Refuse with `AmbiguousYear`.
    Fail,
}

impl FromStr for DuplicateFramePolicy {
    type Err = LandcoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "fail" => Ok(Self::Fail),
            other => Err(LandcoverError::config(format!(
                "unknown duplicate frame policy '{}' (expected first or fail)",
                other
            ))),
        }
    }
}

impl fmt::Display for DuplicateFramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// Result of resolving one calendar year.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        frame: RasterFrame,
        /// Number of frames that matched the year; 1 in the canonical case
        candidates: usize,
    },
    Missing {
        year: i32,
    },
}

impl Resolution {
    /// More than one frame matched and the earliest was picked.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Resolution::Found { candidates, .. } if *candidates > 1)
    }

    pub fn frame(&self) -> Option<&RasterFrame> {
        match self {
            Resolution::Found { frame, .. } => Some(frame),
            Resolution::Missing { .. } => None,
        }
    }

    /// The resolved frame, or `MissingYear`.
    pub fn into_frame(self) -> LandcoverResult<RasterFrame> {
        match self {
            Resolution::Found { frame, .. } => Ok(frame),
            Resolution::Missing { year } => Err(LandcoverError::MissingYear(year)),
        }
    }
}

/// Picks one representative frame per calendar year from a time series.
#[derive(Debug, Clone)]
pub struct YearResolver {
    series: RasterTimeSeries,
    policy: DuplicateFramePolicy,
}

impl YearResolver {
    pub fn new(series: RasterTimeSeries) -> Self {
        Self {
            series,
            policy: DuplicateFramePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicateFramePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicateFramePolicy {
        self.policy
    }

    pub fn series(&self) -> &RasterTimeSeries {
        &self.series
    }

    /// Resolve the frame for `year`.
    ///
    /// A returned frame always has `frame.year() == year`.
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn resolve(&self, year: i32) -> LandcoverResult<Resolution> {
        let frames = self.series.filter_year(year)?.materialize().await?;
        let candidates = frames.len();

        let Some(frame) = frames.into_iter().find(|f| f.year() == year) else {
            debug!(year, "No frame for year");
            return Ok(Resolution::Missing { year });
        };

        if candidates > 1 {
            match self.policy {
                DuplicateFramePolicy::Fail => {
                    return Err(LandcoverError::AmbiguousYear { year, candidates });
                }
                DuplicateFramePolicy::First => {
                    warn!(
                        year,
                        candidates,
                        frame = %frame.id,
                        "Multiple frames for year, using the earliest"
                    );
                }
            }
        }

        debug!(year, frame = %frame.id, "Resolved frame");
        Ok(Resolution::Found { frame, candidates })
    }
}
