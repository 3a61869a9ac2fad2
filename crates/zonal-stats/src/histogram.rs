//! Zonal statistics results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use landcover_common::{pixel_area_km2, ClassGroup, GroupingScheme};

/// Pixel count per class code for one (frame, region, scale) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    scale_meters: f64,
    counts: BTreeMap<u8, u64>,
}

impl Histogram {
    pub fn new(scale_meters: f64) -> Self {
        Self {
            scale_meters,
            counts: BTreeMap::new(),
        }
    }

    pub fn from_counts(scale_meters: f64, counts: BTreeMap<u8, u64>) -> Self {
        let counts = counts.into_iter().filter(|(_, n)| *n > 0).collect();
        Self {
            scale_meters,
            counts,
        }
    }

    pub fn add(&mut self, code: u8, count: u64) {
        if count > 0 {
            *self.counts.entry(code).or_insert(0) += count;
        }
    }

    /// Accumulate another partial histogram (e.g. one tile).
    pub fn merge(&mut self, other: &Histogram) {
        for (&code, &count) in &other.counts {
            self.add(code, count);
        }
    }

    pub fn get(&self, code: u8) -> u64 {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<u8, u64> {
        &self.counts
    }

    pub fn scale_meters(&self) -> f64 {
        self.scale_meters
    }

    pub fn total_pixels(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn area_km2(&self, code: u8) -> f64 {
        self.get(code) as f64 * pixel_area_km2(self.scale_meters)
    }

    /// Pixels whose code belongs to `group`.
    pub fn count_in(&self, group: &ClassGroup) -> u64 {
        self.counts
            .iter()
            .filter(|(code, _)| group.contains(**code))
            .map(|(_, n)| *n)
            .sum()
    }

    /// Every pixel in the region, in km².
    pub fn total_area_km2(&self) -> f64 {
        self.total_pixels() as f64 * pixel_area_km2(self.scale_meters)
    }
}

/// Area per class group for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaResult {
    pub year: i32,
    pub scale_meters: f64,
    /// Area of every counted pixel in the region, grouped or not
    pub total_area_km2: f64,
    areas: BTreeMap<String, f64>,
}

impl AreaResult {
    pub fn new(year: i32, scale_meters: f64, total_area_km2: f64) -> Self {
        Self {
            year,
            scale_meters,
            total_area_km2,
            areas: BTreeMap::new(),
        }
    }

    /// Derive group areas from a histogram.
    ///
    /// Codes outside every group contribute to the total only.
    pub fn from_histogram(year: i32, histogram: &Histogram, groups: &GroupingScheme) -> Self {
        let pixel_area = pixel_area_km2(histogram.scale_meters());
        let mut result = Self::new(year, histogram.scale_meters(), histogram.total_area_km2());
        for group in groups.groups() {
            result.insert(&group.name, histogram.count_in(group) as f64 * pixel_area);
        }
        result
    }

    pub fn insert(&mut self, group: &str, area_km2: f64) {
        self.areas.insert(group.to_string(), area_km2);
    }

    pub fn get(&self, group: &str) -> Option<f64> {
        self.areas.get(group).copied()
    }

    pub fn areas(&self) -> &BTreeMap<String, f64> {
        &self.areas
    }

    /// Sum over all groups; never more than `total_area_km2`.
    pub fn grouped_area_km2(&self) -> f64 {
        self.areas.values().sum()
    }

    /// Area of pixels whose code is in no group.
    pub fn ungrouped_area_km2(&self) -> f64 {
        (self.total_area_km2 - self.grouped_area_km2()).max(0.0)
    }
}
