//! Class groups: named buckets of categorical class codes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LandcoverError, LandcoverResult};

/// Area of one pixel in km² at the given scale in meters.
pub fn pixel_area_km2(scale_meters: f64) -> f64 {
    let side_km = scale_meters / 1000.0;
    side_km * side_km
}

/// An inclusive range of class codes. A single code is `min == max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeSpec")]
pub struct CodeRange {
    pub min: u8,
    pub max: u8,
}

impl CodeRange {
    pub fn new(min: u8, max: u8) -> LandcoverResult<Self> {
        if min > max {
            return Err(LandcoverError::config(format!(
                "class code range {}-{} is inverted",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn single(code: u8) -> Self {
        Self {
            min: code,
            max: code,
        }
    }

    pub fn contains(&self, code: u8) -> bool {
        code >= self.min && code <= self.max
    }

    pub fn overlaps(&self, other: &CodeRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Parse "7" or "1-5".
    pub fn parse(s: &str) -> LandcoverResult<Self> {
        let parse_code = |p: &str| {
            p.trim()
                .parse::<u8>()
                .map_err(|_| LandcoverError::config(format!("invalid class code '{}'", p)))
        };

        match s.split_once('-') {
            Some((min, max)) => Self::new(parse_code(min)?, parse_code(max)?),
            None => Ok(Self::single(parse_code(s)?)),
        }
    }
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// Accepted config spellings for a code range.
#[derive(Deserialize)]
#[serde(untagged)]
enum CodeSpec {
    Code(u8),
    Text(String),
    Bounds { min: u8, max: u8 },
}

impl TryFrom<CodeSpec> for CodeRange {
    type Error = LandcoverError;

    fn try_from(spec: CodeSpec) -> Result<Self, Self::Error> {
        match spec {
            CodeSpec::Code(code) => Ok(CodeRange::single(code)),
            CodeSpec::Text(text) => CodeRange::parse(&text),
            CodeSpec::Bounds { min, max } => CodeRange::new(min, max),
        }
    }
}

/// A named set of class codes, e.g. Forest = {1..5}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub name: String,
    pub ranges: Vec<CodeRange>,
}

impl ClassGroup {
    pub fn new(name: impl Into<String>, ranges: Vec<CodeRange>) -> Self {
        Self {
            name: name.into(),
            ranges,
        }
    }

    pub fn contains(&self, code: u8) -> bool {
        self.ranges.iter().any(|r| r.contains(code))
    }

    /// Every code in this group, ascending.
    pub fn codes(&self) -> Vec<u8> {
        (0..=u8::MAX).filter(|c| self.contains(*c)).collect()
    }
}

/// A set of pairwise-disjoint class groups.
///
/// Construction fails if any code would be claimed by two groups, so a code
/// is counted at most once in any area summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupingScheme {
    groups: Vec<ClassGroup>,
}

impl GroupingScheme {
    pub fn new(groups: Vec<ClassGroup>) -> LandcoverResult<Self> {
        for (i, a) in groups.iter().enumerate() {
            if a.name.trim().is_empty() {
                return Err(LandcoverError::config("class group name must not be empty"));
            }
            if a.ranges.is_empty() {
                return Err(LandcoverError::config(format!(
                    "class group '{}' has no codes",
                    a.name
                )));
            }
            for b in &groups[i + 1..] {
                if a.name == b.name {
                    return Err(LandcoverError::config(format!(
                        "class group '{}' is defined twice",
                        a.name
                    )));
                }
                let overlap = a
                    .ranges
                    .iter()
                    .flat_map(|ra| b.ranges.iter().map(move |rb| (ra, rb)))
                    .find(|(ra, rb)| ra.overlaps(rb));
                if let Some((ra, rb)) = overlap {
                    return Err(LandcoverError::config(format!(
                        "class groups '{}' ({}) and '{}' ({}) overlap",
                        a.name, ra, b.name, rb
                    )));
                }
            }
        }

        Ok(Self { groups })
    }

    /// Build from a name → ranges mapping (group order follows the map).
    pub fn from_map(map: &BTreeMap<String, Vec<CodeRange>>) -> LandcoverResult<Self> {
        Self::new(
            map.iter()
                .map(|(name, ranges)| ClassGroup::new(name.clone(), ranges.clone()))
                .collect(),
        )
    }

    /// Forest = {1..5}, Savanna = {6..9}, Agriculture = {12, 14}.
    pub fn canonical() -> Self {
        Self {
            groups: vec![
                ClassGroup::new("Forest", vec![CodeRange { min: 1, max: 5 }]),
                ClassGroup::new("Savanna", vec![CodeRange { min: 6, max: 9 }]),
                ClassGroup::new(
                    "Agriculture",
                    vec![CodeRange::single(12), CodeRange::single(14)],
                ),
            ],
        }
    }

    pub fn groups(&self) -> &[ClassGroup] {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&ClassGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// The single group containing `code`, if any.
    pub fn group_of(&self, code: u8) -> Option<&ClassGroup> {
        self.groups.iter().find(|g| g.contains(code))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
