/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the search pipeline, the imagery backend and the UI layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-width of the area of interest around a resolved coordinate, in degrees
pub const AOI_HALF_WIDTH_DEG: f64 = 0.5;

/// A WGS84 latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A place the user searched for, with its resolved coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Free text exactly as typed by the user (trimmed)
    pub name: String,
    pub coordinate: Coordinate,
}

/// Year and month of a search
///
/// Captured from the time selector when the search is submitted and
/// passed by value through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePeriod {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl TimePeriod {
    /// Returns None if the month is outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Half-open range covering the whole month.
    ///
    /// December rolls over into January of the following year.
    pub fn date_range(&self) -> DateRange {
        let start = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN);
        let (end_year, end_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let end = NaiveDate::from_ymd_opt(end_year, end_month, 1).unwrap_or(NaiveDate::MAX);
        DateRange { start, end }
    }

    /// Suffix appended to a place name in the comparison table, e.g. "202410"
    pub fn label_suffix(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }
}

impl Default for TimePeriod {
    fn default() -> Self {
        Self { year: 2018, month: 1 }
    }
}

/// Half-open date interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// ISO formatted bounds, as the imagery backend expects them
    pub fn iso_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }
}

/// Square polygon of fixed half-width around a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaOfInterest {
    pub center: Coordinate,
    pub half_width: f64,
}

impl AreaOfInterest {
    pub fn around(center: Coordinate) -> Self {
        Self { center, half_width: AOI_HALF_WIDTH_DEG }
    }

    pub fn west(&self) -> f64 {
        self.center.lon - self.half_width
    }

    pub fn east(&self) -> f64 {
        self.center.lon + self.half_width
    }

    pub fn south(&self) -> f64 {
        self.center.lat - self.half_width
    }

    pub fn north(&self) -> f64 {
        self.center.lat + self.half_width
    }

    /// Exterior ring as `[lon, lat]` pairs: NW, SW, SE, NE
    pub fn ring(&self) -> [[f64; 2]; 4] {
        [
            [self.west(), self.north()],
            [self.west(), self.south()],
            [self.east(), self.south()],
            [self.east(), self.north()],
        ]
    }
}

/// Tile URL templates for the three rendered overlays
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTiles {
    pub ndvi: String,
    pub no2: String,
    pub thermal: String,
}

/// Everything one search produces
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    /// Mean NDVI over the AOI after water masking
    pub ndvi_mean: f64,
    /// 90th percentile minus median of the SWIR band
    pub uhii: f64,
    pub tiles: LayerTiles,
}

/// One row of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub city: String,
    pub ndvi: f64,
    pub uhii: f64,
}

impl ComparisonRow {
    pub fn new(city: impl Into<String>, ndvi: f64, uhii: f64) -> Self {
        Self { city: city.into(), ndvi, uhii }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(range: &DateRange) -> i64 {
        (range.end - range.start).num_days()
    }

    #[test]
    fn test_mid_year_range_ends_next_month() {
        let range = TimePeriod::new(2024, 10).unwrap().date_range();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(days(&range), 31);
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let range = TimePeriod::new(2023, 12).unwrap().date_range();
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(days(&range) > 0);
        assert_eq!(days(&range), 31);
    }

    #[test]
    fn test_every_month_has_positive_length() {
        for month in 1..=12 {
            let range = TimePeriod::new(2020, month).unwrap().date_range();
            assert!((28..=31).contains(&days(&range)), "month {month}");
        }
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(TimePeriod::new(2024, 0).is_none());
        assert!(TimePeriod::new(2024, 13).is_none());
    }

    #[test]
    fn test_iso_bounds_and_label() {
        let period = TimePeriod::new(2019, 3).unwrap();
        let (start, end) = period.date_range().iso_bounds();
        assert_eq!(start, "2019-03-01");
        assert_eq!(end, "2019-04-01");
        assert_eq!(period.label_suffix(), "201903");
    }

    #[test]
    fn test_aoi_ring_is_square_around_center() {
        let aoi = AreaOfInterest::around(Coordinate::new(1.35, 103.8));
        let ring = aoi.ring();
        let close = |a: [f64; 2], b: [f64; 2]| (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9;
        assert!(close(ring[0], [103.3, 1.85]));
        assert!(close(ring[1], [103.3, 0.85]));
        assert!(close(ring[2], [104.3, 0.85]));
        assert!(close(ring[3], [104.3, 1.85]));
    }
}
