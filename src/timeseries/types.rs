//! Core data types for the delta proxy cache
//!
//! This module defines the fundamental types shared by every layer:
//! - `Extent`: A closed time interval on the step grid
//! - `TimeRangeQuery`: A normalized range query (statement, extent, step)
//! - `Point` and `Series`: Timestamped value rows
//! - `FastForwardValue`: The near-real-time sample kept outside the cache

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed time interval `[start, end]`, in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Start timestamp (inclusive)
    pub start: i64,
    /// End timestamp (inclusive)
    pub end: i64,
}

impl Extent {
    /// Create a new extent
    ///
    /// # Panics
    /// Panics if start > end
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start <= end, "Extent: start must not be after end");
        Self { start, end }
    }

    /// Create an extent, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Single-instant extent
    pub fn point(timestamp: i64) -> Self {
        Self {
            start: timestamp,
            end: timestamp,
        }
    }

    /// Check if a timestamp falls within this extent
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Check if this extent fully contains another
    pub fn contains_extent(&self, other: &Extent) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// Check if this extent overlaps with another (shared boundaries overlap)
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Smallest extent spanning both
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Get intersection with another extent, if any
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        Self::try_new(self.start.max(other.start), self.end.min(other.end))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// A normalized time range query
///
/// The statement and step form the cache identity; the extent changes with
/// every request and never contributes to the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRangeQuery {
    /// Opaque query text (path plus non-range parameters for rollups)
    pub statement: String,
    /// Requested extent, as sent by the client
    pub extent: Extent,
    /// Sampling interval in milliseconds, always > 0
    pub step: i64,
}

impl TimeRangeQuery {
    /// Create a query, returning None if the extent or step is invalid
    pub fn try_new(statement: impl Into<String>, extent: Extent, step: i64) -> Option<Self> {
        if step <= 0 || extent.start > extent.end {
            return None;
        }
        Some(Self {
            statement: statement.into(),
            extent,
            step,
        })
    }

    /// Requested extent aligned outward to the step grid
    pub fn aligned_extent(&self) -> Extent {
        crate::timeseries::extent::align_to_step(&self.extent, self.step)
    }
}

/// One timestamped row of values
///
/// Values are optional because backends report gaps as nulls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Value row
    pub values: Vec<Option<f64>>,
}

impl Point {
    /// Create a point with a single value
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            values: vec![Some(value)],
        }
    }

    /// Create a point with an arbitrary row
    pub fn with_values(timestamp: i64, values: Vec<Option<f64>>) -> Self {
        Self { timestamp, values }
    }
}

/// An ordered sequence of points
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub points: Vec<Point>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from unordered points
    ///
    /// Points are sorted by timestamp; for equal timestamps the later point wins.
    pub fn from_points(points: Vec<Point>) -> Self {
        let mut series = Self { points };
        series.normalize();
        series
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.points.iter().map(|p| p.timestamp)
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Sort ascending and drop earlier duplicates of each timestamp
    pub(crate) fn normalize(&mut self) {
        // Stable sort keeps insertion order among equal timestamps
        self.points.sort_by_key(|p| p.timestamp);
        let mut deduped: Vec<Point> = Vec::with_capacity(self.points.len());
        for point in self.points.drain(..) {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        self.points = deduped;
    }
}

impl From<Vec<Point>> for Series {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

/// The most recent real-time sample
///
/// Kept separate from cached series: its timestamp may fall in a step that
/// has not closed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FastForwardValue {
    /// Timestamp normalized down to its step boundary
    pub timestamp: i64,
    pub values: Vec<Option<f64>>,
}

impl FastForwardValue {
    pub fn into_point(self) -> Point {
        Point::with_values(self.timestamp, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_contains() {
        let extent = Extent::new(1000, 2000);

        assert!(!extent.contains(999));
        assert!(extent.contains(1000));
        assert!(extent.contains(1500));
        assert!(extent.contains(2000));
        assert!(!extent.contains(2001));
    }

    #[test]
    fn test_extent_overlaps() {
        let a = Extent::new(1000, 2000);

        assert!(a.overlaps(&Extent::new(1500, 2500)));
        assert!(a.overlaps(&Extent::new(2000, 3000))); // Shared boundary
        assert!(!a.overlaps(&Extent::new(2001, 3000)));
        assert!(a.overlaps(&Extent::new(500, 1000)));
    }

    #[test]
    fn test_extent_union_and_intersection() {
        let a = Extent::new(100, 200);
        let b = Extent::new(150, 300);

        assert_eq!(a.union(&b), Extent::new(100, 300));
        assert_eq!(a.intersection(&b), Some(Extent::new(150, 200)));
        assert_eq!(a.intersection(&Extent::new(201, 300)), None);
    }

    #[test]
    fn test_extent_try_new() {
        assert!(Extent::try_new(10, 5).is_none());
        assert_eq!(Extent::try_new(5, 5), Some(Extent::point(5)));
    }

    #[test]
    fn test_time_range_query_validation() {
        assert!(TimeRangeQuery::try_new("q", Extent::new(0, 10), 0).is_none());
        assert!(TimeRangeQuery::try_new("q", Extent { start: 10, end: 0 }, 5).is_none());

        let trq = TimeRangeQuery::try_new("q", Extent::new(15, 42), 10).unwrap();
        assert_eq!(trq.aligned_extent(), Extent::new(10, 50));
    }

    #[test]
    fn test_series_from_points_sorts_and_dedups() {
        let series = Series::from_points(vec![
            Point::new(30, 3.0),
            Point::new(10, 1.0),
            Point::new(20, 2.0),
            Point::new(10, 9.0),
        ]);

        let timestamps: Vec<i64> = series.timestamps().collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
        // Later duplicate wins
        assert_eq!(series.points[0].values, vec![Some(9.0)]);
    }

    #[test]
    fn test_series_serialization() {
        let series = Series::from_points(vec![
            Point::new(10, 1.5),
            Point::with_values(20, vec![None]),
        ]);
        let json = serde_json::to_string(&series).unwrap();
        let restored: Series = serde_json::from_str(&json).unwrap();

        assert_eq!(series, restored);
    }
}
