//! Merger
//!
//! Combines a cached series with freshly fetched delta fragments and trims
//! the result for display.
//!
//! Merge strategy:
//! 1. Crop each fragment to the extent it was fetched for
//! 2. Concatenate cached points, then fragments in fetch order
//! 3. Stable-sort by timestamp, keeping the last write for each timestamp
//! 4. Coalesce coverage extents

use crate::timeseries::extent::{coalesce, crop_after, crop_before};
use crate::timeseries::types::{Extent, Point, Series};

/// A fetched fragment and the extent it was requested for
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub extent: Extent,
    pub series: Series,
}

impl Fragment {
    pub fn new(extent: Extent, series: Series) -> Self {
        Self { extent, series }
    }
}

/// Merge fragments into an existing series
///
/// Origins may return more than was asked for; anything outside a fragment's
/// extent is dropped so the returned extents describe exactly the coverage of
/// the returned series. For equal timestamps the newest fragment wins.
pub fn merge(
    existing: &Series,
    existing_extents: &[Extent],
    fragments: &[Fragment],
    step: i64,
) -> (Series, Vec<Extent>) {
    let fragment_len: usize = fragments.iter().map(|f| f.series.len()).sum();
    let mut points: Vec<Point> = Vec::with_capacity(existing.len() + fragment_len);
    points.extend(existing.points.iter().cloned());

    let mut extents = existing_extents.to_vec();
    for fragment in fragments {
        points.extend(
            fragment
                .series
                .points
                .iter()
                .filter(|p| fragment.extent.contains(p.timestamp))
                .cloned(),
        );
        extents.push(fragment.extent);
    }

    (Series::from_points(points), coalesce(&extents, step))
}

/// Restrict a series to the requested (unaligned) extent
///
/// Uses binary search on the sorted timestamps; the input is left untouched.
pub fn trim(series: &Series, requested: &Extent) -> Series {
    let lo = series
        .points
        .partition_point(|p| p.timestamp < requested.start);
    let hi = series
        .points
        .partition_point(|p| p.timestamp <= requested.end);

    if lo >= hi {
        return Series::new();
    }
    Series {
        points: series.points[lo..hi].to_vec(),
    }
}

/// Drop points and coverage after `last`
pub fn crop_tail(series: &Series, extents: &[Extent], last: i64) -> (Series, Vec<Extent>) {
    let hi = series.points.partition_point(|p| p.timestamp <= last);
    (
        Series {
            points: series.points[..hi].to_vec(),
        },
        crop_after(extents, last),
    )
}

/// Drop points and coverage before `first`
pub fn crop_head(series: &Series, extents: &[Extent], first: i64) -> (Series, Vec<Extent>) {
    let lo = series.points.partition_point(|p| p.timestamp < first);
    (
        Series {
            points: series.points[lo..].to_vec(),
        },
        crop_before(extents, first),
    )
}

/// Splice a point into a series view, replacing any point at the same timestamp
pub fn splice(series: &mut Series, point: Point) {
    match series
        .points
        .binary_search_by_key(&point.timestamp, |p| p.timestamp)
    {
        Ok(idx) => series.points[idx] = point,
        Err(idx) => series.points.insert(idx, point),
    }
}
