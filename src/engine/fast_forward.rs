//! Fast-forward path
//!
//! A fresh near-real-time sample fetched on every request, outside the range
//! cache. Its point lives in a step that has not closed yet, so it is only
//! ever spliced into the response view.

use std::fmt;

use crate::timeseries::{align_down, splice, Extent, FastForwardValue, Series};

/// Outcome of the fast-forward sub-request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastForwardStatus {
    /// A value was fetched and spliced
    Hit,
    /// The fetch succeeded but produced nothing usable
    Miss,
    /// The fetch failed; the range response is served without it
    Error,
    /// Not attempted
    Off,
}

impl fmt::Display for FastForwardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastForwardStatus::Hit => write!(f, "hit"),
            FastForwardStatus::Miss => write!(f, "miss"),
            FastForwardStatus::Error => write!(f, "err"),
            FastForwardStatus::Off => write!(f, "off"),
        }
    }
}

/// The window `[now - step, now]`
pub fn window(now: i64, step: i64) -> Extent {
    Extent::new(now.saturating_sub(step), now)
}

/// Whether the request reaches into the near-real-time window
pub fn reaches_now(requested: &Extent, now: i64, step: i64) -> bool {
    requested.end >= now.saturating_sub(step)
}

/// Newest sample of a fast-forward fetch, normalized to its step boundary
pub fn extract(series: &Series, step: i64) -> Option<FastForwardValue> {
    series.points.last().map(|point| FastForwardValue {
        timestamp: align_down(point.timestamp, step),
        values: point.values.clone(),
    })
}

/// Splice the value into the visible series
///
/// Skipped when the value falls outside the request or would land before
/// the newest visible point.
pub fn apply(view: &mut Series, value: FastForwardValue, requested: &Extent) -> bool {
    if !requested.contains(value.timestamp) {
        return false;
    }
    if view.last_timestamp().is_some_and(|last| last > value.timestamp) {
        return false;
    }
    splice(view, value.into_point());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::Point;

    #[test]
    fn test_window() {
        assert_eq!(window(1_000_000, 60_000), Extent::new(940_000, 1_000_000));
    }

    #[test]
    fn test_reaches_now() {
        let now = 1_000_000;
        assert!(reaches_now(&Extent::new(0, now), now, 60_000));
        assert!(reaches_now(&Extent::new(0, now - 60_000), now, 60_000));
        assert!(!reaches_now(&Extent::new(0, now - 60_001), now, 60_000));
    }

    #[test]
    fn test_extract_normalizes_timestamp() {
        let series = Series::from_points(vec![Point::new(950_000, 1.0), Point::new(995_500, 2.0)]);
        let value = extract(&series, 60_000).unwrap();

        assert_eq!(value.timestamp, 960_000);
        assert_eq!(value.values, vec![Some(2.0)]);
        assert!(extract(&Series::new(), 60_000).is_none());
    }

    #[test]
    fn test_apply_appends_tail() {
        let mut view = Series::from_points(vec![Point::new(840_000, 1.0), Point::new(900_000, 1.0)]);
        let value = FastForwardValue {
            timestamp: 960_000,
            values: vec![Some(3.0)],
        };

        assert!(apply(&mut view, value, &Extent::new(840_000, 1_000_000)));
        assert_eq!(view.last_timestamp(), Some(960_000));
    }

    #[test]
    fn test_apply_replaces_open_step() {
        let mut view = Series::from_points(vec![Point::new(900_000, 1.0), Point::new(960_000, 1.0)]);
        let value = FastForwardValue {
            timestamp: 960_000,
            values: vec![Some(3.0)],
        };

        assert!(apply(&mut view, value, &Extent::new(840_000, 1_000_000)));
        assert_eq!(view.len(), 2);
        assert_eq!(view.points[1].values, vec![Some(3.0)]);
    }

    #[test]
    fn test_apply_outside_request() {
        let mut view = Series::new();
        let value = FastForwardValue {
            timestamp: 960_000,
            values: vec![Some(3.0)],
        };

        assert!(!apply(&mut view, value, &Extent::new(0, 900_000)));
        assert!(view.is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(FastForwardStatus::Error.to_string(), "err");
        assert_eq!(FastForwardStatus::Off.to_string(), "off");
    }
}
