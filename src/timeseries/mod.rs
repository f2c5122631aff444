//! Time-Series Model
//!
//! Backend-agnostic building blocks of the delta proxy cache:
//!
//! - **types**: `Extent`, `TimeRangeQuery`, `Point`, `Series`, `FastForwardValue`
//! - **extent**: Step alignment, coalescing and delta computation
//! - **merge**: Merging fetched fragments into cached series, trimming views
//!
//! # Example
//!
//! ```rust
//! use deltaproxy::timeseries::{compute_deltas, Extent};
//!
//! // Cache holds [100, 200] at a 10ms step; the client asks for [150, 250]
//! let deltas = compute_deltas(&Extent::new(150, 250), &[Extent::new(100, 200)], 10);
//! assert_eq!(deltas, vec![Extent::new(210, 250)]);
//! ```

pub mod extent;
pub mod merge;
pub mod types;

pub use extent::{align_down, align_to_step, align_up, coalesce, compute_deltas};
pub use merge::{merge, splice, trim, Fragment};
pub use types::{Extent, FastForwardValue, Point, Series, TimeRangeQuery};
