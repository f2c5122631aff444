//! Extent Calculator
//!
//! Pure functions over extents on a step grid. An aligned extent `[s, e]`
//! with step `k` stands for the grid points `s, s+k, ..., e`, so two aligned
//! extents are contiguous when the second starts at most one step after the
//! first ends.
//!
//! None of these functions block or allocate beyond their output.

use crate::timeseries::types::Extent;

/// Round a timestamp down to the nearest step boundary
pub fn align_down(timestamp: i64, step: i64) -> i64 {
    timestamp - timestamp.rem_euclid(step)
}

/// Round a timestamp up to the nearest step boundary
pub fn align_up(timestamp: i64, step: i64) -> i64 {
    timestamp.saturating_add((step - timestamp.rem_euclid(step)) % step)
}

/// Align an extent outward to the step grid
///
/// Start rounds down and end rounds up, so upstream fetches are canonical.
/// Aligning an aligned extent is a no-op.
pub fn align_to_step(extent: &Extent, step: i64) -> Extent {
    debug_assert!(step > 0, "step must be positive");
    Extent {
        start: align_down(extent.start, step),
        end: align_up(extent.end, step),
    }
}

/// Sort and merge overlapping or contiguous extents
///
/// Equal boundary timestamps and boundaries one step apart both count as
/// contiguous.
pub fn coalesce(extents: &[Extent], step: i64) -> Vec<Extent> {
    let mut sorted = extents.to_vec();
    sorted.sort_by_key(|e| (e.start, e.end));

    let mut merged: Vec<Extent> = Vec::with_capacity(sorted.len());
    for extent in sorted {
        match merged.last_mut() {
            Some(last) if extent.start <= last.end.saturating_add(step) => {
                last.end = last.end.max(extent.end);
            }
            _ => merged.push(extent),
        }
    }
    merged
}

/// Compute the delta set: the parts of `requested` not covered by `covered`
///
/// The request is aligned to the step grid first; covered extents are
/// coalesced. The result is ordered, pairwise disjoint, step-aligned, and
/// contained in the aligned request.
pub fn compute_deltas(requested: &Extent, covered: &[Extent], step: i64) -> Vec<Extent> {
    let requested = align_to_step(requested, step);
    let covered = coalesce(covered, step);

    let mut deltas = Vec::new();
    let mut cursor = requested.start;

    for block in covered {
        let block = align_to_step(&block, step);
        if block.end < cursor {
            continue;
        }
        if block.start > requested.end {
            break;
        }
        if block.start > cursor {
            deltas.push(Extent::new(cursor, (block.start - step).min(requested.end)));
        }
        cursor = block.end.saturating_add(step);
        if cursor > requested.end {
            return deltas;
        }
    }

    if cursor <= requested.end {
        deltas.push(Extent::new(cursor, requested.end));
    }
    deltas
}

/// Drop everything after `last` from each extent
///
/// Extents entirely after `last` disappear.
pub fn crop_after(extents: &[Extent], last: i64) -> Vec<Extent> {
    extents
        .iter()
        .filter_map(|e| Extent::try_new(e.start, e.end.min(last)))
        .collect()
}

/// Drop everything before `first` from each extent
pub fn crop_before(extents: &[Extent], first: i64) -> Vec<Extent> {
    extents
        .iter()
        .filter_map(|e| Extent::try_new(e.start.max(first), e.end))
        .collect()
}

/// Check whether any extent overlaps the given one
pub fn any_overlap(extents: &[Extent], extent: &Extent) -> bool {
    extents.iter().any(|e| e.overlaps(extent))
}
