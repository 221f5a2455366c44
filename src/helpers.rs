//! Shared numeric helpers for gap-prone observation series.
//!
//! Satellite channels arrive with holes: masked pixels, off-swath months,
//! zero-denominator indices. Both helpers skip the missing entries instead of
//! poisoning the aggregate:
//!
//! - `mean_ignoring_missing`: arithmetic mean of the present values
//! - `median`: 50th percentile of the present values (average of the two
//!   middle elements for even counts)
//!
//! Both return `None` when nothing is present, and the caller decides what an
//! undefined statistic means for its channel.

/// Mean of the `Some` entries, `None` when there are no present values.
pub(crate) fn mean_ignoring_missing(values: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.iter().flatten() {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Median of the provided values, `None` for an empty input.
///
/// Takes ownership because it must sort; callers collect the present values
/// of one channel and hand them over.
pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
