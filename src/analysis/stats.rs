// Small numeric helpers shared by the analyses. All of them return 0 for an
// empty input instead of NaN.

use itertools::Itertools;

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the values selected by `predicate`, 0 when nothing matches.
pub(crate) fn mean_where(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    let selected = values.iter().copied().filter(|v| predicate(*v)).collect_vec();
    mean(&selected)
}

/// Share of values matching `predicate`, as a percentage of all values.
pub(crate) fn percent_where<T: Copy>(values: &[T], predicate: impl Fn(T) -> bool) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    values.iter().filter(|v| predicate(**v)).count() as f64 / values.len() as f64 * 100.
}

/// Population variance.
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

pub(crate) fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.)
}

pub(crate) fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec()
}

/// Percentile with linear interpolation between closest ranks, `pct` in 0-100.
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    let sorted = sorted(values);
    if sorted.is_empty() {
        return 0.;
    }
    let rank = pct.clamp(0., 100.) / 100. * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

pub(crate) fn median(values: &[f64]) -> f64 {
    percentile(values, 50.)
}
