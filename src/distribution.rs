use crate::error::ConfigError;
use itertools::Itertools;
use serde::Serialize;
use textplots::{Chart, Plot, Shape};

pub const COVERAGE_PERCENT: f64 = 55.0;

const MAX_PLOT_POINTS: usize = 2000;

/// Cumulative share of accesses over the table's rows, in the order given.
///
/// Point `i` (starting at 1) holds the fraction of all accesses made by the first `i` rows.
/// Returns no points for an empty table or one with no accesses at all.
pub fn cdf(counts: &[u64]) -> Vec<(f64, f64)> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![];
    }

    counts
        .iter()
        .scan(0_u64, |acc, count| {
            *acc += count;
            Some(*acc)
        })
        .enumerate()
        .map(|(i, cumulative)| ((i + 1) as f64, cumulative as f64 / total as f64))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    pub portion: f64,
    pub addresses: usize,
    pub accesses: u64,
    pub total_accesses: u64,
}

/// Finds how many of the hottest addresses are needed to account for `portion` percent of all
/// accesses.
pub fn coverage(counts: &[u64], portion: f64) -> Result<Option<Coverage>, ConfigError> {
    if !(portion > 0.0 && portion <= 100.0) {
        return Err(ConfigError::InvalidPortion(portion));
    }

    let total: u64 = counts.iter().sum();
    if total == 0 {
        return Ok(None);
    }

    let target = total as f64 * portion * 0.01;
    let mut accesses = 0;
    for (i, count) in counts.iter().sorted_by(|a, b| b.cmp(a)).enumerate() {
        accesses += count;
        if accesses as f64 >= target {
            return Ok(Some(Coverage {
                portion,
                addresses: i + 1,
                accesses,
                total_accesses: total,
            }));
        }
    }

    // floating point rounding can leave the last sum a hair short of the target
    Ok(Some(Coverage {
        portion,
        addresses: counts.len(),
        accesses,
        total_accesses: total,
    }))
}

/// Thins a CDF out to at most `max` points, always keeping the last one.
fn thin(points: &[(f64, f64)], max: usize) -> Vec<(f32, f32)> {
    let step = points.len().div_ceil(max).max(1);
    let mut thinned = points
        .iter()
        .step_by(step)
        .map(|(x, y)| (*x as f32, *y as f32))
        .collect::<Vec<_>>();

    if let Some((x, y)) = points.last() {
        if thinned.last() != Some(&(*x as f32, *y as f32)) {
            thinned.push((*x as f32, *y as f32));
        }
    }
    thinned
}

/// Draws the CDF in the terminal.
pub fn plot_cdf(points: &[(f64, f64)]) {
    if points.is_empty() {
        return;
    }

    let thinned = thin(points, MAX_PLOT_POINTS);
    let xmax = thinned.last().map(|(x, _)| *x).unwrap_or(1.0);
    Chart::new(160, 60, 0.0, xmax)
        .lineplot(&Shape::Lines(&thinned))
        .display();
}
