use crate::error::{QueryError, Result};
use crate::score::{hard_filtered, soft_score};
use crate::Constraint;
use std::cmp::Ordering;
use workout_dataset::{Dataset, Exercise};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// One surviving record: its row in the dataset and its soft score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub index: usize,
    pub score: f32,
}

/// Records that passed the hard filter, ordered by descending score with
/// dataset order as the tie-break. May be empty; that is a valid outcome,
/// not an error.
#[derive(Debug, Clone, Default)]
pub struct RankedResult {
    pub hits: Vec<RankedHit>,
}

impl RankedResult {
    pub fn exercises<'a>(&self, dataset: &'a Dataset) -> Vec<(&'a Exercise, f32)> {
        self.hits
            .iter()
            .filter_map(|hit| dataset.get(hit.index).map(|ex| (ex, hit.score)))
            .collect()
    }
}

/// Hard-filters and ranks the dataset against `constraint`.
pub fn search(dataset: &Dataset, constraint: &Constraint, limit: Option<usize>) -> RankedResult {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    // With an exact intensity required, the level index already narrows the
    // scan; row indices come back in dataset order, preserving the
    // tie-break.
    let candidates: Vec<usize> = match constraint.intensity {
        Some(level) => dataset.rows_with_level(level).to_vec(),
        None => (0..dataset.len()).collect(),
    };

    let mut hits: Vec<RankedHit> = candidates
        .into_iter()
        .filter_map(|index| {
            let exercise = dataset.get(index)?;
            if hard_filtered(exercise, constraint) {
                return None;
            }
            Some(RankedHit {
                index,
                score: soft_score(exercise, constraint),
            })
        })
        .collect();

    // Stable sort: equal scores keep ascending dataset order.
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);

    log::debug!(
        "search: {} hits (limit {limit}) against {} records",
        hits.len(),
        dataset.len()
    );
    RankedResult { hits }
}

/// Exact, case-insensitive lookup by exercise name.
pub fn find_by_name<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Exercise> {
    dataset
        .find_by_name(name)
        .ok_or_else(|| QueryError::NotFound(name.to_string()))
}
