//! Dataset cache for the workout tool-server.
//!
//! Owns the exercise dataset end to end: downloading the remote CSV
//! snapshot, persisting it locally, and loading it into an immutable
//! indexed [`Dataset`]. The first load is guarded so it runs at most once
//! per process; everything after that is a cheap `Arc` clone.

mod cache;
mod error;
mod record;
pub mod snapshot;

pub use cache::{DatasetCache, DatasetConfig, DownloadReport, DEFAULT_DATASET_URL};
pub use error::{DatasetError, Result};
pub use record::{Exercise, Level};
pub use snapshot::{Snapshot, SNAPSHOT_COLUMNS};

use std::collections::HashMap;

/// Immutable, indexed view over the loaded exercise records.
///
/// Record order is the snapshot's row order; query ranking relies on it for
/// deterministic tie-breaks, so nothing here may reorder `records`.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<Exercise>,
    by_name: HashMap<String, usize>,
    by_level: HashMap<Level, Vec<usize>>,
    by_muscle: HashMap<String, Vec<usize>>,
    revision: String,
}

impl Dataset {
    pub fn from_records(records: Vec<Exercise>, revision: impl Into<String>) -> Self {
        let mut by_name = HashMap::with_capacity(records.len());
        let mut by_level: HashMap<Level, Vec<usize>> = HashMap::new();
        let mut by_muscle: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            // First occurrence wins on duplicate names; later rows stay
            // reachable through linear scans but not through the index.
            by_name.entry(record.name.to_lowercase()).or_insert(idx);
            by_level.entry(record.level).or_default().push(idx);
            by_muscle
                .entry(record.muscle_group.to_lowercase())
                .or_default()
                .push(idx);
        }
        Self {
            records,
            by_name,
            by_level,
            by_muscle,
            revision: revision.into(),
        }
    }

    pub fn records(&self) -> &[Exercise] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Exercise> {
        self.records.get(index)
    }

    /// Exact, case-insensitive name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&Exercise> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.records[idx])
    }

    pub fn rows_with_level(&self, level: Level) -> &[usize] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows_with_muscle_group(&self, muscle_group: &str) -> &[usize] {
        self.by_muscle
            .get(&muscle_group.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Source revision of the snapshot this dataset was parsed from.
    pub fn revision(&self) -> &str {
        &self.revision
    }
}

#[cfg(test)]
pub(crate) fn sample_records() -> Vec<Exercise> {
    vec![
        Exercise {
            name: "Push-Up".into(),
            muscle_group: "Chest".into(),
            equipment: "Body Only".into(),
            level: Level::Moderate,
            duration_minutes: 10,
            contraindications: vec!["wrist injury".into(), "shoulder injury".into()],
        },
        Exercise {
            name: "Barbell Squat".into(),
            muscle_group: "Quadriceps".into(),
            equipment: "Barbell".into(),
            level: Level::High,
            duration_minutes: 20,
            contraindications: vec!["knee injury".into(), "lower back injury".into()],
        },
        Exercise {
            name: "Walking".into(),
            muscle_group: "Cardio".into(),
            equipment: "None".into(),
            level: Level::Low,
            duration_minutes: 30,
            contraindications: vec![],
        },
        Exercise {
            name: "Plank".into(),
            muscle_group: "Abdominals".into(),
            equipment: "Body Only".into(),
            level: Level::Moderate,
            duration_minutes: 5,
            contraindications: vec!["shoulder injury".into()],
        },
    ]
}
