use serde::{Deserialize, Serialize};
use workout_dataset::Level;

/// A structured query against the dataset.
///
/// Every field is optional; an all-empty constraint matches everything and
/// ranks nothing above anything else. `restrictions` is the exclusion set
/// matched against record contraindications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<u32>,
}

impl Constraint {
    pub fn is_empty(&self) -> bool {
        *self == Constraint::default()
    }

    /// Refinement merge: fields present in `self` override, absent fields
    /// are inherited from `prior`. This is the session store's
    /// single-prior-turn merge; it never looks further back than one turn.
    pub fn merged_over(&self, prior: &Constraint) -> Constraint {
        Constraint {
            age: self.age.or(prior.age),
            goal: self.goal.clone().or_else(|| prior.goal.clone()),
            intensity: self.intensity.or(prior.intensity),
            mood: self.mood.clone().or_else(|| prior.mood.clone()),
            restrictions: if self.restrictions.is_empty() {
                prior.restrictions.clone()
            } else {
                self.restrictions.clone()
            },
            max_duration_minutes: self.max_duration_minutes.or(prior.max_duration_minutes),
        }
    }
}
