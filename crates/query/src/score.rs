//! Hard filter and soft scorer.

use crate::Constraint;
use workout_dataset::{Exercise, Level};

// Component weights, renormalized over the constraint fields actually
// present so partial constraints still score in [0, 1].
const WEIGHT_DURATION: f32 = 0.40;
const WEIGHT_GOAL: f32 = 0.35;
const WEIGHT_MOOD: f32 = 0.25;

/// Exclusionary predicate. A record failing it is never returned.
pub(crate) fn hard_filtered(exercise: &Exercise, constraint: &Constraint) -> bool {
    if let Some(level) = constraint.intensity {
        if exercise.level != level {
            return true;
        }
    }
    excluded_by_restrictions(exercise, &constraint.restrictions)
}

pub(crate) fn excluded_by_restrictions(exercise: &Exercise, restrictions: &[String]) -> bool {
    restrictions.iter().any(|restriction| {
        let restriction = restriction.trim().to_lowercase();
        if restriction.is_empty() {
            return false;
        }
        exercise.contraindications.iter().any(|contra| {
            // "knee" must exclude a "knee injury" record, so containment
            // counts in both directions.
            contra.contains(&restriction) || restriction.contains(contra.as_str())
        })
    })
}

/// Weighted closeness of a surviving record to the constraint, in [0, 1].
/// An empty constraint scores 0 for every record, which leaves the
/// dataset's own order in place after the stable sort.
pub(crate) fn soft_score(exercise: &Exercise, constraint: &Constraint) -> f32 {
    let mut weight_sum = 0.0f32;
    let mut score_sum = 0.0f32;

    if let Some(max_minutes) = constraint.max_duration_minutes {
        weight_sum += WEIGHT_DURATION;
        score_sum += WEIGHT_DURATION * duration_closeness(exercise.duration_minutes, max_minutes);
    }
    if let Some(goal) = constraint.goal.as_deref() {
        weight_sum += WEIGHT_GOAL;
        score_sum += WEIGHT_GOAL * goal_affinity(goal, exercise);
    }
    if let Some(preferred) = constraint.mood.as_deref().and_then(mood_energy_level) {
        weight_sum += WEIGHT_MOOD;
        score_sum += WEIGHT_MOOD * level_closeness(preferred, exercise.level);
    }

    if weight_sum == 0.0 {
        0.0
    } else {
        score_sum / weight_sum
    }
}

fn duration_closeness(duration: u32, max_minutes: u32) -> f32 {
    if max_minutes == 0 {
        return 0.0;
    }
    let duration = duration as f32;
    let max_minutes = max_minutes as f32;
    1.0 - (duration - max_minutes).abs() / duration.max(max_minutes)
}

/// Fraction of goal tokens that appear in the record's name, muscle group,
/// or equipment.
fn goal_affinity(goal: &str, exercise: &Exercise) -> f32 {
    let haystack = format!(
        "{} {} {}",
        exercise.name, exercise.muscle_group, exercise.equipment
    )
    .to_lowercase();
    let tokens: Vec<String> = goal
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let matched = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    matched as f32 / tokens.len() as f32
}

/// Maps a free-text mood onto the intensity tier it calls for. Unknown
/// moods resolve to `None` and drop out of the score.
fn mood_energy_level(mood: &str) -> Option<Level> {
    match mood.trim().to_lowercase().as_str() {
        "tired" | "exhausted" | "sleepy" | "stressed" | "sore" | "low" => Some(Level::Low),
        "okay" | "fine" | "neutral" | "calm" => Some(Level::Moderate),
        "energetic" | "fresh" | "motivated" | "pumped" | "great" => Some(Level::High),
        _ => None,
    }
}

fn level_closeness(preferred: Level, actual: Level) -> f32 {
    let distance = (preferred.rank() as i8 - actual.rank() as i8).unsigned_abs();
    1.0 - distance as f32 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(level: Level, duration: u32, contraindications: &[&str]) -> Exercise {
        Exercise {
            name: "Test Move".into(),
            muscle_group: "Chest".into(),
            equipment: "Body Only".into(),
            level,
            duration_minutes: duration,
            contraindications: contraindications.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn restriction_matches_both_directions() {
        let ex = exercise(Level::Moderate, 10, &["knee injury"]);
        assert!(excluded_by_restrictions(&ex, &["knee".into()]));
        assert!(excluded_by_restrictions(&ex, &["knee injury recovery".into()]));
        assert!(!excluded_by_restrictions(&ex, &["shoulder".into()]));
        assert!(!excluded_by_restrictions(&ex, &["  ".into()]));
    }

    #[test]
    fn intensity_mismatch_is_hard_filtered() {
        let ex = exercise(Level::Low, 10, &[]);
        let constraint = Constraint {
            intensity: Some(Level::High),
            ..Constraint::default()
        };
        assert!(hard_filtered(&ex, &constraint));
    }

    #[test]
    fn duration_closeness_peaks_at_exact_fit() {
        assert_eq!(duration_closeness(30, 30), 1.0);
        assert!(duration_closeness(25, 30) > duration_closeness(10, 30));
        assert!(duration_closeness(45, 30) < 1.0);
        assert!(duration_closeness(10, 30) >= 0.0);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let constraint = Constraint {
            goal: Some("chest strength".into()),
            mood: Some("tired".into()),
            max_duration_minutes: Some(15),
            ..Constraint::default()
        };
        for level in [Level::Low, Level::Moderate, Level::High] {
            for duration in [1, 15, 90] {
                let score = soft_score(&exercise(level, duration, &[]), &constraint);
                assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
    }

    #[test]
    fn empty_constraint_scores_zero() {
        let score = soft_score(&exercise(Level::Moderate, 10, &[]), &Constraint::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn unknown_mood_drops_out_of_the_score() {
        let with_unknown = Constraint {
            mood: Some("quixotic".into()),
            max_duration_minutes: Some(10),
            ..Constraint::default()
        };
        let without_mood = Constraint {
            max_duration_minutes: Some(10),
            ..Constraint::default()
        };
        let ex = exercise(Level::High, 10, &[]);
        assert_eq!(
            soft_score(&ex, &with_unknown),
            soft_score(&ex, &without_mood)
        );
    }
}
