use serde::{Deserialize, Serialize};

/// Intensity tier of an exercise, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Moderate,
    High,
}

impl Level {
    /// Parses a tier from user or snapshot input. Accepts the wire names
    /// plus the difficulty labels the upstream dataset uses.
    pub fn parse(raw: &str) -> Option<Level> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "beginner" | "easy" | "light" => Some(Level::Low),
            "moderate" | "medium" | "intermediate" => Some(Level::Moderate),
            "high" | "expert" | "advanced" | "intense" => Some(Level::High),
            _ => None,
        }
    }

    /// Position on the 0..=2 intensity scale, for closeness scoring.
    pub fn rank(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::Moderate => 1,
            Level::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Moderate => "moderate",
            Level::High => "high",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exercise entity from the dataset. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub muscle_group: String,
    pub equipment: String,
    pub level: Level,
    pub duration_minutes: u32,
    /// Lowercased keywords matched against a query's exclusion set.
    pub contraindications: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse_accepts_upstream_labels() {
        assert_eq!(Level::parse("Beginner"), Some(Level::Low));
        assert_eq!(Level::parse("Intermediate"), Some(Level::Moderate));
        assert_eq!(Level::parse("Expert"), Some(Level::High));
        assert_eq!(Level::parse(" high "), Some(Level::High));
        assert_eq!(Level::parse("extreme"), None);
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Level::Moderate).unwrap(), "\"moderate\"");
        let back: Level = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(back, Level::High);
    }
}
