//! Persisted snapshot of the remote exercise dataset.
//!
//! A snapshot is a CSV file plus a small JSON sidecar recording where it
//! came from and which revision it is. Both are written atomically (temp
//! file, then rename) so a crashed download never leaves a half-written
//! snapshot behind.

use crate::error::{DatasetError, Result};
use crate::record::{Exercise, Level};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SNAPSHOT_FILE_NAME: &str = "exercises.csv";
pub const SNAPSHOT_META_FILE_NAME: &str = "snapshot.json";

/// Column set of the snapshot CSV. Header order in the file is free; rows
/// are resolved by header name.
pub const SNAPSHOT_COLUMNS: &[&str] = &[
    "name",
    "muscle_group",
    "equipment",
    "level",
    "duration_minutes",
    "contraindications",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub revision: String,
    pub source_url: String,
    pub fetched_at_unix: u64,
}

impl SnapshotMeta {
    pub fn new(revision: impl Into<String>, source_url: impl Into<String>) -> Self {
        let fetched_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            revision: revision.into(),
            source_url: source_url.into(),
            fetched_at_unix,
        }
    }
}

/// A parsed on-disk snapshot.
#[derive(Debug)]
pub struct Snapshot {
    pub records: Vec<Exercise>,
    pub meta: SnapshotMeta,
    pub csv_path: PathBuf,
}

/// Content-derived revision, used when the origin sends no validator.
pub fn content_revision(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

pub fn csv_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE_NAME)
}

pub fn exists(dir: &Path) -> bool {
    csv_path(dir).exists()
}

/// Loads the snapshot under `dir`, or `None` when no snapshot was ever
/// persisted there. A present-but-unreadable snapshot is an error, not
/// `None`: silently refetching over corrupt local state would mask it.
pub fn load(dir: &Path) -> Result<Option<Snapshot>> {
    let csv_file = csv_path(dir);
    if !csv_file.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&csv_file)?;
    let records = parse_csv(&content)?;

    let meta_file = dir.join(SNAPSHOT_META_FILE_NAME);
    let meta = if meta_file.exists() {
        serde_json::from_str(&fs::read_to_string(&meta_file)?)?
    } else {
        // Sidecar lost (pre-sidecar snapshot or manual edit): fall back to
        // a content-derived revision so the dataset stays versioned.
        SnapshotMeta::new(content_revision(content.as_bytes()), "unknown")
    };

    Ok(Some(Snapshot {
        records,
        meta,
        csv_path: csv_file,
    }))
}

/// Atomically persists CSV content and its sidecar under `dir`.
pub fn persist(dir: &Path, content: &str, meta: &SnapshotMeta) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let csv_file = csv_path(dir);
    write_atomic(&csv_file, content.as_bytes())?;

    let meta_file = dir.join(SNAPSHOT_META_FILE_NAME);
    write_atomic(&meta_file, &serde_json::to_vec_pretty(meta)?)?;

    Ok(csv_file)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Parses the snapshot CSV into exercise records.
///
/// Hand-rolled RFC-4180-style reader: quoted fields may contain commas,
/// doubled quotes, and newlines. Row order is preserved; it is the
/// dataset's canonical order.
pub fn parse_csv(content: &str) -> Result<Vec<Exercise>> {
    let mut rows = split_rows(content)?;
    if rows.is_empty() {
        return Err(DatasetError::Malformed("empty snapshot".into()));
    }

    let header = rows.remove(0);
    let column = |name: &str| -> Result<usize> {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| DatasetError::Malformed(format!("missing column: {name}")))
    };
    let name_col = column("name")?;
    let muscle_col = column("muscle_group")?;
    let equipment_col = column("equipment")?;
    let level_col = column("level")?;
    let duration_col = column("duration_minutes")?;
    let contra_col = column("contraindications")?;

    let mut records = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let line = row_idx + 2; // 1-based, after the header
        let field = |col: usize| -> Result<&str> {
            row.get(col)
                .map(String::as_str)
                .ok_or_else(|| DatasetError::Malformed(format!("row {line}: too few fields")))
        };

        let name = field(name_col)?.trim().to_string();
        if name.is_empty() {
            return Err(DatasetError::Malformed(format!("row {line}: empty name")));
        }
        let level_raw = field(level_col)?;
        let level = Level::parse(level_raw).ok_or_else(|| {
            DatasetError::Malformed(format!("row {line}: unknown level {level_raw:?}"))
        })?;
        let duration_raw = field(duration_col)?.trim();
        let duration_minutes = duration_raw.parse::<u32>().map_err(|_| {
            DatasetError::Malformed(format!("row {line}: bad duration {duration_raw:?}"))
        })?;
        let contraindications = field(contra_col)?
            .split(';')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        records.push(Exercise {
            name,
            muscle_group: field(muscle_col)?.trim().to_string(),
            equipment: field(equipment_col)?.trim().to_string(),
            level,
            duration_minutes,
            contraindications,
        });
    }
    Ok(records)
}

fn split_rows(content: &str) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                // Skip blank lines between records.
                if !(row.len() == 1 && row[0].trim().is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return Err(DatasetError::Malformed("unterminated quoted field".into()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        if !(row.len() == 1 && row[0].trim().is_empty()) {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
name,muscle_group,equipment,level,duration_minutes,contraindications
Push-Up,Chest,Body Only,moderate,10,wrist injury;shoulder injury
\"Squat, Barbell\",Quadriceps,Barbell,expert,20,\"knee injury\"
Walking,Cardio,None,beginner,30,
";

    #[test]
    fn parses_quoted_fields_and_keyword_lists() {
        let records = parse_csv(SAMPLE).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].contraindications, vec!["wrist injury", "shoulder injury"]);
        assert_eq!(records[1].name, "Squat, Barbell");
        assert_eq!(records[1].level, Level::High);
        assert_eq!(records[2].contraindications, Vec::<String>::new());
    }

    #[test]
    fn accepts_reordered_columns() {
        let csv = "\
level,name,contraindications,duration_minutes,equipment,muscle_group
low,Walking,,30,None,Cardio
";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].name, "Walking");
        assert_eq!(records[0].level, Level::Low);
    }

    #[test]
    fn rejects_missing_column_and_bad_rows() {
        let missing = "name,muscle_group,equipment,level,duration_minutes\nX,Y,Z,low,5\n";
        assert!(matches!(parse_csv(missing), Err(DatasetError::Malformed(_))));

        let bad_level = SAMPLE.replace("moderate", "ridiculous");
        assert!(matches!(parse_csv(&bad_level), Err(DatasetError::Malformed(_))));

        let bad_duration = SAMPLE.replace(",10,", ",soon,");
        assert!(matches!(parse_csv(&bad_duration), Err(DatasetError::Malformed(_))));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let meta = SnapshotMeta::new("rev-1", "https://example.invalid/exercises.csv");
        persist(dir.path(), SAMPLE, &meta).unwrap();

        let snapshot = load(dir.path()).unwrap().expect("snapshot present");
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(snapshot.meta.revision, "rev-1");
        assert!(!csv_path(dir.path()).with_extension("tmp").exists());
    }

    #[test]
    fn load_on_empty_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn content_revision_is_stable() {
        assert_eq!(content_revision(b"abc"), content_revision(b"abc"));
        assert_ne!(content_revision(b"abc"), content_revision(b"abd"));
        assert!(content_revision(b"abc").starts_with("sha256:"));
    }
}
