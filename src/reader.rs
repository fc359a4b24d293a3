use crate::error::AllocationError;
use crate::models::{parse_privileged_flag, Channel, StudentRecord};
use anyhow::{Context, Result};
use csv::StringRecord;
use regex::Regex;

/// A normalized roster as handed to the allocation core.
#[derive(Debug)]
pub struct Roster {
    pub students: Vec<StudentRecord>,
    /// Number of preference columns present in the source file.
    pub preference_slots: usize,
    /// Rows dropped because their channel value is not a valid enumerant.
    pub skipped_rows: usize,
}

struct ColumnLayout {
    id: Option<usize>,
    name: Option<usize>,
    score: usize,
    channel: usize,
    privileged: Option<usize>,
    note: Option<usize>,
    preferences: Vec<usize>, // column indexes in rank order
}

pub struct RosterReader {
    preference_pattern: Regex,
}

impl RosterReader {
    pub fn new() -> Self {
        Self {
            preference_pattern: Regex::new(r"^preference_([0-9]+)$").unwrap(),
        }
    }

    /// Reads a schema-normalized CSV roster.
    ///
    /// Expects canonical headers: `score` and `channel` are required, ranked
    /// preferences live in `preference_1 .. preference_N` columns (N is
    /// whatever the file carries), and `id`, `name`, `privileged`, `note`
    /// are optional.
    pub fn read_file(&self, file_path: &str) -> Result<Roster> {
        let mut reader = csv::Reader::from_path(file_path)
            .with_context(|| format!("Failed to open roster file: {}", file_path))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read headers from: {}", file_path))?
            .clone();
        let layout = self.locate_columns(&headers)?;

        let mut students = Vec::new();
        let mut skipped_rows = 0usize;

        for (row_number, row) in reader.records().enumerate() {
            let row = row
                .with_context(|| format!("Failed to read row {} of {}", row_number + 2, file_path))?;

            // Rows outside the three admission channels never reach the core
            let channel = match Channel::parse(cell(&row, Some(layout.channel)).trim()) {
                Some(channel) => channel,
                None => {
                    skipped_rows += 1;
                    continue;
                }
            };

            // Non-numeric scores are coerced to 0 rather than rejected
            let score = cell(&row, Some(layout.score))
                .trim()
                .parse::<f64>()
                .unwrap_or(0.0);

            let preferences = layout
                .preferences
                .iter()
                .map(|&idx| cell(&row, Some(idx)).trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();

            let id = cell(&row, layout.id).trim().to_string();
            let id = if id.is_empty() {
                (row_number + 1).to_string()
            } else {
                id
            };

            students.push(StudentRecord {
                id,
                name: cell(&row, layout.name).trim().to_string(),
                score,
                channel,
                preferences,
                privileged: parse_privileged_flag(cell(&row, layout.privileged)),
                note: cell(&row, layout.note).trim().to_string(),
            });
        }

        Ok(Roster {
            students,
            preference_slots: layout.preferences.len(),
            skipped_rows,
        })
    }

    fn locate_columns(&self, headers: &StringRecord) -> Result<ColumnLayout> {
        let position = |wanted: &str| headers.iter().position(|h| h.trim() == wanted);

        let score = position("score")
            .ok_or_else(|| AllocationError::MissingColumn("score".to_string()))?;
        let channel = position("channel")
            .ok_or_else(|| AllocationError::MissingColumn("channel".to_string()))?;

        let mut preferences: Vec<(u32, usize)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(caps) = self.preference_pattern.captures(header.trim()) {
                if let Ok(rank) = caps[1].parse::<u32>() {
                    preferences.push((rank, idx));
                }
            }
        }
        if preferences.is_empty() {
            return Err(AllocationError::NoPreferenceColumns.into());
        }
        preferences.sort_by_key(|&(rank, _)| rank);

        Ok(ColumnLayout {
            id: position("id"),
            name: position("name"),
            score,
            channel,
            privileged: position("privileged"),
            note: position("note"),
            preferences: preferences.into_iter().map(|(_, idx)| idx).collect(),
        })
    }
}

fn cell<'a>(row: &'a StringRecord, index: Option<usize>) -> &'a str {
    index.and_then(|i| row.get(i)).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_roster(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");
        std::fs::write(&path, content).unwrap();
        let path_str = path.to_str().unwrap().to_string();
        (dir, path_str)
    }

    fn core_error(result: Result<Roster>) -> AllocationError {
        let err = result.unwrap_err();
        err.downcast::<AllocationError>().expect("expected an AllocationError")
    }

    #[test]
    fn reads_canonical_roster() {
        let (_dir, path) = write_roster(
            "id,name,score,channel,preference_1,preference_2,privileged,note\n\
             1,Aya,88.5,general,Engineering,Medicine,no,\n\
             2,Omar,72,parallel,Medicine,,yes,staff child\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        assert_eq!(roster.students.len(), 2);
        assert_eq!(roster.preference_slots, 2);
        assert_eq!(roster.skipped_rows, 0);

        let aya = &roster.students[0];
        assert_eq!(aya.id, "1");
        assert_eq!(aya.name, "Aya");
        assert_eq!(aya.score, 88.5);
        assert_eq!(aya.channel, Channel::General);
        assert_eq!(aya.preferences, vec!["Engineering", "Medicine"]);
        assert!(!aya.privileged);

        let omar = &roster.students[1];
        assert_eq!(omar.channel, Channel::Parallel);
        assert_eq!(omar.preferences, vec!["Medicine"]);
        assert!(omar.privileged);
        assert_eq!(omar.note, "staff child");
    }

    #[test]
    fn preference_columns_follow_numeric_rank_order() {
        // Column position does not matter, the suffix number does, and
        // preference_10 must sort after preference_2.
        let (_dir, path) = write_roster(
            "preference_10,score,preference_2,channel,preference_1\n\
             Law,90,Medicine,general,Engineering\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        assert_eq!(roster.preference_slots, 3);
        assert_eq!(
            roster.students[0].preferences,
            vec!["Engineering", "Medicine", "Law"]
        );
    }

    #[test]
    fn missing_score_column_is_fatal() {
        let (_dir, path) = write_roster("id,channel,preference_1\n1,general,Engineering\n");
        let err = core_error(RosterReader::new().read_file(&path));
        assert_eq!(err, AllocationError::MissingColumn("score".to_string()));
        assert!(!err.is_configuration());
    }

    #[test]
    fn missing_channel_column_is_fatal() {
        let (_dir, path) = write_roster("id,score,preference_1\n1,80,Engineering\n");
        let err = core_error(RosterReader::new().read_file(&path));
        assert_eq!(err, AllocationError::MissingColumn("channel".to_string()));
    }

    #[test]
    fn roster_without_preference_columns_is_fatal() {
        let (_dir, path) = write_roster("id,score,channel\n1,80,general\n");
        let err = core_error(RosterReader::new().read_file(&path));
        assert_eq!(err, AllocationError::NoPreferenceColumns);
    }

    #[test]
    fn rows_with_unknown_channel_are_skipped() {
        let (_dir, path) = write_roster(
            "score,channel,preference_1\n\
             80,general,Engineering\n\
             75,evening,Engineering\n\
             70,,Engineering\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        assert_eq!(roster.students.len(), 1);
        assert_eq!(roster.skipped_rows, 2);
    }

    #[test]
    fn non_numeric_score_becomes_zero() {
        let (_dir, path) = write_roster(
            "score,channel,preference_1\n\
             absent,general,Engineering\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        assert_eq!(roster.students[0].score, 0.0);
    }

    #[test]
    fn blank_preferences_are_dropped_preserving_rank_order() {
        let (_dir, path) = write_roster(
            "score,channel,preference_1,preference_2,preference_3\n\
             80,general,, Medicine ,Law\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        assert_eq!(roster.students[0].preferences, vec!["Medicine", "Law"]);
        // The file still had three preference columns
        assert_eq!(roster.preference_slots, 3);
    }

    #[test]
    fn optional_columns_default_when_absent() {
        let (_dir, path) = write_roster(
            "score,channel,preference_1\n\
             80,general,Engineering\n\
             75,general,Medicine\n",
        );

        let roster = RosterReader::new().read_file(&path).unwrap();
        // Row numbers stand in for missing ids
        assert_eq!(roster.students[0].id, "1");
        assert_eq!(roster.students[1].id, "2");
        assert_eq!(roster.students[0].name, "");
        assert!(!roster.students[0].privileged);
        assert_eq!(roster.students[0].note, "");
    }
}
