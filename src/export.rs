//! Flattening nested records into uniform rows, and JSON/CSV output.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<season>/{games,team_stats,betting_lines,ratings}.{json,csv}
//! <root>/<season>/teams/<sanitized team>.{json,csv}
//! <root>/<season>_summary.json
//! ```

use crate::persist::write_atomic;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One flattened record. Keys are `_`-joined paths; values are display strings.
pub type FlatRow = BTreeMap<String, String>;

/// Columns that always lead the header when present.
pub const PRIORITY_COLUMNS: [&str; 3] = ["team", "season", "conference"];

/// Flatten a record:
/// - nested objects expand with keys joined by `_`
/// - lists of scalars become a comma-joined string
/// - lists containing objects or lists become a JSON string
/// - `null` becomes an empty string
pub fn flatten(record: &Value) -> FlatRow {
    let mut row = FlatRow::new();
    match record {
        Value::Object(map) => flatten_into(&mut row, None, map),
        other => {
            row.insert("value".to_string(), cell(other));
        }
    }
    row
}

fn flatten_into(row: &mut FlatRow, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let key = match prefix {
            Some(prefix) => format!("{}_{}", prefix, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(row, Some(&key), inner),
            other => {
                row.insert(key, cell(other));
            }
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => {
            items.iter().map(cell).collect::<Vec<_>>().join(",")
        }
        // Serializing a Value cannot fail
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Union of all keys: priority columns first (when present), the rest alphabetical.
pub fn header_order(rows: &[FlatRow]) -> Vec<String> {
    let all: BTreeSet<&str> = rows.iter().flat_map(|r| r.keys().map(String::as_str)).collect();

    let mut headers: Vec<String> = PRIORITY_COLUMNS
        .iter()
        .filter(|c| all.contains(*c))
        .map(|c| c.to_string())
        .collect();
    headers.extend(
        all.into_iter()
            .filter(|k| !PRIORITY_COLUMNS.contains(k))
            .map(str::to_string),
    );
    headers
}

/// Every row gets every header, missing cells as "".
pub fn pad_rows(rows: &[FlatRow], headers: &[String]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Render records as CSV bytes with a deterministic header.
pub fn to_csv(records: &[Value]) -> Result<Vec<u8>> {
    let rows: Vec<FlatRow> = records.iter().map(flatten).collect();
    let headers = header_order(&rows);

    let mut writer = csv::Writer::from_writer(Vec::new());
    if !headers.is_empty() {
        writer.write_record(&headers).context("Failed to write CSV header")?;
        for row in pad_rows(&rows, &headers) {
            writer.write_record(&row).context("Failed to write CSV row")?;
        }
    }
    writer.into_inner().context("Failed to finish CSV output")
}

pub fn to_values<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).context("Failed to serialize record"))
        .collect()
}

/// Keep alphanumerics, space, underscore and hyphen.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Paths written for one data kind.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPair {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Season-scoped output directory tree.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn season_dir(&self, season: &str) -> PathBuf {
        self.root.join(season)
    }

    pub fn teams_dir(&self, season: &str) -> PathBuf {
        self.season_dir(season).join("teams")
    }

    pub fn summary_path(&self, season: &str) -> PathBuf {
        self.root.join(format!("{}_summary.json", season))
    }

    /// `<season>/<kind>.{json,csv}`. An empty collection writes nothing.
    pub fn write_collection(&self, season: &str, kind: &str, records: &[Value]) -> Result<Option<WrittenPair>> {
        if records.is_empty() {
            warn!("No {} data to save", kind);
            return Ok(None);
        }
        let pair = write_pair(&self.season_dir(season), kind, records)?;
        info!(
            "Saved {} {} records to {} and {}",
            records.len(),
            kind,
            pair.json.display(),
            pair.csv.display()
        );
        Ok(Some(pair))
    }

    /// `<season>/teams/<team>.{json,csv}` with that team's own games.
    pub fn write_team_games(&self, season: &str, team: &str, games: &[Value]) -> Result<WrittenPair> {
        write_pair(&self.teams_dir(season), &sanitize_filename(team), games)
    }

    pub fn write_summary<T: Serialize>(&self, season: &str, summary: &T) -> Result<PathBuf> {
        let path = self.summary_path(season);
        let payload = serde_json::to_vec_pretty(summary).context("Failed to serialize summary")?;
        write_atomic(&path, &payload)?;
        Ok(path)
    }
}

fn write_pair(dir: &Path, stem: &str, records: &[Value]) -> Result<WrittenPair> {
    let json = dir.join(format!("{}.json", stem));
    let csv = dir.join(format!("{}.csv", stem));

    let json_bytes = serde_json::to_vec_pretty(records).context("Failed to serialize records")?;
    let csv_bytes = to_csv(records)?;

    write_atomic(&json, &json_bytes)?;
    write_atomic(&csv, &csv_bytes)?;
    Ok(WrittenPair { json, csv })
}
