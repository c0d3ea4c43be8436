//! Tagged records for the API's entities.
//!
//! Only the fields the collector reasons about are typed; everything else the
//! API sends is kept in `extra` so the exported JSON/CSV stays complete.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Team from the `teams` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Team {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Team {
    /// School name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.school.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Game {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Game {
    /// Both scores, when the game is final.
    pub fn scores(&self) -> Option<(i64, i64)> {
        Some((self.home_points?, self.away_points?))
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team.as_deref() == Some(team) || self.away_team.as_deref() == Some(team)
    }
}

/// Betting line. There is no stable primary key; see [`BettingLine::dedup_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BettingLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// (gameId, openDate, homeTeam, awayTeam, provider), missing parts as "".
pub type LineKey = (String, String, String, String, String);

impl BettingLine {
    pub fn dedup_key(&self) -> LineKey {
        let game_id = match &self.game_id {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        (
            game_id,
            self.open_date.clone().unwrap_or_default(),
            self.home_team.clone().unwrap_or_default(),
            self.away_team.clone().unwrap_or_default(),
            self.provider.clone().unwrap_or_default(),
        )
    }
}

/// Season statistics for one team. `offense` and `defense` are deeply nested
/// and vary by provider, so they stay as JSON and are read via [`stat_at`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamSeasonStat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wins: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub losses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_minutes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace: Option<Value>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub offense: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub defense: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TeamSeasonStat {
    /// Zero-initialized row for a team the stats endpoint knows nothing about.
    pub fn skeleton(season: &str, team: &Team) -> Self {
        Self {
            season: Some(Value::String(season.to_string())),
            season_label: Some(season_label(season)),
            team_id: team.id,
            team: team.name().map(str::to_string),
            conference: team.conference.clone(),
            games: Some(0),
            wins: Some(0),
            losses: Some(0),
            total_minutes: Some(json!(0)),
            pace: Some(json!(0)),
            offense: side_skeleton(),
            defense: side_skeleton(),
            extra: Map::new(),
        }
    }

    pub fn is_for(&self, team: &str) -> bool {
        self.team.as_deref() == Some(team)
    }
}

/// "2025" -> "20242025"; anything non-numeric is returned as-is.
pub fn season_label(season: &str) -> String {
    match season.trim().parse::<i64>() {
        Ok(year) => format!("{}{}", year - 1, year),
        Err(_) => season.to_string(),
    }
}

fn side_skeleton() -> Value {
    let split = || json!({"made": 0, "attempted": 0, "pct": 0});
    json!({
        "assists": 0,
        "blocks": 0,
        "steals": 0,
        "possessions": 0,
        "trueShooting": 0,
        "rating": 0,
        "fieldGoals": split(),
        "twoPointFieldGoals": split(),
        "threePointFieldGoals": split(),
        "freeThrows": split(),
        "rebounds": {"offensive": 0, "defensive": 0, "total": 0},
        "turnovers": {"total": 0, "teamTotal": 0},
        "fouls": {"total": 0, "technical": 0, "flagrant": 0},
        "points": {"total": 0, "inPaint": 0, "offTurnovers": 0, "fastBreak": 0},
        "fourFactors": {
            "effectiveFieldGoalPct": 0,
            "turnoverRatio": 0,
            "offensiveReboundPct": 0,
            "freeThrowRate": 0
        }
    })
}

/// Safe nested numeric lookup: missing keys, nulls and non-numbers yield `default`.
pub fn stat_at(value: &Value, path: &[&str], default: f64) -> f64 {
    path.iter()
        .try_fold(value, |node, key| node.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(default)
}

/// Adjusted and SRS ratings. Either list may be empty; that is a valid result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ratings {
    pub adjusted: Vec<Value>,
    pub srs: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingRecord {
    pub team: String,
    pub season: String,
    pub ratings: Ratings,
}

/// Decode a JSON collection into typed records, skipping entries that do not fit.
pub fn decode_records<T: serde::de::DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed record: {}", e);
                None
            }
        })
        .collect()
}
