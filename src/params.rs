//! Query parameter normalization.
//!
//! Accessors build a raw list of `(name, Option<value>)` pairs and run it
//! through [`format_params`] before anything goes on the wire. Percent-encoding
//! is left to the transport.

use crate::error::ParamError;
use std::fmt;
use std::str::FromStr;

/// Game status filter accepted by the `games` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    Scheduled,
    InProgress,
    #[default]
    Final,
    Postponed,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
            GameStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for GameStatus {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Ok(GameStatus::Scheduled),
            "in_progress" => Ok(GameStatus::InProgress),
            "final" => Ok(GameStatus::Final),
            "postponed" => Ok(GameStatus::Postponed),
            "cancelled" => Ok(GameStatus::Cancelled),
            _ => Err(ParamError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, API-ready parameter list. Order is preserved.
pub type QueryParams = Vec<(String, String)>;

/// Coerce a season to a plain year string. Non-numeric input passes through.
pub fn format_season(season: &str) -> String {
    let trimmed = season.trim();
    match trimmed.parse::<i64>() {
        Ok(year) => year.to_string(),
        Err(_) => season.to_string(),
    }
}

/// Normalize a raw parameter mapping.
///
/// - `None` values are dropped entirely (the API treats "omitted" and `""` differently).
/// - `season` is coerced via [`format_season`].
/// - `status` must parse as a [`GameStatus`]; anything else is an error.
/// - everything else, `team` included, passes through untouched.
pub fn format_params<K, V>(raw: &[(K, Option<V>)]) -> Result<QueryParams, ParamError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut formatted = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let Some(value) = value else { continue };
        let key = key.as_ref();
        let value = value.as_ref();
        let normalized = match key {
            "season" => format_season(value),
            "status" => value.parse::<GameStatus>()?.as_str().to_string(),
            _ => value.to_string(),
        };
        formatted.push((key.to_string(), normalized));
    }
    Ok(formatted)
}
