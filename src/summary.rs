//! Season summary written next to the season directory.

use crate::aggregate::SeasonCollections;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataCompleteness {
    pub games: bool,
    pub games_with_scores: bool,
    pub team_stats: bool,
    pub betting_lines: bool,
    pub ratings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataCounts {
    pub games: usize,
    pub team_stats: usize,
    pub betting_lines: usize,
    pub ratings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonSummary {
    pub season: String,
    pub total_games: usize,
    pub valid_games_with_scores: usize,
    pub analyzed_teams: usize,
    pub teams_list: Vec<String>,
    pub average_total_score: f64,
    pub total_betting_lines: usize,
    pub data_collection_date: String,
    pub data_completeness: DataCompleteness,
    pub data_counts: DataCounts,
}

impl SeasonSummary {
    pub fn build(season: &str, data: &SeasonCollections, collected_at: chrono::NaiveDateTime) -> Self {
        let totals: Vec<i64> = data
            .games
            .iter()
            .filter_map(|g| g.scores())
            .map(|(home, away)| home + away)
            .collect();

        let average_total_score = if totals.is_empty() {
            0.0
        } else {
            let mean = totals.iter().sum::<i64>() as f64 / totals.len() as f64;
            (mean * 100.0).round() / 100.0
        };

        let mut teams_list = data.analyzed_teams.clone();
        teams_list.sort();
        teams_list.dedup();

        Self {
            season: season.to_string(),
            total_games: data.games.len(),
            valid_games_with_scores: totals.len(),
            analyzed_teams: teams_list.len(),
            teams_list,
            average_total_score,
            total_betting_lines: data.betting_lines.len(),
            data_collection_date: collected_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            data_completeness: DataCompleteness {
                games: !data.games.is_empty(),
                games_with_scores: !totals.is_empty(),
                team_stats: !data.team_stats.is_empty(),
                betting_lines: !data.betting_lines.is_empty(),
                ratings: !data.ratings.is_empty(),
            },
            data_counts: DataCounts {
                games: data.games.len(),
                team_stats: data.team_stats.len(),
                betting_lines: data.betting_lines.len(),
                ratings: data.ratings.len(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Game;
    use chrono::NaiveDate;

    fn game(id: i64, hp: Option<i64>, ap: Option<i64>) -> Game {
        Game {
            id: Some(id),
            home_points: hp,
            away_points: ap,
            ..Game::default()
        }
    }

    #[test]
    fn test_summary_counts_and_average() {
        let data = SeasonCollections {
            games: vec![game(1, Some(70), Some(60)), game(2, Some(81), Some(74)), game(3, None, None)],
            analyzed_teams: vec!["Duke".into(), "Baylor".into()],
            ..SeasonCollections::default()
        };
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let summary = SeasonSummary::build("2025", &data, at);
        assert_eq!(summary.total_games, 3);
        assert_eq!(summary.valid_games_with_scores, 2);
        assert_eq!(summary.average_total_score, 142.5);
        assert_eq!(summary.teams_list, vec!["Baylor".to_string(), "Duke".to_string()]);
        assert_eq!(summary.analyzed_teams, 2);
        assert!(summary.data_completeness.games_with_scores);
        assert!(!summary.data_completeness.betting_lines);
        assert_eq!(summary.data_collection_date, "2025-03-01T12:00:00.000000");

        let json = serde_json::to_value(&summary).unwrap();
        for key in [
            "season",
            "total_games",
            "valid_games_with_scores",
            "analyzed_teams",
            "teams_list",
            "average_total_score",
            "total_betting_lines",
            "data_collection_date",
            "data_completeness",
            "data_counts",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_average_rounds_to_two_places() {
        let data = SeasonCollections {
            games: vec![game(1, Some(70), Some(60)), game(2, Some(70), Some(61)), game(3, Some(70), Some(61))],
            ..SeasonCollections::default()
        };
        let at = chrono::Local::now().naive_local();
        assert_eq!(SeasonSummary::build("2025", &data, at).average_total_score, 130.67);
    }
}
