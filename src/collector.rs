//! One full season collection run: roster, per-team fan-out, merge, export, summary.

use crate::aggregate::{self, PerTeamResults, SeasonCollections};
use crate::api::CbbApi;
use crate::error::CollectError;
use crate::export::{to_values, OutputLayout};
use crate::models::Team;
use crate::orchestrator::{fetch_all, FetchMode, ProgressSpan};
use crate::params::GameStatus;
use crate::progress::{report_failure, ProgressSink};
use crate::summary::SeasonSummary;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Data kinds written as season-wide collections.
pub mod kinds {
    pub const GAMES: &str = "games";
    pub const TEAM_STATS: &str = "team_stats";
    pub const BETTING_LINES: &str = "betting_lines";
    pub const RATINGS: &str = "ratings";
}

// Overall progress budget per phase
const ROSTER_DONE: f64 = 5.0;
const FETCH_WIDTH: f64 = 20.0;
const SAVE_START: f64 = 85.0;
const SUMMARY_START: f64 = 95.0;

/// What a successful run produced.
#[derive(Debug)]
pub struct CollectionReport {
    pub season: String,
    pub teams: usize,
    pub written: Vec<PathBuf>,
    /// `None` when the summary could not be written; the data files stand.
    pub summary: Option<SeasonSummary>,
}

pub struct Collector<'p> {
    api: CbbApi,
    layout: OutputLayout,
    mode: FetchMode,
    max_teams: usize,
    prefetch: bool,
    progress: &'p dyn ProgressSink,
}

impl<'p> Collector<'p> {
    pub fn new(api: CbbApi, layout: OutputLayout, progress: &'p dyn ProgressSink) -> Self {
        Self {
            api,
            layout,
            mode: FetchMode::default(),
            max_teams: 0,
            prefetch: false,
            progress,
        }
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Only the first `max_teams` roster entries are collected. Zero means all.
    pub fn with_max_teams(mut self, max_teams: usize) -> Self {
        self.max_teams = max_teams;
        self
    }

    /// Fetch every kind unfiltered before the fan-out so team lookups hit the cache.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Collect, merge and persist everything for `season`.
    ///
    /// The progress sink always gets a final status, on success or failure.
    pub async fn collect_comprehensive_data(&self, season: &str) -> Result<CollectionReport, CollectError> {
        match self.run(season).await {
            Ok(report) => Ok(report),
            Err(e) => {
                report_failure(self.progress, &format!("Data collection for season {} failed", season), &e);
                Err(e)
            }
        }
    }

    async fn run(&self, season: &str) -> Result<CollectionReport, CollectError> {
        info!("Starting comprehensive data collection for season {}", season);
        self.progress.set_status("Fetching teams list...");
        self.progress.set_progress(0.0);

        let roster = self.roster(season).await?;
        let names: Vec<String> = roster.iter().filter_map(|t| t.name().map(str::to_string)).collect();
        self.progress.set_status(&format!("Processing {} teams...", names.len()));
        self.progress.set_progress(ROSTER_DONE);

        if self.prefetch {
            self.prefetch_season(season).await;
        }
        self.api.warm_cache(season).await;

        let results = self.fetch_per_team(season, &names).await;
        let collections = aggregate::merge(season, &roster, results);

        self.progress.set_status("Saving collected data...");
        self.progress.set_progress(SAVE_START);
        let written = self.save(season, &collections)?;

        self.progress.set_status("Generating summary...");
        self.progress.set_progress(SUMMARY_START);
        let summary = match self.write_summary(season, &collections) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Failed to generate summary for season {}: {:?}", season, e);
                self.progress.set_status(&format!("Warning: summary not generated: {}", e));
                None
            }
        };

        self.progress.set_progress(100.0);
        self.progress.set_status("Data collection complete!");
        info!("Data collection for season {} complete", season);

        Ok(CollectionReport {
            season: season.to_string(),
            teams: names.len(),
            written,
            summary,
        })
    }

    /// Roster after limiting and dropping nameless entries. Empty is fatal.
    async fn roster(&self, season: &str) -> Result<Vec<Team>, CollectError> {
        let mut teams = self.api.get_teams(Some(season)).await;
        if teams.is_empty() {
            return Err(CollectError::NoTeams {
                season: season.to_string(),
            });
        }

        let total = teams.len();
        if self.max_teams > 0 && self.max_teams < total {
            teams.truncate(self.max_teams);
            info!("Team list limited to {} of {} teams", self.max_teams, total);
        }

        let mut seen = HashSet::new();
        teams.retain(|team| match team.name() {
            None => {
                warn!("Skipping team record without a school name (id {:?})", team.id);
                false
            }
            Some(name) if !seen.insert(name.to_string()) => {
                warn!("Skipping repeated team {} (id {:?})", name, team.id);
                false
            }
            Some(_) => true,
        });
        if teams.is_empty() {
            return Err(CollectError::NoTeams {
                season: season.to_string(),
            });
        }
        Ok(teams)
    }

    async fn prefetch_season(&self, season: &str) {
        if !self.api.cache().is_enabled() {
            warn!("Prefetch requested but the cache is disabled; skipping");
            return;
        }
        self.progress.set_status("Prefetching full-season data...");
        let status = GameStatus::default().as_str();
        let api = &self.api;
        tokio::join!(
            api.get_games(season, None, status),
            api.get_team_stats(season, None),
            api.get_betting_lines(season, None),
            api.get_team_ratings(season, None),
        );
    }

    async fn fetch_per_team(&self, season: &str, names: &[String]) -> PerTeamResults {
        let api = &self.api;
        let status = GameStatus::default().as_str();
        let span = |idx: usize| ProgressSpan::new(self.progress, ROSTER_DONE + FETCH_WIDTH * idx as f64, FETCH_WIDTH);

        self.batch_started(kinds::GAMES, names.len());
        let games = fetch_all(names, self.mode, kinds::GAMES, span(0), |team| async move {
            Ok(api.get_games(season, Some(team), status).await)
        })
        .await;
        self.batch_finished(kinds::GAMES, games.len());

        self.batch_started(kinds::TEAM_STATS, names.len());
        let team_stats = fetch_all(names, self.mode, kinds::TEAM_STATS, span(1), |team| async move {
            Ok(api.get_team_stats(season, Some(team)).await)
        })
        .await;
        self.batch_finished(kinds::TEAM_STATS, team_stats.len());

        self.batch_started(kinds::BETTING_LINES, names.len());
        let betting_lines = fetch_all(names, self.mode, kinds::BETTING_LINES, span(2), |team| async move {
            Ok(api.get_betting_lines(season, Some(team)).await)
        })
        .await;
        self.batch_finished(kinds::BETTING_LINES, betting_lines.len());

        self.batch_started(kinds::RATINGS, names.len());
        let ratings = fetch_all(names, self.mode, kinds::RATINGS, span(3), |team| async move {
            Ok(api.get_team_ratings(season, Some(team)).await)
        })
        .await;
        self.batch_finished(kinds::RATINGS, ratings.len());

        PerTeamResults {
            games,
            team_stats,
            betting_lines,
            ratings,
        }
    }

    fn batch_finished(&self, kind: &str, teams: usize) {
        self.progress.set_status(&format!("Fetched {} for {} teams", kind, teams));
    }

    fn batch_started(&self, kind: &str, teams: usize) {
        self.progress.set_status(&format!("Fetching {} for {} teams", kind, teams));
        self.progress.set_sub_progress(0.0);
    }

    /// Season collections are required output; per-team game files are best effort.
    fn save(&self, season: &str, data: &SeasonCollections) -> Result<Vec<PathBuf>, CollectError> {
        let mut written = Vec::new();
        let batches: [(&str, anyhow::Result<Vec<Value>>); 4] = [
            (kinds::GAMES, to_values(&data.games)),
            (kinds::TEAM_STATS, to_values(&data.team_stats)),
            (kinds::BETTING_LINES, to_values(&data.betting_lines)),
            (kinds::RATINGS, to_values(&data.ratings)),
        ];

        for (kind, records) in batches {
            let pair = records
                .and_then(|records| self.layout.write_collection(season, kind, &records))
                .map_err(|source| CollectError::Export {
                    kind: kind.to_string(),
                    source,
                })?;
            if let Some(pair) = pair {
                written.push(pair.json);
                written.push(pair.csv);
            }
        }

        for (team, games) in data.team_games.iter().filter(|(_, games)| !games.is_empty()) {
            let result = to_values(games).and_then(|records| self.layout.write_team_games(season, team, &records));
            match result {
                Ok(pair) => {
                    written.push(pair.json);
                    written.push(pair.csv);
                }
                Err(e) => warn!("Failed to save games for {}: {:?}", team, e),
            }
        }
        info!("Saved data for {} teams", data.team_games.len());
        Ok(written)
    }

    fn write_summary(&self, season: &str, data: &SeasonCollections) -> anyhow::Result<SeasonSummary> {
        let summary = SeasonSummary::build(season, data, chrono::Local::now().naive_local());
        let path = self.layout.write_summary(season, &summary)?;

        info!("Season summary written to {}", path.display());
        if let Value::Object(fields) = serde_json::to_value(&summary)? {
            for (key, value) in fields {
                info!("  {}: {}", key, value);
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints;
    use crate::cache::CollectionCache;
    use crate::progress::RecordingProgress;
    use crate::testing::FakeApi;
    use serde_json::json;
    use std::sync::Arc;

    fn season_fixture() -> FakeApi {
        FakeApi::default()
            .with(
                endpoints::TEAMS,
                json!([
                    {"id": 1, "school": "A", "conference": "ACC"},
                    {"id": 2, "school": "B", "conference": "SEC"},
                    {"id": 3, "school": null}
                ]),
            )
            .with(
                endpoints::GAMES,
                json!([{"id": 1, "homeTeam": "A", "awayTeam": "B", "homePoints": 70, "awayPoints": 60}]),
            )
            .with(
                endpoints::TEAM_STATS,
                json!([{"team": "A", "conference": "ACC", "games": 30, "wins": 20, "losses": 10}]),
            )
            .with(
                endpoints::LINES,
                json!([{"gameId": 1, "homeTeam": "A", "awayTeam": "B", "provider": "ESPN Bet", "spread": -4.5}]),
            )
            .with(endpoints::RATINGS_SRS, json!([{"team": "B", "rating": 3.2}]))
    }

    #[tokio::test]
    async fn test_full_run_writes_season_tree() {
        let out = tempfile::tempdir().unwrap();
        let fake = Arc::new(season_fixture());
        let api = CbbApi::new(fake.clone(), CollectionCache::disabled());
        let sink = RecordingProgress::default();

        let report = Collector::new(api, OutputLayout::new(out.path()), &sink)
            .collect_comprehensive_data("2025")
            .await
            .unwrap();
        assert_eq!(report.teams, 2);

        let season_dir = out.path().join("2025");
        for kind in ["games", "team_stats", "betting_lines", "ratings"] {
            assert!(season_dir.join(format!("{}.json", kind)).exists(), "{} missing", kind);
            assert!(season_dir.join(format!("{}.csv", kind)).exists());
        }
        assert!(season_dir.join("teams/A.json").exists());
        assert!(season_dir.join("teams/B.csv").exists());

        let games: Vec<Value> =
            serde_json::from_slice(&std::fs::read(season_dir.join("games.json")).unwrap()).unwrap();
        assert_eq!(games.len(), 1);
        let lines: Vec<Value> =
            serde_json::from_slice(&std::fs::read(season_dir.join("betting_lines.json")).unwrap()).unwrap();
        assert_eq!(lines.len(), 1);

        let stats: Vec<Value> =
            serde_json::from_slice(&std::fs::read(season_dir.join("team_stats.json")).unwrap()).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["wins"], 20);
        assert_eq!(stats[1]["team"], "B");
        assert_eq!(stats[1]["losses"], 1);

        let header = std::fs::read_to_string(season_dir.join("team_stats.csv")).unwrap();
        assert!(header.starts_with("team,season,conference,"));

        let summary = report.summary.unwrap();
        assert_eq!(summary.total_games, 1);
        assert_eq!(summary.average_total_score, 130.0);
        assert_eq!(summary.teams_list, vec!["A".to_string(), "B".to_string()]);
        assert!(out.path().join("2025_summary.json").exists());

        let statuses = sink.statuses();
        assert_eq!(statuses.first().map(String::as_str), Some("Fetching teams list..."));
        assert!(statuses.contains(&"Processing 2 teams...".to_string()));
        assert!(statuses.contains(&"Fetching betting_lines for 2 teams".to_string()));
        for kind in ["games", "team_stats", "betting_lines", "ratings"] {
            let started = statuses.iter().position(|s| s == &format!("Fetching {} for 2 teams", kind));
            let finished = statuses.iter().position(|s| s == &format!("Fetched {} for 2 teams", kind));
            assert!(started.is_some() && started < finished, "{} batch milestones", kind);
        }
        assert_eq!(statuses.last().map(String::as_str), Some("Data collection complete!"));
    }

    #[tokio::test]
    async fn test_zero_teams_is_fatal_and_writes_nothing() {
        let out = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeApi::default());
        let api = CbbApi::new(fake.clone(), CollectionCache::disabled());
        let sink = RecordingProgress::default();

        let result = Collector::new(api, OutputLayout::new(out.path()), &sink)
            .collect_comprehensive_data("2025")
            .await;

        assert!(matches!(result, Err(CollectError::NoTeams { .. })));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
        let last = sink.statuses().pop().unwrap();
        assert!(last.starts_with("Error"), "unexpected final status {}", last);
        // Roster lookup only: unfiltered, then season-filtered
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test]
    async fn test_max_teams_limits_fan_out() {
        let out = tempfile::tempdir().unwrap();
        let fake = Arc::new(season_fixture());
        let api = CbbApi::new(fake.clone(), CollectionCache::disabled());
        let sink = RecordingProgress::default();

        let report = Collector::new(api, OutputLayout::new(out.path()), &sink)
            .with_max_teams(1)
            .with_mode(FetchMode::Sequential {
                delay: std::time::Duration::ZERO,
            })
            .collect_comprehensive_data("2025")
            .await
            .unwrap();

        assert_eq!(report.teams, 1);
        let team_params: Vec<String> = fake
            .calls()
            .iter()
            .filter(|(endpoint, _)| endpoint == endpoints::GAMES)
            .flat_map(|(_, params)| params.iter().filter(|(k, _)| k == "team").map(|(_, v)| v.clone()))
            .collect();
        assert_eq!(team_params, vec!["A".to_string()]);
        assert!(!out.path().join("2025/teams/B.json").exists());
    }

    #[tokio::test]
    async fn test_repeated_roster_name_collected_once() {
        let out = tempfile::tempdir().unwrap();
        let fake = Arc::new(season_fixture().with(
            endpoints::TEAMS,
            json!([
                {"id": 1, "school": "A", "conference": "ACC"},
                {"id": 9, "school": "A", "conference": "ACC"},
                {"id": 2, "school": "B", "conference": "SEC"}
            ]),
        ));
        let api = CbbApi::new(fake.clone(), CollectionCache::disabled());
        let sink = RecordingProgress::default();

        let report = Collector::new(api, OutputLayout::new(out.path()), &sink)
            .collect_comprehensive_data("2025")
            .await
            .unwrap();

        assert_eq!(report.teams, 2);
        let stats: Vec<Value> =
            serde_json::from_slice(&std::fs::read(out.path().join("2025/team_stats.json")).unwrap()).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["wins"], 20);
        let summary = report.summary.unwrap();
        assert_eq!(summary.data_counts.team_stats, summary.teams_list.len());
        assert_eq!(summary.data_counts.ratings, 2);
    }

    #[tokio::test]
    async fn test_prefetch_serves_team_lookups_from_cache() {
        let out = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(season_fixture());
        let api = CbbApi::new(fake.clone(), CollectionCache::open(cache_dir.path()));
        let sink = RecordingProgress::default();

        Collector::new(api, OutputLayout::new(out.path()), &sink)
            .with_prefetch(true)
            .collect_comprehensive_data("2025")
            .await
            .unwrap();

        let per_endpoint = |name: &str| fake.calls().iter().filter(|(e, _)| e == name).count();
        assert_eq!(per_endpoint(endpoints::GAMES), 1);
        assert_eq!(per_endpoint(endpoints::TEAM_STATS), 1);
        assert_eq!(per_endpoint(endpoints::LINES), 1);
        assert!(cache_dir.path().join("2025_games.json").exists());

        // A later run finds the season on disk and warms memory before fanning out
        let rerun = Arc::new(season_fixture());
        let api = CbbApi::new(rerun.clone(), CollectionCache::open(cache_dir.path()));
        let report = Collector::new(api, OutputLayout::new(out.path()), &sink)
            .collect_comprehensive_data("2025")
            .await
            .unwrap();
        assert_eq!(report.summary.unwrap().total_games, 1);
        assert!(rerun.calls().iter().all(|(e, _)| e == endpoints::TEAMS));
    }
}
