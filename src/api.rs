//! Endpoint accessors: one operation per remote resource.
//!
//! Each accessor validates its parameters, tries the cache, falls through to the
//! transport, and turns failures into an empty collection after logging them.
//! An empty result is a valid answer (a team may have no betting lines).

use crate::cache::CollectionCache;
use crate::error::FetchError;
use crate::models::{decode_records, BettingLine, Game, Ratings, Team, TeamSeasonStat};
use crate::params::{format_params, GameStatus};
use crate::transport::ApiTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod endpoints {
    pub const TEAMS: &str = "teams";
    pub const TEAM_STATS: &str = "stats/team/season";
    pub const GAMES: &str = "games";
    pub const GAMES_TEAMS: &str = "games/teams";
    pub const LINES: &str = "lines";
    pub const RATINGS_ADJUSTED: &str = "ratings/adjusted";
    pub const RATINGS_SRS: &str = "ratings/srs";
}

/// Cache data-type names.
pub mod data_types {
    pub const TEAM_STATS: &str = "team_stats";
    pub const GAMES: &str = "games";
    pub const GAMES_TEAMS: &str = "games_teams";
    pub const BETTING_LINES: &str = "betting_lines";
    pub const RATINGS_ADJUSTED: &str = "ratings_adjusted";
    pub const RATINGS_SRS: &str = "ratings_srs";
}

const SEASON_TYPE_REGULAR: &str = "regular";

type RawParams = Vec<(&'static str, Option<String>)>;

/// One cache-then-network lookup.
struct Lookup<'a> {
    endpoint: &'static str,
    data_type: &'static str,
    season: &'a str,
    team: Option<&'a str>,
    extra: RawParams,
    cacheable: bool,
}

/// College basketball API accessors.
#[derive(Clone)]
pub struct CbbApi {
    transport: Arc<dyn ApiTransport>,
    cache: CollectionCache,
}

impl CbbApi {
    pub fn new(transport: Arc<dyn ApiTransport>, cache: CollectionCache) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &CollectionCache {
        &self.cache
    }

    /// Load every cacheable collection for `season` into memory, so per-team
    /// lookups during the fan-out only read the cache.
    pub async fn warm_cache(&self, season: &str) -> usize {
        if !self.cache.is_enabled() {
            return 0;
        }
        self.cache
            .preload(
                season,
                &[
                    data_types::GAMES,
                    data_types::TEAM_STATS,
                    data_types::GAMES_TEAMS,
                    data_types::BETTING_LINES,
                    data_types::RATINGS_ADJUSTED,
                    data_types::RATINGS_SRS,
                ],
            )
            .await
    }

    /// All teams. The season filter is only applied if the unfiltered call yields nothing.
    pub async fn get_teams(&self, season: Option<&str>) -> Vec<Team> {
        let teams = self.request_or_empty(endpoints::TEAMS, Vec::new()).await;
        if !teams.is_empty() {
            info!("Retrieved {} teams", teams.len());
            return decode_records(teams);
        }

        let Some(season) = season else {
            return Vec::new();
        };
        let teams = self
            .request_or_empty(endpoints::TEAMS, vec![("season", Some(season.to_string()))])
            .await;
        if !teams.is_empty() {
            info!("Retrieved {} teams for season {}", teams.len(), season);
        }
        decode_records(teams)
    }

    pub async fn get_team_stats(&self, season: &str, team: Option<&str>) -> Vec<TeamSeasonStat> {
        let stats: Vec<TeamSeasonStat> = decode_records(
            self.lookup(Lookup {
                endpoint: endpoints::TEAM_STATS,
                data_type: data_types::TEAM_STATS,
                season,
                team,
                extra: vec![("seasonType", Some(SEASON_TYPE_REGULAR.to_string()))],
                cacheable: true,
            })
            .await,
        );

        match stats.first() {
            Some(sample) => {
                info!("Retrieved {} season stats entries for {}", stats.len(), scope(team));
                debug!(
                    "Sample stats - Team: {:?}, Games: {:?}",
                    sample.team, sample.games
                );
            }
            None => warn!("No stats retrieved for {}", scope(team)),
        }
        stats
    }

    /// Games for a season. `status` must be a valid [`GameStatus`] (any case);
    /// otherwise nothing is sent and the result is empty.
    pub async fn get_games(&self, season: &str, team: Option<&str>, status: &str) -> Vec<Game> {
        // Only the default status is cached; other filters always go to the network.
        let cacheable = matches!(status.parse::<GameStatus>(), Ok(GameStatus::Final));
        let games: Vec<Game> = decode_records(
            self.lookup(Lookup {
                endpoint: endpoints::GAMES,
                data_type: data_types::GAMES,
                season,
                team,
                extra: vec![
                    ("seasonType", Some(SEASON_TYPE_REGULAR.to_string())),
                    ("status", Some(status.to_string())),
                ],
                cacheable,
            })
            .await,
        );

        if !games.is_empty() {
            let with_scores = games.iter().filter(|g| g.scores().is_some()).count();
            info!(
                "Retrieved {} games ({} with scores) for {}",
                games.len(),
                with_scores,
                scope(team)
            );
            if with_scores < games.len() {
                warn!("Only {} out of {} games have scores.", with_scores, games.len());
            }
        }
        games
    }

    /// Per-game team box scores.
    pub async fn get_games_teams(&self, season: &str, team: Option<&str>) -> Vec<Value> {
        let records = self
            .lookup(Lookup {
                endpoint: endpoints::GAMES_TEAMS,
                data_type: data_types::GAMES_TEAMS,
                season,
                team,
                extra: vec![("seasonType", Some(SEASON_TYPE_REGULAR.to_string()))],
                cacheable: true,
            })
            .await;
        if !records.is_empty() {
            info!("Retrieved detailed stats for {} game entries", records.len());
        }
        records
    }

    pub async fn get_betting_lines(&self, season: &str, team: Option<&str>) -> Vec<BettingLine> {
        let lines: Vec<BettingLine> = decode_records(
            self.lookup(Lookup {
                endpoint: endpoints::LINES,
                data_type: data_types::BETTING_LINES,
                season,
                team,
                extra: Vec::new(),
                cacheable: true,
            })
            .await,
        );
        if !lines.is_empty() {
            info!("Retrieved {} betting lines for {}", lines.len(), scope(team));
        }
        lines
    }

    /// Adjusted and SRS ratings in one record; either side may be empty.
    pub async fn get_team_ratings(&self, season: &str, team: Option<&str>) -> Ratings {
        let adjusted = self.lookup(Lookup {
            endpoint: endpoints::RATINGS_ADJUSTED,
            data_type: data_types::RATINGS_ADJUSTED,
            season,
            team,
            extra: Vec::new(),
            cacheable: true,
        });
        let srs = self.lookup(Lookup {
            endpoint: endpoints::RATINGS_SRS,
            data_type: data_types::RATINGS_SRS,
            season,
            team,
            extra: Vec::new(),
            cacheable: true,
        });
        let (adjusted, srs) = tokio::join!(adjusted, srs);
        Ratings { adjusted, srs }
    }

    async fn lookup(&self, lookup: Lookup<'_>) -> Vec<Value> {
        let mut raw: RawParams = vec![
            ("season", Some(lookup.season.to_string())),
            ("team", lookup.team.map(str::to_string)),
        ];
        raw.extend(lookup.extra);

        // Validate before touching the cache or the network.
        if let Err(e) = format_params(&raw) {
            error!("Rejected request to {}: {}", lookup.endpoint, e);
            return Vec::new();
        }

        if lookup.cacheable {
            match lookup.team {
                Some(team) => {
                    if let Some(hit) = self.cache.load_for_team(lookup.data_type, lookup.season, team).await {
                        debug!("Serving {} for {} from cache", lookup.data_type, team);
                        return hit;
                    }
                }
                None => {
                    if let Some(hit) = self.cache.load(lookup.data_type, lookup.season).await {
                        return hit.as_ref().clone();
                    }
                }
            }
        }

        match self.request(lookup.endpoint, &raw).await {
            Ok(items) => {
                if lookup.cacheable && lookup.team.is_none() {
                    if let Err(e) = self.cache.save(lookup.data_type, lookup.season, items.clone()).await {
                        warn!("Failed to cache {} for season {}: {:?}", lookup.data_type, lookup.season, e);
                    }
                }
                items
            }
            Err(e) => {
                log_failure(lookup.endpoint, &raw, &e);
                Vec::new()
            }
        }
    }

    async fn request_or_empty(&self, endpoint: &str, raw: RawParams) -> Vec<Value> {
        match self.request(endpoint, &raw).await {
            Ok(items) => items,
            Err(e) => {
                log_failure(endpoint, &raw, &e);
                Vec::new()
            }
        }
    }

    async fn request(&self, endpoint: &str, raw: &RawParams) -> Result<Vec<Value>, FetchError> {
        let params = format_params(raw)?;
        let data = self.transport.get_json(endpoint, &params).await?;
        Ok(into_collection(data))
    }
}

/// Arrays as-is, `null` as empty, a lone object as a one-element collection.
fn into_collection(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn log_failure(endpoint: &str, raw: &RawParams, e: &FetchError) {
    if e.is_client_error() {
        error!("Client error calling {} with {:?}: {}", endpoint, raw, e);
    } else {
        error!("Error making request to {} with {:?}: {}", endpoint, raw, e);
    }
}

fn scope(team: Option<&str>) -> String {
    match team {
        Some(team) => format!("team {}", team),
        None => "all teams".to_string(),
    }
}
