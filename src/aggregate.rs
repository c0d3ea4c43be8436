//! Merge per-team result sets into season-wide collections.
//!
//! Games are unique by id and betting lines by their composite key; the first
//! record seen wins and later duplicates are dropped, not merged. Stats and
//! ratings are one record per team and are simply collected.

use crate::models::{BettingLine, Game, RatingRecord, Ratings, Team, TeamSeasonStat};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Raw per-team output of the fetch phase.
#[derive(Debug, Default)]
pub struct PerTeamResults {
    pub games: HashMap<String, Vec<Game>>,
    pub team_stats: HashMap<String, Vec<TeamSeasonStat>>,
    pub betting_lines: HashMap<String, Vec<BettingLine>>,
    pub ratings: HashMap<String, Ratings>,
}

/// Season-wide, deduplicated collections ready for export.
#[derive(Debug, Default)]
pub struct SeasonCollections {
    pub games: Vec<Game>,
    pub team_stats: Vec<TeamSeasonStat>,
    pub betting_lines: Vec<BettingLine>,
    pub ratings: Vec<RatingRecord>,
    /// Each team's own games, before deduplication, in roster order
    pub team_games: Vec<(String, Vec<Game>)>,
    /// Named teams that went through the fetch phase, in roster order
    pub analyzed_teams: Vec<String>,
}

/// Keep the first record per game id. Games without an id are dropped.
pub fn merge_games<I, B>(batches: I) -> Vec<Game>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = Game>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for game in batches.into_iter().flatten() {
        let Some(id) = game.id else {
            debug!("Dropping game without id");
            continue;
        };
        if seen.insert(id) {
            merged.push(game);
        }
    }
    merged
}

/// Keep the first line per (gameId, openDate, homeTeam, awayTeam, provider).
pub fn merge_betting_lines<I, B>(batches: I) -> Vec<BettingLine>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = BettingLine>,
{
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|line| seen.insert(line.dedup_key()))
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WinLoss {
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
}

/// Record derived from raw games. A win needs strictly more points; ties and
/// unscored games count toward `games` only.
pub fn derive_win_loss(games: &[Game], team: &str) -> WinLoss {
    let mut record = WinLoss::default();
    for game in games.iter().filter(|g| g.involves(team)) {
        record.games += 1;
        let Some((home, away)) = game.scores() else { continue };
        let is_home = game.home_team.as_deref() == Some(team);
        let (ours, theirs) = if is_home { (home, away) } else { (away, home) };
        if ours > theirs {
            record.wins += 1;
        } else if ours < theirs {
            record.losses += 1;
        }
    }
    record
}

/// Build the season collections. Iterates the roster in order so the
/// "first seen" record is reproducible for a given set of fetch results.
pub fn merge(season: &str, roster: &[Team], mut results: PerTeamResults) -> SeasonCollections {
    // One entry per school name; a repeated name keeps its first roster record
    let mut seen = HashSet::new();
    let named: Vec<&Team> = roster
        .iter()
        .filter(|t| t.name().is_some_and(|name| seen.insert(name)))
        .collect();
    let names: Vec<String> = named.iter().filter_map(|t| t.name().map(str::to_string)).collect();

    let team_games: Vec<(String, Vec<Game>)> = names
        .iter()
        .filter_map(|name| results.games.remove(name).map(|games| (name.clone(), games)))
        .collect();
    let games = merge_games(team_games.iter().map(|(_, games)| games.iter().cloned()));
    let betting_lines =
        merge_betting_lines(names.iter().filter_map(|name| results.betting_lines.remove(name)));

    let mut team_stats = Vec::with_capacity(named.len());
    let mut ratings = Vec::with_capacity(named.len());
    for (team, name) in named.iter().zip(&names) {
        let found = results
            .team_stats
            .remove(name)
            .and_then(|stats| stats.into_iter().find(|s| s.is_for(name)));
        match found {
            Some(stat) => {
                debug!("Added complete stats for {}", name);
                team_stats.push(stat);
            }
            None => {
                warn!("No matching stats found for {}; using empty record", name);
                let mut skeleton = TeamSeasonStat::skeleton(season, team);
                let record = derive_win_loss(&games, name);
                skeleton.games = Some(record.games);
                skeleton.wins = Some(record.wins);
                skeleton.losses = Some(record.losses);
                team_stats.push(skeleton);
            }
        }

        ratings.push(RatingRecord {
            team: name.clone(),
            season: season.to_string(),
            ratings: results.ratings.remove(name).unwrap_or_default(),
        });
    }

    info!(
        "Merged season {}: {} games, {} stats rows, {} betting lines, {} ratings",
        season,
        games.len(),
        team_stats.len(),
        betting_lines.len(),
        ratings.len()
    );

    SeasonCollections {
        games,
        team_stats,
        betting_lines,
        ratings,
        team_games,
        analyzed_teams: names,
    }
}
