//! Per-team fan-out with a bounded number of in-flight requests.

use crate::config::MAX_WORKER_CEILING;
use crate::progress::ProgressSink;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How per-team units are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Up to `max_workers` units in flight; rate-limit safety comes from the
    /// transport's retry/backoff and the worker ceiling.
    Parallel { max_workers: usize },
    /// One unit at a time with a fixed pause between teams.
    Sequential { delay: Duration },
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Parallel {
            max_workers: MAX_WORKER_CEILING,
        }
    }
}

/// min(requested, ceiling, team count), never below one.
pub fn worker_count(max_workers: usize, teams: usize) -> usize {
    max_workers.min(MAX_WORKER_CEILING).min(teams).max(1)
}

/// Slice of the overall progress bar owned by one batch.
#[derive(Clone, Copy)]
pub struct ProgressSpan<'a> {
    pub sink: &'a dyn ProgressSink,
    /// Overall percent at batch start
    pub start: f64,
    /// Overall percent covered by the whole batch
    pub width: f64,
}

impl<'a> ProgressSpan<'a> {
    pub fn new(sink: &'a dyn ProgressSink, start: f64, width: f64) -> Self {
        Self { sink, start, width }
    }

    fn unit_done(&self, completed: usize, total: usize, team: &str) {
        let fraction = completed as f64 / total as f64;
        self.sink.set_sub_progress(fraction * 100.0);
        self.sink.set_progress((self.start + self.width * fraction).min(100.0));
        self.sink.set_detail(&format!("Current team: {}", team));
    }
}

/// Run `fetch` once per team and collect results keyed by team name.
///
/// A failing unit is logged and left out of the map; the batch carries on.
/// Completion order is not input order, so the map is the only ordering contract.
pub async fn fetch_all<'a, R, F, Fut>(
    teams: &'a [String],
    mode: FetchMode,
    label: &str,
    progress: ProgressSpan<'_>,
    fetch: F,
) -> HashMap<String, R>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let total = teams.len();
    let mut results = HashMap::with_capacity(total);
    if total == 0 {
        return results;
    }

    let mut completed = 0usize;
    let mut record = |team: &str, outcome: anyhow::Result<R>| {
        completed += 1;
        match outcome {
            Ok(value) => {
                results.insert(team.to_string(), value);
            }
            Err(e) => warn!("Failed to fetch {} for {}: {:?}", label, team, e),
        }
        progress.unit_done(completed, total, team);
    };

    match mode {
        FetchMode::Parallel { max_workers } => {
            let workers = worker_count(max_workers, total);
            debug!("Fetching {} for {} teams with {} workers", label, total, workers);

            let fetch = &fetch;
            let mut units = stream::iter(teams.iter())
                .map(|team| async move { (team.as_str(), fetch(team.as_str()).await) })
                .buffer_unordered(workers);

            while let Some((team, outcome)) = units.next().await {
                record(team, outcome);
            }
        }
        FetchMode::Sequential { delay } => {
            debug!("Fetching {} for {} teams sequentially", label, total);
            for (idx, team) in teams.iter().enumerate() {
                // Fixed pause between teams to stay under upstream rate limits
                if idx > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let outcome = fetch(team.as_str()).await;
                record(team.as_str(), outcome);
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullProgress, ProgressEvent, RecordingProgress};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn roster(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Team {}", i)).collect()
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(10, 3), 3);
        assert_eq!(worker_count(10, 350), 10);
        assert_eq!(worker_count(50, 350), 10);
        assert_eq!(worker_count(4, 350), 4);
        assert_eq!(worker_count(0, 5), 1);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_ceiling() {
        let teams = roster(25);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = fetch_all(
            &teams,
            FetchMode::Parallel { max_workers: 32 },
            "games",
            ProgressSpan::new(&NullProgress, 0.0, 100.0),
            |team| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(team.len())
                }
            },
        )
        .await;

        assert_eq!(results.len(), 25);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= MAX_WORKER_CEILING, "peak {} above ceiling", peak);
        assert!(peak > 1, "expected some parallelism");
    }

    #[tokio::test]
    async fn test_failed_unit_is_absent_not_fatal() {
        let teams = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let results = fetch_all(
            &teams,
            FetchMode::default(),
            "lines",
            ProgressSpan::new(&NullProgress, 0.0, 100.0),
            |team| async move {
                if team == "B" {
                    Err(anyhow!("upstream exploded"))
                } else {
                    Ok(team.to_lowercase())
                }
            },
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["A"], "a");
        assert!(!results.contains_key("B"));
        assert_eq!(results["C"], "c");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_completes() {
        let teams = roster(7);
        let sink = RecordingProgress::default();
        fetch_all(
            &teams,
            FetchMode::Parallel { max_workers: 3 },
            "ratings",
            ProgressSpan::new(&sink, 50.0, 25.0),
            |team| async move {
                // Later teams finish first
                let n: u64 = team.trim_start_matches("Team ").parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(10 - n)).await;
                Ok(())
            },
        )
        .await;

        let events = sink.events();
        let sub: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::SubProgress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(sub.len(), 7);
        assert!(sub.windows(2).all(|w| w[0] < w[1]));
        assert!((sub[6] - 100.0).abs() < 1e-9);

        let overall: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(overall.iter().all(|p| (50.0..=75.0).contains(p)));
        assert!((overall[6] - 75.0).abs() < 1e-9);

        let details = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Detail(d) if d.starts_with("Current team: ")))
            .count();
        assert_eq!(details, 7);
    }

    #[tokio::test]
    async fn test_sequential_mode_runs_in_roster_order() {
        let teams = roster(4);
        let order = std::sync::Mutex::new(Vec::new());
        let results = fetch_all(
            &teams,
            FetchMode::Sequential {
                delay: Duration::from_millis(1),
            },
            "team_stats",
            ProgressSpan::new(&NullProgress, 0.0, 100.0),
            |team| {
                order.lock().unwrap().push(team.to_string());
                async move { Ok(()) }
            },
        )
        .await;

        assert_eq!(results.len(), 4);
        assert_eq!(*order.lock().unwrap(), teams);
    }

    #[tokio::test]
    async fn test_empty_roster() {
        let results: HashMap<String, ()> = fetch_all(
            &[],
            FetchMode::default(),
            "games",
            ProgressSpan::new(&NullProgress, 0.0, 100.0),
            |_| async { Ok(()) },
        )
        .await;
        assert!(results.is_empty());
    }
}
