//! In-memory stand-in for the remote API.

use crate::cache::filter_for_team;
use crate::error::FetchError;
use crate::params::QueryParams;
use crate::transport::ApiTransport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Serves fixed collections per endpoint and filters by `team` like the real API.
#[derive(Default)]
pub struct FakeApi {
    routes: HashMap<String, Value>,
    season_only: HashSet<String>,
    failing_teams: HashSet<String>,
    calls: Mutex<Vec<(String, QueryParams)>>,
}

impl FakeApi {
    pub fn with(mut self, endpoint: &str, data: Value) -> Self {
        self.routes.insert(endpoint.to_string(), data);
        self
    }

    /// Endpoint that only answers when a `season` parameter is present.
    pub fn with_season_only(mut self, endpoint: &str, data: Value) -> Self {
        self.season_only.insert(endpoint.to_string());
        self.with(endpoint, data)
    }

    /// Any request scoped to `team` fails with a 500.
    pub fn failing_for(mut self, team: &str) -> Self {
        self.failing_teams.insert(team.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, QueryParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn param<'a>(params: &'a QueryParams, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn get_json(&self, endpoint: &str, params: &QueryParams) -> Result<Value, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), params.clone()));

        let team = param(params, "team");
        if let Some(team) = team {
            if self.failing_teams.contains(team) {
                return Err(FetchError::RequestFailure {
                    endpoint: endpoint.to_string(),
                    status: 500,
                    body: "boom".to_string(),
                });
            }
        }

        if self.season_only.contains(endpoint) && param(params, "season").is_none() {
            return Ok(Value::Array(Vec::new()));
        }

        let data = self.routes.get(endpoint).cloned().unwrap_or(Value::Array(Vec::new()));
        match (team, data) {
            (Some(team), Value::Array(items)) => Ok(Value::Array(filter_for_team(&items, team))),
            (_, data) => Ok(data),
        }
    }
}
