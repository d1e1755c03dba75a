//! GraphQL indexer client.
//!
//! The indexer is the fast path for discovery and reputation; every query
//! here has a chain fallback owned by the calling component, so any
//! transport error **or** malformed payload is surfaced as an
//! [`IndexerError`] rather than papered over — the caller decides whether to
//! fall back.
//!
//! Numeric fields arrive as GraphQL `BigInt` strings; decoding accepts both
//! string and number forms.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::sentinel::probe::SHARED_HTTP_CLIENT;

/// Per-query timeout against the indexer.
const INDEXER_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for indexer operations. Covers transport failures and
/// responses that do not match the expected shape.
#[derive(Debug, Clone)]
pub struct IndexerError {
    message: String,
}

impl IndexerError {
    pub fn new(message: impl Into<String>) -> Self {
        IndexerError {
            message: message.into(),
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "indexer error: {}", self.message)
    }
}

impl Error for IndexerError {}

/// One row of the `monitoredAgents` entity.
#[derive(Debug, Clone)]
pub struct MonitoredAgent {
    pub agent_id: String,
    pub endpoint: Option<String>,
    pub staked_amount: u128,
    pub last_check_timestamp: u64,
}

/// Aggregated peer feedback as indexed, mean still fixed-point scaled.
#[derive(Debug, Clone, Copy)]
pub struct IndexedReputation {
    pub count: u64,
    pub sum: u128,
    pub mean: u128,
}

/// One indexed `HealthUpdated` event.
#[derive(Debug, Clone)]
pub struct HealthUpdate {
    pub agent_id: String,
    pub block_timestamp: u64,
    pub old_score: u8,
    pub new_score: u8,
    pub success: bool,
    pub response_time: u64,
}

/// Query surface the discovery and reputation components consume.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Agents currently flagged active, capped at 100.
    async fn monitored_agents(&self) -> Result<Vec<MonitoredAgent>, IndexerError>;

    /// One agent by id, `None` when the entity does not exist.
    async fn monitored_agent(&self, agent_id: &str)
        -> Result<Option<MonitoredAgent>, IndexerError>;

    /// Aggregated reputation, `None` when the entity does not exist.
    async fn reputation_summary(
        &self,
        agent_id: &str,
    ) -> Result<Option<IndexedReputation>, IndexerError>;

    /// Most recent on-chain health updates for an agent, newest first.
    async fn health_updates(
        &self,
        agent_id: &str,
        first: usize,
    ) -> Result<Vec<HealthUpdate>, IndexerError>;
}

/// Production [`Indexer`] over a GraphQL HTTP endpoint.
pub struct GraphIndexer {
    url: String,
    client: reqwest::Client,
}

impl GraphIndexer {
    pub fn new(url: impl Into<String>) -> Self {
        GraphIndexer {
            url: url.into(),
            client: SHARED_HTTP_CLIENT.clone(),
        }
    }

    async fn query(&self, query: &str, variables: Value) -> Result<Value, IndexerError> {
        let body = json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(&self.url)
            .timeout(INDEXER_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexerError::new(format!("POST {}: {}", self.url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IndexerError::new(format!("HTTP {} from {}", status, self.url)));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| IndexerError::new(format!("invalid JSON: {}", e)))?;

        if let Some(errors) = parsed.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(IndexerError::new(format!("GraphQL errors: {}", Value::from(errors.clone()))));
            }
        }

        parsed
            .get("data")
            .cloned()
            .ok_or_else(|| IndexerError::new("response has no data field"))
    }
}

/// Accept a GraphQL BigInt in either string or number form.
fn lenient_u128(value: Option<&Value>) -> Result<u128, IndexerError> {
    match value {
        Some(Value::String(s)) => s
            .parse::<u128>()
            .map_err(|e| IndexerError::new(format!("malformed numeric field {:?}: {}", s, e))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| IndexerError::new(format!("malformed numeric field {}", n))),
        Some(other) => Err(IndexerError::new(format!(
            "malformed numeric field {}",
            other
        ))),
        None => Err(IndexerError::new("missing numeric field")),
    }
}

fn lenient_u64(value: Option<&Value>) -> Result<u64, IndexerError> {
    lenient_u128(value).map(|v| u64::try_from(v).unwrap_or(u64::MAX))
}

fn parse_monitored_agent(entity: &Value) -> Result<MonitoredAgent, IndexerError> {
    let agent_id = entity
        .get("agentId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IndexerError::new("monitoredAgent entity without agentId"))?
        .to_string();
    let endpoint = entity
        .get("endpoint")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    Ok(MonitoredAgent {
        agent_id,
        endpoint,
        staked_amount: lenient_u128(entity.get("stakedAmount"))?,
        last_check_timestamp: lenient_u64(entity.get("lastCheckTimestamp"))?,
    })
}

const MONITORED_AGENTS_QUERY: &str = r#"
query MonitoredAgents {
  monitoredAgents(first: 100, where: { isActive: true }) {
    agentId
    endpoint
    stakedAmount
    lastCheckTimestamp
  }
}
"#;

const MONITORED_AGENT_QUERY: &str = r#"
query MonitoredAgent($id: ID!) {
  monitoredAgent(id: $id) {
    agentId
    endpoint
    stakedAmount
    lastCheckTimestamp
  }
}
"#;

const REPUTATION_SUMMARY_QUERY: &str = r#"
query ReputationSummary($id: ID!) {
  reputationSummary(id: $id) {
    count
    sum
    mean
  }
}
"#;

const HEALTH_UPDATES_QUERY: &str = r#"
query HealthUpdates($agentId: String!, $first: Int!) {
  healthUpdateds(
    first: $first
    where: { agentId: $agentId }
    orderBy: blockTimestamp
    orderDirection: desc
  ) {
    id
    agentId
    blockTimestamp
    oldScore
    newScore
    success
    responseTime
  }
}
"#;

#[async_trait]
impl Indexer for GraphIndexer {
    async fn monitored_agents(&self) -> Result<Vec<MonitoredAgent>, IndexerError> {
        let data = self.query(MONITORED_AGENTS_QUERY, json!({})).await?;
        let entities = data
            .get("monitoredAgents")
            .and_then(|v| v.as_array())
            .ok_or_else(|| IndexerError::new("monitoredAgents is not a list"))?;
        entities.iter().map(parse_monitored_agent).collect()
    }

    async fn monitored_agent(
        &self,
        agent_id: &str,
    ) -> Result<Option<MonitoredAgent>, IndexerError> {
        let data = self
            .query(MONITORED_AGENT_QUERY, json!({ "id": agent_id }))
            .await?;
        match data.get("monitoredAgent") {
            None | Some(Value::Null) => Ok(None),
            Some(entity) => parse_monitored_agent(entity).map(Some),
        }
    }

    async fn reputation_summary(
        &self,
        agent_id: &str,
    ) -> Result<Option<IndexedReputation>, IndexerError> {
        let data = self
            .query(REPUTATION_SUMMARY_QUERY, json!({ "id": agent_id }))
            .await?;
        match data.get("reputationSummary") {
            None | Some(Value::Null) => Ok(None),
            Some(entity) => Ok(Some(IndexedReputation {
                count: lenient_u64(entity.get("count"))?,
                sum: lenient_u128(entity.get("sum"))?,
                mean: lenient_u128(entity.get("mean"))?,
            })),
        }
    }

    async fn health_updates(
        &self,
        agent_id: &str,
        first: usize,
    ) -> Result<Vec<HealthUpdate>, IndexerError> {
        let data = self
            .query(
                HEALTH_UPDATES_QUERY,
                json!({ "agentId": agent_id, "first": first }),
            )
            .await?;
        let entities = data
            .get("healthUpdateds")
            .and_then(|v| v.as_array())
            .ok_or_else(|| IndexerError::new("healthUpdateds is not a list"))?;

        entities
            .iter()
            .map(|entity| {
                Ok(HealthUpdate {
                    agent_id: entity
                        .get("agentId")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    block_timestamp: lenient_u64(entity.get("blockTimestamp"))?,
                    old_score: lenient_u64(entity.get("oldScore"))? as u8,
                    new_score: lenient_u64(entity.get("newScore"))? as u8,
                    success: entity
                        .get("success")
                        .and_then(|v| v.as_bool())
                        .ok_or_else(|| IndexerError::new("healthUpdated without success flag"))?,
                    response_time: lenient_u64(entity.get("responseTime"))?,
                })
            })
            .collect()
    }
}
