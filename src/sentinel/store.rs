//! Durable state store.
//!
//! Five logical collections over libsql: agent records (JSON documents with
//! a bounded probe history), the append-only health-event log, the TTL'd LLM
//! response cache, per-agent suspicious counters, one-shot faucet claims,
//! plus a small durable config table. `STATE_STORE_URI` selects the backend:
//! a local file path, `:memory:` (tests), or a `libsql://`/`https://` remote
//! with an auth token.
//!
//! The store is the only shared mutable state in the process. The pipeline
//! is its sole writer for agents, history, events, and counters; the LLM
//! component owns the cache rows.

use std::fmt;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::sentinel::trends::ProbeSample;

/// Maximum retained probe samples per agent. Oldest entries are evicted on
/// push.
pub const HISTORY_LIMIT: usize = 20;

/// Error type for store operations.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}

fn db_err(e: libsql::Error) -> StoreError {
    StoreError::new(e.to_string())
}

/// One row of the append-only health-event log.
///
/// `ts` is assigned by the store on insert; any caller-provided value is
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEvent {
    pub agent_id: String,
    #[serde(default)]
    pub ts: String,
    pub decision: String,
    pub reason: String,
    pub health_score: u8,
    pub response_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_detected: Option<bool>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    agent_id TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    monitored INTEGER NOT NULL DEFAULT 0,
    last_checked_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_monitored ON agents(monitored);
CREATE INDEX IF NOT EXISTS idx_agents_last_checked ON agents(last_checked_at DESC);

CREATE TABLE IF NOT EXISTS health_events (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    ts TEXT NOT NULL,
    decision TEXT NOT NULL,
    reason TEXT NOT NULL,
    health_score INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    failure_type TEXT,
    anomaly_detected INTEGER
);
CREATE INDEX IF NOT EXISTS idx_health_events_agent_ts
    ON health_events(agent_id, ts DESC);

CREATE TABLE IF NOT EXISTS llm_cache (
    cache_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_llm_cache_expires ON llm_cache(expires_at);

CREATE TABLE IF NOT EXISTS suspicious_counters (
    agent_id TEXT PRIMARY KEY,
    consecutive INTEGER NOT NULL DEFAULT 0,
    total_seen INTEGER NOT NULL DEFAULT 0,
    last_at TEXT,
    last_slashed_at TEXT
);

CREATE TABLE IF NOT EXISTS faucet_claims (
    address TEXT PRIMARY KEY,
    claimed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Recursive JSON merge: objects merge key-wise, everything else (arrays,
/// scalars, nulls) overwrites.
fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) if base_value.is_object() && patch_value.is_object() => {
                        deep_merge(base_value, patch_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

/// True when `agent_id` appears in `key` as a whole separator-delimited
/// segment. Cache keys use `:` separators (`health:<id>:…`); legacy keys
/// used `_`, so both count as separators.
fn key_contains_agent(key: &str, agent_id: &str) -> bool {
    key.split([':', '_']).any(|segment| segment == agent_id)
}

/// Handle to the persistent store. Cheap to share behind an `Arc`; each
/// operation opens its own connection against the shared database.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (and if necessary create) the store at `uri`, applying the
    /// schema idempotently.
    pub async fn connect(uri: &str, auth_token: Option<&str>) -> Result<Self, StoreError> {
        let db = if uri == ":memory:" || uri.contains("mode=memory") {
            Builder::new_local(":memory:").build().await
        } else if uri.starts_with("libsql://")
            || uri.starts_with("https://")
            || uri.starts_with("http://")
        {
            Builder::new_remote(uri.to_string(), auth_token.unwrap_or_default().to_string())
                .build()
                .await
        } else {
            Builder::new_local(uri.strip_prefix("file:").unwrap_or(uri))
                .build()
                .await
        }
        .map_err(db_err)?;

        let store = Store { db };
        let conn = store.conn()?;
        conn.execute_batch(SCHEMA).await.map_err(db_err)?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        self.db.connect().map_err(db_err)
    }

    // ---- agents -----------------------------------------------------------

    /// Fetch the full agent document, or `None` for an unknown id.
    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT doc FROM agents WHERE agent_id = ?1",
                params![agent_id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let doc: String = row.get(0).map_err(db_err)?;
                serde_json::from_str(&doc)
                    .map(Some)
                    .map_err(|e| StoreError::new(format!("corrupt agent doc {}: {}", agent_id, e)))
            }
            None => Ok(None),
        }
    }

    /// Deep-merge `partial` into the agent document, creating the row on
    /// first observation. Sets `updatedAt`, seeds `createdAt` on insert, and
    /// mirrors the `monitored` and `lastChecked` fields into their indexed
    /// columns.
    pub async fn upsert_agent(&self, agent_id: &str, partial: &Value) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let now = now_rfc3339();

        let existing = {
            let mut rows = tx
                .query(
                    "SELECT doc FROM agents WHERE agent_id = ?1",
                    params![agent_id],
                )
                .await
                .map_err(db_err)?;
            match rows.next().await.map_err(db_err)? {
                Some(row) => {
                    let raw: String = row.get(0).map_err(db_err)?;
                    Some(serde_json::from_str::<Value>(&raw).map_err(|e| {
                        StoreError::new(format!("corrupt agent doc {}: {}", agent_id, e))
                    })?)
                }
                None => None,
            }
        };

        let inserting = existing.is_none();
        let mut doc = existing.unwrap_or_else(|| json!({ "agentId": agent_id }));
        deep_merge(&mut doc, partial);
        if inserting {
            doc["createdAt"] = Value::String(now.clone());
        }
        doc["updatedAt"] = Value::String(now.clone());

        let monitored = doc
            .get("monitored")
            .and_then(|v| v.as_bool())
            .unwrap_or(false) as i64;
        let last_checked = doc
            .get("lastChecked")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let raw = serde_json::to_string(&doc)
            .map_err(|e| StoreError::new(format!("serializing agent doc: {}", e)))?;

        if inserting {
            tx.execute(
                "INSERT INTO agents (agent_id, doc, monitored, last_checked_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![agent_id, raw, monitored, last_checked, now],
            )
            .await
            .map_err(db_err)?;
        } else {
            tx.execute(
                "UPDATE agents SET doc = ?2, monitored = ?3, last_checked_at = ?4, updated_at = ?5 \
                 WHERE agent_id = ?1",
                params![agent_id, raw, monitored, last_checked, now],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// Most recently checked agents, for the read surface.
    pub async fn list_agents(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT doc FROM agents ORDER BY last_checked_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(db_err)?;
        let mut agents = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let raw: String = row.get(0).map_err(db_err)?;
            if let Ok(doc) = serde_json::from_str(&raw) {
                agents.push(doc);
            }
        }
        Ok(agents)
    }

    /// Append one probe sample to the agent's rolling history, evicting the
    /// oldest entry beyond [`HISTORY_LIMIT`]. Creates the row when the agent
    /// has never been seen.
    pub async fn push_response_history(
        &self,
        agent_id: &str,
        entry: &ProbeSample,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let now = now_rfc3339();

        let existing = {
            let mut rows = tx
                .query(
                    "SELECT doc FROM agents WHERE agent_id = ?1",
                    params![agent_id],
                )
                .await
                .map_err(db_err)?;
            match rows.next().await.map_err(db_err)? {
                Some(row) => {
                    let raw: String = row.get(0).map_err(db_err)?;
                    Some(serde_json::from_str::<Value>(&raw).map_err(|e| {
                        StoreError::new(format!("corrupt agent doc {}: {}", agent_id, e))
                    })?)
                }
                None => None,
            }
        };

        let inserting = existing.is_none();
        let mut doc = existing
            .unwrap_or_else(|| json!({ "agentId": agent_id, "createdAt": now.clone() }));

        let sample = serde_json::to_value(entry)
            .map_err(|e| StoreError::new(format!("serializing probe sample: {}", e)))?;
        let history = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::new(format!("agent doc {} is not an object", agent_id)))?
            .entry("responseHistory")
            .or_insert_with(|| Value::Array(vec![]));
        match history.as_array_mut() {
            Some(entries) => {
                entries.push(sample);
                while entries.len() > HISTORY_LIMIT {
                    entries.remove(0);
                }
            }
            None => {
                *history = Value::Array(vec![sample]);
            }
        }
        doc["updatedAt"] = Value::String(now.clone());

        let raw = serde_json::to_string(&doc)
            .map_err(|e| StoreError::new(format!("serializing agent doc: {}", e)))?;
        if inserting {
            tx.execute(
                "INSERT INTO agents (agent_id, doc, monitored, created_at, updated_at) \
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![agent_id, raw, now],
            )
            .await
            .map_err(db_err)?;
        } else {
            tx.execute(
                "UPDATE agents SET doc = ?2, updated_at = ?3 WHERE agent_id = ?1",
                params![agent_id, raw, now],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    /// Read the rolling probe history (oldest first; empty for unknown ids).
    pub async fn get_response_history(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ProbeSample>, StoreError> {
        let doc = match self.get_agent(agent_id).await? {
            Some(doc) => doc,
            None => return Ok(vec![]),
        };
        let history = doc
            .get("responseHistory")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(history
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    // ---- health events ----------------------------------------------------

    /// Append one immutable health event with a server-side timestamp.
    pub async fn log_health_event(&self, event: &HealthEvent) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();
        let ts = now_rfc3339();
        conn.execute(
            "INSERT INTO health_events \
             (id, agent_id, ts, decision, reason, health_score, response_time_ms, success, failure_type, anomaly_detected) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                event.agent_id.as_str(),
                ts,
                event.decision.as_str(),
                event.reason.as_str(),
                event.health_score as i64,
                event.response_time_ms as i64,
                event.success as i64,
                event.failure_type.as_deref(),
                event.anomaly_detected.map(|b| b as i64),
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// The last `limit` events for an agent, newest first.
    pub async fn get_health_history(
        &self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<HealthEvent>, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT agent_id, ts, decision, reason, health_score, response_time_ms, success, failure_type, anomaly_detected \
                 FROM health_events WHERE agent_id = ?1 \
                 ORDER BY ts DESC, rowid DESC LIMIT ?2",
                params![agent_id, limit as i64],
            )
            .await
            .map_err(db_err)?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            events.push(HealthEvent {
                agent_id: row.get(0).map_err(db_err)?,
                ts: row.get(1).map_err(db_err)?,
                decision: row.get(2).map_err(db_err)?,
                reason: row.get(3).map_err(db_err)?,
                health_score: row.get::<i64>(4).map_err(db_err)? as u8,
                response_time_ms: row.get::<i64>(5).map_err(db_err)? as u64,
                success: row.get::<i64>(6).map_err(db_err)? != 0,
                failure_type: row.get::<Option<String>>(7).map_err(db_err)?,
                anomaly_detected: row
                    .get::<Option<i64>>(8)
                    .map_err(db_err)?
                    .map(|v| v != 0),
            });
        }
        Ok(events)
    }

    // ---- llm cache --------------------------------------------------------

    /// Cache lookup. A row past its deadline is a miss.
    pub async fn get_cached(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT value, expires_at FROM llm_cache WHERE cache_key = ?1",
                params![key],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let expires_at: i64 = row.get(1).map_err(db_err)?;
                if expires_at <= now_epoch() {
                    return Ok(None);
                }
                let raw: String = row.get(0).map_err(db_err)?;
                serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|e| StoreError::new(format!("corrupt cache row {}: {}", key, e)))
            }
            None => Ok(None),
        }
    }

    /// Cache write with `expires_at = now + ttl`. Expired rows are purged on
    /// every write, which keeps the table bounded without a sweeper task.
    pub async fn set_cached(
        &self,
        key: &str,
        value: &Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let now = now_epoch();
        conn.execute(
            "DELETE FROM llm_cache WHERE expires_at <= ?1",
            params![now],
        )
        .await
        .map_err(db_err)?;
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::new(format!("serializing cache value: {}", e)))?;
        conn.execute(
            "INSERT OR REPLACE INTO llm_cache (cache_key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, raw, now + ttl.as_secs() as i64],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ---- suspicious counters ----------------------------------------------

    /// Atomically bump the agent's consecutive-suspicious counter.
    ///
    /// Returns true iff the new value reached `threshold`; in that case the
    /// same transaction resets `consecutive` to 0 and stamps
    /// `last_slashed_at`. `total_seen` grows monotonically either way.
    pub async fn increment_suspicious(
        &self,
        agent_id: &str,
        threshold: u32,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let now = now_rfc3339();

        tx.execute(
            "INSERT INTO suspicious_counters (agent_id, consecutive, total_seen, last_at) \
             VALUES (?1, 1, 1, ?2) \
             ON CONFLICT(agent_id) DO UPDATE SET \
                 consecutive = consecutive + 1, \
                 total_seen = total_seen + 1, \
                 last_at = ?2",
            params![agent_id, now.clone()],
        )
        .await
        .map_err(db_err)?;

        let consecutive: i64 = {
            let mut rows = tx
                .query(
                    "SELECT consecutive FROM suspicious_counters WHERE agent_id = ?1",
                    params![agent_id],
                )
                .await
                .map_err(db_err)?;
            match rows.next().await.map_err(db_err)? {
                Some(row) => row.get(0).map_err(db_err)?,
                None => return Err(StoreError::new("suspicious counter vanished mid-update")),
            }
        };

        let reached = consecutive >= threshold as i64;
        if reached {
            tx.execute(
                "UPDATE suspicious_counters SET consecutive = 0, last_slashed_at = ?2 \
                 WHERE agent_id = ?1",
                params![agent_id, now],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(reached)
    }

    /// Current consecutive-suspicious count (0 for unknown agents).
    pub async fn get_suspicious(&self, agent_id: &str) -> Result<u32, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT consecutive FROM suspicious_counters WHERE agent_id = ?1",
                params![agent_id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as u32),
            None => Ok(0),
        }
    }

    /// Reset the consecutive counter after a healthy verdict.
    pub async fn reset_suspicious(&self, agent_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE suspicious_counters SET consecutive = 0 WHERE agent_id = ?1",
            params![agent_id],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ---- lifecycle --------------------------------------------------------

    /// Cascade delete of everything keyed to an unregistered agent: its
    /// record, health events, counter row, and every cache row whose key
    /// contains the id as a whole segment. Returns the collections that had
    /// rows removed.
    pub async fn delete_agent_data(
        &self,
        agent_id: &str,
    ) -> Result<Vec<&'static str>, StoreError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        let mut touched = Vec::new();

        let agents = tx
            .execute("DELETE FROM agents WHERE agent_id = ?1", params![agent_id])
            .await
            .map_err(db_err)?;
        if agents > 0 {
            touched.push("agents");
        }

        let events = tx
            .execute(
                "DELETE FROM health_events WHERE agent_id = ?1",
                params![agent_id],
            )
            .await
            .map_err(db_err)?;
        if events > 0 {
            touched.push("health_events");
        }

        let counters = tx
            .execute(
                "DELETE FROM suspicious_counters WHERE agent_id = ?1",
                params![agent_id],
            )
            .await
            .map_err(db_err)?;
        if counters > 0 {
            touched.push("suspicious_counters");
        }

        // Key-segment matching is done in Rust: `_` is a LIKE wildcard and
        // the match must be exact per segment, not substring.
        let mut stale_keys = Vec::new();
        {
            let mut rows = tx
                .query("SELECT cache_key FROM llm_cache", ())
                .await
                .map_err(db_err)?;
            while let Some(row) = rows.next().await.map_err(db_err)? {
                let key: String = row.get(0).map_err(db_err)?;
                if key_contains_agent(&key, agent_id) {
                    stale_keys.push(key);
                }
            }
        }
        for key in &stale_keys {
            tx.execute(
                "DELETE FROM llm_cache WHERE cache_key = ?1",
                params![key.as_str()],
            )
            .await
            .map_err(db_err)?;
        }
        if !stale_keys.is_empty() {
            touched.push("llm_cache");
        }

        tx.commit().await.map_err(db_err)?;
        Ok(touched)
    }

    // ---- faucet claims ----------------------------------------------------

    /// Record a one-shot claim for `address` (lowercased). Returns true only
    /// the first time; an existing row means the address was already served.
    pub async fn claim_once(&self, address: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let normalized = address.to_lowercase();
        let affected = conn
            .execute(
                "INSERT OR IGNORE INTO faucet_claims (address, claimed_at) VALUES (?1, ?2)",
                params![normalized, now_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    // ---- durable config ---------------------------------------------------

    /// Read a config value persisted across restarts.
    pub async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT value FROM config WHERE key = ?1", params![key])
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    /// Write a config value; read-your-writes.
    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_recurses_objects_and_overwrites_rest() {
        let mut base = json!({
            "name": "agent",
            "metrics": { "healthScore": 90, "uptime": 99.5 },
            "history": [1, 2, 3]
        });
        deep_merge(
            &mut base,
            &json!({
                "metrics": { "healthScore": 80 },
                "history": [4],
                "lastDecision": "healthy"
            }),
        );
        assert_eq!(base["metrics"]["healthScore"], 80);
        assert_eq!(base["metrics"]["uptime"], 99.5);
        assert_eq!(base["history"], json!([4]));
        assert_eq!(base["lastDecision"], "healthy");
        assert_eq!(base["name"], "agent");
    }

    #[test]
    fn cache_key_segment_matching() {
        assert!(key_contains_agent("health:7:true:40", "7"));
        assert!(key_contains_agent("narrative:7", "7"));
        assert!(key_contains_agent("onboard:agent_7:https://x", "7"));
        assert!(key_contains_agent("7", "7"));

        // Substrings must not match: agent 7 is not agent 17 or 70.
        assert!(!key_contains_agent("health:17:true:40", "7"));
        assert!(!key_contains_agent("narrative:70", "7"));
        assert!(!key_contains_agent("response:https://7a.example:abcd", "7"));
    }
}
