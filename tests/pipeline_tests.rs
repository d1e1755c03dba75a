use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use agent_sentinel::sentinel::chain::{
    Chain, ChainError, ChainHealth, RawReputation, TxOutcome,
};
use agent_sentinel::sentinel::indexer::{
    HealthUpdate, IndexedReputation, Indexer, IndexerError, MonitoredAgent,
};
use agent_sentinel::sentinel::llm::{ChatClient, LlmDiagnostic, LlmError};
use agent_sentinel::sentinel::metadata::MetadataResolver;
use agent_sentinel::sentinel::pipeline::Pipeline;
use agent_sentinel::sentinel::probe::ProbeClient;
use agent_sentinel::sentinel::store::Store;
use agent_sentinel::sentinel::trends::ProbeSample;

// ---- local one-shot HTTP responder -----------------------------------------

async fn spawn_http(status_line: &'static str, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

// ---- mock chain ------------------------------------------------------------

struct MockChain {
    health: Mutex<HashMap<u64, ChainHealth>>,
    update_calls: Mutex<Vec<(u64, u64, bool)>>,
    report_calls: Mutex<Vec<(u64, String)>>,
}

impl MockChain {
    fn new() -> Self {
        MockChain {
            health: Mutex::new(HashMap::new()),
            update_calls: Mutex::new(Vec::new()),
            report_calls: Mutex::new(Vec::new()),
        }
    }

    async fn set_monitored(&self, agent_id: u64) {
        self.health.lock().await.insert(
            agent_id,
            ChainHealth {
                health_score: 80,
                is_monitored: true,
                ..ChainHealth::default()
            },
        );
    }

    async fn updates(&self) -> Vec<(u64, u64, bool)> {
        self.update_calls.lock().await.clone()
    }

    async fn reports(&self) -> Vec<(u64, String)> {
        self.report_calls.lock().await.clone()
    }
}

#[async_trait]
impl Chain for MockChain {
    async fn health_data(&self, agent_id: u64) -> Result<ChainHealth, ChainError> {
        self.health
            .lock()
            .await
            .get(&agent_id)
            .cloned()
            .ok_or_else(|| ChainError::new(format!("no such token {}", agent_id)))
    }

    async fn token_uri(&self, _agent_id: u64) -> Result<String, ChainError> {
        Ok(String::new())
    }

    async fn owner_of(&self, _agent_id: u64) -> Result<String, ChainError> {
        Ok("0x00000000000000000000000000000000000000aa".to_string())
    }

    async fn reputation_summary(&self, _agent_id: u64) -> Result<RawReputation, ChainError> {
        Ok(RawReputation::default())
    }

    async fn update_health(
        &self,
        agent_id: u64,
        response_time_ms: u64,
        success: bool,
    ) -> Result<TxOutcome, ChainError> {
        self.update_calls
            .lock()
            .await
            .push((agent_id, response_time_ms, success));
        Ok(TxOutcome {
            hash: "0x01".to_string(),
            success: true,
        })
    }

    async fn report_suspicious(
        &self,
        agent_id: u64,
        reason: &str,
    ) -> Result<TxOutcome, ChainError> {
        self.report_calls
            .lock()
            .await
            .push((agent_id, reason.to_string()));
        Ok(TxOutcome {
            hash: "0x02".to_string(),
            success: true,
        })
    }
}

// ---- mock indexer ----------------------------------------------------------

struct MockIndexer {
    /// `None` simulates an indexer outage; `Some` is the active-agent set.
    agents: Mutex<Option<Vec<MonitoredAgent>>>,
}

impl MockIndexer {
    fn up(agents: Vec<MonitoredAgent>) -> Self {
        MockIndexer {
            agents: Mutex::new(Some(agents)),
        }
    }

    fn down() -> Self {
        MockIndexer {
            agents: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn monitored_agents(&self) -> Result<Vec<MonitoredAgent>, IndexerError> {
        self.agents
            .lock()
            .await
            .clone()
            .ok_or_else(|| IndexerError::new("indexer down"))
    }

    async fn monitored_agent(
        &self,
        _agent_id: &str,
    ) -> Result<Option<MonitoredAgent>, IndexerError> {
        Ok(None)
    }

    async fn reputation_summary(
        &self,
        _agent_id: &str,
    ) -> Result<Option<IndexedReputation>, IndexerError> {
        Ok(None)
    }

    async fn health_updates(
        &self,
        _agent_id: &str,
        _first: usize,
    ) -> Result<Vec<HealthUpdate>, IndexerError> {
        Ok(vec![])
    }
}

// ---- mock chat client ------------------------------------------------------

struct MockChat {
    /// Canned JSON responses keyed by schema name; a missing key behaves
    /// like a transport outage.
    responses: Mutex<HashMap<&'static str, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockChat {
    fn new() -> Self {
        MockChat {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn respond(&self, schema_name: &'static str, body: Value) {
        self.responses
            .lock()
            .await
            .insert(schema_name, body.to_string());
    }

    async fn forget(&self, schema_name: &str) {
        self.responses.lock().await.remove(schema_name);
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_content: &str,
        schema_name: &str,
        _schema: &Value,
    ) -> Result<String, LlmError> {
        self.calls.lock().await.push(schema_name.to_string());
        self.responses
            .lock()
            .await
            .get(schema_name)
            .cloned()
            .ok_or_else(|| LlmError::new("llm down"))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

// ---- harness ---------------------------------------------------------------

fn healthy_decision() -> Value {
    json!({
        "decision": "healthy",
        "reason": "endpoint responsive and consistent",
        "failureType": "none",
        "anomalyDetected": false
    })
}

fn suspicious_decision() -> Value {
    json!({
        "decision": "suspicious",
        "reason": "endpoint returned a server error",
        "failureType": "error"
    })
}

fn valid_response_validation() -> Value {
    json!({
        "isValid": true,
        "schemaCompliant": true,
        "isSpoofed": false,
        "issues": [],
        "confidence": 90
    })
}

async fn build(
    chain: Arc<MockChain>,
    indexer: Arc<MockIndexer>,
    chat: Arc<MockChat>,
) -> (Pipeline, Arc<Store>) {
    let store = Arc::new(Store::connect(":memory:", None).await.unwrap());
    let llm = LlmDiagnostic::new(chat, store.clone(), Duration::from_secs(300));
    let pipeline = Pipeline::new(
        store.clone(),
        chain,
        indexer,
        llm,
        ProbeClient::new(),
        // Never reached: the mock chain reports empty token URIs.
        MetadataResolver::new("http://127.0.0.1:1"),
    );
    (pipeline, store)
}

// ---- scenarios -------------------------------------------------------------

#[tokio::test]
async fn happy_path_resets_counter_and_updates_chain() {
    let endpoint = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(1).await;
    let chat = Arc::new(MockChat::new());
    chat.respond("health_decision", healthy_decision()).await;
    chat.respond("response_validation", valid_response_validation()).await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::up(vec![])), chat).await;

    // Ten prior successful samples around 50 ms, and an open suspicious run.
    for i in 0..10 {
        store
            .push_response_history(
                "1",
                &ProbeSample {
                    timestamp: i,
                    response_time_ms: 45 + (i as u64 % 10),
                    success: true,
                },
            )
            .await
            .unwrap();
    }
    store.increment_suspicious("1", 6).await.unwrap();
    store.increment_suspicious("1", 6).await.unwrap();

    pipeline.check_and_decide("1", Some(&endpoint)).await;

    let updates = chain.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, 1);
    assert!(updates[0].2, "healthy verdict reports success");
    assert!(chain.reports().await.is_empty());

    // Healthy verdict resets the suspicious run.
    assert_eq!(store.get_suspicious("1").await.unwrap(), 0);

    // Exactly one event, decision healthy.
    let events = store.get_health_history("1", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].decision, "healthy");
    assert!(events[0].success);

    // Probe appended to the rolling history.
    assert_eq!(store.get_response_history("1").await.unwrap().len(), 11);

    let doc = store.get_agent("1").await.unwrap().unwrap();
    assert_eq!(doc["monitored"], true);
    assert_eq!(doc["lastDecision"], "healthy");
    assert_eq!(doc["totalChecks"], 1);
    assert_eq!(doc["successfulChecks"], 1);
}

#[tokio::test]
async fn six_strikes_slash_then_reset() {
    let endpoint = spawn_http("500 Internal Server Error", "").await;
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(2).await;
    let chat = Arc::new(MockChat::new());
    chat.respond("health_decision", suspicious_decision()).await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::up(vec![])), chat).await;

    for cycle in 1..=5u32 {
        pipeline.check_and_decide("2", Some(&endpoint)).await;
        assert_eq!(
            store.get_suspicious("2").await.unwrap(),
            cycle,
            "counter after cycle {}",
            cycle
        );
        assert!(chain.reports().await.is_empty(), "no slash before strike 6");
    }

    // Cycle six: updateHealth *and* reportSuspicious, then counter reset.
    pipeline.check_and_decide("2", Some(&endpoint)).await;

    let updates = chain.updates().await;
    assert_eq!(updates.len(), 6);
    assert!(updates.iter().all(|(id, _, success)| *id == 2 && !success));

    let reports = chain.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, 2);
    assert_eq!(
        reports[0].1,
        "endpoint returned a server error [error]"
    );

    assert_eq!(store.get_suspicious("2").await.unwrap(), 0);

    // One event per verdict cycle.
    assert_eq!(store.get_health_history("2", 50).await.unwrap().len(), 6);
}

#[tokio::test]
async fn recovery_resets_counter_without_slash() {
    let failing = spawn_http("500 Internal Server Error", "").await;
    let healthy = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(3).await;
    let chat = Arc::new(MockChat::new());
    chat.respond("health_decision", suspicious_decision()).await;
    chat.respond("response_validation", valid_response_validation()).await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::up(vec![])), chat.clone()).await;

    let mut counters = Vec::new();
    for _ in 0..3 {
        pipeline.check_and_decide("3", Some(&failing)).await;
        counters.push(store.get_suspicious("3").await.unwrap());
    }

    // The agent recovers; the adjudicator follows.
    chat.respond("health_decision", healthy_decision()).await;
    pipeline.check_and_decide("3", Some(&healthy)).await;
    counters.push(store.get_suspicious("3").await.unwrap());

    assert_eq!(counters, vec![1, 2, 3, 0]);
    assert!(chain.reports().await.is_empty());
}

#[tokio::test]
async fn critical_verdict_zeroes_response_time_and_leaves_counter() {
    let endpoint = spawn_http("200 OK", r#"{"uptime":"100%"}"#).await;
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(4).await;
    let chat = Arc::new(MockChat::new());
    chat.respond(
        "health_decision",
        json!({
            "decision": "critical",
            "reason": "fabricated uptime",
            "slashPercent": 30,
            "failureType": "spoofed"
        }),
    )
    .await;
    chat.respond("response_validation", valid_response_validation()).await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::up(vec![])), chat).await;
    store.increment_suspicious("4", 6).await.unwrap();
    store.increment_suspicious("4", 6).await.unwrap();

    pipeline.check_and_decide("4", Some(&endpoint)).await;

    let updates = chain.updates().await;
    assert_eq!(updates, vec![(4, 0, false)]);
    assert!(chain.reports().await.is_empty());
    // Critical leaves the debouncer untouched.
    assert_eq!(store.get_suspicious("4").await.unwrap(), 2);
}

#[tokio::test]
async fn llm_outage_applies_safe_default_without_caching() {
    let endpoint = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(5).await;
    let chat = Arc::new(MockChat::new());
    // Validation succeeds, but the adjudicator is down: three transport
    // failures, then the probe-driven safe default.
    chat.respond("response_validation", valid_response_validation()).await;
    chat.forget("health_decision").await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::up(vec![])), chat).await;
    store.increment_suspicious("5", 6).await.unwrap();

    pipeline.check_and_decide("5", Some(&endpoint)).await;

    // Safe default for a successful probe is healthy.
    let updates = chain.updates().await;
    assert_eq!(updates.len(), 1);
    assert!(updates[0].2);
    assert_eq!(store.get_suspicious("5").await.unwrap(), 0);

    let events = store.get_health_history("5", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].decision, "healthy");

    // Safe defaults are never cached: the only cache row for this cycle is
    // the successful validation, which is not keyed by the agent id.
    let touched = store.delete_agent_data("5").await.unwrap();
    assert!(touched.contains(&"agents"));
    assert!(touched.contains(&"health_events"));
    assert!(
        !touched.contains(&"llm_cache"),
        "no decision row may be cached for agent 5"
    );
}

#[tokio::test]
async fn indexer_outage_falls_back_to_chain_scan() {
    let endpoint_a = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let chain = Arc::new(MockChain::new());
    // Monitored agents inside the fallback range, one unmonitored neighbor.
    chain.set_monitored(3).await;
    chain.set_monitored(5).await;
    chain.health.lock().await.insert(
        11,
        ChainHealth {
            is_monitored: false,
            ..ChainHealth::default()
        },
    );
    // The fallback learns endpoints from chain health data.
    for id in [3u64, 5] {
        chain.health.lock().await.get_mut(&id).unwrap().endpoint = endpoint_a.clone();
    }

    let chat = Arc::new(MockChat::new());
    chat.respond("health_decision", healthy_decision()).await;
    chat.respond("response_validation", valid_response_validation()).await;

    let (pipeline, store) = build(chain.clone(), Arc::new(MockIndexer::down()), chat).await;

    pipeline.run_cycle().await;

    let mut checked: Vec<u64> = chain.updates().await.iter().map(|(id, _, _)| *id).collect();
    checked.sort_unstable();
    assert_eq!(checked, vec![3, 5], "exactly the monitored ids in 0..20");

    assert!(store.get_agent("3").await.unwrap().is_some());
    assert!(store.get_agent("5").await.unwrap().is_some());
    assert!(store.get_agent("11").await.unwrap().is_none());
}

#[tokio::test]
async fn unregistration_cascades_and_report_reads_null() {
    let chain = Arc::new(MockChain::new());
    let chat = Arc::new(MockChat::new());
    let (pipeline, store) = build(chain, Arc::new(MockIndexer::up(vec![])), chat).await;

    store
        .upsert_agent("7", &json!({ "name": "departing", "monitored": true }))
        .await
        .unwrap();
    store
        .set_cached("narrative:7", &json!({"summary": "x"}), Duration::from_secs(300))
        .await
        .unwrap();

    let touched = pipeline.notify_unregistered("7").await;
    assert!(touched.contains(&"agents"));
    assert!(store.get_agent("7").await.unwrap().is_none());
    assert!(store.get_cached("narrative:7").await.unwrap().is_none());

    // The read surface now reports nothing for this agent.
    assert!(pipeline.trust_report("7").await.is_none());
}

#[tokio::test]
async fn registration_seeds_the_agent_row() {
    let chain = Arc::new(MockChain::new());
    chain.set_monitored(9).await;
    let chat = Arc::new(MockChat::new());
    let (pipeline, store) = build(chain, Arc::new(MockIndexer::up(vec![])), chat).await;

    pipeline
        .notify_registered("9", Some("https://nine.example/health"), 1_000_000)
        .await;

    let doc = store.get_agent("9").await.unwrap().unwrap();
    assert_eq!(doc["monitored"], true);
    assert_eq!(doc["endpoint"], "https://nine.example/health");
    assert_eq!(doc["stakedAmount"], "1000000");
    assert!(doc["ownerAddress"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn onboarding_probe_feeds_the_screening() {
    let endpoint = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let chain = Arc::new(MockChain::new());
    let chat = Arc::new(MockChat::new());
    chat.respond(
        "onboarding_validation",
        json!({
            "isValid": true,
            "issues": [],
            "suggestions": ["declare a capabilities list"],
            "generatedDescription": null,
            "duplicateRisk": "low",
            "readinessScore": 82
        }),
    )
    .await;
    let (pipeline, _store) = build(chain, Arc::new(MockIndexer::up(vec![])), chat).await;

    let validation = pipeline
        .validate_onboarding("newcomer", "freshly deployed", &endpoint, &[])
        .await;

    assert!(validation.is_valid);
    assert_eq!(validation.readiness_score, 82);
    assert_eq!(validation.suggestions.len(), 1);
}

#[tokio::test]
async fn trust_report_composes_record_and_narrative() {
    let chain = Arc::new(MockChain::new());
    let chat = Arc::new(MockChat::new());
    chat.respond(
        "trust_narrative",
        json!({
            "summary": "consistently responsive",
            "strengths": ["fast", "stable"],
            "concerns": [],
            "recommendation": "trust",
            "riskLevel": "low"
        }),
    )
    .await;
    let (pipeline, store) = build(chain, Arc::new(MockIndexer::up(vec![])), chat).await;

    store
        .upsert_agent("6", &json!({ "name": "steady", "lastDecision": "healthy" }))
        .await
        .unwrap();

    let report = pipeline.trust_report("6").await.expect("known agent");
    assert_eq!(report["agentId"], "6");
    assert_eq!(report["agent"]["name"], "steady");
    assert_eq!(report["narrative"]["recommendation"], "trust");
    assert_eq!(report["narrative"]["riskLevel"], "low");
}
