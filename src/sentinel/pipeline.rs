//! Pipeline orchestrator: one monitoring cycle, and the per-agent
//! probe → validate → diagnose → act state machine.
//!
//! Agents are processed strictly sequentially within a cycle, and every
//! failure is isolated to its agent: a dead endpoint, a down gateway, or a
//! store hiccup is logged and skipped, never propagated past the agent's
//! iteration. Per-agent write ordering is fixed: history push, agent upsert,
//! health event, chain write.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::sentinel::chain::{Chain, ChainHealth};
use crate::sentinel::decision::{self, VerdictOutcome};
use crate::sentinel::discovery;
use crate::sentinel::indexer::Indexer;
use crate::sentinel::llm::{
    FailureType, HealthContext, LlmDiagnostic, OnboardingRequest, OnboardingValidation,
    ResponseValidation,
};
use crate::sentinel::metadata::{health_endpoint_from_card, MetadataResolver};
use crate::sentinel::probe::{ProbeClient, ProbeResult};
use crate::sentinel::reputation::{self, Reputation};
use crate::sentinel::store::{HealthEvent, Store};
use crate::sentinel::trends::{self, ProbeSample};

/// Wires discovery, probing, diagnostics, persistence, and chain writes into
/// the per-cycle state machine.
pub struct Pipeline {
    store: Arc<Store>,
    chain: Arc<dyn Chain>,
    indexer: Arc<dyn Indexer>,
    llm: LlmDiagnostic,
    probe: ProbeClient,
    resolver: MetadataResolver,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        chain: Arc<dyn Chain>,
        indexer: Arc<dyn Indexer>,
        llm: LlmDiagnostic,
        probe: ProbeClient,
        resolver: MetadataResolver,
    ) -> Self {
        Pipeline {
            store,
            chain,
            indexer,
            llm,
            probe,
            resolver,
        }
    }

    /// Read access for the trust API collaborator. The API gets the store's
    /// read operations only; all writes flow through the cycle and the two
    /// notify entry points.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// One full monitoring cycle: discover, then check each agent in turn.
    pub async fn run_cycle(&self) {
        let agents = discovery::list_monitored(&self.indexer, &self.chain).await;
        log::info!("cycle start: {} monitored agents", agents.len());
        for agent in &agents {
            self.check_and_decide(&agent.agent_id, agent.endpoint.as_deref())
                .await;
        }
        log::info!("cycle end");
    }

    /// The per-agent state machine. Never fails: every error path logs and
    /// returns so the remaining agents still run.
    pub async fn check_and_decide(&self, agent_id: &str, endpoint: Option<&str>) {
        let numeric_id = match agent_id.parse::<u64>() {
            Ok(id) => id,
            Err(err) => {
                log::warn!("skipping agent with non-numeric id {:?}: {}", agent_id, err);
                return;
            }
        };

        // 1. Authoritative on-chain health; unmonitored agents are skipped.
        let chain_health = match self.chain.health_data(numeric_id).await {
            Ok(health) => health,
            Err(err) => {
                log::warn!("agent {}: health read failed: {}", agent_id, err);
                return;
            }
        };
        if !chain_health.is_monitored {
            log::debug!("agent {}: not monitored on-chain, skipping", agent_id);
            return;
        }

        // 2. Metadata card and endpoint selection.
        let card = self.resolver.resolve_card(&self.chain, numeric_id).await;
        let endpoint = match endpoint
            .map(|e| e.to_string())
            .or_else(|| card.as_ref().and_then(health_endpoint_from_card))
        {
            Some(endpoint) => endpoint,
            None => {
                log::info!("agent {}: no health endpoint known, skipping", agent_id);
                return;
            }
        };

        // 3. Probe.
        let probe = self.probe.probe(&endpoint).await;

        // 4. Trends over the history as stored *before* this probe.
        let existing = match self.store.get_agent(agent_id).await {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!("agent {}: record read failed: {}", agent_id, err);
                None
            }
        };
        let history = history_from_doc(existing.as_ref());
        let trend_stats = trends::compute_trends(&history);
        let anomalous = trends::is_anomalous(probe.response_time_ms, &trend_stats);

        // 5. Validate the body when there is one to validate.
        let validation: Option<ResponseValidation> = match &probe.body {
            Some(body) if probe.success => Some(
                self.llm
                    .validate_response(&endpoint, body, card.as_ref())
                    .await,
            ),
            _ => None,
        };

        // 6. Peer reputation.
        let rep = reputation::reputation(&self.indexer, &self.chain, agent_id).await;

        // 7. Adjudicate.
        let decision = self
            .llm
            .make_health_decision(&HealthContext {
                agent_id,
                endpoint: &endpoint,
                probe: &probe,
                chain_health: &chain_health,
                trends: &trend_stats,
                anomalous,
                validation: validation.as_ref(),
                card: card.as_ref(),
            })
            .await;
        log::info!(
            "agent {}: {} ({} ms, success={}) — {}",
            agent_id,
            decision.decision.as_str(),
            probe.response_time_ms,
            probe.success,
            decision.reason
        );

        // 8. History push.
        let sample = ProbeSample {
            timestamp: Utc::now().timestamp(),
            response_time_ms: probe.response_time_ms,
            success: probe.success,
        };
        if let Err(err) = self.store.push_response_history(agent_id, &sample).await {
            log::warn!("agent {}: history push failed: {}", agent_id, err);
        }

        // 9. Agent upsert with derived fields.
        let partial = self
            .derived_fields(
                agent_id,
                numeric_id,
                &endpoint,
                &chain_health,
                &probe,
                &rep,
                decision.decision.as_str(),
                &decision.reason,
                card.as_ref(),
                existing.is_none(),
            )
            .await;
        if let Err(err) = self.store.upsert_agent(agent_id, &partial).await {
            log::warn!("agent {}: upsert failed: {}", agent_id, err);
        }

        // 10. Health event.
        let event = HealthEvent {
            agent_id: agent_id.to_string(),
            ts: String::new(),
            decision: decision.decision.as_str().to_string(),
            reason: decision.reason.clone(),
            health_score: chain_health.health_score,
            response_time_ms: probe.response_time_ms,
            success: probe.success,
            failure_type: decision
                .failure_type
                .filter(|ft| *ft != FailureType::None)
                .map(|ft| ft.as_str().to_string()),
            anomaly_detected: decision.anomaly_detected,
        };
        if let Err(err) = self.store.log_health_event(&event).await {
            log::warn!("agent {}: event log failed: {}", agent_id, err);
        }

        // 11. Chain write and counter bookkeeping.
        let _: VerdictOutcome = decision::execute_verdict(
            &self.chain,
            &self.store,
            agent_id,
            numeric_id,
            &decision,
            &probe,
        )
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn derived_fields(
        &self,
        agent_id: &str,
        numeric_id: u64,
        endpoint: &str,
        chain_health: &ChainHealth,
        probe: &ProbeResult,
        rep: &Reputation,
        last_decision: &str,
        last_reason: &str,
        card: Option<&Value>,
        first_observation: bool,
    ) -> Value {
        let new_total = chain_health.total_checks + 1;
        let new_success = chain_health.successful_checks + probe.success as u64;
        let uptime = new_success as f64 * 100.0 / new_total as f64;
        let avg_response = (chain_health.total_response_time + probe.response_time_ms) as f64
            / new_total as f64;
        let consecutive_failures = if probe.success {
            0
        } else {
            chain_health.consecutive_failures + 1
        };

        let mut partial = json!({
            "endpoint": endpoint,
            "healthScore": chain_health.health_score,
            "consecutiveFailures": consecutive_failures,
            "uptimePercent": uptime,
            "avgResponseTimeMs": avg_response,
            "totalChecks": new_total,
            "successfulChecks": new_success,
            "reputationMean": rep.mean,
            "feedbackCount": rep.count,
            "monitored": true,
            "lastChecked": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "lastDecision": last_decision,
            "lastReason": last_reason,
        });

        if let Some(card) = card {
            if let Some(name) = card.get("name").and_then(|v| v.as_str()) {
                partial["name"] = json!(name);
            }
            if let Some(description) = card.get("description").and_then(|v| v.as_str()) {
                partial["description"] = json!(description);
            }
            if let Some(image) = card.get("image").and_then(|v| v.as_str()) {
                partial["imageUrl"] = json!(image);
            }
            partial["metadata"] = card.clone();
        }

        // Owner lookup once, when the row is first created.
        if first_observation {
            match self.chain.owner_of(numeric_id).await {
                Ok(owner) => partial["ownerAddress"] = json!(owner),
                Err(err) => log::debug!("ownerOf({}) failed: {}", agent_id, err),
            }
        }

        partial
    }

    /// Out-of-band signal from the onboarding collaborator: an agent enabled
    /// monitoring. Seeds the agent row immediately instead of waiting for
    /// the next cycle's discovery.
    pub async fn notify_registered(
        &self,
        agent_id: &str,
        endpoint: Option<&str>,
        staked_amount: u128,
    ) {
        let mut partial = json!({
            "monitored": true,
            "stakedAmount": staked_amount.to_string(),
        });
        if let Some(endpoint) = endpoint {
            partial["endpoint"] = json!(endpoint);
        }

        if let Ok(numeric_id) = agent_id.parse::<u64>() {
            if let Ok(owner) = self.chain.owner_of(numeric_id).await {
                partial["ownerAddress"] = json!(owner);
            }
            if let Some(card) = self.resolver.resolve_card(&self.chain, numeric_id).await {
                if let Some(name) = card.get("name").and_then(|v| v.as_str()) {
                    partial["name"] = json!(name);
                }
                if let Some(description) = card.get("description").and_then(|v| v.as_str()) {
                    partial["description"] = json!(description);
                }
                partial["metadata"] = card;
            }
        }

        match self.store.upsert_agent(agent_id, &partial).await {
            Ok(()) => log::info!("agent {} registered for monitoring", agent_id),
            Err(err) => log::warn!("registering agent {}: {}", agent_id, err),
        }
    }

    /// Out-of-band signal that the agent was unregistered: cascade delete of
    /// everything keyed to it.
    pub async fn notify_unregistered(&self, agent_id: &str) -> Vec<&'static str> {
        match self.store.delete_agent_data(agent_id).await {
            Ok(touched) => {
                log::info!("agent {} unregistered; cleaned {:?}", agent_id, touched);
                touched
            }
            Err(err) => {
                log::warn!("unregistering agent {}: {}", agent_id, err);
                vec![]
            }
        }
    }

    /// Compose the trust report served by the read API: the stored record,
    /// reputation, recent events, and the generated narrative. `None` for
    /// unknown agents.
    pub async fn trust_report(&self, agent_id: &str) -> Option<Value> {
        let doc = match self.store.get_agent(agent_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("trust report for {}: record read failed: {}", agent_id, err);
                return None;
            }
        };

        let rep = reputation::reputation(&self.indexer, &self.chain, agent_id).await;
        let last_decision = doc
            .get("lastDecision")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let narrative = self
            .llm
            .generate_trust_narrative(agent_id, Some(&doc), &rep, last_decision.as_deref())
            .await;

        let events = self
            .store
            .get_health_history(agent_id, 20)
            .await
            .unwrap_or_default();
        let chain_updates = match self.indexer.health_updates(agent_id, 50).await {
            Ok(updates) => updates
                .iter()
                .map(|u| {
                    json!({
                        "blockTimestamp": u.block_timestamp,
                        "oldScore": u.old_score,
                        "newScore": u.new_score,
                        "success": u.success,
                        "responseTime": u.response_time,
                    })
                })
                .collect::<Vec<_>>(),
            Err(err) => {
                log::debug!("trust report for {}: indexer updates unavailable: {}", agent_id, err);
                vec![]
            }
        };

        Some(json!({
            "agentId": agent_id,
            "agent": doc,
            "reputation": { "mean": rep.mean, "count": rep.count },
            "narrative": narrative,
            "recentEvents": events,
            "recentChainUpdates": chain_updates,
        }))
    }

    /// Screen a candidate registration for the onboarding collaborator:
    /// reachability probe plus the LLM screening operation.
    pub async fn validate_onboarding(
        &self,
        name: &str,
        description: &str,
        endpoint: &str,
        capabilities: &[String],
    ) -> OnboardingValidation {
        let reachability = self.probe.probe(endpoint).await;
        self.llm
            .validate_onboarding(&OnboardingRequest {
                name,
                description,
                endpoint,
                reachability: &reachability,
                capabilities,
            })
            .await
    }
}

fn history_from_doc(doc: Option<&Value>) -> Vec<ProbeSample> {
    doc.and_then(|d| d.get("responseHistory"))
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
