//! LLM-backed diagnostics: response validation, health adjudication, trust
//! narratives, and onboarding screening.
//!
//! All four operations share one generic structured-call path
//! ([`LlmDiagnostic::call_structured`]): cache lookup, up to three attempts
//! with linear back-off, strict output parsing, cache write on success, and
//! a deterministic safe default when every attempt fails. Safe defaults are
//! never cached — the next cycle should try the real service again.

pub mod chat;
pub mod schemas;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::sentinel::chain::ChainHealth;
use crate::sentinel::probe::ProbeResult;
use crate::sentinel::reputation::Reputation;
use crate::sentinel::store::Store;
use crate::sentinel::trends::TrendStats;

pub use chat::{ChatClient, LlmError, OpenAiCompatClient};
pub use schemas::Operation;

/// Attempts per operation before the safe default applies.
const MAX_ATTEMPTS: u32 = 3;

/// Linear back-off step between attempts (2 s, then 4 s).
const BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Final verdict on an agent's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Suspicious,
    Critical,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Healthy => "healthy",
            Verdict::Suspicious => "suspicious",
            Verdict::Critical => "critical",
        }
    }
}

/// Classified failure mode accompanying a non-healthy verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureType {
    None,
    Timeout,
    Error,
    Spoofed,
    Degraded,
    Unknown,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::None => "none",
            FailureType::Timeout => "timeout",
            FailureType::Error => "error",
            FailureType::Spoofed => "spoofed",
            FailureType::Degraded => "degraded",
            FailureType::Unknown => "unknown",
        }
    }
}

/// Output of `validateResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseValidation {
    pub is_valid: bool,
    pub schema_compliant: bool,
    pub is_spoofed: bool,
    pub issues: Vec<String>,
    pub confidence: u8,
}

/// Output of `makeHealthDecision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDecision {
    pub decision: Verdict,
    pub reason: String,
    pub slash_percent: Option<u8>,
    pub failure_type: Option<FailureType>,
    pub anomaly_detected: Option<bool>,
    pub anomaly_details: Option<String>,
}

/// Output of `generateTrustNarrative`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustNarrative {
    pub summary: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Trust,
    Verify,
    Caution,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Output of `validateOnboarding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub generated_description: Option<String>,
    pub duplicate_risk: DuplicateRisk,
    pub readiness_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateRisk {
    None,
    Low,
    Medium,
    High,
}

/// Everything the health adjudication sees for one agent in one cycle.
pub struct HealthContext<'a> {
    pub agent_id: &'a str,
    pub endpoint: &'a str,
    pub probe: &'a ProbeResult,
    pub chain_health: &'a ChainHealth,
    pub trends: &'a TrendStats,
    pub anomalous: bool,
    pub validation: Option<&'a ResponseValidation>,
    pub card: Option<&'a Value>,
}

/// Candidate registration screened by `validateOnboarding`.
pub struct OnboardingRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub endpoint: &'a str,
    pub reachability: &'a ProbeResult,
    pub capabilities: &'a [String],
}

// Cache keys are operation-specific. The health key deliberately includes
// the exact response time, so two probes of slightly different latency miss
// each other; that hit-rate cost is accepted behavior.

pub fn response_cache_key(endpoint: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("response:{}:{}", endpoint, &hex[..16])
}

pub fn health_cache_key(agent_id: &str, success: bool, response_time_ms: u64) -> String {
    format!("health:{}:{}:{}", agent_id, success, response_time_ms)
}

pub fn narrative_cache_key(agent_id: &str) -> String {
    format!("narrative:{}", agent_id)
}

pub fn onboard_cache_key(name: &str, endpoint: &str) -> String {
    format!("onboard:{}:{}", name, endpoint)
}

/// The diagnostic component: four operations over one structured-call core.
pub struct LlmDiagnostic {
    chat: Arc<dyn ChatClient>,
    store: Arc<Store>,
    cache_ttl: Duration,
}

impl LlmDiagnostic {
    pub fn new(chat: Arc<dyn ChatClient>, store: Arc<Store>, cache_ttl: Duration) -> Self {
        LlmDiagnostic {
            chat,
            store,
            cache_ttl,
        }
    }

    /// Generic structured call: cache → retried completion → cache write.
    ///
    /// Returns `None` when every attempt failed (transport or parse); the
    /// caller substitutes the operation's safe default.
    async fn call_structured<T>(&self, op: Operation, cache_key: &str, user_context: &str) -> Option<T>
    where
        T: DeserializeOwned + Serialize,
    {
        match self.store.get_cached(cache_key).await {
            Ok(Some(cached)) => {
                if let Ok(value) = serde_json::from_value::<T>(cached) {
                    log::debug!("llm cache hit for {}", cache_key);
                    return Some(value);
                }
                // A cached row that no longer parses is treated as a miss.
            }
            Ok(None) => {}
            Err(err) => log::warn!("llm cache read for {} failed: {}", cache_key, err),
        }

        let spec = op.spec();
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(BACKOFF_STEP * attempt).await;
            }
            match self
                .chat
                .complete(spec.system_prompt, user_context, spec.name, &spec.schema)
                .await
            {
                Ok(content) => match serde_json::from_str::<T>(&content) {
                    Ok(value) => {
                        if let Ok(raw) = serde_json::to_value(&value) {
                            if let Err(err) =
                                self.store.set_cached(cache_key, &raw, self.cache_ttl).await
                            {
                                log::warn!("llm cache write for {} failed: {}", cache_key, err);
                            }
                        }
                        return Some(value);
                    }
                    Err(err) => {
                        log::warn!(
                            "{} attempt {}/{}: output violates schema: {}",
                            spec.name,
                            attempt + 1,
                            MAX_ATTEMPTS,
                            err
                        );
                    }
                },
                Err(err) => {
                    log::warn!(
                        "{} attempt {}/{}: {}",
                        spec.name,
                        attempt + 1,
                        MAX_ATTEMPTS,
                        err
                    );
                }
            }
        }
        None
    }

    /// Validate a probe response body against the agent's declared card.
    pub async fn validate_response(
        &self,
        endpoint: &str,
        body: &str,
        card: Option<&Value>,
    ) -> ResponseValidation {
        let cache_key = response_cache_key(endpoint, body);
        let context = serde_json::to_string_pretty(&json!({
            "endpoint": endpoint,
            "responseBody": body,
            "metadataCard": card,
        }))
        .unwrap_or_default();

        self.call_structured(Operation::ValidateResponse, &cache_key, &context)
            .await
            .unwrap_or_else(|| {
                log::warn!("validateResponse exhausted; using permissive default");
                ResponseValidation {
                    is_valid: true,
                    schema_compliant: true,
                    is_spoofed: false,
                    issues: vec![],
                    confidence: 50,
                }
            })
    }

    /// Adjudicate the agent's health for this cycle.
    pub async fn make_health_decision(&self, ctx: &HealthContext<'_>) -> HealthDecision {
        let cache_key =
            health_cache_key(ctx.agent_id, ctx.probe.success, ctx.probe.response_time_ms);
        let context = serde_json::to_string_pretty(&json!({
            "agentId": ctx.agent_id,
            "endpoint": ctx.endpoint,
            "probe": {
                "success": ctx.probe.success,
                "responseTimeMs": ctx.probe.response_time_ms,
                "body": ctx.probe.body,
            },
            "onChainHealth": {
                "healthScore": ctx.chain_health.health_score,
                "totalChecks": ctx.chain_health.total_checks,
                "successfulChecks": ctx.chain_health.successful_checks,
                "consecutiveFailures": ctx.chain_health.consecutive_failures,
            },
            "trends": ctx.trends,
            "anomalousLatency": ctx.anomalous,
            "validation": ctx.validation,
            "metadataCard": ctx.card,
        }))
        .unwrap_or_default();

        self.call_structured(Operation::HealthDecision, &cache_key, &context)
            .await
            .unwrap_or_else(|| safe_health_decision(ctx.probe))
    }

    /// Produce the trust narrative served by the read API.
    pub async fn generate_trust_narrative(
        &self,
        agent_id: &str,
        agent_record: Option<&Value>,
        reputation: &Reputation,
        last_decision: Option<&str>,
    ) -> TrustNarrative {
        let cache_key = narrative_cache_key(agent_id);
        let context = serde_json::to_string_pretty(&json!({
            "agentId": agent_id,
            "healthRecord": agent_record,
            "reputation": { "mean": reputation.mean, "count": reputation.count },
            "lastDecision": last_decision,
        }))
        .unwrap_or_default();

        self.call_structured(Operation::TrustNarrative, &cache_key, &context)
            .await
            .unwrap_or_else(|| TrustNarrative {
                summary: "unavailable".to_string(),
                strengths: vec![],
                concerns: vec!["analysis unavailable".to_string()],
                recommendation: Recommendation::Verify,
                risk_level: RiskLevel::Medium,
            })
    }

    /// Screen a candidate registration.
    pub async fn validate_onboarding(&self, req: &OnboardingRequest<'_>) -> OnboardingValidation {
        let cache_key = onboard_cache_key(req.name, req.endpoint);
        let context = serde_json::to_string_pretty(&json!({
            "name": req.name,
            "description": req.description,
            "endpoint": req.endpoint,
            "reachability": {
                "success": req.reachability.success,
                "responseTimeMs": req.reachability.response_time_ms,
                "body": req.reachability.body,
            },
            "capabilities": req.capabilities,
        }))
        .unwrap_or_default();

        self.call_structured(Operation::ValidateOnboarding, &cache_key, &context)
            .await
            .unwrap_or_else(|| OnboardingValidation {
                is_valid: true,
                issues: vec![],
                suggestions: vec![],
                generated_description: None,
                duplicate_risk: DuplicateRisk::None,
                readiness_score: 50,
            })
    }
}

/// Deterministic fallback when the adjudicator is unreachable: trust the
/// probe alone. A successful probe stays healthy; a failed one is only
/// suspicious — a transport outage on our side must never look critical.
pub fn safe_health_decision(probe: &ProbeResult) -> HealthDecision {
    if probe.success {
        HealthDecision {
            decision: Verdict::Healthy,
            reason: format!(
                "endpoint responded in {} ms; diagnostic service unavailable",
                probe.response_time_ms
            ),
            slash_percent: None,
            failure_type: Some(FailureType::None),
            anomaly_detected: Some(false),
            anomaly_details: None,
        }
    } else {
        HealthDecision {
            decision: Verdict::Suspicious,
            reason: format!(
                "probe failed after {} ms; diagnostic service unavailable",
                probe.response_time_ms
            ),
            slash_percent: None,
            failure_type: Some(FailureType::Error),
            anomaly_detected: Some(false),
            anomaly_details: None,
        }
    }
}
