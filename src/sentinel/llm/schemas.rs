//! Static prompt and output-schema table for the diagnostic operations.
//!
//! Each operation is a `(system prompt, JSON schema)` pair. The system
//! prompt is stable per operation and is always placed first in the request
//! so the upstream provider can cache the shared prefix; only the user
//! context varies between calls.

use lazy_static::lazy_static;
use serde_json::{json, Value};

/// The four diagnostic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ValidateResponse,
    HealthDecision,
    TrustNarrative,
    ValidateOnboarding,
}

/// Prompt and schema for one operation.
pub struct OperationSpec {
    /// Schema name sent in the `json_schema` wrapper.
    pub name: &'static str,
    /// Stable system prompt, always the first message.
    pub system_prompt: &'static str,
    /// Declared output schema the model must satisfy.
    pub schema: Value,
}

impl Operation {
    pub fn spec(&self) -> &'static OperationSpec {
        match self {
            Operation::ValidateResponse => &SPECS[0],
            Operation::HealthDecision => &SPECS[1],
            Operation::TrustNarrative => &SPECS[2],
            Operation::ValidateOnboarding => &SPECS[3],
        }
    }
}

const VALIDATE_RESPONSE_PROMPT: &str = "You are a response validator for a network of \
autonomous agents. You are given the body an agent's health endpoint returned, together \
with the agent's declared metadata card. Judge whether the response is a genuine, \
well-formed health response for the declared service, whether it complies with the \
card's declared shape, and whether it shows signs of spoofing (static canned output, \
mismatched identity, impossible values). List concrete issues. Report a confidence \
between 0 and 100. Answer only with the requested JSON.";

const HEALTH_DECISION_PROMPT: &str = "You are the health adjudicator of an on-chain \
agent monitoring oracle. You are given one agent's probe outcome, its on-chain health \
statistics, rolling latency trends, an optional response validation, and its metadata \
card. Decide whether the agent is healthy, suspicious, or critical. Reserve critical \
for evidence of deliberate deception (spoofed responses, fabricated uptime); transient \
failures are suspicious at most. Name the failure type and flag latency anomalies when \
the current probe deviates sharply from the trend. Keep the reason to one sentence. \
Answer only with the requested JSON.";

const TRUST_NARRATIVE_PROMPT: &str = "You are writing a short trust assessment of an \
autonomous agent for prospective counterparties. You are given the agent's stored \
health record, its aggregated peer reputation, and its most recent monitoring \
decision. Summarize the agent's reliability, list its strengths and concerns, and \
finish with a recommendation and risk level. Be factual and terse; do not speculate \
beyond the data given. Answer only with the requested JSON.";

const VALIDATE_ONBOARDING_PROMPT: &str = "You are screening a new agent registration \
for an on-chain monitoring network. You are given the submitted name, description, \
endpoint, a reachability probe of that endpoint, and the declared capabilities. \
Judge whether the registration is complete and plausible, list blocking issues and \
non-blocking suggestions, optionally propose a cleaner description, estimate the risk \
that this duplicates an existing well-known service, and score overall readiness from \
0 to 100. Answer only with the requested JSON.";

lazy_static! {
    static ref SPECS: [OperationSpec; 4] = [
        OperationSpec {
            name: "response_validation",
            system_prompt: VALIDATE_RESPONSE_PROMPT,
            schema: json!({
                "type": "object",
                "properties": {
                    "isValid": { "type": "boolean" },
                    "schemaCompliant": { "type": "boolean" },
                    "isSpoofed": { "type": "boolean" },
                    "issues": { "type": "array", "items": { "type": "string" } },
                    "confidence": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["isValid", "schemaCompliant", "isSpoofed", "issues", "confidence"],
                "additionalProperties": false
            }),
        },
        OperationSpec {
            name: "health_decision",
            system_prompt: HEALTH_DECISION_PROMPT,
            schema: json!({
                "type": "object",
                "properties": {
                    "decision": { "type": "string", "enum": ["healthy", "suspicious", "critical"] },
                    "reason": { "type": "string" },
                    "slashPercent": { "type": ["integer", "null"], "minimum": 0, "maximum": 100 },
                    "failureType": {
                        "type": ["string", "null"],
                        "enum": ["none", "timeout", "error", "spoofed", "degraded", "unknown", null]
                    },
                    "anomalyDetected": { "type": ["boolean", "null"] },
                    "anomalyDetails": { "type": ["string", "null"] }
                },
                "required": ["decision", "reason", "failureType"],
                "additionalProperties": false
            }),
        },
        OperationSpec {
            name: "trust_narrative",
            system_prompt: TRUST_NARRATIVE_PROMPT,
            schema: json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "strengths": { "type": "array", "items": { "type": "string" } },
                    "concerns": { "type": "array", "items": { "type": "string" } },
                    "recommendation": { "type": "string", "enum": ["trust", "verify", "caution", "avoid"] },
                    "riskLevel": { "type": "string", "enum": ["low", "medium", "high", "critical"] }
                },
                "required": ["summary", "strengths", "concerns", "recommendation", "riskLevel"],
                "additionalProperties": false
            }),
        },
        OperationSpec {
            name: "onboarding_validation",
            system_prompt: VALIDATE_ONBOARDING_PROMPT,
            schema: json!({
                "type": "object",
                "properties": {
                    "isValid": { "type": "boolean" },
                    "issues": { "type": "array", "items": { "type": "string" } },
                    "suggestions": { "type": "array", "items": { "type": "string" } },
                    "generatedDescription": { "type": ["string", "null"] },
                    "duplicateRisk": { "type": "string", "enum": ["none", "low", "medium", "high"] },
                    "readinessScore": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["isValid", "issues", "suggestions", "duplicateRisk", "readinessScore"],
                "additionalProperties": false
            }),
        },
    ];
}
