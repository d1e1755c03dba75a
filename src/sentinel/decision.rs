//! Verdict execution: maps the adjudicated decision onto chain writes and
//! the suspicious-counter state machine.
//!
//! The 6-strike debouncer is the heart of the punishment policy: one model
//! call can never slash an agent. Six consecutive non-healthy verdicts are
//! required, and any healthy verdict resets the run immediately. The
//! threshold value is shared with [`Store::increment_suspicious`], which
//! performs the increment-and-reset atomically.

use std::sync::Arc;

use crate::sentinel::chain::{Chain, TxOutcome};
use crate::sentinel::llm::{FailureType, HealthDecision, Verdict};
use crate::sentinel::probe::ProbeResult;
use crate::sentinel::store::Store;

/// Consecutive non-healthy verdicts required before `reportSuspicious` is
/// submitted.
pub const SLASH_THRESHOLD: u32 = 6;

/// What one verdict execution actually did.
#[derive(Debug, Default)]
pub struct VerdictOutcome {
    /// The health-update transaction, when it was accepted.
    pub health_tx: Option<TxOutcome>,
    /// The slash transaction, when the debouncer fired and the submission
    /// was accepted.
    pub slash_tx: Option<TxOutcome>,
    /// True when the counter reached the threshold this cycle (independent
    /// of whether the slash transaction itself succeeded).
    pub slashed: bool,
}

/// On-chain reason string: `"<reason> [<failureType>]"` unless the failure
/// type is absent or `none`.
pub fn format_reason(reason: &str, failure_type: Option<FailureType>) -> String {
    match failure_type {
        Some(ft) if ft != FailureType::None => format!("{} [{}]", reason, ft.as_str()),
        _ => reason.to_string(),
    }
}

/// Execute one verdict for one agent.
///
/// Chain failures are logged and swallowed here: a failed submission never
/// aborts the cycle, the next cycle re-derives the verdict from scratch.
/// Counter bookkeeping still happens when the chain is down, so a flapping
/// RPC cannot indefinitely defer a deserved slash.
pub async fn execute_verdict(
    chain: &Arc<dyn Chain>,
    store: &Store,
    agent_id: &str,
    numeric_id: u64,
    decision: &HealthDecision,
    probe: &ProbeResult,
) -> VerdictOutcome {
    let mut outcome = VerdictOutcome::default();

    match decision.decision {
        Verdict::Healthy => {
            outcome.health_tx =
                submit_update(chain, numeric_id, probe.response_time_ms, true).await;
            if let Err(err) = store.reset_suspicious(agent_id).await {
                log::warn!("resetting suspicious counter for {}: {}", agent_id, err);
            }
        }
        Verdict::Suspicious => {
            outcome.health_tx =
                submit_update(chain, numeric_id, probe.response_time_ms, probe.success).await;
            match store.increment_suspicious(agent_id, SLASH_THRESHOLD).await {
                Ok(true) => {
                    outcome.slashed = true;
                    let reason = format_reason(&decision.reason, decision.failure_type);
                    log::info!("agent {} reached strike {}; reporting: {}", agent_id, SLASH_THRESHOLD, reason);
                    match chain.report_suspicious(numeric_id, &reason).await {
                        Ok(tx) => outcome.slash_tx = Some(tx),
                        Err(err) => {
                            log::warn!("reportSuspicious for {} failed: {}", agent_id, err)
                        }
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    log::warn!("incrementing suspicious counter for {}: {}", agent_id, err)
                }
            }
        }
        Verdict::Critical => {
            // Critical verdicts record an outright failure; the counter is
            // left untouched.
            outcome.health_tx = submit_update(chain, numeric_id, 0, false).await;
        }
    }

    outcome
}

async fn submit_update(
    chain: &Arc<dyn Chain>,
    numeric_id: u64,
    response_time_ms: u64,
    success: bool,
) -> Option<TxOutcome> {
    match chain.update_health(numeric_id, response_time_ms, success).await {
        Ok(tx) => {
            log::debug!("updateHealth({}) mined: {}", numeric_id, tx.hash);
            Some(tx)
        }
        Err(err) => {
            log::warn!("updateHealth({}) failed: {}", numeric_id, err);
            None
        }
    }
}
