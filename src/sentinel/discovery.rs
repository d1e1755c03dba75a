//! Discovery of the agents to monitor this cycle.
//!
//! The indexer is the primary source; when it fails in any way the
//! discovery falls back to scanning a fixed id range directly on-chain.
//! Discovery never caches — it runs exactly once per cycle.

use std::sync::Arc;

use crate::sentinel::chain::Chain;
use crate::sentinel::indexer::Indexer;

/// Exclusive upper bound of the on-chain fallback scan.
///
/// The fallback deliberately sees at most token ids 0..=19; agents with
/// higher ids are only discoverable through the indexer. Widening this
/// range is a behavior change, not a bug fix.
pub const FALLBACK_SCAN_LIMIT: u64 = 20;

/// One discovered agent: its id and, when the source knows it, the declared
/// health endpoint.
#[derive(Debug, Clone)]
pub struct DiscoveredAgent {
    pub agent_id: String,
    pub endpoint: Option<String>,
}

/// Produce the current set of monitored agents.
///
/// Indexer path: active agents, capped at 100 by the query itself.
/// Fallback path: scan ids `0..FALLBACK_SCAN_LIMIT` on-chain and keep those
/// whose `isMonitored` flag is set.
pub async fn list_monitored(
    indexer: &Arc<dyn Indexer>,
    chain: &Arc<dyn Chain>,
) -> Vec<DiscoveredAgent> {
    match indexer.monitored_agents().await {
        Ok(agents) => agents
            .into_iter()
            .map(|a| DiscoveredAgent {
                agent_id: a.agent_id,
                endpoint: a.endpoint,
            })
            .collect(),
        Err(err) => {
            log::warn!("indexer discovery failed, scanning chain: {}", err);
            scan_chain(chain).await
        }
    }
}

async fn scan_chain(chain: &Arc<dyn Chain>) -> Vec<DiscoveredAgent> {
    let mut discovered = Vec::new();
    for agent_id in 0..FALLBACK_SCAN_LIMIT {
        match chain.health_data(agent_id).await {
            Ok(health) if health.is_monitored => {
                let endpoint = if health.endpoint.is_empty() {
                    None
                } else {
                    Some(health.endpoint)
                };
                discovered.push(DiscoveredAgent {
                    agent_id: agent_id.to_string(),
                    endpoint,
                });
            }
            Ok(_) => {}
            Err(err) => {
                // Unminted ids revert; that is the expected end of the range.
                log::debug!("fallback scan skipping id {}: {}", agent_id, err);
            }
        }
    }
    discovered
}
