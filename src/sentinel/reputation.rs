//! Aggregated peer-feedback reputation for an agent.
//!
//! Indexer first, chain view call on any indexer failure. The registry
//! stores the mean fixed-point scaled (1e18); this module divides it back
//! into natural units on egress. A missing entity is a zero reputation, not
//! an error.

use std::sync::Arc;

use crate::sentinel::chain::Chain;
use crate::sentinel::indexer::Indexer;

/// Fixed-point scale applied to the mean at the source.
const MEAN_SCALE: f64 = 1e18;

/// Reputation in natural units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reputation {
    pub mean: f64,
    pub count: u64,
}

/// Fetch the aggregated reputation for `agent_id`.
pub async fn reputation(
    indexer: &Arc<dyn Indexer>,
    chain: &Arc<dyn Chain>,
    agent_id: &str,
) -> Reputation {
    match indexer.reputation_summary(agent_id).await {
        Ok(Some(summary)) => Reputation {
            mean: summary.mean as f64 / MEAN_SCALE,
            count: summary.count,
        },
        Ok(None) => Reputation::default(),
        Err(err) => {
            log::debug!("indexer reputation for {} failed, using chain: {}", agent_id, err);
            chain_reputation(chain, agent_id).await
        }
    }
}

async fn chain_reputation(chain: &Arc<dyn Chain>, agent_id: &str) -> Reputation {
    let numeric_id = match agent_id.parse::<u64>() {
        Ok(id) => id,
        Err(err) => {
            log::warn!("reputation: non-numeric agent id {}: {}", agent_id, err);
            return Reputation::default();
        }
    };
    match chain.reputation_summary(numeric_id).await {
        Ok(raw) => Reputation {
            mean: raw.mean as f64 / MEAN_SCALE,
            count: raw.count,
        },
        Err(err) => {
            log::warn!("chain reputation for {} failed: {}", agent_id, err);
            Reputation::default()
        }
    }
}
