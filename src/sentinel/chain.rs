//! On-chain gateway: typed reads of the monitoring contracts and the two
//! verdict-write transactions.
//!
//! The [`Chain`] trait is the seam the pipeline is tested against; the
//! production implementation [`EthChain`] talks JSON-RPC through alloy with a
//! local private-key signer. Write submissions retry the transport three
//! times with a linear back-off and then surface the error to the caller,
//! which logs and moves on — a failed write never aborts a cycle, the next
//! cycle re-derives the same verdict from authoritative state.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;

sol! {
    #[sol(rpc)]
    contract HealthMonitor {
        function getHealthData(uint256 agentId) external view returns (
            uint8 healthScore,
            uint256 lastCheckTimestamp,
            uint256 totalChecks,
            uint256 successfulChecks,
            uint256 failedChecks,
            uint256 totalResponseTime,
            uint256 consecutiveFailures,
            bool isMonitored,
            uint256 stakedAmount,
            string endpoint
        );
        function updateHealth(uint256 agentId, uint256 responseTime, bool success) external;
        function reportSuspicious(uint256 agentId, string reason) external;
    }

    #[sol(rpc)]
    contract IdentityRegistry {
        function tokenURI(uint256 tokenId) external view returns (string uri);
        function ownerOf(uint256 tokenId) external view returns (address owner);
    }

    #[sol(rpc)]
    contract ReputationRegistry {
        function getSummary(uint256 agentId) external view returns (
            uint256 count,
            uint256 sum,
            uint256 mean,
            uint8 valueDecimals
        );
    }
}

/// Error type for chain operations.
#[derive(Debug, Clone)]
pub struct ChainError {
    message: String,
}

impl ChainError {
    pub fn new(message: impl Into<String>) -> Self {
        ChainError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain error: {}", self.message)
    }
}

impl Error for ChainError {}

/// Snapshot of `HealthMonitor.getHealthData` for one agent.
#[derive(Debug, Clone, Default)]
pub struct ChainHealth {
    pub health_score: u8,
    pub last_check_timestamp: u64,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub total_response_time: u64,
    pub consecutive_failures: u64,
    pub is_monitored: bool,
    pub staked_amount: u128,
    pub endpoint: String,
}

/// Raw `ReputationRegistry.getSummary` values, still fixed-point scaled.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawReputation {
    pub count: u64,
    pub sum: u128,
    /// Mean score scaled by 10^`value_decimals` at the source.
    pub mean: u128,
    pub value_decimals: u8,
}

/// Hash and status of a mined transaction.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub hash: String,
    pub success: bool,
}

/// Read/write surface of the monitoring contracts.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn health_data(&self, agent_id: u64) -> Result<ChainHealth, ChainError>;
    async fn token_uri(&self, agent_id: u64) -> Result<String, ChainError>;
    async fn owner_of(&self, agent_id: u64) -> Result<String, ChainError>;
    async fn reputation_summary(&self, agent_id: u64) -> Result<RawReputation, ChainError>;
    async fn update_health(
        &self,
        agent_id: u64,
        response_time_ms: u64,
        success: bool,
    ) -> Result<TxOutcome, ChainError>;
    async fn report_suspicious(&self, agent_id: u64, reason: &str)
        -> Result<TxOutcome, ChainError>;
}

/// Number of submission attempts before a write is given up on.
const WRITE_ATTEMPTS: u32 = 3;

/// Linear back-off step between write attempts.
const WRITE_BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Production [`Chain`] implementation over JSON-RPC.
pub struct EthChain {
    provider: DynProvider,
    health_monitor: Address,
    identity_registry: Address,
    reputation_registry: Address,
}

impl EthChain {
    /// Build a signing provider from the RPC URL and hex private key, and
    /// resolve the three contract addresses.
    pub fn connect(
        rpc_url: &str,
        private_key: &str,
        health_monitor: &str,
        identity_registry: &str,
        reputation_registry: &str,
    ) -> Result<Self, ChainError> {
        let url = url::Url::parse(rpc_url)
            .map_err(|e| ChainError::new(format!("invalid RPC_URL: {}", e)))?;
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ChainError::new(format!("invalid PRIVATE_KEY: {}", e)))?;
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();

        Ok(EthChain {
            provider,
            health_monitor: parse_address("HEALTH_MONITOR", health_monitor)?,
            identity_registry: parse_address("IDENTITY_REGISTRY", identity_registry)?,
            reputation_registry: parse_address("REPUTATION_REGISTRY", reputation_registry)?,
        })
    }
}

fn parse_address(label: &str, raw: &str) -> Result<Address, ChainError> {
    raw.parse::<Address>()
        .map_err(|e| ChainError::new(format!("invalid {} address {}: {}", label, raw, e)))
}

fn to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn to_u128(value: U256) -> u128 {
    u128::try_from(value).unwrap_or(u128::MAX)
}

#[async_trait]
impl Chain for EthChain {
    async fn health_data(&self, agent_id: u64) -> Result<ChainHealth, ChainError> {
        let contract = HealthMonitor::new(self.health_monitor, self.provider.clone());
        let data = contract
            .getHealthData(U256::from(agent_id))
            .call()
            .await
            .map_err(|e| ChainError::new(format!("getHealthData({}): {}", agent_id, e)))?;

        Ok(ChainHealth {
            health_score: data.healthScore,
            last_check_timestamp: to_u64(data.lastCheckTimestamp),
            total_checks: to_u64(data.totalChecks),
            successful_checks: to_u64(data.successfulChecks),
            failed_checks: to_u64(data.failedChecks),
            total_response_time: to_u64(data.totalResponseTime),
            consecutive_failures: to_u64(data.consecutiveFailures),
            is_monitored: data.isMonitored,
            staked_amount: to_u128(data.stakedAmount),
            endpoint: data.endpoint,
        })
    }

    async fn token_uri(&self, agent_id: u64) -> Result<String, ChainError> {
        let contract = IdentityRegistry::new(self.identity_registry, self.provider.clone());
        contract
            .tokenURI(U256::from(agent_id))
            .call()
            .await
            .map_err(|e| ChainError::new(format!("tokenURI({}): {}", agent_id, e)))
    }

    async fn owner_of(&self, agent_id: u64) -> Result<String, ChainError> {
        let contract = IdentityRegistry::new(self.identity_registry, self.provider.clone());
        let owner = contract
            .ownerOf(U256::from(agent_id))
            .call()
            .await
            .map_err(|e| ChainError::new(format!("ownerOf({}): {}", agent_id, e)))?;
        Ok(format!("{:#x}", owner))
    }

    async fn reputation_summary(&self, agent_id: u64) -> Result<RawReputation, ChainError> {
        let contract = ReputationRegistry::new(self.reputation_registry, self.provider.clone());
        let summary = contract
            .getSummary(U256::from(agent_id))
            .call()
            .await
            .map_err(|e| ChainError::new(format!("getSummary({}): {}", agent_id, e)))?;

        Ok(RawReputation {
            count: to_u64(summary.count),
            sum: to_u128(summary.sum),
            mean: to_u128(summary.mean),
            value_decimals: summary.valueDecimals,
        })
    }

    async fn update_health(
        &self,
        agent_id: u64,
        response_time_ms: u64,
        success: bool,
    ) -> Result<TxOutcome, ChainError> {
        let contract = HealthMonitor::new(self.health_monitor, self.provider.clone());
        let mut last_err = None;
        for attempt in 0..WRITE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(WRITE_BACKOFF_STEP * attempt).await;
            }
            let submitted = contract
                .updateHealth(
                    U256::from(agent_id),
                    U256::from(response_time_ms),
                    success,
                )
                .send()
                .await;
            match submitted {
                Ok(pending) => {
                    // The receipt wait is unbounded: it resolves when the
                    // transaction mines or the transport itself fails.
                    let receipt = pending.get_receipt().await.map_err(|e| {
                        ChainError::new(format!("updateHealth({}) receipt: {}", agent_id, e))
                    })?;
                    return Ok(TxOutcome {
                        hash: format!("{:#x}", receipt.transaction_hash),
                        success: receipt.status(),
                    });
                }
                Err(e) => {
                    log::warn!(
                        "updateHealth({}) attempt {}/{} failed: {}",
                        agent_id,
                        attempt + 1,
                        WRITE_ATTEMPTS,
                        e
                    );
                    last_err = Some(ChainError::new(format!("updateHealth({}): {}", agent_id, e)));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ChainError::new("updateHealth: no attempt made")))
    }

    async fn report_suspicious(
        &self,
        agent_id: u64,
        reason: &str,
    ) -> Result<TxOutcome, ChainError> {
        let contract = HealthMonitor::new(self.health_monitor, self.provider.clone());
        let mut last_err = None;
        for attempt in 0..WRITE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(WRITE_BACKOFF_STEP * attempt).await;
            }
            let submitted = contract
                .reportSuspicious(U256::from(agent_id), reason.to_string())
                .send()
                .await;
            match submitted {
                Ok(pending) => {
                    let receipt = pending.get_receipt().await.map_err(|e| {
                        ChainError::new(format!("reportSuspicious({}) receipt: {}", agent_id, e))
                    })?;
                    return Ok(TxOutcome {
                        hash: format!("{:#x}", receipt.transaction_hash),
                        success: receipt.status(),
                    });
                }
                Err(e) => {
                    log::warn!(
                        "reportSuspicious({}) attempt {}/{} failed: {}",
                        agent_id,
                        attempt + 1,
                        WRITE_ATTEMPTS,
                        e
                    );
                    last_err = Some(ChainError::new(format!(
                        "reportSuspicious({}): {}",
                        agent_id, e
                    )));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ChainError::new("reportSuspicious: no attempt made")))
    }
}

/// Decode the agent id from the second indexed topic of a
/// `MonitoringEnabled(uint256 indexed agentId, string endpoint, uint256 stakedAmount)`
/// log, as a decimal string.
pub fn agent_id_from_topic(topic: &[u8; 32]) -> String {
    U256::from_be_bytes(*topic).to_string()
}
