//! Agent metadata ("card") resolution from content-addressed storage.
//!
//! The card URI comes from `IdentityRegistry.tokenURI`. `ipfs://` URIs are
//! fetched through a fixed-order gateway cascade: the configured gateway
//! first, then the public fallbacks. The first 2xx JSON body wins. The
//! resolver is best-effort by contract: every failure path returns `None`,
//! never an error, and no gateway may hold the pipeline longer than 10 s.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::sentinel::chain::Chain;
use crate::sentinel::probe::SHARED_HTTP_CLIENT;

/// Per-gateway fetch timeout.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Public gateways tried after the configured one, in order.
const PUBLIC_GATEWAYS: [&str; 3] = [
    "https://ipfs.io",
    "https://cloudflare-ipfs.com",
    "https://dweb.link",
];

/// Resolves agent cards via the gateway cascade.
pub struct MetadataResolver {
    gateways: Vec<String>,
    client: reqwest::Client,
}

impl MetadataResolver {
    /// `primary_gateway` is tried first; the well-known public gateways
    /// follow. Duplicates of the primary are skipped.
    pub fn new(primary_gateway: &str) -> Self {
        let primary = primary_gateway.trim_end_matches('/').to_string();
        let mut gateways = vec![primary.clone()];
        for public in PUBLIC_GATEWAYS {
            if public != primary {
                gateways.push(public.to_string());
            }
        }
        MetadataResolver {
            gateways,
            client: SHARED_HTTP_CLIENT.clone(),
        }
    }

    /// Build a resolver with an explicit gateway list (no public fallbacks
    /// appended). Used when the cascade itself is under the caller's
    /// control, e.g. in tests or air-gapped deployments.
    pub fn with_gateways(gateways: Vec<String>) -> Self {
        MetadataResolver {
            gateways: gateways
                .into_iter()
                .map(|g| g.trim_end_matches('/').to_string())
                .collect(),
            client: SHARED_HTTP_CLIENT.clone(),
        }
    }

    /// Fetch and decode the metadata card for `agent_id`, or `None` when the
    /// URI is unset, every gateway fails, or the payload is not JSON.
    pub async fn resolve_card(&self, chain: &Arc<dyn Chain>, agent_id: u64) -> Option<Value> {
        let uri = match chain.token_uri(agent_id).await {
            Ok(uri) => uri,
            Err(err) => {
                log::warn!("tokenURI({}) failed: {}", agent_id, err);
                return None;
            }
        };
        if uri.trim().is_empty() {
            return None;
        }
        self.fetch_uri(&uri).await
    }

    /// Resolve a raw card URI. Direct `http(s)` URIs are fetched as-is;
    /// `ipfs://` URIs (and bare hashes) go through the cascade.
    pub async fn fetch_uri(&self, uri: &str) -> Option<Value> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return self.fetch_json(uri).await;
        }

        let hash = uri.strip_prefix("ipfs://").unwrap_or(uri);
        let hash = hash.trim_start_matches('/');
        for gateway in &self.gateways {
            let url = format!("{}/ipfs/{}", gateway, hash);
            if let Some(card) = self.fetch_json(&url).await {
                return Some(card);
            }
        }
        log::warn!("card {} unresolvable: all gateways exhausted", uri);
        None
    }

    async fn fetch_json(&self, url: &str) -> Option<Value> {
        let resp = match self
            .client
            .get(url)
            .timeout(GATEWAY_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                log::debug!("gateway {}: {}", url, err);
                return None;
            }
        };
        if !resp.status().is_success() {
            log::debug!("gateway {}: HTTP {}", url, resp.status());
            return None;
        }
        match resp.json::<Value>().await {
            Ok(card) => Some(card),
            Err(err) => {
                log::debug!("gateway {}: invalid JSON: {}", url, err);
                None
            }
        }
    }
}

/// Pick the declared health endpoint out of a card's `services` array.
///
/// Services named `status`, `health`, or `ping` qualify, first match wins.
pub fn health_endpoint_from_card(card: &Value) -> Option<String> {
    const HEALTH_SERVICE_NAMES: [&str; 3] = ["status", "health", "ping"];
    card.get("services")?
        .as_array()?
        .iter()
        .find_map(|service| {
            let name = service.get("name")?.as_str()?;
            if HEALTH_SERVICE_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
                service
                    .get("endpoint")
                    .and_then(|e| e.as_str())
                    .map(|e| e.to_string())
            } else {
                None
            }
        })
}
