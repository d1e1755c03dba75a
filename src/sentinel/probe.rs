//! Health-endpoint probe client.
//!
//! One monitoring cycle issues exactly one GET per agent through
//! [`ProbeClient::probe`]. The call is deliberately infallible: transport
//! errors, timeouts, and non-2xx statuses all collapse into a failed
//! [`ProbeResult`] so a misbehaving agent can never abort the cycle.

use std::time::{Duration, Instant};

use lazy_static::lazy_static;

/// Hard per-probe timeout. An endpoint slower than this is a failed probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    /// Shared HTTP client with persistent connection pooling.
    ///
    /// One client instance keeps TLS sessions and DNS lookups warm across
    /// cycles; per-request timeouts are applied at the call sites.
    pub(crate) static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build shared HTTP client")
    };
}

/// Outcome of a single probe.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// True iff the endpoint answered with a status in [200, 300).
    pub success: bool,
    /// Elapsed wall time in milliseconds, reported for failures too.
    pub response_time_ms: u64,
    /// Response body on success; `None` on any failure.
    pub body: Option<String>,
}

/// Issues health probes against agent endpoints.
#[derive(Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
}

impl ProbeClient {
    pub fn new() -> Self {
        ProbeClient {
            client: SHARED_HTTP_CLIENT.clone(),
        }
    }

    /// Perform one GET against `endpoint` with the hard 10 s timeout.
    ///
    /// Never returns an error: any transport failure, timeout, or non-2xx
    /// status yields `success = false` with the elapsed wall time filled in.
    pub async fn probe(&self, endpoint: &str) -> ProbeResult {
        let start = Instant::now();
        let response = self
            .client
            .get(endpoint)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let success = (200..300).contains(&status);
                if success {
                    // Body read shares the probe deadline budget; a stalled
                    // body counts as a failed probe.
                    match resp.text().await {
                        Ok(body) => ProbeResult {
                            success: true,
                            response_time_ms: elapsed_ms(start),
                            body: Some(body),
                        },
                        Err(err) => {
                            log::warn!("probe {}: body read failed: {}", endpoint, err);
                            ProbeResult {
                                success: false,
                                response_time_ms: elapsed_ms(start),
                                body: None,
                            }
                        }
                    }
                } else {
                    log::debug!("probe {}: HTTP {}", endpoint, status);
                    ProbeResult {
                        success: false,
                        response_time_ms: elapsed_ms(start),
                        body: None,
                    }
                }
            }
            Err(err) => {
                log::debug!("probe {}: {}", endpoint, err);
                ProbeResult {
                    success: false,
                    response_time_ms: elapsed_ms(start),
                    body: None,
                }
            }
        }
    }
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
