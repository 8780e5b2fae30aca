//! Probe module: resolves a target's address and reduces several external
//! ping attempts into one averaged latency measurement.

mod ping;
mod resolve;

pub use resolve::resolve;

use thiserror::Error;

use crate::db::Target;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("resolution failed: {0}")]
    Resolution(String),
    #[error("command failed: {0}")]
    Command(String),
}

/// Runs probes with a fixed attempt count taken from the current config.
/// Rebuilt by the scheduler whenever the config is reloaded.
pub struct Prober {
    ping_count: u32,
}

impl Prober {
    pub fn new(ping_count: u32) -> Self {
        Self {
            ping_count: ping_count.clamp(1, 10),
        }
    }

    /// Probe one target.
    ///
    /// Resolves the address, then runs the configured number of sequential
    /// attempts against the resolved literal. Attempts run one after another
    /// rather than in parallel to avoid flooding a single host. Returns
    /// `(mean latency ms, true)` over successful samples, or `(0.0, false)`
    /// when resolution failed or no attempt succeeded.
    pub async fn probe(&self, target: &Target) -> (f64, bool) {
        let addr = match resolve(&target.address, &target.dns_server).await {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!("DNS resolution failed for {}: {}", target.address, e);
                return (0.0, false);
            }
        };

        let mut samples = Vec::with_capacity(self.ping_count as usize);
        for _ in 0..self.ping_count {
            match ping::ping_once(&addr).await {
                Ok(ms) => samples.push(ms),
                Err(e) => tracing::debug!("ping attempt failed for {}: {}", addr, e),
            }
        }

        summarize(&samples)
    }
}

/// Reduce the successful samples of one probe to a single result.
fn summarize(samples: &[f64]) -> (f64, bool) {
    if samples.is_empty() {
        return (0.0, false);
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    (mean, true)
}
