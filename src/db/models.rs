//! Database model types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored endpoint with a stable, config-derived identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// 16 hex chars, fingerprint of (address, description, hide_address, dns_server).
    pub id: String,
    pub address: String,
    pub description: String,
    /// When set, the literal address is blanked in every external representation.
    pub hide_address: bool,
    /// Custom DNS server for hostname resolution, "" = system default.
    pub dns_server: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The live working set of targets, keyed by id. Replaced wholesale on
/// reconciliation; individual entries are carried over by value.
pub type TargetSet = HashMap<String, Target>;

/// One probe outcome. Write-once.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub target_id: String,
    /// Mean latency in milliseconds over successful samples; 0 when `success` is false.
    pub latency_ms: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// A measurement joined with its target's metadata, as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRow {
    pub target_id: String,
    pub addr: String,
    pub description: String,
    pub hide_addr: bool,
    pub latency: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl MeasurementRow {
    /// Blank the address when the target asked for it to be hidden.
    pub fn sanitized(mut self) -> Self {
        if self.hide_addr {
            self.addr = String::new();
        }
        self
    }
}

/// Externally exposed view of a target. The only shape in which target data
/// leaves the process, so the hide_address contract lives in one place.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    pub id: String,
    pub addr: String,
    pub description: String,
    pub hide_addr: bool,
}

impl From<&Target> for TargetView {
    fn from(t: &Target) -> Self {
        Self {
            id: t.id.clone(),
            addr: if t.hide_address {
                String::new()
            } else {
                t.address.clone()
            },
            description: t.description.clone(),
            hide_addr: t.hide_address,
        }
    }
}
