//! Target identity and reconciliation.
//!
//! A target's id is a pure function of its configuration tuple, which is
//! what lets history survive restarts and config reloads: the same tuple
//! always maps to the same row in the store.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::config::TargetSpec;
use crate::db::{DbError, Store, Target, TargetSet};

/// Deterministic fingerprint of a target's identity tuple, 16 hex chars.
pub fn target_id(addr: &str, description: &str, hide_addr: bool, dns_server: &str) -> String {
    let data = format!("{}|{}|{}|{}", addr, description, hide_addr, dns_server);
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Merge the configured target list against the current set.
///
/// Known ids are carried forward with `updated_at` refreshed. New ids are
/// persisted synchronously before entering the result; a persistence failure
/// aborts the whole reconcile so no partial set is ever installed. Ids absent
/// from the configured list drop out of the result but stay in the store.
pub fn reconcile(
    store: &Store,
    existing: &TargetSet,
    specs: &[TargetSpec],
) -> Result<TargetSet, DbError> {
    let mut next = TargetSet::with_capacity(specs.len());

    for spec in specs {
        let id = target_id(&spec.addr, &spec.description, spec.hide_addr, &spec.dns_server);

        if let Some(known) = existing.get(&id) {
            let mut target = known.clone();
            target.updated_at = Utc::now();
            next.insert(id, target);
        } else {
            let now = Utc::now();
            let target = Target {
                id: id.clone(),
                address: spec.addr.clone(),
                description: spec.description.clone(),
                hide_address: spec.hide_addr,
                dns_server: spec.dns_server.clone(),
                created_at: now,
                updated_at: now,
            };
            store.save_target(&target)?;
            tracing::info!("added new target: {} ({})", target.description, target.address);
            next.insert(id, target);
        }
    }

    Ok(next)
}
