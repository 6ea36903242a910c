//! The append engine: links a candidate onto the tail of the chain.
//!
//! Per append, inside the store's tail lock:
//!
//!   read tail hash → truncate timestamp → content hash → sign link → insert
//!
//! The tail hash is re-read under the lock on every call. The engine keeps
//! no "last hash" of its own, so any number of engines (threads, processes)
//! may share one store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use chronicle_contracts::{
    error::ChronicleResult,
    record::{ActivityCandidate, ActivityRecord, PendingRecord, GENESIS_HASH},
};

use crate::{
    hash::{content_hash, link_message, truncate_to_seconds, CanonicalPayload},
    traits::{ActivityStore, LinkSigner},
};

/// Serializes candidates into signed chain links and persists them.
#[derive(Clone)]
pub struct AppendEngine {
    store: Arc<dyn ActivityStore>,
    signer: Arc<dyn LinkSigner>,
}

impl AppendEngine {
    pub fn new(store: Arc<dyn ActivityStore>, signer: Arc<dyn LinkSigner>) -> Self {
        Self { store, signer }
    }

    pub fn store(&self) -> &Arc<dyn ActivityStore> {
        &self.store
    }

    pub fn signer(&self) -> &Arc<dyn LinkSigner> {
        &self.signer
    }

    /// Append `candidate` as the new tail.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the transaction aborts. Nothing is
    /// committed in that case and the chain tail is unchanged.
    pub fn append(&self, candidate: &ActivityCandidate) -> ChronicleResult<ActivityRecord> {
        let signer = self.signer.as_ref();
        let mut build = |tail: Option<&str>| link_candidate(candidate, tail, signer);

        match self.store.append_under_lock(&mut build) {
            Ok(record) => {
                let short_hash = record.content_hash.get(..12).unwrap_or(&record.content_hash);
                debug!(
                    sequence = record.sequence_number,
                    action = %record.action,
                    content_hash = %short_hash,
                    "activity appended"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(action = %candidate.action, error = %e, "activity append failed");
                Err(e)
            }
        }
    }
}

/// Build the pending record that follows `tail`.
fn link_candidate(
    candidate: &ActivityCandidate,
    tail: Option<&str>,
    signer: &dyn LinkSigner,
) -> ChronicleResult<PendingRecord> {
    let previous_hash = tail.unwrap_or(GENESIS_HASH).to_string();
    let created_at = truncate_to_seconds(Utc::now());

    let content_hash = content_hash(&CanonicalPayload::for_candidate(
        candidate,
        created_at,
        &previous_hash,
    ))?;
    let signature = signer.sign(&link_message(&content_hash, &previous_hash));

    Ok(PendingRecord {
        user_id: candidate.user_id.clone(),
        action: candidate.action.clone(),
        resource: candidate.resource.clone(),
        resource_id: candidate.resource_id.clone(),
        details: candidate.details.clone(),
        session_info: candidate.session_info.clone(),
        created_at,
        content_hash,
        previous_hash,
        signature,
    })
}
