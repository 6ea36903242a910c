//! Chain verifier for the Chronicle activity log.
//!
//! Every examined record goes through the same three checks, in order:
//!
//! 1. **Content**: recompute `content_hash` from the stored fields.
//! 2. **Linkage**: `previous_hash` must equal the running expected hash.
//! 3. **Signature**: the link must validate under an accepted key.
//!
//! The first failing check ends the run; records after a break are not
//! examined.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chronicle_contracts::{
    error::ChronicleResult,
    record::{ActivityRecord, GENESIS_HASH},
    verification::{
        BreakReason, BrokenAt, VerificationMode, VerificationResult, VerifyOptions,
        DEFAULT_FULL_BATCH_SIZE, DEFAULT_QUICK_LIMIT,
    },
};
use chronicle_core::{
    hash::{link_message, recompute_record_hash},
    traits::{ActivityStore, LinkSigner},
};

/// Walks the stored chain and reports the first point of divergence.
#[derive(Clone)]
pub struct ChainVerifier {
    store: Arc<dyn ActivityStore>,
    signer: Arc<dyn LinkSigner>,
    quick_limit: usize,
    batch_size: usize,
}

impl ChainVerifier {
    /// A verifier with the default quick limit and full-mode batch size.
    pub fn new(store: Arc<dyn ActivityStore>, signer: Arc<dyn LinkSigner>) -> Self {
        Self {
            store,
            signer,
            quick_limit: DEFAULT_QUICK_LIMIT,
            batch_size: DEFAULT_FULL_BATCH_SIZE,
        }
    }

    /// Default window for quick verification when the caller gives no limit.
    pub fn with_quick_limit(mut self, limit: usize) -> Self {
        self.quick_limit = limit.max(1);
        self
    }

    /// Rows fetched per round trip in full mode.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Verify the chain according to `opts`.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the store cannot be read or a record cannot
    /// be re-serialized. A broken chain is `Ok` with `valid == false`.
    pub fn verify(&self, opts: &VerifyOptions) -> ChronicleResult<VerificationResult> {
        match opts.mode {
            VerificationMode::Quick => {
                let limit = opts.limit.unwrap_or(self.quick_limit).max(1);
                self.verify_quick(limit)
            }
            VerificationMode::Full => self.verify_full(),
        }
    }

    fn verify_quick(&self, limit: usize) -> ChronicleResult<VerificationResult> {
        let records = self.store.recent_records(limit)?;
        let total = self.store.total_count()?;

        debug!(limit, total, fetched = records.len(), "quick verification starting");

        let Some(first) = records.first() else {
            return Ok(VerificationResult::passed(VerificationMode::Quick, total, 0));
        };

        // The window starts mid-chain unless its first record is the oldest.
        let baseline = match self.store.record_before(first.sequence_number)? {
            Some(prev) => prev.content_hash,
            None => GENESIS_HASH.to_string(),
        };

        let mut walk = ChainWalk::new(baseline);
        for record in &records {
            if let Some(broken) = walk.check(record, self.signer.as_ref())? {
                return Ok(report_break(VerificationMode::Quick, total, walk.checked, broken));
            }
        }

        info!(checked = walk.checked, total, "quick verification passed");
        Ok(VerificationResult::passed(VerificationMode::Quick, total, walk.checked))
    }

    fn verify_full(&self) -> ChronicleResult<VerificationResult> {
        // Records appended after this point are outside this run.
        let total = self.store.total_count()?;
        debug!(total, batch_size = self.batch_size, "full verification starting");

        let mut walk = ChainWalk::new(GENESIS_HASH.to_string());
        let mut next_from = 0u64;

        while walk.checked < total {
            let remaining = usize::try_from(total - walk.checked).unwrap_or(usize::MAX);
            let batch = self
                .store
                .records_from(next_from, self.batch_size.min(remaining))?;

            let Some(last) = batch.last() else {
                break;
            };
            next_from = last.sequence_number + 1;

            for record in &batch {
                if let Some(broken) = walk.check(record, self.signer.as_ref())? {
                    return Ok(report_break(VerificationMode::Full, total, walk.checked, broken));
                }
            }

            debug!(checked = walk.checked, next_from, "verification batch done");
        }

        info!(checked = walk.checked, total, "full verification passed");
        Ok(VerificationResult::passed(VerificationMode::Full, total, walk.checked))
    }
}

fn report_break(
    mode: VerificationMode,
    total: u64,
    checked: u64,
    broken: BrokenAt,
) -> VerificationResult {
    warn!(
        mode = %mode,
        sequence = broken.sequence_number,
        reason = %broken.reason,
        expected = ?broken.expected,
        actual = ?broken.actual,
        "activity chain verification failed"
    );
    VerificationResult::failed(mode, total, checked, broken)
}

/// Running state of one pass over the chain.
struct ChainWalk {
    /// `content_hash` the next record must name as its `previous_hash`.
    expected_previous: String,
    checked: u64,
}

impl ChainWalk {
    fn new(baseline: String) -> Self {
        Self {
            expected_previous: baseline,
            checked: 0,
        }
    }

    /// Run all three checks on `record`. `Some` means the chain broke here.
    fn check(
        &mut self,
        record: &ActivityRecord,
        signer: &dyn LinkSigner,
    ) -> ChronicleResult<Option<BrokenAt>> {
        // ── Check 1: content ─────────────────────────────────────────────────
        let recomputed = recompute_record_hash(record)?;
        if recomputed != record.content_hash {
            return Ok(Some(broken(
                record,
                BreakReason::ContentModified,
                Some(recomputed),
                Some(record.content_hash.clone()),
            )));
        }

        // ── Check 2: linkage ─────────────────────────────────────────────────
        if record.previous_hash != self.expected_previous {
            return Ok(Some(broken(
                record,
                BreakReason::ChainBreak,
                Some(self.expected_previous.clone()),
                Some(record.previous_hash.clone()),
            )));
        }

        // ── Check 3: signature ───────────────────────────────────────────────
        let message = link_message(&record.content_hash, &record.previous_hash);
        if !signer.verify(&message, &record.signature) {
            return Ok(Some(broken(record, BreakReason::InvalidSignature, None, None)));
        }

        self.expected_previous = record.content_hash.clone();
        self.checked += 1;
        Ok(None)
    }
}

fn broken(
    record: &ActivityRecord,
    reason: BreakReason,
    expected: Option<String>,
    actual: Option<String>,
) -> BrokenAt {
    BrokenAt {
        id: record.id.clone(),
        sequence_number: record.sequence_number,
        reason,
        expected,
        actual,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use chronicle_audit::{HmacSigner, InMemoryActivityStore};
    use chronicle_contracts::{
        details::{ActivityDetails, Scope, Target},
        record::{ActivityCandidate, ActivityRecord, GENESIS_HASH},
        verification::{BreakReason, VerificationMode, VerifyOptions},
    };
    use chronicle_core::{
        hash::{link_message, recompute_record_hash},
        traits::{ActivityStore, LinkSigner},
        AppendEngine,
    };

    use super::ChainVerifier;

    // ── Builder helpers ───────────────────────────────────────────────────────

    const KEY: &[u8] = b"verify-test-key";

    fn signer() -> Arc<HmacSigner> {
        Arc::new(HmacSigner::new(KEY).unwrap())
    }

    fn candidate(i: usize) -> ActivityCandidate {
        ActivityCandidate {
            user_id: Some("admin-1".to_string()),
            action: "notes.create".to_string(),
            resource: "notes".to_string(),
            resource_id: Some(format!("note-{i}")),
            details: ActivityDetails::new(
                Scope::App { app_id: "notes".to_string() },
                Target::new("note", format!("note-{i}")).named(format!("Note {i}")),
            ),
            session_info: None,
        }
    }

    /// A store holding `n` freshly appended records, plus a verifier over it.
    fn seeded(n: usize) -> (InMemoryActivityStore, ChainVerifier) {
        let store = InMemoryActivityStore::new();
        let engine = AppendEngine::new(Arc::new(store.clone()), signer());
        for i in 0..n {
            engine.append(&candidate(i)).unwrap();
        }
        let verifier = ChainVerifier::new(Arc::new(store.clone()), signer());
        (store, verifier)
    }

    // ── Passing chains ────────────────────────────────────────────────────────

    #[test]
    fn test_empty_log_is_trivially_valid() {
        let (_, verifier) = seeded(0);
        for opts in [VerifyOptions::full(), VerifyOptions::quick(100)] {
            let result = verifier.verify(&opts).unwrap();
            assert!(result.valid);
            assert_eq!(result.total_entries, 0);
            assert_eq!(result.checked_entries, 0);
            assert!(result.broken_at.is_none());
        }
    }

    #[test]
    fn test_quick_verifies_whole_small_log() {
        let (_, verifier) = seeded(5);
        let result = verifier.verify(&VerifyOptions::quick(100)).unwrap();
        assert!(result.valid);
        assert_eq!(result.mode, VerificationMode::Quick);
        assert_eq!(result.total_entries, 5);
        assert_eq!(result.checked_entries, 5);
    }

    #[test]
    fn test_quick_window_anchors_on_predecessor() {
        let (_, verifier) = seeded(10);
        let result = verifier.verify(&VerifyOptions::quick(3)).unwrap();
        assert!(result.valid);
        assert_eq!(result.total_entries, 10);
        assert_eq!(result.checked_entries, 3);
    }

    #[test]
    fn test_quick_default_limit_and_zero_limit() {
        let (_, verifier) = seeded(4);
        let verifier = verifier.with_quick_limit(2);

        let default = verifier.verify(&VerifyOptions::default()).unwrap();
        assert_eq!(default.checked_entries, 2);

        let zero = verifier.verify(&VerifyOptions::quick(0)).unwrap();
        assert!(zero.valid);
        assert_eq!(zero.checked_entries, 1);
    }

    #[test]
    fn test_full_walks_across_batch_boundaries() {
        let (_, verifier) = seeded(7);
        let result = verifier
            .with_batch_size(2)
            .verify(&VerifyOptions::full())
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.total_entries, 7);
        assert_eq!(result.checked_entries, 7);
    }

    #[test]
    fn test_full_verification_is_idempotent() {
        let (_, verifier) = seeded(6);
        let first = verifier.verify(&VerifyOptions::full()).unwrap();
        let second = verifier.verify(&VerifyOptions::full()).unwrap();
        assert_eq!(first, second);
        assert!(first.valid);
    }

    #[test]
    fn test_rotated_key_still_verifies_history() {
        let (store, _) = seeded(3);

        let rotated = Arc::new(
            HmacSigner::new(b"new-primary")
                .unwrap()
                .with_legacy_key(KEY)
                .unwrap(),
        );
        let engine = AppendEngine::new(Arc::new(store.clone()), rotated.clone());
        engine.append(&candidate(99)).unwrap();

        let verifier = ChainVerifier::new(Arc::new(store.clone()), rotated);
        let result = verifier.verify(&VerifyOptions::full()).unwrap();
        assert!(result.valid);
        assert_eq!(result.checked_entries, 4);

        // Without the legacy key the historical links no longer validate.
        let strict = ChainVerifier::new(
            Arc::new(store),
            Arc::new(HmacSigner::new(b"new-primary").unwrap()),
        );
        let result = strict.verify(&VerifyOptions::full()).unwrap();
        let broken = result.broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::InvalidSignature);
        assert_eq!(broken.sequence_number, 1);
    }

    // ── Tamper detection ──────────────────────────────────────────────────────

    #[test]
    fn test_content_modification_is_located() {
        let (store, verifier) = seeded(3);
        store
            .tamper(2, |r| r.details.target.name = Some("Forged".to_string()))
            .unwrap();

        let result = verifier.verify(&VerifyOptions::full()).unwrap();
        assert!(!result.valid);
        assert_eq!(result.checked_entries, 1);
        let broken = result.broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ContentModified);
        assert_eq!(broken.sequence_number, 2);
        let stored = store.records_from(2, 1).unwrap().remove(0).content_hash;
        assert_eq!(broken.actual, Some(stored));
    }

    #[test]
    fn test_whole_second_timestamp_shift_is_detected() {
        let (store, verifier) = seeded(2);
        store
            .tamper(1, |r| r.created_at = r.created_at + Duration::seconds(1))
            .unwrap();

        let broken = verifier.verify(&VerifyOptions::full()).unwrap().broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ContentModified);
        assert_eq!(broken.sequence_number, 1);
    }

    #[test]
    fn test_sub_second_timestamp_noise_is_not_tamper() {
        let (store, verifier) = seeded(2);
        store
            .tamper(1, |r| r.created_at = r.created_at + Duration::milliseconds(250))
            .unwrap();

        assert!(verifier.verify(&VerifyOptions::full()).unwrap().valid);
    }

    #[test]
    fn test_previous_hash_rewrite_is_chain_break() {
        let (store, verifier) = seeded(4);
        let forged = "f".repeat(64);
        let expected = store.records_from(2, 1).unwrap()[0].content_hash.clone();

        // Re-hash so only the linkage is wrong, not the content.
        store
            .tamper(3, |r| {
                r.previous_hash = forged.clone();
                r.content_hash = recompute_record_hash(r).unwrap();
            })
            .unwrap();

        let result = verifier.verify(&VerifyOptions::full()).unwrap();
        let broken = result.broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ChainBreak);
        assert_eq!(broken.sequence_number, 3);
        assert_eq!(broken.expected, Some(expected));
        assert_eq!(broken.actual, Some(forged));
        assert_eq!(result.checked_entries, 2);
    }

    #[test]
    fn test_signature_rewrite_is_invalid_signature() {
        let (store, verifier) = seeded(3);
        store.tamper(2, |r| r.signature = "0".repeat(64)).unwrap();

        let broken = verifier.verify(&VerifyOptions::full()).unwrap().broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::InvalidSignature);
        assert_eq!(broken.sequence_number, 2);
    }

    #[test]
    fn test_forged_link_without_key_fails_signature() {
        let (store, verifier) = seeded(3);
        let attacker = HmacSigner::new(b"attacker-key").unwrap();

        // Consistent hashes, but signed with the wrong key.
        store
            .tamper(3, |r| {
                r.details.metadata = Some(json!({ "forged": true }));
                r.content_hash = recompute_record_hash(r).unwrap();
                r.signature = attacker.sign(&link_message(&r.content_hash, &r.previous_hash));
            })
            .unwrap();

        let broken = verifier.verify(&VerifyOptions::full()).unwrap().broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::InvalidSignature);
        assert_eq!(broken.sequence_number, 3);
    }

    #[test]
    fn test_deleted_record_breaks_following_link() {
        let (store, verifier) = seeded(5);
        assert!(store.excise(3).unwrap());

        let result = verifier.verify(&VerifyOptions::full()).unwrap();
        let broken = result.broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ChainBreak);
        assert_eq!(broken.sequence_number, 4);
        assert_eq!(result.total_entries, 4);
    }

    #[test]
    fn test_reordered_records_are_detected() {
        let (store, verifier) = seeded(4);
        let r2 = store.records_from(2, 1).unwrap().remove(0);
        let r3 = store.records_from(3, 1).unwrap().remove(0);

        store
            .tamper(2, |r| *r = ActivityRecord { sequence_number: 2, ..r3.clone() })
            .unwrap();
        store
            .tamper(3, |r| *r = ActivityRecord { sequence_number: 3, ..r2.clone() })
            .unwrap();

        let broken = verifier.verify(&VerifyOptions::full()).unwrap().broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ChainBreak);
        assert_eq!(broken.sequence_number, 2);
    }

    #[test]
    fn test_quick_ignores_tamper_outside_window() {
        let (store, verifier) = seeded(6);
        store
            .tamper(1, |r| r.details.target.name = Some("Forged".to_string()))
            .unwrap();

        assert!(verifier.verify(&VerifyOptions::quick(3)).unwrap().valid);
        assert!(!verifier.verify(&VerifyOptions::full()).unwrap().valid);
    }

    #[test]
    fn test_quick_detects_tamper_inside_window() {
        let (store, verifier) = seeded(6);
        store.tamper(5, |r| r.action = "notes.delete".to_string()).unwrap();

        let result = verifier.verify(&VerifyOptions::quick(3)).unwrap();
        assert!(!result.valid);
        assert_eq!(result.checked_entries, 1);
        assert_eq!(result.broken_at.unwrap().sequence_number, 5);
    }

    #[test]
    fn test_purge_leaves_full_verification_unanchored() {
        let (store, verifier) = seeded(3);
        // Same shape a retention purge of the oldest record leaves behind.
        store.excise(1).unwrap();

        let result = verifier.verify(&VerifyOptions::full()).unwrap();
        let broken = result.broken_at.unwrap();
        assert_eq!(broken.reason, BreakReason::ChainBreak);
        assert_eq!(broken.sequence_number, 2);
        assert_eq!(broken.expected.as_deref(), Some(GENESIS_HASH));

        // Quick mode over the survivors has no predecessor either.
        assert!(!verifier.verify(&VerifyOptions::quick(10)).unwrap().valid);

        // A purge of everything returns the log to a trivially valid state.
        store.purge_older_than(Utc::now() + Duration::days(1)).unwrap();
        assert!(verifier.verify(&VerifyOptions::full()).unwrap().valid);
    }
}
