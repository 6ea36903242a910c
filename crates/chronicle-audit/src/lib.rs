//! # chronicle-audit
//!
//! Concrete collaborators for the Chronicle chain engines: an HMAC-SHA256
//! link signer and two append-only stores.
//!
//! ## Overview
//!
//! - `HmacSigner` signs each link with the primary key and accepts
//!   signatures from any configured legacy key.
//! - `InMemoryActivityStore` keeps the log in a `Vec`; its mutex is the
//!   tail lock.
//! - `SqliteActivityStore` persists to SQLite; `BEGIN IMMEDIATE` is the
//!   tail lock.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chronicle_audit::{HmacSigner, SqliteActivityStore};
//! use chronicle_core::AppendEngine;
//!
//! let store = Arc::new(SqliteActivityStore::open(Path::new("activity.db"))?);
//! let signer = Arc::new(HmacSigner::new(key)?.with_legacy_key(old_key)?);
//! let engine = AppendEngine::new(store, signer);
//! ```

pub mod memory;
pub mod signer;
pub mod sqlite;

pub use memory::InMemoryActivityStore;
pub use signer::HmacSigner;
pub use sqlite::SqliteActivityStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use chronicle_contracts::{
        details::{ActivityDetails, Scope, Target},
        error::ChronicleError,
        record::{ActivityCandidate, ActivityFilter, GENESIS_HASH},
    };
    use chronicle_core::{
        hash::{link_message, recompute_record_hash},
        traits::{ActivityStore, LinkSigner},
        AppendEngine,
    };

    use super::{HmacSigner, InMemoryActivityStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn candidate(name: &str) -> ActivityCandidate {
        ActivityCandidate {
            user_id: Some("admin-1".to_string()),
            action: "users.create".to_string(),
            resource: "users".to_string(),
            resource_id: Some(format!("user-{name}")),
            details: ActivityDetails::new(
                Scope::System,
                Target::new("user", format!("user-{name}")).named(name),
            ),
            session_info: None,
        }
    }

    fn engine(store: &InMemoryActivityStore) -> AppendEngine {
        AppendEngine::new(
            Arc::new(store.clone()),
            Arc::new(HmacSigner::new(b"primary-key").unwrap()),
        )
    }

    // ── HmacSigner ────────────────────────────────────────────────────────────

    #[test]
    fn test_sign_and_verify_with_primary() {
        let signer = HmacSigner::new(b"primary-key").unwrap();
        let message = link_message(&"a".repeat(64), GENESIS_HASH);
        let sig = signer.sign(&message);

        assert_eq!(sig.len(), 64, "HMAC-SHA256 hex must be 64 chars");
        assert!(signer.verify(&message, &sig));
        assert!(!signer.verify("other:message", &sig));
    }

    #[test]
    fn test_legacy_key_signatures_still_verify() {
        let old = HmacSigner::new(b"retired-key").unwrap();
        let rotated = HmacSigner::new(b"primary-key")
            .unwrap()
            .with_legacy_key(b"retired-key")
            .unwrap();
        let message = link_message("abc", GENESIS_HASH);

        let historical = old.sign(&message);
        assert!(rotated.verify(&message, &historical));
        assert_ne!(rotated.sign(&message), historical, "new links use the primary key");
        assert_eq!(rotated.legacy_key_count(), 1);
    }

    #[test]
    fn test_unknown_key_and_garbage_signatures_fail() {
        let signer = HmacSigner::new(b"primary-key").unwrap();
        let stranger = HmacSigner::new(b"someone-else").unwrap();
        let message = link_message("abc", "def");

        assert!(!signer.verify(&message, &stranger.sign(&message)));
        assert!(!signer.verify(&message, "not-hex"));
        assert!(!signer.verify(&message, ""));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        match HmacSigner::new(b"") {
            Err(ChronicleError::Signing { reason }) => assert!(reason.contains("empty")),
            other => panic!("expected Signing error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_env_requires_primary() {
        let err = HmacSigner::from_env("CHRONICLE_TEST_KEY_THAT_IS_NEVER_SET", &[]).unwrap_err();
        assert!(matches!(err, ChronicleError::ConfigError { .. }));
    }

    #[test]
    fn test_debug_does_not_leak_key_material() {
        let signer = HmacSigner::new(b"super-secret").unwrap();
        let debug = format!("{:?}", signer);
        assert!(!debug.contains("super-secret"));
    }

    // ── InMemoryActivityStore ────────────────────────────────────────────────

    /// Sequential appends produce a linked, reproducible chain starting at GENESIS.
    #[test]
    fn test_hash_chain_integrity() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        for name in ["alice", "bob", "carol"] {
            engine.append(&candidate(name)).unwrap();
        }

        let records = store.records_from(0, 10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].previous_hash, GENESIS_HASH);
        for pair in records.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].content_hash);
        }
        for r in &records {
            assert_eq!(recompute_record_hash(r).unwrap(), r.content_hash);
        }
    }

    /// Sequence numbers must be 1, 2, 3, … with no gaps or skips.
    #[test]
    fn test_sequence_monotonic() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        for name in ["a", "b", "c"] {
            engine.append(&candidate(name)).unwrap();
        }

        for (idx, record) in store.records_from(0, 10).unwrap().iter().enumerate() {
            assert_eq!(record.sequence_number, idx as u64 + 1);
        }
    }

    /// Concurrent appenders never observe the same tail.
    #[test]
    fn test_concurrent_appends_are_linearized() {
        let store = InMemoryActivityStore::new();

        thread::scope(|s| {
            for t in 0..8 {
                let engine = engine(&store);
                s.spawn(move || {
                    for i in 0..25 {
                        engine.append(&candidate(&format!("{t}-{i}"))).unwrap();
                    }
                });
            }
        });

        let records = store.records_from(0, 1000).unwrap();
        assert_eq!(records.len(), 200);
        let mut expected_prev = GENESIS_HASH.to_string();
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.sequence_number, i as u64 + 1);
            assert_eq!(r.previous_hash, expected_prev);
            expected_prev = r.content_hash.clone();
        }
    }

    #[test]
    fn test_batches_and_predecessor_lookup() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        for i in 0..7 {
            engine.append(&candidate(&i.to_string())).unwrap();
        }

        let batch: Vec<u64> = store
            .records_from(3, 2)
            .unwrap()
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(batch, vec![3, 4]);
        assert!(store.records_from(8, 10).unwrap().is_empty());

        let recent: Vec<u64> = store
            .recent_records(3)
            .unwrap()
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(recent, vec![5, 6, 7]);
        assert_eq!(store.recent_records(100).unwrap().len(), 7);

        assert_eq!(store.record_before(5).unwrap().unwrap().sequence_number, 4);
        assert!(store.record_before(1).unwrap().is_none());
    }

    #[test]
    fn test_query_newest_first_with_pagination() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        for i in 0..5 {
            engine.append(&candidate(&i.to_string())).unwrap();
        }

        let page = store
            .query(&ActivityFilter {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            })
            .unwrap();
        let seqs: Vec<u64> = page.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![4, 3]);
    }

    /// Purging keeps sequence assignment monotonic.
    #[test]
    fn test_purge_does_not_rewind_sequence() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        engine.append(&candidate("old")).unwrap();
        engine.append(&candidate("older")).unwrap();

        let removed = store.purge_older_than(Utc::now() + Duration::days(1)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.total_count().unwrap(), 0);

        let next = engine.append(&candidate("new")).unwrap();
        assert_eq!(next.sequence_number, 3);
        assert_eq!(next.previous_hash, GENESIS_HASH, "empty log links to GENESIS");
    }

    /// The cutoff is compared at whole seconds, like the SQLite store.
    #[test]
    fn test_purge_cutoff_uses_whole_seconds() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        engine.append(&candidate("earlier")).unwrap();
        engine.append(&candidate("on-the-second")).unwrap();

        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.tamper(1, |r| r.created_at = t - Duration::seconds(1)).unwrap();
        store.tamper(2, |r| r.created_at = t).unwrap();

        let removed = store.purge_older_than(t + Duration::milliseconds(500)).unwrap();
        assert_eq!(removed, 1);
        let survivors = store.records_from(0, 10).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].sequence_number, 2);
    }

    #[test]
    fn test_tamper_mutates_in_place() {
        let store = InMemoryActivityStore::new();
        let engine = engine(&store);
        engine.append(&candidate("alice")).unwrap();

        assert!(store
            .tamper(1, |r| r.details.metadata = Some(json!({ "forged": true })))
            .unwrap());
        assert!(!store.tamper(2, |_| {}).unwrap());

        let r = store.records_from(1, 1).unwrap().remove(0);
        assert_ne!(recompute_record_hash(&r).unwrap(), r.content_hash);
    }
}
