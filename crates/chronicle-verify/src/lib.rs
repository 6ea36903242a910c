//! # chronicle-verify
//!
//! Integrity verification for the Chronicle activity log.
//!
//! This crate provides [`engine::ChainVerifier`], which walks the stored
//! chain and recomputes every link. It runs in one of two modes:
//!
//! 1. **Quick**: the most recent `limit` records, anchored on the record
//!    immediately before them (or GENESIS).
//! 2. **Full**: every record from GENESIS, read in fixed-size batches so
//!    no lock or transaction outlives a single batch.
//!
//! Verification stops at the first divergence. Integrity failures are data,
//! not errors: they come back as `valid = false` with a `brokenAt` locus.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use chronicle_contracts::verification::VerifyOptions;
//! use chronicle_verify::engine::ChainVerifier;
//!
//! let verifier = ChainVerifier::new(store, signer);
//! let result = verifier.verify(&VerifyOptions::full())?;
//! if !result.valid {
//!     eprintln!("chain broken at {:?}", result.broken_at);
//! }
//! ```

pub mod engine;

pub use engine::ChainVerifier;
