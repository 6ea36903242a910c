//! # chronicle-core
//!
//! The chain-building half of the Chronicle activity log.
//!
//! This crate provides:
//! - The two collaborator traits (`ActivityStore`, `LinkSigner`)
//! - The content hasher (`hash`), shared by the write and verify paths
//! - The `AppendEngine`, which links and persists new records
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chronicle_core::{AppendEngine, traits::{ActivityStore, LinkSigner}};
//!
//! let engine = AppendEngine::new(store, signer);
//! let record = engine.append(&candidate)?;
//! ```

pub mod append;
pub mod hash;
pub mod traits;

pub use append::AppendEngine;
