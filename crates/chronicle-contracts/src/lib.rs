//! # chronicle-contracts
//!
//! Shared types, result shapes, and errors for the Chronicle activity log.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod details;
pub mod error;
pub mod record;
pub mod verification;
