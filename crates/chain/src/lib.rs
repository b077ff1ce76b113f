// Path: crates/chain/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # ember chain
//!
//! The state-transition engine of the ledger. Candidate blocks arriving out
//! of order enter the [`engine::Engine`], which routes them onto the
//! canonical chain, an alt chain, or the orphan buffer; canonical extensions
//! are validated, their transactions replayed against the world-state
//! repository, rewards distributed, and the head advanced.

pub mod engine;
pub mod executor;
pub mod rewards;
pub mod validate;

pub use engine::{ConnectOutcome, Engine};
