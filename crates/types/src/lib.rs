// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Core data structures, error types, protocol parameters, and configs for
//! the ember state-transition engine.

pub mod config;
pub mod core;
pub mod error;
pub mod params;

pub use ethereum_types::{H256, U256};

/// A 20-byte account address.
pub type Address = ethereum_types::H160;
