// Path: crates/state/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Reference world-state repository for the ember engine.
//!
//! Production deployments back the [`Repository`] contract with a
//! Merkle-Patricia trie; this crate provides the flat in-memory equivalent
//! used by tests and light tooling. The commitment is a keccak over the
//! sorted account set, which preserves the contract's observable property:
//! equal state, equal root.
//!
//! [`Repository`]: ember_api::repository::Repository

pub mod repository;

pub use repository::WorldRepository;
