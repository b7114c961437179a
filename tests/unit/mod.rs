// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the cluster lifecycle operations
//!
//! These run the public operations against the in-memory store from
//! `tests/common`:
//! - Cluster create, update, delete and restart
//! - Listing, including clusters still being torn down
//! - Credential retrieval
//! - Operator install and upgrade
//! - Manifest generation as seen through the store

#[path = "../common/mod.rs"]
mod common;

mod credentials;
mod deletion;
mod manifests;
