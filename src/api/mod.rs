//! JSON HTTP API over the cluster operations
//!
//! Routes live under `/v1`; the `{engine}` path segment is `xtradb` or
//! `psmdb`. Each request runs under a child of the process shutdown token
//! that is also cancelled when the request deadline passes.

mod server;

pub use server::{ApiState, InstallOperatorRequest, create_router, run_api_server, status_code};
