#![warn(missing_docs)]
//! Vigil keeps remotely-hosted uptime monitors synchronized with a locally
//! declared desired configuration, tolerating a remote API whose writes are
//! not immediately visible to reads.

pub mod client;
pub mod merge;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod request;
pub mod settle;
pub mod test_helpers;
