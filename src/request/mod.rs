//! Translation of a declared configuration into the exact remote mutation
//! payload, applying per-variant field rules and defaulting.

mod builder;
mod error;

pub use builder::{build_create, build_update, BuiltRequest, DerivedDefaults, DEFAULT_TIMEOUT_SECS};
pub use error::ValidationError;
