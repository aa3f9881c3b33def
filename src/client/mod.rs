//! The consumed surface of the remote monitoring API.

mod traits;
mod types;

pub use traits::{ApiError, MonitorApi};
pub use types::{FieldPatch, MonitorRequest};

#[cfg(test)]
pub use traits::MockMonitorApi;
