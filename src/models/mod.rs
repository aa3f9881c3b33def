//! Data model shared across the reconciliation pipeline.

pub mod blocks;
pub mod contact;
pub mod field;
pub mod monitor;
pub mod state;
