//! Data models for claims and configuration.

pub mod claim;
pub mod config;

pub use claim::{ClaimField, ClaimRecord, FieldIssue};
pub use config::ClaimConfig;
