//! Domain rules for the InnerAI metering and billing backend.
//!
//! Everything here is pure: no database, no HTTP. The `db` and `api` crates
//! call into these modules to decide what to persist.

pub mod credits;
pub mod error;
pub mod models;
pub mod pagination;
pub mod plans;
pub mod roles;
pub mod signature;
pub mod subscription;
pub mod types;
pub mod usage;
