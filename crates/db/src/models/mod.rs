//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - Create DTOs for inserts
//! - Response shapes where the row must not be serialized as-is

pub mod credit_transaction;
pub mod payment;
pub mod session;
pub mod subscription;
pub mod usage;
pub mod user;
pub mod webhook_event;
