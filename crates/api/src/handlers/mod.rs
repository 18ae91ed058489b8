//! Request handlers.
//!
//! One submodule per resource. Handlers validate input, call into
//! `innerai_core` for decisions and `innerai_db` repositories for
//! persistence, and map failures through [`AppError`](crate::error::AppError).

pub mod admin;
pub mod auth;
pub mod billing;
pub mod catalog;
pub mod credits;
pub mod metering;
pub mod subscription;
pub mod usage;
pub mod users;
pub mod webhooks;
