//! InnerAI API server library.
//!
//! Exposes config, state, error handling, routes, the payment gateway
//! clients and background jobs so integration tests and both binaries can
//! share them.

pub mod auth;
pub mod background;
pub mod billing;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
