//! Background jobs.
//!
//! Long-running loops take a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! and are spawned from `main.rs`; the same work is exposed as a one-shot
//! function for the CLI binary and the admin endpoint.

pub mod subscription_expiry;
