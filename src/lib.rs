//! courier: target-based HTTP request orchestration.
//!
//! Callers describe API calls as [`Target`](model::Target) implementations;
//! a [`Provider`](provider::Provider) resolves each target into an endpoint,
//! materializes the request, runs it over the transport (or synthesizes a
//! stubbed sample), and delivers the terminal result exactly once. Plugins
//! observe and rewrite requests around the transport, a cancel token covers
//! the whole call, and an optional in-flight table collapses concurrent
//! identical calls into a single operation.

pub mod prelude;

pub mod errors;
pub mod inflight;
pub mod model;
pub mod plugin;
pub mod provider;
pub mod token;
pub mod transport;
