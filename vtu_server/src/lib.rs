//! # VTU wallet server
//!
//! The HTTP face of the wallet ledger. It is responsible for:
//! * serving the wallet, funding and purchase routes,
//! * receiving and authenticating payment gateway webhooks,
//! * running the background reconciliation sweep.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
