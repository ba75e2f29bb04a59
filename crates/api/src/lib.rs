//! Studio API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! handlers) so integration tests and the binary entrypoint can both
//! access them.

pub mod config;
pub mod emitter;
pub mod error;
pub mod form;
pub mod handlers;
pub mod orchestrator;
pub mod router;
pub mod routes;
pub mod state;
pub mod upload;
