//! Domain types for the generation façade.
//!
//! Artifacts, retry policies, the task catalogue, workflow templates and
//! conversational sessions. Nothing in here talks to the network.

pub mod artifact;
pub mod error;
pub mod job;
pub mod options;
pub mod retry;
pub mod seed;
pub mod session;
pub mod task;
pub mod template;
