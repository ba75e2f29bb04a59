//! ComfyUI REST client and job lifecycle.
//!
//! Submits parameterized workflows, polls the history endpoint until a
//! job's outputs appear, and extracts typed artifacts from the raw
//! history payload.

pub mod api;
pub mod backend;
pub mod extract;
pub mod job;
pub mod poller;
