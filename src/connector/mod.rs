//! # Connector Layer
//!
//! Adapters implementing the application interfaces:
//! - Postgres source reader and pgvector destination stores
//! - Sync log persistence
//! - Embedding generation (ONNX Runtime, or a deterministic mock)
//! - In-memory stand-ins for dry runs and tests
//!
//! `api` wires the adapters into use cases and turns results into CLI output.

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
