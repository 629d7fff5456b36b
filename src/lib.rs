#![deny(missing_docs)]

//! Core library for the docrelay document task orchestrator.

/// ACP HTTP routing and handlers.
pub mod acp;
/// Environment-driven configuration management.
pub mod config;
/// Document text extraction.
pub mod extraction;
/// Language-model gateway abstraction and the watsonx.ai client.
pub mod gateway;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Request and model-call counters.
pub mod metrics;
/// Task validation, chunking, dispatch, and result assembly.
pub mod orchestrator;
