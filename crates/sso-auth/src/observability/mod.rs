//! Observability module for the SSO authentication service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
