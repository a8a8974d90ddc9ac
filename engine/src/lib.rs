//! Yojana Engine Library
//!
//! Core of the Yojana Sahayak welfare-scheme discovery agent: a per-session
//! finite-state orchestration loop over planning, tool execution, evaluation
//! and response, backed by a rule-based eligibility engine and a
//! contradiction detector over the evolving user profile.
//!
//! This library is used by both the `yojana` binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Scheme catalog loading module
pub mod catalog;

/// Rule-based eligibility engine
pub mod eligibility;

/// Profile merge and contradiction detection
pub mod profile;

/// Bounded conversation memory
pub mod memory;

/// Language backend abstraction layer
pub mod llm;

/// Scheme retrieval service clients
pub mod retrieval;

/// Speech-to-text / text-to-speech boundary
pub mod speech;

/// User profile persistence module
pub mod store;

/// Agent orchestration module (planner, executor, evaluator, orchestrator)
pub mod agent;

/// CLI interface module
pub mod cli;
