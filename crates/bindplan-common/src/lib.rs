//! Common types and utilities for the bindplan dependency graph planner.
//!
//! This crate provides foundational types used across all bindplan crates:
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, message codes)
//! - Planner limits and default thresholds

// Diagnostic types, codes and message templates
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticRelatedInformation};

// Centralized limits and defaults
pub mod limits;
