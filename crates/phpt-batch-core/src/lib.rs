//! Batch orchestration for analyzer fixture tests.
//!
//! Test cases are grouped by their effective analyzer arguments, each group is
//! analyzed by one analyzer process, and the combined JSON diagnostics are
//! routed back to the originating case by scratch-file path before being
//! formatted and matched against the declared expectation.

pub mod common;
pub mod domain;
pub mod modules;
