//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Limiter construction with default adapters
//! - Clock abstraction (system time vs mock)
//! - JSON state file with atomic replacement
//! - The `metrics` facade

pub mod builder;
pub mod clock;
pub mod recorder;
pub mod state_file;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for testing
/// window expiry and persistence failures.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// stream-dedup = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
