//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Seen store (last processed time per dedup value)
//! - Limiter (decision making around a caller's handler)
//! - Persistence (startup load and periodic snapshots)
//! - Background tasks (snapshot, scrub and gauge loops)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod config;
pub mod limiter;
pub mod metrics;
pub mod persistence;
pub mod ports;
pub mod seen_store;
pub mod tasks;
