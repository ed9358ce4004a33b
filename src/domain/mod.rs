//! Domain layer - pure deduplication rules with no I/O.
//!
//! - Field path queries into message payloads
//! - Suppression window and grace period arithmetic
//!
//! All types in this layer are pure and easily testable.

pub mod field_path;
pub mod window;

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Dedup value to the time it was last successfully processed.
pub type SeenMap = HashMap<String, DateTime<Utc>>;
