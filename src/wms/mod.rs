//! WMS request normalization subsystem.
//!
//! # Data Flow
//! ```text
//! raw query parameters (case-insensitive, untrusted)
//!     → query.rs (merge with defaults, apply allow-list)
//!     → BBOX validation (reject before any upstream I/O)
//!     → canonical upstream query string (percent-encoded)
//! ```
//!
//! # Design Decisions
//! - Caller keys outside the allow-list are silently dropped to prevent
//!   parameter injection toward the upstream WMS protocol
//! - DEBUG is an out-of-band control flag, never forwarded upstream
//! - FORMAT keeps its literal `/` when serialized; the upstream rejects a
//!   percent-encoded slash inside a MIME type

pub mod query;

pub use query::{normalize, NormalizeError, TileQuery};
