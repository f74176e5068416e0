//! Upstream WMS client subsystem.
//!
//! # Data Flow
//! ```text
//! canonical query string + inbound headers
//!     → client.rs (header allow-list, referer override)
//!     → GET to the fixed upstream base URL
//!     → status >= 500: one retry after a fixed grace period
//!     → UpstreamResponse (status, content-type, body bytes)
//! ```
//!
//! # Design Decisions
//! - Exactly one retry with a fixed delay, no backoff or jitter; a second
//!   failure is surfaced to the caller as-is
//! - Transport errors are never retried
//! - The upstream requires a fixed Referer for access control; the inbound
//!   value is always replaced

pub mod client;

pub use client::{UpstreamClient, UpstreamResponse};
