//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! inbound GET /tiles
//!     → request.rs (attach request ID)
//!     → server.rs (parse query, normalize, admission, upstream call)
//!     → response.rs (classify outcome, cache headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
