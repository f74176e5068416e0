//! Cadastral tile gateway library.
//!
//! An HTTP gateway in front of a national cadastral WMS endpoint. Inbound
//! tile requests are normalized into a canonical GetMap query, admitted
//! through a bounded-concurrency gate, forwarded upstream with one bounded
//! retry, and classified into tiered cache-control responses.

// Core pipeline
pub mod admission;
pub mod http;
pub mod upstream;
pub mod wms;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
