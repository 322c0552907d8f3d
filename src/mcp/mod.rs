//! Model Context Protocol server plane.
//!
//! ```text
//! HTTP request ──► session lookup ──► per-session McpServer
//!                      │                    │
//!                      │                    ├─► tools: search / fetch / get_code_guidelines
//!                      │                    └─► resources: guidelines://{key}
//!                      └─► SessionPool (TTL reaping, per-product isolation)
//! ```
//!
//! The wire format is JSON-RPC 2.0 over HTTP with the `mcp-session-id`
//! header for session correlation. Heavy state (searcher, embedder,
//! store) is shared; a session owns only its server instance and lock.

pub mod context;
pub mod http;
pub mod protocol;
pub mod server;
pub mod session;

pub use context::{RequestContext, current, with_context};
pub use http::{AppState, ProductState, SESSION_HEADER, router, serve};
pub use server::McpServer;
pub use session::{SESSION_TTL, SWEEP_INTERVAL, SessionHandle, SessionPool};
