//! Ambient request context.
//!
//! Carries request identity into tool handlers without threading it
//! through every signature. Backed by a tokio task-local: the HTTP layer
//! scopes each dispatch, and the access-log wrapper reads it back out.

use serde::Serialize;

/// Identity of one in-flight MCP request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    /// Server-generated id for this request.
    pub request_id: String,
    /// Session the request arrived on.
    pub session_id: String,
    /// Product endpoint the session belongs to.
    pub product_id: String,
    /// Client `name/version` from the initialize handshake, when known.
    pub client_info: Option<String>,
    /// Remote peer address.
    pub client_ip: Option<String>,
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Runs `future` with `context` as the ambient request context.
pub async fn with_context<F>(context: RequestContext, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_CONTEXT.scope(context, future).await
}

/// The ambient context of the current task, if one is scoped.
#[must_use]
pub fn current() -> Option<RequestContext> {
    REQUEST_CONTEXT.try_with(Clone::clone).ok()
}
