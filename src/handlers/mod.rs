pub mod assets;
pub mod current;
pub mod health;
pub mod probe;
pub mod sample;

use axum::extract::OriginalUri;

use crate::error::AgentError;

/// Catches any request path that isn't one of the four MTConnect surfaces
/// (`spec.md` §6) and reports it as the protocol's own error rather than
/// axum's default 404.
pub async fn unsupported(OriginalUri(uri): OriginalUri) -> Result<(), AgentError> {
    Err(AgentError::UnsupportedVerb(uri.path().to_string()))
}
