use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::AgentError;
use crate::models::query::ProbeParams;
use crate::query;
use crate::AppState;

pub async fn probe(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> Result<impl IntoResponse, AgentError> {
    let doc = query::probe(&state.registry, params.path.as_deref())?;
    let xml = query::xml::serialize_document(doc, &state.agent_name);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
