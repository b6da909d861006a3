use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::AgentError;
use crate::models::query::CurrentParams;
use crate::query;
use crate::AppState;

pub async fn current(
    State(state): State<AppState>,
    Query(params): Query<CurrentParams>,
) -> Result<impl IntoResponse, AgentError> {
    let doc = {
        let store = state.store.lock().await;
        query::current(&state.registry, &store, params.path.as_deref(), params.at)?
    };
    let xml = query::xml::serialize_document(doc, &state.agent_name);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
