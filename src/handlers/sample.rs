use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::AgentError;
use crate::models::asset::XmlNode;
use crate::models::query::SampleParams;
use crate::query;
use crate::AppState;

/// `interval` is accepted and currently ignored: a one-shot HTTP response
/// can only serve the single-shot form of `/sample`, not long-polling.
pub async fn sample(
    State(state): State<AppState>,
    Query(params): Query<SampleParams>,
) -> Result<impl IntoResponse, AgentError> {
    let (mut doc, served) = {
        let store = state.store.lock().await;
        query::sample(&state.registry, &store, params.path.as_deref(), params.from, params.count)?
    };
    if let XmlNode::Element { attrs, .. } = &mut doc {
        attrs.push(("count".to_string(), served.to_string()));
    }
    let xml = query::xml::serialize_document(doc, &state.agent_name);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
