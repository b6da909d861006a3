use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::models::query::AssetsParams;
use crate::query;
use crate::AppState;

pub async fn assets(State(state): State<AppState>, Query(params): Query<AssetsParams>) -> impl IntoResponse {
    let doc = {
        let store = state.store.lock().await;
        query::assets(&store, params.asset_type.as_deref(), params.count)
    };
    let xml = query::xml::serialize_document(doc, &state.agent_name);
    ([(header::CONTENT_TYPE, "application/xml")], xml)
}
