//! Schema inference RPC surface (C9, spec.md §4.9): infer a `Schema` from a
//! sample of raw rows.

use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::domain::InferredSchema;
use crate::error::ServerResult;
use crate::schema_inferencer::infer_schema;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/infer", post(infer))
}

#[derive(Debug, Deserialize)]
struct InferSchemaRequest {
    rows: Vec<serde_json::Value>,
}

async fn infer(Json(request): Json<InferSchemaRequest>) -> ServerResult<Json<InferredSchema>> {
    Ok(Json(infer_schema(&request.rows)))
}
