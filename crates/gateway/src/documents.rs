//! Document management endpoints over blob storage and the vector index.

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Multipart, Path, Query, State, multipart::MultipartError},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

use crate::{
    error::{ApiError, ApiResult},
    state::GatewayState,
};

#[derive(Debug, Deserialize)]
pub struct PrefixParams {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InspectParams {
    pub blob_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub blob_names: Vec<String>,
}

fn prefix_or_default(state: &GatewayState, prefix: Option<String>) -> String {
    prefix.unwrap_or_else(|| state.default_prefix.clone())
}

pub async fn list(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<PrefixParams>,
) -> ApiResult<Json<Value>> {
    let prefix = prefix_or_default(&state, params.prefix);
    let documents = state
        .documents()?
        .list_documents(&prefix)
        .await
        .map_err(|e| ApiError::internal(format!("Error listing documents: {e}")))?;
    Ok(Json(json!({
        "success": true,
        "prefix": prefix,
        "total_documents": documents.len(),
        "documents": documents,
    })))
}

/// Multipart form with one or more `files` parts and an optional `prefix`.
pub async fn upload(State(state): State<Arc<GatewayState>>, mut form: Multipart) -> ApiResult<Json<Value>> {
    let documents = state.documents()?;
    let failed = |e: MultipartError| ApiError::internal(format!("Error uploading documents: {e}"));

    let mut prefix = None;
    let mut files = Vec::new();
    while let Some(field) = form.next_field().await.map_err(failed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("prefix") => prefix = Some(field.text().await.map_err(failed)?),
            Some("files") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(failed)?;
                files.push((file_name, data.to_vec()));
            },
            other => warn!(field = ?other, "ignoring unknown form field"),
        }
    }
    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    let prefix = prefix
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| state.default_prefix.clone());
    info!(prefix = %prefix, files = files.len(), "upload requested");
    Ok(Json(documents.upload_and_index(files, &prefix).await))
}

pub async fn delete_many(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    let result = state.documents()?.batch_delete(&req.blob_names).await;
    Ok(Json(json!(result)))
}

pub async fn delete_one(
    State(state): State<Arc<GatewayState>>,
    Path(blob_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let result = state.documents()?.delete_document(&blob_name).await;
    Ok(Json(json!(result)))
}

pub async fn inspect(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<InspectParams>,
) -> ApiResult<Json<Value>> {
    let blob_name = params.blob_name.as_deref().filter(|b| !b.is_empty());
    Ok(Json(state.documents()?.inspect_sample(blob_name).await))
}

pub async fn schema(State(state): State<Arc<GatewayState>>) -> ApiResult<Json<Value>> {
    Ok(Json(state.documents()?.collection_info().await))
}

/// Index blobs under the prefix that are not in the index yet.
pub async fn reindex(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<PrefixParams>,
) -> ApiResult<Json<Value>> {
    let prefix = prefix_or_default(&state, params.prefix);
    Ok(Json(state.documents()?.index_incremental(&prefix, None).await))
}
