//! Document management over blob storage and the vector index: upload,
//! incremental indexing, listing, deletion and collection maintenance.
//!
//! Results are JSON-shaped because they are returned as-is by the HTTP API.

use std::{path::Path, sync::Arc};

use {
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{error, info, warn},
};

use crate::{
    blob::BlobStore,
    indexer::{IndexReport, Indexer},
    vector_store::{FieldMatch, VectorStore},
};

const SCROLL_LIMIT: usize = 1000;
const SAMPLE_SIZE: usize = 5;
const DEFAULT_VECTOR_SIZE: usize = 3072;

/// MIME type from the file extension.
pub fn detect_mime(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "txt" => "text/plain",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

fn with_slash(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchUpload {
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub total_files: usize,
    pub uploaded_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
    pub details: Vec<Value>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentEntry {
    pub name: String,
    pub display_name: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: Option<String>,
    pub creation_time: Option<String>,
    pub blob_url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteResult {
    pub blob_name: String,
    pub blob_deleted: bool,
    pub search_documents_deleted: usize,
    pub search_deletion_errors: bool,
    pub success: bool,
    pub message: String,
    pub debug_info: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchDelete {
    pub total_requested: usize,
    pub successful_deletions: usize,
    pub failed_deletions: usize,
    pub details: Vec<DeleteResult>,
}

pub struct DocumentManager {
    indexer: Arc<Indexer>,
    vector_size: usize,
}

impl DocumentManager {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self {
            indexer,
            vector_size: DEFAULT_VECTOR_SIZE,
        }
    }

    /// Vector size used when the collection is rebuilt.
    pub fn with_vector_size(mut self, size: usize) -> Self {
        self.vector_size = size;
        self
    }

    fn blobs(&self) -> &Arc<dyn BlobStore> {
        self.indexer.blobs()
    }

    fn store(&self) -> &Arc<dyn VectorStore> {
        self.indexer.store()
    }

    pub async fn upload_file(&self, blob_name: &str, data: Vec<u8>) -> Value {
        let content_type = detect_mime(blob_name);
        let size = data.len();
        match self.blobs().upload(blob_name, data, content_type).await {
            Ok(()) => json!({
                "success": true,
                "blob_name": blob_name,
                "size": size,
                "content_type": content_type,
                "message": format!("Successfully uploaded {blob_name}"),
            }),
            Err(e) => {
                warn!(blob = blob_name, error = %e, "upload failed");
                json!({
                    "success": false,
                    "blob_name": blob_name,
                    "error": e.to_string(),
                    "message": format!("Failed to upload {blob_name}: {e}"),
                })
            },
        }
    }

    /// Upload `(file name, bytes)` pairs under `prefix`, keeping only the
    /// base name of each file.
    pub async fn batch_upload(&self, files: Vec<(String, Vec<u8>)>, prefix: &str) -> BatchUpload {
        let prefix = with_slash(prefix);
        let mut out = BatchUpload {
            total_files: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            out.message = "No files provided for upload".into();
            return out;
        }

        for (path, data) in files {
            let fname = Path::new(&path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&path)
                .to_string();
            let blob_name = format!("{prefix}{fname}");
            let result = self.upload_file(&blob_name, data).await;
            if result["success"] == true {
                out.successful_uploads += 1;
                out.uploaded_files.push(blob_name);
            } else {
                out.failed_uploads += 1;
                out.failed_files.push(FailedFile {
                    file: fname,
                    error: result["error"].as_str().unwrap_or_default().to_string(),
                });
            }
            out.details.push(result);
        }

        out.message = format!(
            "Upload completed: {} successful, {} failed",
            out.successful_uploads, out.failed_uploads
        );
        out
    }

    /// Index `specific` blobs, or every blob under `prefix` that is not in
    /// the index yet.
    pub async fn index_incremental(&self, prefix: &str, specific: Option<&[String]>) -> Value {
        match self.try_index_incremental(prefix, specific).await {
            Ok(v) => v,
            Err(e) => {
                error!(prefix, error = %e, "indexing failed");
                json!({
                    "success": false,
                    "prefix": prefix,
                    "error": e.to_string(),
                    "message": format!("Failed to index documents: {e}"),
                })
            },
        }
    }

    async fn try_index_incremental(&self, prefix: &str, specific: Option<&[String]>) -> anyhow::Result<Value> {
        let report = match specific {
            Some(names) => {
                info!(files = ?names, "indexing specific files");
                self.indexer.index_blobs(names).await
            },
            None => {
                let indexed = self.indexer.indexed_sources().await.unwrap_or_else(|e| {
                    warn!(error = %e, "could not read indexed sources, indexing everything");
                    Default::default()
                });
                let prefix = with_slash(prefix);
                let names: Vec<String> = self.blobs().list(&prefix).await?.into_iter().map(|b| b.name).collect();
                let new: Vec<String> = names.iter().filter(|n| !indexed.contains(*n)).cloned().collect();
                info!(prefix = %prefix, total = names.len(), new = new.len(), "incremental indexing");
                if new.is_empty() {
                    return Ok(json!({
                        "success": true,
                        "prefix": prefix,
                        "index_report": {
                            "indexed": 0,
                            "skipped": names.len(),
                            "errors": [],
                            "total_chunks": 0,
                            "message": "No new documents to index",
                        },
                        "message": format!(
                            "No new documents to index in {prefix}. All {} documents are already indexed.",
                            names.len()
                        ),
                    }));
                }
                self.indexer.index_blobs(&new).await
            },
        };
        Ok(json!({
            "success": true,
            "prefix": prefix,
            "index_report": report,
            "message": "Successfully processed and indexed documents to Qdrant",
        }))
    }

    /// Upload, then index only the files that were uploaded.
    pub async fn upload_and_index(&self, files: Vec<(String, Vec<u8>)>, prefix: &str) -> Value {
        let upload = self.batch_upload(files, prefix).await;
        if upload.successful_uploads == 0 {
            let message = format!("Upload failed: {}. Indexing skipped.", upload.message);
            return json!({
                "upload_results": upload,
                "index_results": null,
                "overall_success": false,
                "message": message,
            });
        }

        let index = self.index_incremental(prefix, Some(&upload.uploaded_files)).await;
        let message = format!(
            "Upload: {}. Incremental Index: {}",
            upload.message,
            index["message"].as_str().unwrap_or("Completed")
        );
        json!({
            "overall_success": index["success"] == true,
            "upload_results": upload,
            "index_results": index,
            "message": message,
        })
    }

    /// Blobs under `prefix`, most recently modified first.
    pub async fn list_documents(&self, prefix: &str) -> anyhow::Result<Vec<DocumentEntry>> {
        let prefix = with_slash(prefix);
        let mut docs: Vec<DocumentEntry> = self
            .blobs()
            .list(&prefix)
            .await?
            .into_iter()
            .map(|b| DocumentEntry {
                display_name: b.name.replace(&prefix, ""),
                blob_url: self.blobs().url(&b.name),
                size: b.size,
                content_type: b.content_type.unwrap_or_else(|| "unknown".into()),
                last_modified: b.last_modified.map(|t| t.to_rfc3339()),
                creation_time: b.creation_time.map(|t| t.to_rfc3339()),
                name: b.name,
            })
            .collect();
        docs.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(docs)
    }

    /// Ids of the points indexed from `blob_name`: the first filter that
    /// finds anything wins.
    async fn find_points(&self, blob_name: &str) -> Vec<String> {
        for key in ["source", "metadata.source"] {
            let filter = FieldMatch::new(key, blob_name);
            match self.store().scroll(Some(&filter), SCROLL_LIMIT).await {
                Ok(points) if !points.is_empty() => {
                    info!(blob = blob_name, key, found = points.len(), "found indexed chunks");
                    return points.into_iter().map(|p| p.id).collect();
                },
                Ok(_) => {},
                Err(e) => warn!(blob = blob_name, key, error = %e, "point lookup failed"),
            }
        }
        Vec::new()
    }

    /// Remove the indexed chunks of a blob, then the blob itself.
    pub async fn delete_document(&self, blob_name: &str) -> DeleteResult {
        let mut result = DeleteResult {
            blob_name: blob_name.to_string(),
            ..Default::default()
        };

        let ids = self.find_points(blob_name).await;
        result.debug_info = json!({"found_point_ids": ids});
        if !ids.is_empty() {
            match self.store().delete_points(&ids).await {
                Ok(()) => result.search_documents_deleted = ids.len(),
                Err(e) => {
                    error!(blob = blob_name, error = %e, "failed to delete points");
                    result.search_deletion_errors = true;
                },
            }
        }

        result.blob_deleted = match self.blobs().delete(blob_name).await {
            Ok(deleted) => {
                if !deleted {
                    warn!(blob = blob_name, "blob does not exist");
                }
                deleted
            },
            Err(e) => {
                error!(blob = blob_name, error = %e, "failed to delete blob");
                false
            },
        };

        result.success = result.blob_deleted && !result.search_deletion_errors;
        result.message = if result.success {
            format!(
                "✅ Document successfully deleted. Removed {} indexed chunks and 1 blob file.",
                result.search_documents_deleted
            )
        } else {
            "❌ Failed to completely delete document.".into()
        };
        result
    }

    pub async fn batch_delete(&self, blob_names: &[String]) -> BatchDelete {
        let mut out = BatchDelete {
            total_requested: blob_names.len(),
            ..Default::default()
        };
        for name in blob_names {
            let result = self.delete_document(name).await;
            if result.success {
                out.successful_deletions += 1;
            } else {
                out.failed_deletions += 1;
            }
            out.details.push(result);
        }
        out
    }

    /// A few stored points, optionally only those of one blob, with the
    /// approximate collection size.
    pub async fn inspect_sample(&self, blob_name: Option<&str>) -> Value {
        let filter = blob_name.map(|b| FieldMatch::new("metadata.source", b));
        let sample = async {
            let points = self.store().scroll(filter.as_ref(), SAMPLE_SIZE).await?;
            let count = self.store().count().await?;
            anyhow::Ok((points, count))
        };
        match sample.await {
            Ok((points, count)) => json!({
                "total_documents_approx": count,
                "sample_documents": points
                    .into_iter()
                    .map(|p| json!({"id": p.id, "payload": p.payload}))
                    .collect::<Vec<_>>(),
                "collection_name": self.store().collection_name(),
            }),
            Err(e) => json!({"error": format!("Failed to inspect Qdrant collection: {e}")}),
        }
    }

    pub async fn collection_info(&self) -> Value {
        self.store()
            .collection_info()
            .await
            .unwrap_or_else(|e| json!({"error": format!("Failed to get Qdrant collection info: {e}")}))
    }

    /// Drop and recreate the collection, then index everything under
    /// `prefix`.
    pub async fn rebuild_index(&self, prefix: &str) -> Value {
        let collection = self.store().collection_name().to_string();
        let rebuild = async {
            warn!(collection = %collection, "recreating collection");
            self.store().recreate_collection(self.vector_size).await?;
            info!(collection = %collection, prefix, "re-indexing all documents");
            self.indexer.index_prefix(prefix).await
        };
        match rebuild.await {
            Ok(report) => json!({
                "success": true,
                "message": format!("Successfully rebuilt index {collection}."),
                "index_report": report,
            }),
            Err(e) => {
                error!(collection = %collection, error = %e, "rebuild failed");
                json!({"error": format!("Failed to rebuild index: {e}")})
            },
        }
    }

    /// Full (non-incremental) index of `prefix`.
    pub async fn index_all(&self, prefix: &str) -> anyhow::Result<IndexReport> {
        self.indexer.index_prefix(prefix).await
    }
}
