//! Retrieval-augmented Q&A over internal documents: layout analysis,
//! structure-aware chunking, embeddings, vector search and answering, plus
//! the document management operations around the index.

pub mod answer;
pub mod azure_blob;
pub mod blob;
pub mod chunker;
pub mod documents;
pub mod embeddings;
pub mod extract;
pub mod indexer;
pub mod layout;
pub mod prompt;
pub mod qdrant;
pub mod query;
pub mod rerank;
pub mod tables;
pub mod text;
pub mod vector_store;

pub use {
    answer::{NO_RESULTS_ANSWER, RagService},
    azure_blob::{AzureBlobStore, StorageAccount},
    blob::{BlobItem, BlobStore, InMemoryBlobStore},
    documents::{DocumentManager, detect_mime},
    embeddings::{AzureEmbeddingProvider, EmbeddingProvider},
    indexer::{IndexReport, Indexer},
    layout::{AzureLayoutAnalyzer, DocumentAnalyzer},
    qdrant::QdrantStore,
    query::is_document_listing_query,
    vector_store::{InMemoryVectorStore, VectorStore},
};
