//! Vector index backends and the document ingestion pipeline.

pub mod document;
pub mod in_memory_store;
pub mod pinecone;
pub mod qdrant_ops;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use pinecone::{PineconeConfig, PineconeStore};
pub use qdrant_ops::QdrantOps;
pub use vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, wait_until_ready,
};
