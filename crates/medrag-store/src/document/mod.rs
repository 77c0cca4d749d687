pub mod error;
pub mod loader;
pub mod pipeline;
pub mod reduce;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{DirectoryLoader, PdfLoader, TextLoader};
pub use pipeline::{IngestOptions, IngestReport, IngestionPipeline, point_id};
pub use reduce::reduce_metadata;
pub use splitter::{DEFAULT_SEPARATORS, SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentMetadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &std::path::Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>,
    >;

    fn supported_extensions(&self) -> &[&str];
}
