use std::collections::HashMap;

use super::types::{Document, DocumentMetadata};

/// Strip every metadata field except `source`.
///
/// `content_type` survives as the loader's annotation; `extra` (page numbers,
/// PDF producer info and the like) is discarded.
#[must_use]
pub fn reduce_metadata(documents: Vec<Document>) -> Vec<Document> {
    let reduced: Vec<Document> = documents
        .into_iter()
        .map(|doc| Document {
            content: doc.content,
            metadata: DocumentMetadata {
                source: doc.metadata.source,
                content_type: doc.metadata.content_type,
                extra: HashMap::new(),
            },
        })
        .collect();
    tracing::debug!(documents = reduced.len(), "reduced document metadata");
    reduced
}
