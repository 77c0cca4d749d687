use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
};
use super::check_size;

/// Extracts text from a PDF, one document per page.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = tokio::fs::canonicalize(&path).await?;
            check_size(&path, max_size).await?;

            let source = path.display().to_string();
            let path_buf = path.clone();
            let source_for_err = source.clone();
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&path_buf).map_err(|e| DocumentError::Pdf {
                    path: source_for_err,
                    message: e.to_string(),
                })
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            tracing::debug!(source = %source, pages = pages.len(), "extracted PDF text");

            Ok(pages
                .into_iter()
                .enumerate()
                .map(|(page, content)| Document {
                    content,
                    metadata: DocumentMetadata {
                        source: source.clone(),
                        content_type: "application/pdf".to_owned(),
                        extra: HashMap::from([("page".to_owned(), page.to_string())]),
                    },
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
