mod directory;
mod pdf;
mod text;

pub use directory::DirectoryLoader;
pub use pdf::PdfLoader;
pub use text::TextLoader;

use std::path::Path;

use super::{DocumentError, DocumentLoader};

async fn check_size(path: &Path, max_size: u64) -> Result<(), DocumentError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn supports(loader: &dyn DocumentLoader, ext: &str) -> bool {
    loader.supported_extensions().contains(&ext)
}
