use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use super::super::{Document, DocumentError, DocumentLoader};
use super::{PdfLoader, TextLoader, extension_of, supports};

const PATTERN_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Loads every matching file in a directory, in path order.
pub struct DirectoryLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
    extensions: Vec<String>,
    pattern: Option<Pattern>,
    recursive: bool,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new(vec!["pdf".to_owned()])
    }
}

impl std::fmt::Debug for DirectoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLoader")
            .field("loaders", &self.loaders.len())
            .field("extensions", &self.extensions)
            .field("pattern", &self.pattern.as_ref().map(Pattern::as_str))
            .field("recursive", &self.recursive)
            .finish()
    }
}

impl DirectoryLoader {
    /// Loader for the given extensions with the built-in PDF and text loaders.
    #[must_use]
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            loaders: vec![Box::new(PdfLoader::default()), Box::new(TextLoader::default())],
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            pattern: None,
            recursive: false,
        }
    }

    /// Only load files whose path relative to the directory matches `pattern`,
    /// e.g. `*.pdf`. Matching ignores case.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid glob.
    pub fn with_glob(mut self, pattern: &str) -> Result<Self, DocumentError> {
        self.pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.loaders = vec![
            Box::new(PdfLoader { max_file_size }),
            Box::new(TextLoader { max_file_size }),
        ];
        self
    }

    fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = extension_of(path)?;
        if !self.extensions.iter().any(|e| *e == ext) {
            return None;
        }
        self.loaders
            .iter()
            .map(|l| &**l)
            .find(|l| supports(*l, &ext))
    }

    /// Matching files under `dir`, sorted by path.
    ///
    /// Hidden entries are skipped; ignore files are not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not a directory or cannot be walked.
    pub async fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
        let is_dir = tokio::fs::metadata(dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(DocumentError::NotADirectory(dir.to_path_buf()));
        }

        let root = dir.to_path_buf();
        let max_depth = if self.recursive { None } else { Some(1) };
        let entries = tokio::task::spawn_blocking(move || {
            ignore::WalkBuilder::new(&root)
                .standard_filters(false)
                .hidden(true)
                .max_depth(max_depth)
                .build()
                .filter(|entry| {
                    entry
                        .as_ref()
                        .map_or(true, |e| e.file_type().is_some_and(|ft| ft.is_file()))
                })
                .map(|entry| entry.map(ignore::DirEntry::into_path))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

        let mut files: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| self.matches_pattern(dir, path) && self.loader_for(path).is_some())
            .collect();
        files.sort();
        Ok(files)
    }

    fn matches_pattern(&self, dir: &Path, path: &Path) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };
        let relative = path.strip_prefix(dir).unwrap_or(path);
        pattern.matches_path_with(relative, PATTERN_OPTIONS)
    }

    /// Load every matching file. The first failing file aborts the load.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or any file fails to load.
    pub async fn load(&self, dir: &Path) -> Result<Vec<Document>, DocumentError> {
        let files = self.files(dir).await?;
        let mut documents = Vec::new();
        for file in &files {
            let loader = self
                .loader_for(file)
                .ok_or_else(|| DocumentError::UnsupportedFormat(file.display().to_string()))?;
            let docs = loader.load(file).await?;
            tracing::debug!(file = %file.display(), documents = docs.len(), "loaded file");
            documents.extend(docs);
        }
        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            documents = documents.len(),
            "loaded documents"
        );
        Ok(documents)
    }
}
