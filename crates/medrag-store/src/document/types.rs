use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    /// Byte offset within the document where the fresh text (after the overlap) starts.
    pub start_offset: usize,
    /// Leading characters repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// Content with the repeated prefix removed.
    #[must_use]
    pub fn fresh_content(&self) -> &str {
        let skip = self
            .content
            .char_indices()
            .nth(self.overlap)
            .map_or(self.content.len(), |(i, _)| i);
        &self.content[skip..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_content_skips_overlap_chars() {
        let chunk = Chunk {
            content: "ébc def".into(),
            source: "s".into(),
            chunk_index: 1,
            start_offset: 0,
            overlap: 2,
        };
        assert_eq!(chunk.fresh_content(), "c def");
    }

    #[test]
    fn fresh_content_without_overlap() {
        let chunk = Chunk {
            content: "abc".into(),
            source: "s".into(),
            chunk_index: 0,
            start_offset: 0,
            overlap: 0,
        };
        assert_eq!(chunk.fresh_content(), "abc");
    }
}
