//! Overlapping text chunks for retrieval.

use text_splitter::{ChunkConfig, TextSplitter};

use crate::error::{Result, ToolError};

/// Target chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Characters shared by neighbouring chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Splits documents into overlapping chunks.
///
/// Boundaries are chosen from the coarsest level that keeps chunks within
/// size: paragraphs, then lines, sentences, words, and finally characters.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. The overlap must be smaller than the chunk size.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 || overlap >= size {
            return Err(ToolError::internal(format!(
                "invalid chunking: size {size}, overlap {overlap}"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into owned chunks, in document order.
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        let config = ChunkConfig::new(self.size)
            .with_overlap(self.overlap)
            .map_err(|e| ToolError::internal(format!("invalid chunk config: {e}")))?;
        let splitter = TextSplitter::new(config);

        Ok(splitter.chunks(text).map(str::to_string).collect())
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_overlap() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 10).is_ok());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = Chunker::default().split("A short note.").unwrap();
        assert_eq!(chunks, vec!["A short note."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(Chunker::default().split("").unwrap().is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");

        let chunker = Chunker::new(200, 20).unwrap();
        let chunks = chunker.split(&text).unwrap();

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "First paragraph about apples.";
        let second = "Second paragraph about pears.";
        let chunker = Chunker::new(40, 0).unwrap();

        let chunks = chunker.split(&format!("{first}\n\n{second}")).unwrap();
        assert_eq!(chunks, vec![first, second]);
    }
}
