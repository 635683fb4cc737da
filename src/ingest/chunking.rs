//! Sentence-packing chunker for extracted PDF text.
//!
//! Sentences are packed greedily into chunks of roughly
//! `chunk_size_tokens * 4` characters (the usual chars-per-token rule of
//! thumb), and each chunk after the first starts with the tail sentences
//! of its predecessor so answers spanning a boundary stay retrievable.

use chrono::Utc;

use crate::models::DocumentChunk;

const CHARS_PER_TOKEN: usize = 4;

pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    pub fn new(chunk_size_tokens: usize, chunk_overlap_tokens: usize) -> Self {
        Self {
            max_chars: chunk_size_tokens.max(1) * CHARS_PER_TOKEN,
            overlap_chars: chunk_overlap_tokens * CHARS_PER_TOKEN,
        }
    }

    /// Split extracted text into indexed chunks for one document.
    /// Chunk ids are `{fileId}_{chunkIndex}`.
    pub fn chunk_document(
        &self,
        file_id: &str,
        title: &str,
        file_name: &str,
        url: &str,
        text: &str,
    ) -> Vec<DocumentChunk> {
        let pieces = self.split_text(text);
        let timestamp = Utc::now();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| DocumentChunk {
                chunk_id: format!("{file_id}_{index}"),
                chunk_content: content,
                chunk_index: index,
                document_title: title.to_string(),
                file_name: file_name.to_string(),
                document_url: url.to_string(),
                file_id: file_id.to_string(),
                created_timestamp: timestamp,
            })
            .collect()
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        if normalized.len() <= self.max_chars {
            return vec![normalized];
        }

        let sentences = split_sentences(&normalized);
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;

        for sentence in sentences {
            // Oversized single sentence: hard-split on char boundaries
            if sentence.len() > self.max_chars {
                if !current.is_empty() {
                    chunks.push(current.join(" "));
                    current = self.overlap_tail(&chunks);
                    current_len = current.iter().map(|s| s.len() + 1).sum();
                }
                for piece in hard_split(&sentence, self.max_chars) {
                    chunks.push(piece);
                }
                continue;
            }

            if current_len + sentence.len() + 1 > self.max_chars && !current.is_empty() {
                chunks.push(current.join(" "));
                current = self.overlap_tail(&chunks);
                current_len = current.iter().map(|s| s.len() + 1).sum();
                // A large overlap must not push the next chunk past the
                // size budget; shed tail sentences until the incoming
                // sentence fits
                while !current.is_empty()
                    && current_len + sentence.len() + 1 > self.max_chars
                {
                    let removed = current.remove(0);
                    current_len -= removed.len() + 1;
                }
            }
            current_len += sentence.len() + 1;
            current.push(sentence);
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }

    /// Trailing sentences of the last emitted chunk, up to the overlap
    /// budget, newest-last.
    fn overlap_tail(&self, chunks: &[String]) -> Vec<String> {
        if self.overlap_chars == 0 {
            return Vec::new();
        }
        let Some(last) = chunks.last() else {
            return Vec::new();
        };
        let mut tail: Vec<String> = Vec::new();
        let mut taken = 0usize;
        for sentence in split_sentences(last).into_iter().rev() {
            if taken + sentence.len() > self.overlap_chars {
                break;
            }
            taken += sentence.len() + 1;
            tail.push(sentence);
        }
        tail.reverse();
        tail
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Naive sentence splitter: break after `.`, `!`, `?` followed by a space.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &byte) in bytes.iter().enumerate() {
        if matches!(byte, b'.' | b'!' | b'?') && bytes.get(i + 1) == Some(&b' ') {
            let sentence = text[start..=i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = i + 2;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < sentence.len() {
        let mut end = (start + max_chars).min(sentence.len());
        while !sentence.is_char_boundary(end) {
            end -= 1;
        }
        pieces.push(sentence[start..end].to_string());
        start = end;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::new(300, 50);
        let chunks = chunker.chunk_document("f1", "T", "t.pdf", "u", "Short text.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "f1_0");
        assert_eq!(chunks[0].chunk_content, "Short text.");
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::new(300, 50);
        assert!(chunker
            .chunk_document("f1", "T", "t.pdf", "u", "   \n\t ")
            .is_empty());
    }

    #[test]
    fn test_chunk_ids_are_sequential() {
        let chunker = Chunker::new(10, 0);
        let text = "One sentence here. Another sentence here. And a third one. Plus a fourth.";
        let chunks = chunker.chunk_document("abc", "T", "t.pdf", "u", text);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, format!("abc_{i}"));
            assert_eq!(chunk.chunk_index, i);
        }
    }

    #[test]
    fn test_chunks_respect_size_ceiling() {
        let chunker = Chunker::new(15, 0);
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        for chunk in chunker.chunk_document("f", "T", "t.pdf", "u", text) {
            assert!(chunk.chunk_content.len() <= 15 * CHARS_PER_TOKEN);
        }
    }

    #[test]
    fn test_overlap_repeats_trailing_sentence() {
        let chunker = Chunker::new(15, 10);
        let text = "First part here. Second part here. Third part here. Fourth part here.";
        let chunks = chunker.chunk_document("f", "T", "t.pdf", "u", text);
        assert!(chunks.len() > 1);
        let first_tail = split_sentences(&chunks[0].chunk_content)
            .pop()
            .unwrap();
        assert!(chunks[1].chunk_content.contains(&first_tail));
    }

    #[test]
    fn test_large_overlap_still_respects_size_ceiling() {
        // Overlap budget far bigger than the chunk budget
        let chunker = Chunker::new(10, 100);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. \
                    Nu xi omicron pi. Rho sigma tau upsilon.";
        let chunks = chunker.chunk_document("f", "T", "t.pdf", "u", text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chunk_content.len() <= 10 * CHARS_PER_TOKEN,
                "chunk over budget: {:?}",
                chunk.chunk_content
            );
        }
    }

    #[test]
    fn test_oversized_sentence_hard_split() {
        let chunker = Chunker::new(5, 0);
        let text = "x".repeat(100);
        let chunks = chunker.chunk_document("f", "T", "t.pdf", "u", &text);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.chunk_content.len() <= 20));
    }

    #[test]
    fn test_whitespace_normalized() {
        let chunker = Chunker::new(300, 0);
        let chunks = chunker.chunk_document("f", "T", "t.pdf", "u", "a\n\nb\t c");
        assert_eq!(chunks[0].chunk_content, "a b c");
    }
}
