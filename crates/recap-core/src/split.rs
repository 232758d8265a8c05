//! Recursive token-bounded transcript splitting.
//!
//! Partitions an over-length transcript into chunks that each fit a token
//! budget, splitting near the midpoint at sentence boundaries so chunk
//! sizes stay roughly balanced and sentences stay intact. Recursion depth
//! is O(log(total/budget)).

use crate::token::TokenCounter;

/// A contiguous piece of a transcript with its measured token length.
///
/// Chunks partition the input in order, with no gaps or overlaps; the
/// single boundary space consumed at each sentence split is the only text
/// not carried into a chunk. Invariant: `tokens <= budget` at creation,
/// except for a unit that cannot be split further.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub tokens: usize,
}

/// Split `text` into an ordered sequence of token-bounded chunks.
///
/// Pure function: always terminates and always returns at least one chunk.
/// An input with no split point left (fewer than two characters) is emitted
/// as an oversized chunk rather than recursing forever.
pub fn split_transcript(text: &str, budget: usize, counter: &TokenCounter) -> Vec<Chunk> {
    let tokens = counter.count(text);
    if tokens < budget {
        return vec![Chunk {
            text: text.to_string(),
            tokens,
        }];
    }

    let char_count = text.chars().count();
    if char_count < 2 {
        // Irreducible unit over budget: forward progress over strict
        // budget adherence.
        return vec![Chunk {
            text: text.to_string(),
            tokens,
        }];
    }

    let mid = char_count / 2;
    let mid_byte = byte_offset(text, mid);

    // Last ". " whose period sits at or before the midpoint character. The
    // search window extends one character past the midpoint so a period at
    // the midpoint itself still finds its trailing space.
    let search_end = byte_offset(text, mid + 2);
    let boundary = text[..search_end].rfind(". ").filter(|&p| p <= mid_byte);

    let (left, right) = match boundary {
        // Left half keeps the period; the boundary space is consumed.
        Some(p) => (&text[..p + 1], &text[p + 2..]),
        // No sentence boundary in reach: split at the raw character
        // midpoint, consuming nothing.
        None => (&text[..mid_byte], &text[mid_byte..]),
    };

    let mut chunks = split_transcript(left, budget, counter);
    if !right.is_empty() {
        chunks.extend(split_transcript(right, budget, counter));
    }
    chunks
}

/// Byte offset of the character at `index`, or the text length when the
/// index is past the end.
fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn transcript(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Speaker one made point number {} in some detail.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_below_budget_returns_input_unchanged() {
        let counter = TokenCounter::approximate();
        let text = "Short enough to summarize in one pass.";

        let chunks = split_transcript(text, 1000, &counter);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].tokens, counter.count(text));
    }

    #[test]
    fn test_chunks_fit_budget_and_reconstruct_input() {
        let counter = TokenCounter::approximate();
        let text = transcript(200);
        let budget = 100;

        let chunks = split_transcript(&text, budget, &counter);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.tokens <= budget,
                "chunk of {} tokens exceeds budget {}",
                chunk.tokens,
                budget
            );
        }

        // Only the boundary spaces consumed at split points are missing.
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(strip_whitespace(&joined), strip_whitespace(&text));
    }

    #[test]
    fn test_splits_prefer_sentence_boundaries() {
        let counter = TokenCounter::approximate();
        let text = transcript(100);

        let chunks = split_transcript(&text, 120, &counter);

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with('.'),
                "non-final chunk does not end at a sentence boundary: {:?}",
                &chunk.text[chunk.text.len().saturating_sub(20)..]
            );
        }
    }

    #[test]
    fn test_chunk_sizes_roughly_balanced() {
        let counter = TokenCounter::approximate();
        let text = transcript(200);

        let chunks = split_transcript(&text, 200, &counter);

        assert!(chunks.len() > 1);
        let largest = chunks.iter().map(|c| c.tokens).max().unwrap();
        let smallest = chunks.iter().map(|c| c.tokens).min().unwrap();
        assert!(
            largest <= smallest * 4,
            "unbalanced chunks: smallest {} largest {}",
            smallest,
            largest
        );
    }

    #[test]
    fn test_no_sentence_boundary_splits_at_midpoint() {
        let counter = TokenCounter::approximate();
        // One long unbroken run, no ". " anywhere
        let text = "x".repeat(400);

        let chunks = split_transcript(&text, 50, &counter);

        assert!(chunks.len() > 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
        for chunk in &chunks {
            assert!(chunk.tokens <= 50);
        }
    }

    #[test]
    fn test_irreducible_unit_emitted_oversized() {
        let counter = TokenCounter::approximate();
        let text = "abcdefgh";

        // Budget of 1 token cannot hold even a single character's count,
        // so recursion bottoms out at one-character oversized chunks.
        let chunks = split_transcript(text, 1, &counter);

        assert_eq!(chunks.len(), 8);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let counter = TokenCounter::approximate();
        let text = "Zvukový záznam pokračoval ďalej bez prestávky".repeat(8);

        let chunks = split_transcript(&text, 20, &counter);

        assert!(chunks.len() > 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(strip_whitespace(&joined), strip_whitespace(&text));
    }
}
