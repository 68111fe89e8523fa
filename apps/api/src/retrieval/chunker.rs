//! Character-window chunker for résumé text.
//!
//! Text is whitespace-normalised first, then cut into windows of at most
//! `max_chars` characters, each starting `overlap` characters before the end
//! of its predecessor. Lengths are counted in `char`s, never bytes, so a
//! window boundary can't split a multi-byte code point.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// Creates a validated config: `max_chars > 0` and `overlap < max_chars`.
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self, AppError> {
        if max_chars == 0 {
            return Err(AppError::Validation(
                "chunk max_chars must be greater than 0".to_string(),
            ));
        }
        if overlap >= max_chars {
            return Err(AppError::Validation(format!(
                "chunk overlap ({overlap}) must be less than max_chars ({max_chars})"
            )));
        }
        Ok(Self { max_chars, overlap })
    }

    /// Overlap actually applied. A config built by hand with `overlap >= max_chars`
    /// degrades to non-overlapping windows instead of stalling.
    fn effective_overlap(&self) -> usize {
        if self.overlap < self.max_chars {
            self.overlap
        } else {
            0
        }
    }
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into overlapping windows. Blank input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let cleaned = normalize_whitespace(text);
    if cleaned.is_empty() || config.max_chars == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the string.
    let boundaries: Vec<usize> = cleaned
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(cleaned.len()))
        .collect();
    let length = boundaries.len() - 1;
    let overlap = config.effective_overlap();

    let mut chunks = Vec::new();
    let mut start = 0_usize;

    while start < length {
        let end = (start + config.max_chars).min(length);
        chunks.push(cleaned[boundaries[start]..boundaries[end]].to_string());
        if end == length {
            break;
        }
        start = end.saturating_sub(overlap);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text(len: usize) -> String {
        // Non-repeating enough that overlap checks aren't trivially satisfied.
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_default_config() {
        let config = ChunkConfig::default();
        assert_eq!(config.max_chars, 1000);
        assert_eq!(config.overlap, 200);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(1000, 200).is_ok());
        assert!(ChunkConfig::new(200, 200).is_err());
        assert!(ChunkConfig::new(200, 300).is_err());
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_empty_and_whitespace_yield_no_chunks() {
        let config = ChunkConfig::default();
        assert!(chunk_text("", &config).is_empty());
        assert!(chunk_text("   \n\t  ", &config).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Experience:\n  Rust   engineer", &ChunkConfig::default());
        assert_eq!(chunks, vec!["Experience: Rust engineer".to_string()]);
    }

    #[test]
    fn test_2300_chars_gives_three_chunks_sharing_200() {
        let text = sample_text(2300);
        let chunks = chunk_text(&text, &ChunkConfig::default());
        assert_eq!(chunks.len(), 3);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 200).collect();
            let head: String = pair[1].chars().take(200).collect();
            assert_eq!(tail, head);
        }
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }

    #[test]
    fn test_chunk_count_formula() {
        let config = ChunkConfig::new(100, 30).unwrap();
        for len in [1_usize, 50, 100, 101, 170, 171, 500, 999] {
            let chunks = chunk_text(&sample_text(len), &config);
            let expected = if len > config.max_chars {
                (len - config.overlap).div_ceil(config.max_chars - config.overlap)
            } else {
                1
            };
            assert_eq!(chunks.len(), expected, "len={len}");
        }
    }

    #[test]
    fn test_reconstruction_reproduces_normalized_text() {
        let config = ChunkConfig::new(120, 40).unwrap();
        let raw = "Skills:  Rust, C++, C#\n\nnode.js  ".repeat(30);
        let chunks = chunk_text(&raw, &config);
        assert_eq!(reconstruct(&chunks, config.overlap), normalize_whitespace(&raw));
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let config = ChunkConfig::new(10, 3).unwrap();
        let text = "résumé naïve café ".repeat(5);
        let chunks = chunk_text(&text, &config);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(reconstruct(&chunks, 3), normalize_whitespace(&text));
    }

    #[test]
    fn test_overlap_not_below_max_degrades_without_looping() {
        let config = ChunkConfig {
            max_chars: 10,
            overlap: 10,
        };
        let chunks = chunk_text(&sample_text(35), &config);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), sample_text(35));
    }
}
