//! Recursive character splitter.
//!
//! Splits on the coarsest separator present (`"\n\n"`, `"\n"`, `" "`, then
//! per character), recursing into pieces that are still too long, and merges
//! neighbouring pieces back up to `chunk_size` characters with up to
//! `chunk_overlap` characters carried into the next chunk. Separators stay
//! attached to the start of the piece that follows them. Lengths are counted
//! in `char`s; chunks are whitespace-trimmed and never empty.

use std::collections::VecDeque;

use crate::errors::RagError;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Clone, Debug)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk size must be > 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut rest: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                rest = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<String> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, rest));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily packs pieces into chunks, rolling a window of at most
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(dropped) => total -= char_len(dropped),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_joined(&mut out, &window);
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Splits on `separator`, prefixing every piece after the first with it.
/// An empty separator splits into characters. Empty pieces are dropped.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    let mut parts = text.split(separator);
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{separator}{part}"));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_not_below_size() {
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn short_text_is_one_trimmed_chunk() {
        let s = TextSplitter::new(1000, 200).unwrap();
        assert_eq!(s.split("  hello world \n"), vec!["hello world".to_string()]);
        assert!(s.split("   \n\n  ").is_empty());
        assert!(s.split("").is_empty());
    }

    #[test]
    fn splits_on_paragraphs_first() {
        let s = TextSplitter::new(12, 0).unwrap();
        let chunks = s.split("aaaa bbbb\n\ncccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb".to_string(), "cccc dddd".to_string()]);
    }

    #[test]
    fn words_overlap_between_chunks() {
        let s = TextSplitter::new(10, 4).unwrap();
        let chunks = s.split("one two three four five");
        assert_eq!(
            chunks,
            vec![
                "one two".to_string(),
                "two three".to_string(),
                "four five".to_string(),
            ]
        );
    }

    #[test]
    fn overlap_carries_trailing_words() {
        let s = TextSplitter::new(12, 6).unwrap();
        let chunks = s.split("aa bb cc dd ee ff");
        assert_eq!(
            chunks,
            vec![
                "aa bb cc dd".to_string(),
                "cc dd ee ff".to_string(),
            ]
        );
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let s = TextSplitter::new(4, 0).unwrap();
        let chunks = s.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let s = TextSplitter::new(3, 0).unwrap();
        let chunks = s.split("ёжик");
        assert_eq!(chunks, vec!["ёжи", "к"]);
        for c in &chunks {
            assert!(c.chars().count() <= 3);
        }
    }

    #[test]
    fn chunks_respect_size_on_realistic_text() {
        let s = TextSplitter::new(100, 20).unwrap();
        let para = "Rust makes systems programming approachable. ".repeat(10);
        let text = format!("{para}\n\n{para}\n{para}");
        let chunks = s.split(&text);
        assert!(chunks.len() > 3);
        for c in &chunks {
            assert!(c.chars().count() <= 100, "chunk too long: {}", c.len());
            assert!(!c.trim().is_empty());
        }
    }
}
