//! Character-bounded chunking of extracted document text.
//!
//! Boundaries are chosen in order of preference:
//!
//! - Paragraphs: a whitespace run containing two or more line breaks ends a paragraph; the run
//!   stays attached to the paragraph it follows.
//! - Sentences: inside an oversized paragraph, `.`, `!` or `?` followed by whitespace ends a
//!   sentence; the whitespace stays with the sentence.
//! - Hard splits: a sentence still longer than the limit is cut every `max_chunk_chars`
//!   characters. This is the last resort and is logged at `warn`.
//!
//! The resulting units are packed greedily, in order, into chunks of at most `max_chunk_chars`
//! characters. Whitespace-only units never start a chunk: they ride along with the text they
//! follow (or, at the very start, the text they precede), so every chunk carries text and only
//! surrounding whitespace can take a chunk past the limit. Chunks are contiguous slices of the
//! input, so concatenating their contents reproduces the text exactly.

use serde::Serialize;
use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;
use thiserror::Error;

/// Errors produced while chunking text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The chunk limit was zero.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// A contiguous slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Position in document order, starting at zero.
    pub index: usize,
    /// Chunk text.
    pub content: String,
    /// Character (Unicode scalar) offsets of the chunk within the source text.
    pub char_range: Range<usize>,
}

/// A boundary-aligned piece of text: byte slice plus its character count.
struct Unit<'a> {
    text: &'a str,
    chars: usize,
}

/// Split `text` into ordered chunks of at most `max_chunk_chars` characters.
///
/// Pure and deterministic. Empty input yields no chunks.
pub fn split(text: &str, max_chunk_chars: usize) -> Result<Vec<TextChunk>, ChunkingError> {
    if max_chunk_chars == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut units = Vec::new();
    let mut hard_splits = 0usize;
    for paragraph in paragraphs(text) {
        let chars = paragraph.chars().count();
        if chars <= max_chunk_chars {
            units.push(Unit {
                text: paragraph,
                chars,
            });
            continue;
        }
        for sentence in sentences(paragraph) {
            let chars = sentence.chars().count();
            if chars <= max_chunk_chars {
                units.push(Unit {
                    text: sentence,
                    chars,
                });
            } else {
                hard_splits += 1;
                units.extend(hard_split(sentence, max_chunk_chars));
            }
        }
    }

    if hard_splits > 0 {
        tracing::warn!(
            sentences = hard_splits,
            max_chunk_chars,
            "Sentences exceeded the chunk limit and were split mid-sentence"
        );
    }

    Ok(pack(units, max_chunk_chars))
}

fn pack(units: Vec<Unit<'_>>, max_chunk_chars: usize) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut content = String::new();
    let mut chunk_chars = 0usize;
    let mut chunk_start = 0usize;
    let mut has_text = false;

    for unit in units {
        let blank = unit.text.trim().is_empty();
        if has_text && !blank && chunk_chars + unit.chars > max_chunk_chars {
            chunks.push(TextChunk {
                index: chunks.len(),
                content: std::mem::take(&mut content),
                char_range: chunk_start..chunk_start + chunk_chars,
            });
            chunk_start += chunk_chars;
            chunk_chars = 0;
            has_text = false;
        }
        content.push_str(unit.text);
        chunk_chars += unit.chars;
        has_text |= !blank;
    }

    if chunk_chars > 0 {
        chunks.push(TextChunk {
            index: chunks.len(),
            content,
            char_range: chunk_start..chunk_start + chunk_chars,
        });
    }

    chunks
}

/// Consume a whitespace run; returns the byte offset just past it and how many `\n` it held.
fn consume_whitespace(chars: &mut Peekable<CharIndices<'_>>) -> Option<(usize, usize)> {
    let mut end = None;
    let mut newlines = 0;
    while let Some(&(offset, ch)) = chars.peek() {
        if !ch.is_whitespace() {
            break;
        }
        newlines += usize::from(ch == '\n');
        end = Some(offset + ch.len_utf8());
        chars.next();
    }
    end.map(|end| (end, newlines))
}

fn paragraphs(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some(&(_, ch)) = chars.peek() {
        if !ch.is_whitespace() {
            chars.next();
            continue;
        }
        if let Some((end, newlines)) = consume_whitespace(&mut chars) {
            if newlines >= 2 && end < text.len() {
                pieces.push(&text[start..end]);
                start = end;
            }
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn sentences(paragraph: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        if let Some((end, _)) = consume_whitespace(&mut chars) {
            if end < paragraph.len() {
                pieces.push(&paragraph[start..end]);
                start = end;
            }
        }
    }

    if start < paragraph.len() {
        pieces.push(&paragraph[start..]);
    }
    pieces
}

fn hard_split(sentence: &str, max_chunk_chars: usize) -> Vec<Unit<'_>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = 0;

    for (offset, _) in sentence.char_indices() {
        if chars == max_chunk_chars {
            pieces.push(Unit {
                text: &sentence[start..offset],
                chars,
            });
            start = offset;
            chars = 0;
        }
        chars += 1;
    }

    if chars > 0 {
        pieces.push(Unit {
            text: &sentence[start..],
            chars,
        });
    }
    pieces
}
