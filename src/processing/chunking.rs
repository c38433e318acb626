//! Character-bounded semantic chunking with a sliding overlap.
//!
//! Oracle prompts are budgeted in characters, so chunk boundaries are chosen by `semchunk-rs`
//! with a character counter instead of a tokenizer. Every chunk after the first is prefixed
//! with the tail of its predecessor so a clause cut at a boundary is still seen whole by one of
//! the two calls.

use semchunk_rs::Chunker;

use super::types::ChunkingError;

/// Overlap applied between consecutive chunks unless configured otherwise.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Split `text` into chunks of at most `max_length` characters.
///
/// Text that already fits is returned unchanged as the only element. Longer text is split on
/// semantic boundaries (paragraphs, sentences, words) and consecutive chunks share up to
/// `overlap` characters, aligned to a word start where possible.
pub fn split_text(
    text: &str,
    max_length: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if max_length == 0 {
        return Err(ChunkingError::InvalidChunkLength);
    }
    if char_len(text) <= max_length {
        return Ok(vec![text.to_string()]);
    }

    // Leave at least half of every chunk for text the previous call has not seen.
    let overlap = overlap.min(max_length / 2);
    let base_length = max_length - overlap;
    let chunker = Chunker::new(base_length, Box::new(char_len));
    let base_chunks: Vec<String> = bounded_pieces(text, base_length)
        .into_iter()
        .flat_map(|piece| {
            // The splitter falls back to byte-indexed character splitting when a piece has no
            // break point, which is only sound for ASCII. Such pieces already fit.
            if piece.chars().any(is_break_point) {
                chunker.chunk(piece)
            } else {
                vec![piece.to_string()]
            }
        })
        .filter(|chunk| !chunk.trim().is_empty())
        .collect();
    tracing::trace!(
        chars = char_len(text),
        max_length,
        overlap,
        chunks = base_chunks.len(),
        "Split oversized unit"
    );
    Ok(apply_overlap(base_chunks, max_length, overlap))
}

/// Characters `semchunk-rs` splits on besides whitespace.
const BREAK_CHARS: &[char] = &[
    '.', '?', '!', '*', ';', ',', '(', ')', '[', ']', '\u{201c}', '\u{201d}', '\u{2018}',
    '\u{2019}', '\'', '"', '`', ':', '\u{2014}', '\u{2026}', '/', '\\', '\u{2013}', '&', '-',
];

fn is_break_point(ch: char) -> bool {
    ch.is_whitespace() || BREAK_CHARS.contains(&ch)
}

/// Cut `text` on character boundaries so that no run without a break point is longer than
/// `limit` characters. Pieces are contiguous and concatenate back to `text`.
fn bounded_pieces(text: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut run = 0;
    for (offset, ch) in text.char_indices() {
        if is_break_point(ch) {
            run = 0;
            continue;
        }
        if run == limit {
            pieces.push(&text[piece_start..offset]);
            piece_start = offset;
            run = 0;
        }
        run += 1;
    }
    pieces.push(&text[piece_start..]);
    pieces
}

fn apply_overlap(chunks: Vec<String>, max_length: usize, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for current in chunks {
        let chunk = match previous.as_deref() {
            None => current.clone(),
            Some(prev) => {
                // One extra character goes to the separating space.
                let budget = overlap.min(max_length.saturating_sub(char_len(&current) + 1));
                let tail = overlap_tail(prev, budget);
                if tail.is_empty() {
                    current.clone()
                } else {
                    format!("{tail} {current}")
                }
            }
        };
        overlapped.push(chunk);
        previous = Some(current);
    }
    overlapped
}

/// Last `limit` characters of `text`, moved forward to a word start when the cut lands inside
/// a word and a later word exists.
fn overlap_tail(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }
    let text = text.trim_end();
    let total = char_len(text);
    if total <= limit {
        return text.trim_start();
    }

    let start = text
        .char_indices()
        .nth(total - limit)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let tail = &text[start..];
    let cut_mid_word = !text[..start].ends_with(char::is_whitespace);
    if cut_mid_word {
        if let Some(boundary) = tail.find(char::is_whitespace) {
            let aligned = tail[boundary..].trim_start();
            if !aligned.is_empty() {
                return aligned;
            }
        }
    }
    tail.trim_start()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
