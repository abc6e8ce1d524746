//! Byte-budget text segmentation for the outbound radio channel.
//!
//! The transport enforces a hard per-message ceiling in bytes, not
//! characters, and the alert text uses a multi-byte alphabet. Every chunk
//! produced here encodes to at most `max_bytes` UTF-8 bytes and ends on a
//! character boundary. Where possible the cut lands after a sentence
//! terminator, otherwise on whitespace.
//!
//! The two entry points deliberately disagree on what to do when no
//! boundary exists inside the budget:
//! - [`truncate`] returns an empty string (send nothing rather than a
//!   mid-word fragment);
//! - [`segment`] falls back to a hard cut so a long digest still goes out.

/// Characters that end a sentence when followed by whitespace.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '?', '!'];

/// Budget reduction for the second attempt at a non-empty prefix.
const PREFIX_RETRY_MARGIN: usize = 3;

/// Collapses every whitespace run to a single space and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a
/// character. A partial trailing character is dropped.
pub fn byte_safe_prefix(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Byte offset just past the last sentence terminator that is followed by
/// whitespace inside `prefix`.
fn sentence_split(prefix: &str) -> Option<usize> {
    let mut split = None;
    let mut chars = prefix.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if SENTENCE_TERMINATORS.contains(&c)
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            split = Some(i + c.len_utf8());
        }
    }
    split
}

/// Byte offset of the last whitespace character in `prefix`, provided
/// something precedes it.
fn whitespace_split(prefix: &str) -> Option<usize> {
    prefix
        .char_indices()
        .filter(|(i, c)| *i > 0 && c.is_whitespace())
        .map(|(i, _)| i)
        .last()
}

/// Preferred split offset inside a byte-safe prefix, if any.
fn split_point(prefix: &str) -> Option<usize> {
    sentence_split(prefix).or_else(|| whitespace_split(prefix))
}

/// Fits `text` into a single message of at most `max_bytes`.
///
/// Text that already fits is returned trimmed. Otherwise the longest
/// byte-safe prefix is cut at its last sentence end or whitespace. When the
/// prefix holds no such boundary the result is empty, and the caller must
/// treat that as nothing to send.
pub fn truncate(text: &str, max_bytes: usize) -> String {
    let text = text.trim();
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let prefix = byte_safe_prefix(text, max_bytes);
    match split_point(prefix) {
        Some(split) => prefix[..split].trim_end().to_string(),
        None => String::new(),
    }
}

/// Splits `text` into ordered chunks of at most `max_bytes` each.
///
/// Whitespace is normalized first. Each chunk is cut at the last sentence
/// end inside the budget, else at the last whitespace, else hard at the
/// byte-safe prefix. Returns an empty list for empty input or a zero
/// budget, and stops early if a non-empty prefix cannot be formed.
pub fn segment(text: &str, max_bytes: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let mut chunks = Vec::new();
    if max_bytes == 0 || normalized.is_empty() {
        return chunks;
    }

    let mut remaining = normalized.as_str();
    while !remaining.is_empty() {
        if remaining.len() <= max_bytes {
            chunks.push(remaining.to_string());
            break;
        }

        let mut prefix = byte_safe_prefix(remaining, max_bytes);
        if prefix.is_empty() {
            prefix = byte_safe_prefix(remaining, max_bytes.saturating_sub(PREFIX_RETRY_MARGIN));
            if prefix.is_empty() {
                break;
            }
        }

        let consumed = split_point(prefix).unwrap_or(prefix.len());
        let chunk = remaining[..consumed].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[consumed..].trim();
    }

    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
