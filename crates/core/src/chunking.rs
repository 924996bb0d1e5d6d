use crate::error::ChunkError;

/// Default upper bound on chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Trimmed, non-empty lines of `text` in their original order.
pub fn normalize_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Greedily packs lines into chunks of fewer than `max_chunk_size` characters.
///
/// Every appended line costs its length plus one joining space, and a line is
/// appended only while the running length plus the line length stays strictly
/// below the limit. The first buffer starts empty, so its leading space is
/// counted even though it is trimmed from the emitted chunk; buffers opened by
/// an overflowing line start at that line's length. Lines are never split, so a
/// single line longer than the limit becomes one oversized chunk.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Result<Vec<String>, ChunkError> {
    if max_chunk_size == 0 {
        return Err(ChunkError::InvalidChunkSize(max_chunk_size));
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut buffered_chars = 0usize;

    for line in normalize_lines(text) {
        let line_chars = line.chars().count();

        if buffered_chars + line_chars < max_chunk_size {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
            buffered_chars += 1 + line_chars;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            buffered_chars = line_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        return Err(ChunkError::EmptyInput);
    }

    Ok(chunks)
}
