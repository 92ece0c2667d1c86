#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

/// Configuration for narrative chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same narrative
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 40,
        }
    }
}

/// Split a complaint narrative into overlapping character windows.
///
/// The narrative is trimmed first. A narrative that fits within
/// `chunk_size` characters yields exactly one chunk equal to the trimmed
/// text; longer narratives yield windows of `chunk_size` characters that
/// advance by `chunk_size - chunk_overlap`, so consecutive windows share
/// exactly `chunk_overlap` characters. Empty or whitespace-only narratives
/// yield no chunks.
///
/// Window boundaries are measured in `char`s, never bytes, so multi-byte
/// text is split cleanly.
#[inline]
pub fn split_narrative(narrative: &str, config: &ChunkingConfig) -> Vec<String> {
    debug_assert!(config.chunk_overlap < config.chunk_size);

    let text = narrative.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.chunk_size {
        return vec![text.to_string()];
    }

    let step = config.chunk_size - config.chunk_overlap;
    let mut chunks = Vec::with_capacity(chars.len().div_ceil(step));
    let mut start = 0;

    loop {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
