// SPDX-License-Identifier: MIT

//! Chunk-and-merge support for oversized sections

use std::collections::HashSet;

use super::schema::ExtractionItem;
use crate::cvsense::config::MergeStrategy;

/// Split `text` into chunks of at most `chunk_chars` characters on line
/// boundaries. A single line longer than the limit is cut mid-line.
/// Concatenating the chunks gives back `text`.
pub fn split_into_chunks(text: &str, chunk_chars: usize) -> Vec<&str> {
    let limit = chunk_chars.max(1);
    let mut chunks = Vec::new();
    // byte offsets of the open chunk, and its length in chars
    let mut start = 0;
    let mut end = 0;
    let mut chars = 0;

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if chars > 0 && chars + line_chars > limit {
            chunks.push(&text[start..end]);
            start = end;
            chars = 0;
        }
        end += line.len();
        chars += line_chars;

        while chars > limit {
            let cut = text[start..end]
                .char_indices()
                .nth(limit)
                .map(|(i, _)| start + i)
                .unwrap_or(end);
            chunks.push(&text[start..cut]);
            start = cut;
            chars -= limit;
        }
    }

    if end > start {
        chunks.push(&text[start..end]);
    }
    chunks
}

fn dedup_key(item: &ExtractionItem) -> String {
    match item {
        ExtractionItem::Skill(skill) => format!("skill:{}", skill.skill_name.trim().to_lowercase()),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Merge per-chunk outputs in chunk order
pub fn merge_chunk_items(
    chunk_items: Vec<Vec<ExtractionItem>>,
    strategy: MergeStrategy,
) -> Vec<ExtractionItem> {
    let all = chunk_items.into_iter().flatten();
    match strategy {
        MergeStrategy::Concatenate => all.collect(),
        MergeStrategy::ConcatenateDedup => {
            let mut seen = HashSet::new();
            all.filter(|item| seen.insert(dedup_key(item))).collect()
        }
    }
}
