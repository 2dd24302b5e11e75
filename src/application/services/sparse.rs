//! Lexical helpers shared by the hybrid search encoder and the hashing embedder.

use std::collections::BTreeMap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Lower-cased tokens split on whitespace and ASCII punctuation.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// FNV-1a over the token bytes. Values end up persisted in Endee, so the
/// hash must not change between builds or hosts.
pub fn stable_token_hash(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Hashed term-frequency encoding: bucket = hash mod `dimension`, weight
/// `1 + ln(tf)`, L2-normalised. Indices come back sorted and unique.
pub fn encode_sparse(text: &str, dimension: usize) -> (Vec<u32>, Vec<f32>) {
    if dimension == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for token in tokenize(text) {
        // dimension is bounded by the index config, so the bucket fits in u32
        let bucket = (stable_token_hash(&token) % dimension as u64) as u32;
        *counts.entry(bucket).or_insert(0) += 1;
    }

    let mut indices = Vec::with_capacity(counts.len());
    let mut values = Vec::with_capacity(counts.len());
    for (bucket, tf) in counts {
        indices.push(bucket);
        values.push(1.0 + (tf as f32).ln());
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut values {
            *value /= norm;
        }
    }

    (indices, values)
}
