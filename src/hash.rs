//! Per-line content hashing.
//!
//! Each hashline token is a 2-character string drawn from a fixed 16-symbol
//! alphabet, treated as a pair of 4-bit nibbles. Using a non-hex alphabet
//! keeps hashline tokens visually distinct from hex byte dumps and diff
//! hunk markers a model might echo back.

use xxhash_rust::xxh32::xxh32;

/// Fixed 16-symbol alphabet. Index `i` and `i` are stable across the crate;
/// do not reorder without bumping the wire format.
const ALPHABET: [char; 16] = [
    'Z', 'P', 'M', 'Q', 'V', 'R', 'W', 'S', 'N', 'K', 'T', 'X', 'J', 'B', 'Y', 'H',
];

fn symbol(nibble: u8) -> char {
    ALPHABET[(nibble & 0x0f) as usize]
}

fn index_of(c: char) -> Option<u8> {
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|i| i as u8)
}

/// Whitespace-stripped content has no letter or digit (Unicode L/N).
fn is_symbol_only(stripped: &str) -> bool {
    !stripped.chars().any(|c| c.is_alphanumeric())
}

/// Compute the 2-character hashline token for `content` at `line_number`.
///
/// Strips a single trailing `\r`, strips all remaining whitespace, then
/// hashes with xxHash32. Symbol-only lines (no letter/digit survives the
/// strip — blank lines, lines of pure punctuation) are seeded with the line
/// number instead of 0, so that two blank lines at different positions
/// don't collide and look like the same anchor.
pub fn compute_line_hash(line_number: usize, content: &str) -> String {
    let trimmed = content.strip_suffix('\r').unwrap_or(content);
    let stripped: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();

    let seed: u32 = if is_symbol_only(&stripped) {
        line_number as u32
    } else {
        0
    };

    let hash = xxh32(stripped.as_bytes(), seed) % 256;
    let hi = symbol((hash >> 4) as u8);
    let lo = symbol((hash & 0x0f) as u8);
    let mut token = String::with_capacity(2);
    token.push(hi);
    token.push(lo);
    token
}

/// True iff `s` is exactly two characters, both drawn from [`ALPHABET`].
pub fn is_valid_token(s: &str) -> bool {
    let mut chars = s.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) => index_of(a).is_some() && index_of(b).is_some(),
        _ => false,
    }
}

/// Truncate a hash token longer than 2 characters to its first 2 — a
/// common weak-model artifact (e.g. echoing a 4-char hex hash).
pub fn truncate_token(s: &str) -> String {
    s.chars().take(2).collect()
}

/// Whole-file digest: lowercase 8-hex-digit `xxHash32(raw, 0)` of the
/// uncanonicalized bytes (BOM and line endings included). Used only as an
/// optional stale-check handshake between a prior read and a later write —
/// unlike per-line hashes, this says nothing about which line changed.
pub fn compute_file_hash(raw: &[u8]) -> String {
    format!("{:08x}", xxh32(raw, 0))
}
