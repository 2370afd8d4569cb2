//! # UID Normalizer
//!
//! Pure functions that canonicalize the card identifier a reader reports.
//!
//! ## Reader Quirks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Same physical card, different readers:                                 │
//! │                                                                         │
//! │    "25:0E:8B:1B:08"   separators + mixed case                           │
//! │    "250e8b1b08"       lowercase                                         │
//! │    "250E8B1B0800"     zero-padded                                       │
//! │    "081B8B0E25"       byte order reversed                               │
//! │    "250E8B1B"         truncated to 4 bytes                              │
//! │                                                                         │
//! │  normalize_hex ──► strip_trailing_zeros ──► reverse_byte_order          │
//! │                                         └─► first_n_hex(_, 8)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function is total over string input and never panics.

use serde::Serialize;

/// Number of hex characters in a 4-byte UID prefix.
pub const FOUR_BYTE_HEX_LEN: usize = 8;

/// Keeps only hex digits and uppercases them.
///
/// ```rust
/// use farelink_core::uid::normalize_hex;
///
/// assert_eq!(normalize_hex("25:0e:8B-1b 08"), "250E8B1B08");
/// assert_eq!(normalize_hex(""), "");
/// ```
pub fn normalize_hex(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Removes trailing `'0'` padding.
///
/// Returns the input unchanged if stripping would leave nothing, so a
/// non-empty UID never collapses to an empty one.
///
/// ```rust
/// use farelink_core::uid::strip_trailing_zeros;
///
/// assert_eq!(strip_trailing_zeros("250E8B1B0800"), "250E8B1B08");
/// assert_eq!(strip_trailing_zeros("0000"), "0000");
/// ```
pub fn strip_trailing_zeros(normalized: &str) -> String {
    let stripped = normalized.trim_end_matches('0');
    if stripped.is_empty() {
        normalized.to_string()
    } else {
        stripped.to_string()
    }
}

/// Reverses the order of the 2-character byte pairs.
///
/// Odd-length input is left-padded with a single `'0'` first; a reader that
/// formats the UID as a number drops the leading nibble. Returns `None` for
/// fewer than two hex characters.
///
/// ```rust
/// use farelink_core::uid::reverse_byte_order;
///
/// assert_eq!(reverse_byte_order("AABBCC").as_deref(), Some("CCBBAA"));
/// assert_eq!(reverse_byte_order("ABC").as_deref(), Some("BC0A"));
/// assert_eq!(reverse_byte_order("A"), None);
/// ```
pub fn reverse_byte_order(hex: &str) -> Option<String> {
    if hex.len() < 2 || !hex.is_ascii() {
        return None;
    }

    let padded;
    let hex = if hex.len() % 2 == 1 {
        padded = format!("0{hex}");
        padded.as_str()
    } else {
        hex
    };

    let bytes = hex.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    for pair in bytes.chunks(2).rev() {
        for &b in pair {
            out.push(b as char);
        }
    }
    Some(out)
}

/// Returns the first `n` hex characters (the whole string when shorter).
///
/// ```rust
/// use farelink_core::uid::first_n_hex;
///
/// assert_eq!(first_n_hex("250E8B1B0800", 8), "250E8B1B");
/// assert_eq!(first_n_hex("ABC", 8), "ABC");
/// ```
pub fn first_n_hex(hex: &str, n: usize) -> String {
    hex.chars().take(n).collect()
}

// =============================================================================
// Derived forms
// =============================================================================

/// All comparable forms of one raw UID, computed once per tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UidForms {
    /// Exactly as received.
    pub raw: String,
    /// Hex-only, uppercase.
    pub normalized: String,
    /// Normalized with trailing zero padding removed.
    pub stripped: String,
    /// Byte-reversed `stripped`, when meaningful.
    pub reversed: Option<String>,
    /// First 4 bytes of `stripped`, only when it has at least 8 hex chars.
    pub four_byte_prefix: Option<String>,
}

impl UidForms {
    pub fn derive(raw: &str) -> Self {
        let normalized = normalize_hex(raw);
        let stripped = strip_trailing_zeros(&normalized);
        let reversed = reverse_byte_order(&stripped);
        let four_byte_prefix = (stripped.len() >= FOUR_BYTE_HEX_LEN)
            .then(|| first_n_hex(&stripped, FOUR_BYTE_HEX_LEN));

        UidForms {
            raw: raw.to_string(),
            normalized,
            stripped,
            reversed,
            four_byte_prefix,
        }
    }

    /// The form an operator should register when nothing matched.
    pub fn suggested(&self) -> &str {
        if self.stripped.is_empty() {
            self.raw.trim()
        } else {
            &self.stripped
        }
    }

    /// Distinct non-empty hex probes worth sending to storage.
    pub fn probes(&self) -> Vec<&str> {
        let mut probes: Vec<&str> = Vec::with_capacity(4);
        let candidates = [
            Some(self.normalized.as_str()),
            Some(self.stripped.as_str()),
            self.reversed.as_deref(),
            self.four_byte_prefix.as_deref(),
        ];
        for probe in candidates.into_iter().flatten() {
            if !probe.is_empty() && !probes.contains(&probe) {
                probes.push(probe);
            }
        }
        probes
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
