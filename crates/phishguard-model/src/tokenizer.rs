//! Character-level URL encoder.
//!
//! Maps a URL to a fixed-width sequence of [`MAX_LEN`] integer codes. The
//! vocabulary is compiled in: printable ASCII (`' '` through `'~'`) maps to
//! `1..=95`, everything else collapses to [`UNK`], and [`PAD`] fills the tail.
//!
//! Long inputs are truncated and short ones padded. Neither case is an error,
//! so [`encode`] is total over every `&str`.

/// Number of codes in every encoded sequence.
pub const MAX_LEN: usize = 75;

/// Padding code for positions past the end of the URL.
pub const PAD: u32 = 0;

/// Number of printable ASCII characters in the vocabulary.
pub const VOCAB_LEN: u32 = 95;

/// Code for any character outside the printable ASCII range.
pub const UNK: u32 = VOCAB_LEN + 1;

/// Embedding rows needed to cover every code the encoder can emit.
pub const DEFAULT_VOCAB_SIZE: usize = UNK as usize + 1;

/// First printable ASCII character (space).
const FIRST_PRINTABLE: u32 = 0x20;

/// Last printable ASCII character (tilde).
const LAST_PRINTABLE: u32 = 0x7E;

/// A fixed-width encoded URL.
pub type TokenSequence = [u32; MAX_LEN];

/// Look up the vocabulary code for a single character.
#[inline]
pub fn char_to_id(c: char) -> u32 {
    let cp = c as u32;
    if (FIRST_PRINTABLE..=LAST_PRINTABLE).contains(&cp) {
        cp - (FIRST_PRINTABLE - 1)
    } else {
        UNK
    }
}

/// Encode a URL into a [`TokenSequence`].
///
/// Only the first [`MAX_LEN`] characters (Unicode scalar values, not bytes)
/// contribute. The remainder of the sequence is [`PAD`].
///
/// ```
/// use phishguard_model::tokenizer::{encode, MAX_LEN, PAD};
///
/// let ids = encode("hi");
/// assert_eq!(ids.len(), MAX_LEN);
/// assert_eq!(ids[0], 'h' as u32 - 31);
/// assert_eq!(ids[MAX_LEN - 1], PAD);
/// ```
pub fn encode(url: &str) -> TokenSequence {
    let mut ids = [PAD; MAX_LEN];
    for (slot, c) in ids.iter_mut().zip(url.chars()) {
        *slot = char_to_id(c);
    }
    ids
}

/// Encode several URLs at once.
pub fn encode_batch<S: AsRef<str>>(urls: &[S]) -> Vec<TokenSequence> {
    urls.iter().map(|u| encode(u.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
