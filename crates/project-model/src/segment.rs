//! Sentence identifiers.
//!
//! `sentence_id(collection, index)` is a pure function: the same pair
//! always yields the same id, so timing data authored against one parse of
//! a collection stays valid against any later parse that assigns the same
//! indices.

/// Stable identifier of one sentence, e.g. `p2s007`.
pub type SentenceId = String;

/// Minimum digits for the sentence index part of an id.
const INDEX_WIDTH: usize = 3;

/// Build the id for the `index`-th (1-based) sentence of `collection`.
///
/// Indices are zero-padded to three digits, so lexicographic order equals
/// index order for collections of up to 999 sentences.
pub fn sentence_id(collection: u32, index: u32) -> SentenceId {
    format!("p{collection}s{index:0width$}", width = INDEX_WIDTH)
}

/// Recover `(collection, index)` from an id produced by [`sentence_id`].
pub fn parse_sentence_id(id: &str) -> Option<(u32, u32)> {
    let rest = id.strip_prefix('p')?;
    let (collection, index) = rest.split_once('s')?;
    if collection.is_empty() || index.len() < INDEX_WIDTH {
        return None;
    }
    if !collection.bytes().all(|b| b.is_ascii_digit()) || !index.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some((collection.parse().ok()?, index.parse().ok()?))
}
