//! Collections ("parts") and their sentences.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::segment::{sentence_id, SentenceId};

/// Smallest valid collection number.
pub const MIN_COLLECTION: u32 = 1;

/// Largest valid collection number.
pub const MAX_COLLECTION: u32 = 8;

/// A validated collection number in `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct CollectionNumber(u32);

impl CollectionNumber {
    pub fn new(number: i64) -> Result<Self, ModelError> {
        if number < MIN_COLLECTION as i64 || number > MAX_COLLECTION as i64 {
            return Err(ModelError::InvalidCollection {
                number,
                min: MIN_COLLECTION,
                max: MAX_COLLECTION,
            });
        }
        Ok(Self(number as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Every valid collection number, in order.
    pub fn all() -> impl Iterator<Item = CollectionNumber> {
        (MIN_COLLECTION..=MAX_COLLECTION).map(CollectionNumber)
    }
}

impl TryFrom<i64> for CollectionNumber {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionNumber> for u32 {
    fn from(value: CollectionNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for CollectionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The smallest addressable unit of primary text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Stable id derived from (collection, index).
    pub id: SentenceId,

    /// 1-based position among the collection's emitted sentences.
    pub index: u32,

    /// Primary-language content.
    pub text: String,

    /// Secondary-language text extracted from the source, if any.
    #[serde(default)]
    pub translation: Option<String>,
}

impl Sentence {
    pub fn new(collection: u32, index: u32, text: impl Into<String>) -> Self {
        Self {
            id: sentence_id(collection, index),
            index,
            text: text.into(),
            translation: None,
        }
    }

    pub fn with_translation(mut self, translation: Option<String>) -> Self {
        self.translation = translation;
        self
    }
}

/// One numbered part of the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Collection (part) number.
    #[serde(rename = "collectionNumber", alias = "part")]
    pub number: u32,

    /// Display title.
    pub title: String,

    /// Sentences ordered by index.
    pub sentences: Vec<Sentence>,

    /// Where the text was retrieved from.
    pub source_url: String,
}

impl Collection {
    /// Default display title for a collection.
    pub fn default_title(number: u32) -> String {
        format!("الحزب {number}")
    }

    /// Collection label drawn on frames; same text as the default title.
    pub fn label(number: u32) -> String {
        Self::default_title(number)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Look up a sentence by its 1-based index.
    pub fn sentence(&self, index: u32) -> Option<&Sentence> {
        let pos = (index as usize).checked_sub(1)?;
        self.sentences
            .get(pos)
            .filter(|s| s.index == index)
            .or_else(|| self.sentences.iter().find(|s| s.index == index))
    }

    /// Sentences with `from <= index <= to`, in order.
    pub fn range(&self, from: u32, to: u32) -> Vec<&Sentence> {
        self.sentences
            .iter()
            .filter(|s| s.index >= from && s.index <= to)
            .collect()
    }

    /// Whether indices are exactly `1..=N` and ids match the registry.
    pub fn has_contiguous_indices(&self) -> bool {
        self.sentences.iter().enumerate().all(|(pos, s)| {
            s.index as usize == pos + 1 && s.id == sentence_id(self.number, s.index)
        })
    }
}
