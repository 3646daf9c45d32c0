//! Per-sentence audio timing.
//!
//! A [`TimingSet`] is the persisted form: only complete intervals, sorted by
//! sentence id. A [`TimingDraft`] is the editor-local form where either bound
//! may still be missing. Validation returns every violation it finds and
//! never mutates its input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::segment::{sentence_id, SentenceId};

/// Schema version written into persisted timing sets.
pub const TIMING_SET_VERSION: u32 = 1;

/// The audio `[start, end)` window of one sentence, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingInterval {
    pub sentence_id: SentenceId,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl TimingInterval {
    pub fn new(sentence_id: impl Into<SentenceId>, start_sec: f64, end_sec: f64) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            start_sec,
            end_sec,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// Timing of one reader's recording of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSet {
    pub reader_id: String,

    #[serde(alias = "part")]
    pub collection_number: u32,

    /// Complete intervals, unique per sentence id, sorted by id.
    #[serde(default)]
    pub items: Vec<TimingInterval>,

    #[serde(default = "default_version")]
    pub version: u32,

    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

fn default_version() -> u32 {
    TIMING_SET_VERSION
}

impl TimingSet {
    /// Create an empty timing set stamped with the current time.
    pub fn new(reader_id: impl Into<String>, collection_number: u32) -> Self {
        Self {
            reader_id: reader_id.into(),
            collection_number,
            items: Vec::new(),
            version: TIMING_SET_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Build a set from arbitrary items; later duplicates win.
    pub fn from_items(
        reader_id: impl Into<String>,
        collection_number: u32,
        items: Vec<TimingInterval>,
    ) -> Self {
        let mut set = Self::new(reader_id, collection_number);
        set.items = items;
        set.normalize();
        set
    }

    /// Sort by sentence id and drop duplicate ids, keeping the last one.
    pub fn normalize(&mut self) {
        let mut by_id: BTreeMap<SentenceId, TimingInterval> = BTreeMap::new();
        for item in self.items.drain(..) {
            by_id.insert(item.sentence_id.clone(), item);
        }
        self.items = by_id.into_values().collect();
    }

    /// Insert or replace the interval for its sentence id.
    pub fn insert(&mut self, interval: TimingInterval) {
        match self
            .items
            .binary_search_by(|probe| probe.sentence_id.cmp(&interval.sentence_id))
        {
            Ok(pos) => self.items[pos] = interval,
            Err(pos) => self.items.insert(pos, interval),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TimingInterval> {
        self.items
            .binary_search_by(|probe| probe.sentence_id.as_str().cmp(id))
            .ok()
            .map(|pos| &self.items[pos])
    }

    /// Interval of the `index`-th sentence of this set's collection.
    pub fn interval_at(&self, index: u32) -> Option<&TimingInterval> {
        self.get(&sentence_id(self.collection_number, index))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check sentences `1..=total` for bounds and adjacent-overlap violations.
    pub fn validate(&self, total_sentences: u32) -> Vec<TimingViolation> {
        validate_with(self.collection_number, total_sentences, |id| {
            self.get(id).map(|i| DraftInterval {
                start_sec: Some(i.start_sec),
                end_sec: Some(i.end_sec),
            })
        })
    }

    /// Canonical serialized form: items sorted by sentence id, pretty JSON.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        let mut canonical = self.clone();
        canonical.normalize();
        serde_json::to_string_pretty(&canonical)
    }

    /// Parse a timing file. Accepts the legacy `part` key and unsorted items.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut set: TimingSet = serde_json::from_str(json)?;
        set.normalize();
        Ok(set)
    }
}

/// Editor-local bounds of one sentence; either side may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DraftInterval {
    pub start_sec: Option<f64>,
    pub end_sec: Option<f64>,
}

impl DraftInterval {
    pub fn complete(&self) -> Option<(f64, f64)> {
        Some((self.start_sec?, self.end_sec?))
    }
}

/// Editable timing state for one (reader, collection) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingDraft {
    reader_id: String,
    collection_number: u32,
    entries: BTreeMap<SentenceId, DraftInterval>,
}

impl TimingDraft {
    pub fn new(reader_id: impl Into<String>, collection_number: u32) -> Self {
        Self {
            reader_id: reader_id.into(),
            collection_number,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_timing_set(set: &TimingSet) -> Self {
        let entries = set
            .items
            .iter()
            .map(|i| {
                (
                    i.sentence_id.clone(),
                    DraftInterval {
                        start_sec: Some(i.start_sec),
                        end_sec: Some(i.end_sec),
                    },
                )
            })
            .collect();
        Self {
            reader_id: set.reader_id.clone(),
            collection_number: set.collection_number,
            entries,
        }
    }

    pub fn reader_id(&self) -> &str {
        &self.reader_id
    }

    pub fn collection_number(&self) -> u32 {
        self.collection_number
    }

    pub fn get(&self, index: u32) -> Option<DraftInterval> {
        self.entries
            .get(&sentence_id(self.collection_number, index))
            .copied()
    }

    pub fn set_start(&mut self, index: u32, secs: f64) -> Result<(), ModelError> {
        let secs = checked_time(index, secs)?;
        self.entry(index).start_sec = Some(secs);
        Ok(())
    }

    pub fn set_end(&mut self, index: u32, secs: f64) -> Result<(), ModelError> {
        let secs = checked_time(index, secs)?;
        self.entry(index).end_sec = Some(secs);
        Ok(())
    }

    /// Forget both bounds of a sentence.
    pub fn clear(&mut self, index: u32) -> bool {
        self.entries
            .remove(&sentence_id(self.collection_number, index))
            .is_some()
    }

    /// Copy the previous sentence's end into this sentence's start.
    ///
    /// No-op (returns `false`) for the first sentence or when the previous
    /// interval is missing or incomplete.
    pub fn derive_start(&mut self, index: u32) -> bool {
        if index <= 1 {
            return false;
        }
        let Some((_, previous_end)) = self.get(index - 1).and_then(|p| p.complete()) else {
            return false;
        };
        self.entry(index).start_sec = Some(previous_end);
        true
    }

    pub fn validate(&self, total_sentences: u32) -> Vec<TimingViolation> {
        validate_with(self.collection_number, total_sentences, |id| {
            self.entries.get(id).copied()
        })
    }

    /// Number of sentences with both bounds set.
    pub fn complete_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.complete().is_some())
            .count()
    }

    /// Persistable form: complete intervals only, sorted by id.
    pub fn to_timing_set(&self) -> TimingSet {
        let items = self
            .entries
            .iter()
            .filter_map(|(id, e)| {
                e.complete()
                    .map(|(start, end)| TimingInterval::new(id.clone(), start, end))
            })
            .collect();
        TimingSet::from_items(self.reader_id.clone(), self.collection_number, items)
    }

    fn entry(&mut self, index: u32) -> &mut DraftInterval {
        self.entries
            .entry(sentence_id(self.collection_number, index))
            .or_default()
    }
}

fn checked_time(index: u32, secs: f64) -> Result<f64, ModelError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ModelError::InvalidTime { index, value: secs });
    }
    Ok(round_millis(secs))
}

/// Round a playback position to millisecond precision.
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// A single problem found by timing validation.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingViolation {
    /// Only one bound is recorded (drafts only).
    Incomplete { index: u32, sentence_id: SentenceId },

    /// `start >= end`.
    Bounds {
        index: u32,
        sentence_id: SentenceId,
        start_sec: f64,
        end_sec: f64,
    },

    /// The sentence starts before the previous sentence ends.
    Overlap {
        previous_index: u32,
        index: u32,
        previous_end_sec: f64,
        start_sec: f64,
    },
}

impl TimingViolation {
    /// Index of the sentence the violation is reported against.
    pub fn index(&self) -> u32 {
        match self {
            Self::Incomplete { index, .. }
            | Self::Bounds { index, .. }
            | Self::Overlap { index, .. } => *index,
        }
    }

    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::Bounds { .. })
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::Overlap { .. })
    }
}

impl std::fmt::Display for TimingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete { index, .. } => {
                write!(f, "Sentence {index}: start or end is missing")
            }
            Self::Bounds {
                index,
                start_sec,
                end_sec,
                ..
            } => write!(
                f,
                "Sentence {index}: start ({start_sec:.3}s) must be before end ({end_sec:.3}s)"
            ),
            Self::Overlap {
                previous_index,
                index,
                previous_end_sec,
                start_sec,
            } => write!(
                f,
                "Overlap between {previous_index} and {index}: starts at {start_sec:.3}s before previous end {previous_end_sec:.3}s"
            ),
        }
    }
}

/// Shared rule set. Only the immediately preceding sentence is compared;
/// non-adjacent overlaps are not detected.
fn validate_with<F>(collection: u32, total_sentences: u32, lookup: F) -> Vec<TimingViolation>
where
    F: Fn(&str) -> Option<DraftInterval>,
{
    let mut violations = Vec::new();
    let mut previous: Option<DraftInterval> = None;

    for index in 1..=total_sentences {
        let id = sentence_id(collection, index);
        let current = lookup(&id);

        if let Some(current) = current {
            match current.complete() {
                None => violations.push(TimingViolation::Incomplete {
                    index,
                    sentence_id: id.clone(),
                }),
                Some((start, end)) if start >= end => violations.push(TimingViolation::Bounds {
                    index,
                    sentence_id: id.clone(),
                    start_sec: start,
                    end_sec: end,
                }),
                Some(_) => {}
            }

            if let (Some(previous_end), Some(start)) =
                (previous.and_then(|p| p.end_sec), current.start_sec)
            {
                if start < previous_end {
                    violations.push(TimingViolation::Overlap {
                        previous_index: index - 1,
                        index,
                        previous_end_sec: previous_end,
                        start_sec: start,
                    });
                }
            }
        }

        previous = current;
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft_with(intervals: &[(u32, Option<f64>, Option<f64>)]) -> TimingDraft {
        let mut draft = TimingDraft::new("reader-1", 1);
        for (index, start, end) in intervals {
            if let Some(start) = start {
                draft.set_start(*index, *start).unwrap();
            }
            if let Some(end) = end {
                draft.set_end(*index, *end).unwrap();
            }
        }
        draft
    }

    #[test]
    fn test_inverted_interval_is_single_bounds_violation() {
        let draft = draft_with(&[
            (1, Some(0.0), Some(4.0)),
            (2, Some(5.0), Some(4.0)),
        ]);
        let violations = draft.validate(5);
        assert_eq!(violations.iter().filter(|v| v.is_bounds()).count(), 1);
        assert_eq!(violations.iter().filter(|v| v.is_overlap()).count(), 0);
        assert_eq!(violations[0].index(), 2);
    }

    #[test]
    fn test_overlap_references_adjacent_pair() {
        let draft = draft_with(&[(1, Some(1.0), Some(6.0)), (2, Some(5.0), Some(9.0))]);
        let violations = draft.validate(2);
        assert_eq!(violations.len(), 1);
        match &violations[0] {
            TimingViolation::Overlap {
                previous_index,
                index,
                ..
            } => {
                assert_eq!((*previous_index, *index), (1, 2));
            }
            other => panic!("expected overlap, got {other:?}"),
        }
        assert!(violations[0].to_string().contains("1 and 2"));
    }

    #[test]
    fn test_overlap_checked_against_partial_neighbours() {
        // Sentence 1 has only an end, sentence 2 only a start.
        let draft = draft_with(&[(1, None, Some(6.0)), (2, Some(5.0), None)]);
        let violations = draft.validate(2);
        assert_eq!(violations.iter().filter(|v| v.is_overlap()).count(), 1);
        assert_eq!(
            violations
                .iter()
                .filter(|v| matches!(v, TimingViolation::Incomplete { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_touching_intervals_are_valid() {
        let draft = draft_with(&[(1, Some(0.0), Some(3.5)), (2, Some(3.5), Some(7.0))]);
        assert!(draft.validate(2).is_empty());
    }

    #[test]
    fn test_gaps_are_not_violations() {
        let draft = draft_with(&[(1, Some(0.0), Some(3.0)), (3, Some(1.0), Some(2.0))]);
        // Sentence 2 is absent, so 1 and 3 are never compared.
        assert!(draft.validate(3).is_empty());
    }

    #[test]
    fn test_validate_ignores_indices_beyond_total() {
        let draft = draft_with(&[(4, Some(5.0), Some(1.0))]);
        assert!(draft.validate(3).is_empty());
        assert_eq!(draft.validate(4).len(), 1);
    }

    #[test]
    fn test_derive_start_copies_previous_end() {
        let mut draft = draft_with(&[(1, Some(0.0), Some(2.75))]);
        assert!(draft.derive_start(2));
        assert_eq!(draft.get(2).unwrap().start_sec, Some(2.75));
        assert_eq!(draft.get(2).unwrap().end_sec, None);
    }

    #[test]
    fn test_derive_start_noop_cases() {
        let mut draft = draft_with(&[(1, None, Some(2.0)), (3, Some(9.0), None)]);
        assert!(!draft.derive_start(1));
        // Previous interval incomplete.
        assert!(!draft.derive_start(2));
        assert!(draft.get(2).is_none());
        // Previous interval missing.
        assert!(!draft.derive_start(5));
        assert!(draft.get(5).is_none());
    }

    #[test]
    fn test_set_rejects_invalid_times() {
        let mut draft = TimingDraft::new("r", 1);
        assert!(matches!(
            draft.set_start(1, -0.5),
            Err(ModelError::InvalidTime { index: 1, .. })
        ));
        assert!(draft.set_end(1, f64::NAN).is_err());
        assert!(draft.get(1).is_none());
    }

    #[test]
    fn test_set_rounds_to_millis() {
        let mut draft = TimingDraft::new("r", 1);
        draft.set_start(1, 1.23456).unwrap();
        assert_eq!(draft.get(1).unwrap().start_sec, Some(1.235));
    }

    #[test]
    fn test_to_timing_set_drops_incomplete() {
        let draft = draft_with(&[
            (2, Some(3.0), Some(4.0)),
            (1, Some(0.0), Some(3.0)),
            (3, Some(4.0), None),
        ]);
        let set = draft.to_timing_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set.items[0].sentence_id, "p1s001");
        assert_eq!(set.items[1].sentence_id, "p1s002");
        assert_eq!(set.version, TIMING_SET_VERSION);
        assert!(set.interval_at(3).is_none());
        assert_eq!(draft.complete_count(), 2);
    }

    #[test]
    fn test_timing_set_insert_keeps_order() {
        let mut set = TimingSet::new("r", 2);
        set.insert(TimingInterval::new("p2s003", 6.0, 8.0));
        set.insert(TimingInterval::new("p2s001", 0.0, 2.0));
        set.insert(TimingInterval::new("p2s003", 6.5, 8.0));
        assert_eq!(set.len(), 2);
        assert_eq!(set.items[0].sentence_id, "p2s001");
        assert_eq!(set.interval_at(3).unwrap().start_sec, 6.5);
    }

    #[test]
    fn test_canonical_json_round_trip() {
        let set = TimingSet::from_items(
            "reader-1",
            3,
            vec![
                TimingInterval::new("p3s010", 40.0, 44.5),
                TimingInterval::new("p3s002", 4.0, 8.25),
                TimingInterval::new("p3s001", 0.0, 4.0),
            ],
        );
        let json = set.to_canonical_json().unwrap();
        assert!(json.contains("\"readerId\""));
        assert!(json.contains("\"collectionNumber\": 3"));
        assert!(json.contains("\"startSec\""));

        let parsed = TimingSet::from_json(&json).unwrap();
        assert_eq!(parsed, set);
        let ids: Vec<&str> = parsed.items.iter().map(|i| i.sentence_id.as_str()).collect();
        assert_eq!(ids, vec!["p3s001", "p3s002", "p3s010"]);
    }

    #[test]
    fn test_from_json_accepts_legacy_part_key_and_sorts() {
        let json = r#"{
            "readerId": "reader-1",
            "part": 1,
            "items": [
                {"sentenceId": "p1s002", "startSec": 2.0, "endSec": 3.0},
                {"sentenceId": "p1s001", "startSec": 0.0, "endSec": 2.0}
            ],
            "version": 1,
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        let set = TimingSet::from_json(json).unwrap();
        assert_eq!(set.collection_number, 1);
        assert_eq!(set.items[0].sentence_id, "p1s001");
        assert!(set.validate(2).is_empty());
    }

    fn arb_intervals() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0.0f64..100.0, -5.0f64..20.0), 1..12)
    }

    proptest! {
        #[test]
        fn prop_overlap_iff_adjacent_pair_overlaps(intervals in arb_intervals()) {
            let items: Vec<TimingInterval> = intervals
                .iter()
                .enumerate()
                .map(|(i, (start, len))| TimingInterval::new(sentence_id(1, i as u32 + 1), *start, start + len))
                .collect();
            let set = TimingSet::from_items("r", 1, items.clone());
            let violations = set.validate(items.len() as u32);

            let expected = items.windows(2).any(|w| w[0].end_sec > w[1].start_sec);
            prop_assert_eq!(violations.iter().any(|v| v.is_overlap()), expected);
        }

        #[test]
        fn prop_bounds_iff_start_not_before_end(intervals in arb_intervals()) {
            let items: Vec<TimingInterval> = intervals
                .iter()
                .enumerate()
                .map(|(i, (start, len))| TimingInterval::new(sentence_id(1, i as u32 + 1), *start, start + len))
                .collect();
            let set = TimingSet::from_items("r", 1, items.clone());
            let violations = set.validate(items.len() as u32);

            let expected = items.iter().filter(|i| i.start_sec >= i.end_sec).count();
            prop_assert_eq!(violations.iter().filter(|v| v.is_bounds()).count(), expected);
        }

        #[test]
        fn prop_round_trip_preserves_complete_intervals(intervals in arb_intervals()) {
            let items: Vec<TimingInterval> = intervals
                .iter()
                .enumerate()
                .map(|(i, (start, len))| TimingInterval::new(sentence_id(2, i as u32 + 1), *start, start + len))
                .collect();
            let set = TimingSet::from_items("r", 2, items);
            let parsed = TimingSet::from_json(&set.to_canonical_json().unwrap()).unwrap();
            prop_assert_eq!(parsed.items, set.items);
        }
    }
}
