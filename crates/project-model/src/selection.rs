//! Sentence selection and the render state derived from it.
//!
//! A selection is a contiguous, clamped range of sentence indices. Its text
//! and timing window are recomputed from scratch whenever the range, the
//! timing set, or the style changes; nothing here is cached.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Sentence};
use crate::reader::Reader;
use crate::timing::TimingSet;

/// Separator placed between selected sentences.
pub const SENTENCE_SEPARATOR: &str = "\n\n";

/// An inclusive `from..=to` range of 1-based sentence indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRange {
    from: u32,
    to: u32,
}

impl SentenceRange {
    /// Clamp both bounds into `1..=max(1, total)` and swap them if reversed.
    pub fn clamped(from: i64, to: i64, total: u32) -> Self {
        let max = total.max(1) as i64;
        let a = from.clamp(1, max) as u32;
        let b = to.clamp(1, max) as u32;
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn from(&self) -> u32 {
        self.from
    }

    pub fn to(&self) -> u32 {
        self.to
    }

    /// Number of indices in the range; always at least 1.
    pub fn count(&self) -> u32 {
        self.to - self.from + 1
    }

    pub fn indices(&self) -> RangeInclusive<u32> {
        self.from..=self.to
    }
}

impl std::fmt::Display for SentenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Resolved `[start, end)` audio window of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SelectionWindow {
    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }
}

/// Sentences of a collection picked by a range.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    collection: &'a Collection,
    range: SentenceRange,
}

impl<'a> Selection<'a> {
    pub fn new(collection: &'a Collection, range: SentenceRange) -> Self {
        Self { collection, range }
    }

    pub fn range(&self) -> SentenceRange {
        self.range
    }

    pub fn sentences(&self) -> Vec<&'a Sentence> {
        self.collection.range(self.range.from, self.range.to)
    }

    /// Selected texts separated by a blank line.
    pub fn text(&self) -> String {
        self.sentences()
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(SENTENCE_SEPARATOR)
    }

    /// Translations that are present, joined like [`text`](Self::text).
    pub fn translation(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .sentences()
            .iter()
            .filter_map(|s| s.translation.as_deref())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(SENTENCE_SEPARATOR))
        }
    }

    /// First sentence's start to last sentence's end, if both are recorded.
    pub fn window(&self, timing: &TimingSet) -> Option<SelectionWindow> {
        let sentences = self.sentences();
        let first = sentences.first()?;
        let last = sentences.last()?;
        let start = timing.get(&first.id)?.start_sec;
        let end = timing.get(&last.id)?.end_sec;
        Some(SelectionWindow {
            start_secs: start,
            end_secs: end,
        })
    }
}

/// Vertical anchor of the primary text block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

impl std::str::FromStr for TextPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "center" | "centre" | "middle" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!("unknown text position '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowStyle {
    pub enabled: bool,
    /// Blur radius in reference pixels; the offset is derived from it.
    pub strength: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 35.0,
        }
    }
}

impl ShadowStyle {
    /// Vertical shadow offset: `max(2, round(strength / 12))`.
    pub fn offset(&self) -> f32 {
        (self.strength / 12.0).round().max(2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Background {
    Solid {
        color: String,
    },
    /// Image scaled to cover the frame; the colour is used if it cannot be read.
    Image {
        path: std::path::PathBuf,
        fallback_color: String,
    },
}

impl Default for Background {
    fn default() -> Self {
        Self::Solid {
            color: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

/// Default solid background colour.
pub const DEFAULT_BACKGROUND: &str = "#0E1A16";

/// Default primary text colour.
pub const DEFAULT_TEXT_COLOR: &str = "#F5D37D";

/// Operator-controlled layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderStyle {
    pub font_size: f32,
    pub line_height: f32,
    pub text_color: String,
    pub position: TextPosition,
    pub shadow: ShadowStyle,
    pub background: Background,
    pub show_translation: bool,
    pub show_collection_label: bool,
    pub show_reader_name: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            font_size: 46.0,
            line_height: 1.4,
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            position: TextPosition::Center,
            shadow: ShadowStyle::default(),
            background: Background::default(),
            show_translation: false,
            show_collection_label: true,
            show_reader_name: true,
        }
    }
}

/// Everything the frame renderer needs for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    pub collection_number: u32,
    pub reader_name: Option<String>,
    pub text: String,
    /// Resolved translation; `None` when hidden or when nothing was extracted.
    pub translation: Option<String>,
    pub style: RenderStyle,
    pub window: Option<SelectionWindow>,
}

impl RenderState {
    pub fn from_selection(
        selection: &Selection<'_>,
        reader: Option<&Reader>,
        timing: Option<&TimingSet>,
        style: RenderStyle,
    ) -> Self {
        let translation = if style.show_translation {
            selection.translation()
        } else {
            None
        };
        Self {
            collection_number: selection.collection.number,
            reader_name: reader.map(|r| r.name.clone()),
            text: selection.text(),
            translation,
            window: timing.and_then(|t| selection.window(t)),
            style,
        }
    }
}

/// Why an export cannot start.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportBlocker {
    NoReader,
    NoAudioLocator { reader_id: String, collection: u32 },
    NoWindow { range: SentenceRange },
}

impl std::fmt::Display for ExportBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoReader => write!(f, "no reader selected"),
            Self::NoAudioLocator {
                reader_id,
                collection,
            } => write!(
                f,
                "reader '{reader_id}' has no audio for collection {collection}"
            ),
            Self::NoWindow { range } => write!(
                f,
                "sentences {range} have no complete timing window (first start and last end are required)"
            ),
        }
    }
}

/// Whether an export may be attempted, and with what inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportReadiness {
    Ready {
        audio_locator: String,
        window: SelectionWindow,
    },
    Blocked(ExportBlocker),
}

impl ExportReadiness {
    /// Export needs an audio locator for the collection and a resolved window.
    pub fn check(reader: Option<&Reader>, state: &RenderState, range: SentenceRange) -> Self {
        let Some(reader) = reader else {
            return Self::Blocked(ExportBlocker::NoReader);
        };
        let Some(locator) = reader.audio_locator(state.collection_number) else {
            return Self::Blocked(ExportBlocker::NoAudioLocator {
                reader_id: reader.id.clone(),
                collection: state.collection_number,
            });
        };
        let Some(window) = state.window else {
            return Self::Blocked(ExportBlocker::NoWindow { range });
        };
        Self::Ready {
            audio_locator: locator.to_string(),
            window,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{TimingDraft, TimingInterval};
    use std::collections::BTreeMap;

    fn collection(n: u32, count: u32) -> Collection {
        Collection {
            number: n,
            title: Collection::default_title(n),
            sentences: (1..=count)
                .map(|i| {
                    let s = Sentence::new(n, i, format!("جملة {i}"));
                    if i % 2 == 0 {
                        s.with_translation(Some(format!("Sentence {i}")))
                    } else {
                        s
                    }
                })
                .collect(),
            source_url: String::new(),
        }
    }

    fn reader(audio: &[(u32, &str)]) -> Reader {
        Reader {
            id: "reader-1".to_string(),
            name: "Reader One".to_string(),
            audio_urls_by_collection: audio
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn complete_timings(n: u32, count: u32) -> TimingSet {
        let mut draft = TimingDraft::new("reader-1", n);
        for i in 1..=count {
            draft.set_start(i, (i - 1) as f64 * 2.0).unwrap();
            draft.set_end(i, i as f64 * 2.0).unwrap();
        }
        draft.to_timing_set()
    }

    #[test]
    fn test_range_clamps_and_swaps() {
        let r = SentenceRange::clamped(7, 2, 5);
        assert_eq!((r.from(), r.to()), (2, 5));
        let r = SentenceRange::clamped(-3, 0, 5);
        assert_eq!((r.from(), r.to()), (1, 1));
        let r = SentenceRange::clamped(1, 10, 0);
        assert_eq!((r.from(), r.to()), (1, 1));
        assert_eq!(SentenceRange::clamped(2, 4, 9).count(), 3);
    }

    #[test]
    fn test_window_duration_for_range() {
        let c = collection(1, 5);
        let timing = TimingSet::from_items(
            "reader-1",
            1,
            vec![
                TimingInterval::new("p1s001", 10.0, 12.0),
                TimingInterval::new("p1s002", 12.0, 15.0),
                TimingInterval::new("p1s003", 15.0, 18.4),
            ],
        );
        let selection = Selection::new(&c, SentenceRange::clamped(1, 3, 5));
        let window = selection.window(&timing).unwrap();
        assert_eq!(window.start_secs, 10.0);
        assert_eq!(window.end_secs, 18.4);
        assert!((window.duration_secs() - 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_window_requires_both_ends() {
        let c = collection(1, 3);
        let timing = TimingSet::from_items("r", 1, vec![TimingInterval::new("p1s001", 0.0, 1.0)]);
        let selection = Selection::new(&c, SentenceRange::clamped(1, 3, 3));
        assert!(selection.window(&timing).is_none());
        // The middle sentence is not needed.
        let timing = TimingSet::from_items(
            "r",
            1,
            vec![
                TimingInterval::new("p1s001", 0.0, 1.0),
                TimingInterval::new("p1s003", 2.0, 1.5),
            ],
        );
        let window = selection.window(&timing).unwrap();
        assert_eq!(window.duration_secs(), 1.5);
    }

    #[test]
    fn test_text_and_translation_joining() {
        let c = collection(2, 4);
        let selection = Selection::new(&c, SentenceRange::clamped(1, 3, 4));
        assert_eq!(selection.text(), "جملة 1\n\nجملة 2\n\nجملة 3");
        assert_eq!(selection.translation().as_deref(), Some("Sentence 2"));

        let only_odd = Selection::new(&c, SentenceRange::clamped(3, 3, 4));
        assert!(only_odd.translation().is_none());
    }

    #[test]
    fn test_render_state_hides_translation_by_default() {
        let c = collection(2, 4);
        let selection = Selection::new(&c, SentenceRange::clamped(1, 4, 4));
        let state = RenderState::from_selection(&selection, None, None, RenderStyle::default());
        assert!(state.translation.is_none());
        assert!(state.reader_name.is_none());
        assert!(state.window.is_none());

        let style = RenderStyle {
            show_translation: true,
            ..RenderStyle::default()
        };
        let state = RenderState::from_selection(&selection, None, None, style);
        assert_eq!(state.translation.as_deref(), Some("Sentence 2\n\nSentence 4"));
    }

    #[test]
    fn test_export_disabled_without_audio_locator() {
        let c = collection(3, 5);
        let timing = complete_timings(3, 5);
        let r = reader(&[(1, "https://cdn.example/1.mp3")]);
        let range = SentenceRange::clamped(1, 5, 5);
        let state = RenderState::from_selection(
            &Selection::new(&c, range),
            Some(&r),
            Some(&timing),
            RenderStyle::default(),
        );
        assert!(state.window.is_some());

        let readiness = ExportReadiness::check(Some(&r), &state, range);
        assert!(!readiness.is_enabled());
        assert!(matches!(
            readiness,
            ExportReadiness::Blocked(ExportBlocker::NoAudioLocator { collection: 3, .. })
        ));
    }

    #[test]
    fn test_export_ready_with_audio_and_window() {
        let c = collection(3, 5);
        let timing = complete_timings(3, 5);
        let r = reader(&[(3, "https://cdn.example/3.mp3")]);
        let range = SentenceRange::clamped(2, 4, 5);
        let state = RenderState::from_selection(
            &Selection::new(&c, range),
            Some(&r),
            Some(&timing),
            RenderStyle::default(),
        );
        match ExportReadiness::check(Some(&r), &state, range) {
            ExportReadiness::Ready {
                audio_locator,
                window,
            } => {
                assert_eq!(audio_locator, "https://cdn.example/3.mp3");
                assert_eq!(window.start_secs, 2.0);
                assert_eq!(window.end_secs, 8.0);
            }
            other => panic!("expected ready, got {other:?}"),
        }

        let untimed = RenderState {
            window: None,
            ..state
        };
        assert!(matches!(
            ExportReadiness::check(Some(&r), &untimed, range),
            ExportReadiness::Blocked(ExportBlocker::NoWindow { .. })
        ));
    }

    #[test]
    fn test_shadow_offset() {
        assert_eq!(ShadowStyle::default().offset(), 3.0);
        let weak = ShadowStyle {
            enabled: true,
            strength: 6.0,
        };
        assert_eq!(weak.offset(), 2.0);
    }

    #[test]
    fn test_style_deserializes_with_defaults() {
        let style: RenderStyle =
            serde_json::from_str(r#"{"fontSize": 60, "position": "top"}"#).unwrap();
        assert_eq!(style.font_size, 60.0);
        assert_eq!(style.position, TextPosition::Top);
        assert_eq!(style.text_color, DEFAULT_TEXT_COLOR);
        assert_eq!(style.background, Background::default());
    }
}
