//! Block assembly and sentence selection.
//!
//! A collection page is a run of numbered blocks, each opened by a marker
//! line such as `12 ▶`. Every block holds the primary text in one or more
//! lines plus assorted translations and commentary. Each block contributes
//! at most one sentence: its longest primary-language line.

use std::sync::OnceLock;

use regex::Regex;
use versereel_project_model::{Collection, CollectionNumber, Sentence};

use crate::classify::{LineClass, LineClassifier, ScriptRatioClassifier};
use crate::markup::visible_lines;

// ASCII digits only: `\d` would also accept Arabic-Indic numerals, which
// appear inside blocks.
const MARKER_PATTERN: &str = r"^([0-9]+)\s*▶";

static MARKER: OnceLock<Option<Regex>> = OnceLock::new();

/// Lines between one block-start marker and the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Number printed in the marker. Informational only; sentence indices
    /// are assigned to emitted sentences, not taken from markers.
    pub marker: Option<u64>,
    pub lines: Vec<String>,
}

/// Parse a line as a block-start marker, returning its number.
///
/// `None` means "not a marker". A marker whose digits overflow still opens
/// a block, reported as `Some(None)`.
fn marker_number(line: &str) -> Option<Option<u64>> {
    let re = MARKER
        .get_or_init(|| Regex::new(MARKER_PATTERN).ok())
        .as_ref()?;
    let caps = re.captures(line)?;
    Some(caps[1].parse().ok())
}

/// Group lines into blocks. Lines before the first marker are discarded.
pub fn split_blocks(lines: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for line in lines {
        if let Some(marker) = marker_number(line) {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(Block {
                marker,
                lines: Vec::new(),
            });
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.lines.push(line.clone());
        }
    }
    blocks.extend(current);
    blocks
}

/// Turns collection markup into sentences.
#[derive(Debug, Clone, Default)]
pub struct SourceDocumentParser<C = ScriptRatioClassifier> {
    classifier: C,
}

impl SourceDocumentParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: LineClassifier> SourceDocumentParser<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Parse raw markup into sentences with ids for `collection`.
    pub fn parse(&self, collection: CollectionNumber, markup: &str) -> Vec<Sentence> {
        self.parse_lines(collection, &visible_lines(markup))
    }

    /// Parse already-extracted lines.
    pub fn parse_lines(&self, collection: CollectionNumber, lines: &[String]) -> Vec<Sentence> {
        let blocks = split_blocks(lines);
        let mut sentences = Vec::with_capacity(blocks.len());
        let mut skipped = 0usize;

        for block in &blocks {
            match self.sentence_parts(block) {
                Some((text, translation)) => {
                    let index = sentences.len() as u32 + 1;
                    sentences.push(
                        Sentence::new(collection.get(), index, text).with_translation(translation),
                    );
                }
                None => skipped += 1,
            }
        }

        tracing::debug!(
            collection = collection.get(),
            classifier = self.classifier.name(),
            lines = lines.len(),
            blocks = blocks.len(),
            skipped,
            sentences = sentences.len(),
            "Segmented collection"
        );
        sentences
    }

    /// Parse markup into a full [`Collection`] with the default title.
    pub fn parse_collection(
        &self,
        collection: CollectionNumber,
        markup: &str,
        source_url: impl Into<String>,
    ) -> Collection {
        Collection {
            number: collection.get(),
            title: Collection::default_title(collection.get()),
            sentences: self.parse(collection, markup),
            source_url: source_url.into(),
        }
    }

    /// Longest primary line (first on ties) and the preferred translation.
    fn sentence_parts(&self, block: &Block) -> Option<(String, Option<String>)> {
        let mut text: Option<(&str, usize)> = None;
        let mut translation_a: Option<&str> = None;
        let mut translation_b: Option<&str> = None;

        for line in &block.lines {
            if self.classifier.classify(line) == LineClass::PrimaryLanguage {
                let len = line.chars().count();
                if text.map_or(true, |(_, best)| len > best) {
                    text = Some((line, len));
                }
            }
            match self.classifier.translation_class(line) {
                Some(LineClass::SecondaryLanguageA) => {
                    translation_a.get_or_insert(line);
                }
                Some(LineClass::SecondaryLanguageB) => {
                    translation_b.get_or_insert(line);
                }
                _ => {}
            }
        }

        let (text, _) = text?;
        let translation = translation_a.or(translation_b).map(str::to_string);
        Some((text.to_string(), translation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn n(v: i64) -> CollectionNumber {
        CollectionNumber::new(v).unwrap()
    }

    #[test]
    fn test_preamble_is_discarded() {
        let input = lines(&["صلاة قبل العلامة", "1 ▶", "اللهم صل على محمد"]);
        let sentences = SourceDocumentParser::new().parse_lines(n(1), &input);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "اللهم صل على محمد");
        assert_eq!(sentences[0].id, "p1s001");
    }

    #[test]
    fn test_longest_primary_line_wins_with_first_tie_break() {
        let input = lines(&["1 ▶", "قصير", "أطول سطر", "أقصر سطر", "Ô Allah"]);
        let sentences = SourceDocumentParser::new().parse_lines(n(1), &input);
        // "أطول سطر" and "أقصر سطر" have the same length; the first one wins.
        assert_eq!(sentences[0].text, "أطول سطر");
    }

    #[test]
    fn test_block_without_primary_is_skipped_without_gap() {
        let input = lines(&[
            "1 ▶",
            "الأولى",
            "2 ▶",
            "Only a note here",
            "3 ▶",
            "الثالثة",
        ]);
        let sentences = SourceDocumentParser::new().parse_lines(n(4), &input);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].index, 2);
        assert_eq!(sentences[1].id, "p4s002");
        assert_eq!(sentences[1].text, "الثالثة");
    }

    #[test]
    fn test_translation_prefers_pattern_a() {
        let input = lines(&[
            "1 ▶",
            "O Lord, bless the Messenger",
            "اللهم صل على سيدنا محمد",
            "Ô Allah prie sur Muhammad",
            "2 ▶",
            "اللهم بارك",
            "bless him and his family",
            "3 ▶",
            "سلام",
        ]);
        let sentences = SourceDocumentParser::new().parse_lines(n(1), &input);
        assert_eq!(
            sentences[0].translation.as_deref(),
            Some("Ô Allah prie sur Muhammad")
        );
        assert_eq!(
            sentences[1].translation.as_deref(),
            Some("bless him and his family")
        );
        assert_eq!(sentences[2].translation, None);
    }

    #[test]
    fn test_marker_variants() {
        assert_eq!(marker_number("12 ▶"), Some(Some(12)));
        assert_eq!(marker_number("7▶\u{fe0e}"), Some(Some(7)));
        assert_eq!(marker_number("3 ▶ trailing text"), Some(Some(3)));
        assert_eq!(marker_number("▶ 3"), None);
        assert_eq!(marker_number("3 >"), None);
        assert_eq!(marker_number("99999999999999999999999 ▶"), Some(None));
        assert_eq!(marker_number("٣ ▶"), None);
        assert_eq!(marker_number("۱۲ ▶"), None);
    }

    #[test]
    fn test_arabic_indic_numbered_line_stays_in_block() {
        let input = lines(&[
            "1 ▶",
            "اللهم صل",
            "٢ ▶ انظر الحاشية",
            "اللهم صل على سيدنا محمد",
            "2 ▶",
            "اللهم بارك",
        ]);
        let sentences = SourceDocumentParser::new().parse_lines(n(1), &input);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "اللهم صل على سيدنا محمد");
        assert_eq!(sentences[1].id, "p1s002");
        assert_eq!(sentences[1].text, "اللهم بارك");
    }

    #[test]
    fn test_translation_taken_from_primary_script_line() {
        let line = "اللهم صل على سيدنا محمد وعلى آله وصحبه bless";
        let sentences = SourceDocumentParser::new().parse_lines(n(1), &lines(&["1 ▶", line]));
        assert_eq!(sentences[0].text, line);
        assert_eq!(sentences[0].translation.as_deref(), Some(line));
    }

    #[test]
    fn test_no_structure_yields_empty() {
        let parser = SourceDocumentParser::new();
        assert!(parser.parse(n(1), "").is_empty());
        assert!(parser.parse(n(1), "<html><body><p>nothing numbered</p></body></html>").is_empty());
    }

    #[test]
    fn test_custom_classifier() {
        struct Upper;
        impl LineClassifier for Upper {
            fn classify(&self, line: &str) -> LineClass {
                if line.chars().all(|c| !c.is_lowercase()) {
                    LineClass::PrimaryLanguage
                } else {
                    LineClass::SecondaryLanguageB
                }
            }
        }
        let parser = SourceDocumentParser::with_classifier(Upper);
        let sentences = parser.parse_lines(n(2), &lines(&["1 ▶", "HELLO", "hello"]));
        assert_eq!(sentences[0].text, "HELLO");
        assert_eq!(sentences[0].translation.as_deref(), Some("hello"));
    }

    proptest! {
        #[test]
        fn prop_indices_are_contiguous(
            blocks in prop::collection::vec(
                prop::collection::vec(prop_oneof!["[ا-ي ]{1,20}", "[a-z ]{1,20}", "[0-9]{1,3}"], 0..5),
                0..20,
            )
        ) {
            let mut input = Vec::new();
            for (i, block) in blocks.iter().enumerate() {
                input.push(format!("{} ▶", i + 1));
                input.extend(block.iter().cloned());
            }
            let sentences = SourceDocumentParser::new().parse_lines(n(3), &input);
            prop_assert!(sentences.len() <= blocks.len());
            for (pos, sentence) in sentences.iter().enumerate() {
                prop_assert_eq!(sentence.index as usize, pos + 1);
                prop_assert_eq!(&sentence.id, &versereel_project_model::sentence_id(3, pos as u32 + 1));
            }
        }
    }
}
