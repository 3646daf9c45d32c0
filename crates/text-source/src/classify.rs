//! Per-line language classification.
//!
//! Block assembly in the parser only sees [`LineClass`] values, so the
//! detection strategy can be swapped without touching it.

use std::sync::OnceLock;

use regex::Regex;

/// What a single extracted line looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineClass {
    /// Mostly primary-script text: a sentence candidate.
    PrimaryLanguage,
    /// Preferred translation language.
    SecondaryLanguageA,
    /// Fallback translation language.
    SecondaryLanguageB,
    Unclassified,
}

/// Strategy for classifying extracted lines.
pub trait LineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> LineClass;

    /// Translation language of a line, checked on every line of a block
    /// regardless of [`classify`](Self::classify). A primary-script line
    /// can still carry a translation marker.
    fn translation_class(&self, line: &str) -> Option<LineClass> {
        match self.classify(line) {
            class @ (LineClass::SecondaryLanguageA | LineClass::SecondaryLanguageB) => Some(class),
            LineClass::PrimaryLanguage | LineClass::Unclassified => None,
        }
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Share of primary-script characters among letters above which a line
/// counts as primary language.
pub const PRIMARY_RATIO_THRESHOLD: f64 = 0.7;

const FRENCH_PATTERN: &str = r"(?i)^Ô\s|^O\sAllah\b|\bprie\b|\bServiteur\b";
const ENGLISH_PATTERN: &str = r"(?i)^O\sAllah\b|\bbless\b|\bMessenger\b";

static FRENCH: OnceLock<Option<Regex>> = OnceLock::new();
static ENGLISH: OnceLock<Option<Regex>> = OnceLock::new();

/// Arabic-script ratio test for primary lines, keyword patterns for
/// French (A) and English (B) translations.
///
/// Priority is primary, then A, then B.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptRatioClassifier;

impl ScriptRatioClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Ratio of primary-script characters to letters, or `None` if the
    /// line has no letters.
    pub fn primary_ratio(line: &str) -> Option<f64> {
        let mut primary = 0usize;
        let mut letters = 0usize;
        for c in line.chars() {
            if is_primary_script(c) {
                primary += 1;
            }
            if c.is_ascii_alphabetic() || is_core_arabic(c) {
                letters += 1;
            }
        }
        if letters == 0 {
            None
        } else {
            Some(primary as f64 / letters as f64)
        }
    }

    pub fn is_primary(line: &str) -> bool {
        Self::primary_ratio(line.trim()).is_some_and(|r| r > PRIMARY_RATIO_THRESHOLD)
    }

    pub fn is_secondary_a(line: &str) -> bool {
        matches_pattern(&FRENCH, FRENCH_PATTERN, line.trim())
    }

    pub fn is_secondary_b(line: &str) -> bool {
        matches_pattern(&ENGLISH, ENGLISH_PATTERN, line.trim())
    }
}

impl LineClassifier for ScriptRatioClassifier {
    fn classify(&self, line: &str) -> LineClass {
        if Self::is_primary(line) {
            LineClass::PrimaryLanguage
        } else if Self::is_secondary_a(line) {
            LineClass::SecondaryLanguageA
        } else if Self::is_secondary_b(line) {
            LineClass::SecondaryLanguageB
        } else {
            LineClass::Unclassified
        }
    }

    fn translation_class(&self, line: &str) -> Option<LineClass> {
        if Self::is_secondary_a(line) {
            Some(LineClass::SecondaryLanguageA)
        } else if Self::is_secondary_b(line) {
            Some(LineClass::SecondaryLanguageB)
        } else {
            None
        }
    }

    fn name(&self) -> &str {
        "script-ratio"
    }
}

fn matches_pattern(cell: &'static OnceLock<Option<Regex>>, source: &str, line: &str) -> bool {
    cell.get_or_init(|| Regex::new(source).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(line))
}

/// Arabic, Arabic Supplement, and Arabic Extended-A.
fn is_primary_script(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
}

/// The letter set only counts the main Arabic block.
fn is_core_arabic(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}')
}
