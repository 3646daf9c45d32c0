//! Versereel Text Source
//!
//! Turns a scraped collection page into an ordered list of sentences:
//! - **Markup:** visible-text extraction as trimmed, whitespace-normalized lines
//! - **Classify:** per-line language detection behind [`LineClassifier`]
//! - **Parser:** block assembly and sentence selection ([`SourceDocumentParser`])
//! - **Fetch:** HTTP retrieval of a collection page ([`CollectionFetcher`])
//!
//! Parsing never fails. Markup without recognizable structure yields an
//! empty sentence list; only retrieval reports errors.

pub mod classify;
pub mod fetch;
pub mod markup;
pub mod parser;

pub use classify::{LineClass, LineClassifier, ScriptRatioClassifier};
pub use fetch::CollectionFetcher;
pub use markup::visible_lines;
pub use parser::SourceDocumentParser;
