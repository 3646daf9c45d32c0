//! Versereel Project Model
//!
//! Defines the core data contracts shared by the parser, the timing
//! editor, and the renderer:
//! - **Segments:** Stable sentence identifiers derived from (collection, index)
//! - **Collections:** Ordered sentence lists produced by the source parser
//! - **Readers:** Static reference data mapping collections to audio sources
//! - **Timing:** Per-sentence audio intervals, editor drafts, and validation
//! - **Selection:** Contiguous sentence ranges resolved into render state
//!
//! Sentence identifiers are the seam between independently authored timing
//! data and re-fetched source text: they depend only on the collection
//! number and the emitted sentence index.

pub mod collection;
pub mod error;
pub mod reader;
pub mod segment;
pub mod selection;
pub mod store;
pub mod timing;

pub use collection::*;
pub use error::*;
pub use reader::*;
pub use segment::*;
pub use selection::*;
pub use store::*;
pub use timing::*;
