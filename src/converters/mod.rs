//! Format converters
//!
//! Lychee-MEI text in and out of the document model.

pub mod lychee_mei;

pub use lychee_mei::{emit_section, parse_section};
