//! Lychee-MEI wire format
//!
//! # Architecture
//!
//! ```text
//! Section ──[emitter: quick-xml]──▶ Lychee-MEI text
//! Lychee-MEI text ──[parser: roxmltree]──▶ Section
//! ```
//!
//! Identifiers travel as `xml:id`. Tuplet spans write their ratio as
//! `num` (notes played) and `numBase` (notes replaced).

pub mod emitter;
pub mod parser;

pub use emitter::emit_section;
pub use parser::parse_section;
