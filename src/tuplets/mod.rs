//! Tuplet Span Codec
//!
//! Front-ends hand tuplets over as nested containers; Lychee-MEI stores them
//! as flat `tupletSpan` annotations that point back at their participants.
//!
//! - **tree**: arena-backed canonical tuplet tree
//! - **codec**: pure `encode`/`decode` between tree and wire form
//! - **ratios**: pending-ratio table used when timing flattened layers

pub mod codec;
pub mod ratios;
pub mod tree;

pub use codec::{decode, decode_layer, encode, encode_voice, Flattened, VoiceItem};
pub use ratios::TupletRatioTable;
pub use tree::{ContainerId, TupletChild, TupletContainer, TupletSpec, TupletTree};
