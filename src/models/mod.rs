//! Models module for the Lychee-MEI document tree
//!
//! Values here are built once from front-end input and treated as
//! immutable afterwards; the engine modules consume and rebuild them.

pub mod duration;
pub mod elements;
pub mod pitch;
pub mod score;

// Re-export commonly used types
pub use duration::{resolve, Denomination, Duration, Fraction};
pub use elements::*;
pub use pitch::{Accidental, AccidentalDisplay, Pitch, PitchName};
pub use score::*;
