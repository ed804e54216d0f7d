//! Lychee-MEI engine
//!
//! Structural, timing and identity engine for Lychee-MEI sections: exact
//! duration arithmetic, tuplet flattening, measure segmentation, beam
//! grouping and stable hierarchical `xml:id` assignment.

pub mod api;
pub mod beat_groups;
pub mod converters;
pub mod errors;
pub mod identity;
pub mod ir;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod tuplets;

// Re-export commonly used types
pub use errors::{ConversionError, ConversionResult, ConversionWarning, RepositoryError};
pub use identity::{IdPath, IdentityMap, IdentityPolicy};
pub use models::*;
pub use pipeline::{convert, section_from_voices, ConversionOutcome, StaffVoices};
pub use settings::ConversionSettings;

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        log::warn!("Logger already initialized: {}", e);
    }

    log::info!("Lychee-MEI WASM module initialized");
}
