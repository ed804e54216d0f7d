//! Intermediate Representation (IR) Module
//!
//! Turns an unmeasured section into its measured form.
//!
//! ```text
//! Section (staff → layer, flat event streams)
//!     ↓
//! Measurizer (exact-fraction segmentation per staff/layer)
//!     ↓
//! Section (measure → staff → layer)
//! ```

pub mod measurization;

pub use measurization::{layer_duration, measurize_section, Measurizer};
