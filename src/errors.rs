//! Error types for Lychee-MEI conversion
//!
//! Fatal errors (`ConversionError`) abort the whole conversion and are handed
//! back to the caller untouched. Recoverable conditions (`ConversionWarning`)
//! are logged where they arise and collected alongside the result.

use crate::models::duration::Fraction;
use thiserror::Error;

/// Result type for every fallible core operation
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Top-level conversion error type
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Denomination not present in the duration table
    #[error("Unknown duration: {0:?}")]
    UnknownDuration(String),

    /// A tuplet span whose participants do not match what follows it
    #[error("Malformed tuplet span {span}: {reason}")]
    MalformedTupletSpan { span: String, reason: String },

    /// Attribute value that cannot be interpreted
    #[error("Invalid value '{value}' for attribute '{attribute}': {reason}")]
    InvalidValue {
        attribute: String,
        value: String,
        reason: String,
    },

    /// Identifier that does not follow the xml:id grammar
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Lychee-MEI text that is not well-formed or misses a required element
    #[error("XML error: {0}")]
    Xml(String),

    /// Identity store failure
    #[error("Identity repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Configuration text that cannot be parsed
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// The platform random source failed while minting an identifier
    #[error("Random source unavailable: {0}")]
    Random(String),
}

impl ConversionError {
    pub(crate) fn invalid_value(attribute: &str, value: &str, reason: &str) -> Self {
        ConversionError::InvalidValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed_span(span: Option<&str>, reason: impl Into<String>) -> Self {
        ConversionError::MalformedTupletSpan {
            span: span.unwrap_or("<unnamed>").to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reading or writing persisted identity maps
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed identity map: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recoverable conditions surfaced to the caller's log
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionWarning {
    /// staffDef without meter.count/meter.unit; the default meter was applied
    #[error("Staff {staff} has no meter; assuming {count}/{unit}")]
    MissingMeter { staff: u32, count: u32, unit: u32 },

    /// An event ran past the end of a measure
    #[error("Staff {staff}, layer {layer}: measure {measure} overfilled by {excess}")]
    MeasureOverflow {
        staff: u32,
        layer: u32,
        measure: u32,
        excess: Fraction,
    },

    /// Tuplet duration that no dotted power-of-two value can express
    #[error("Tuplet {span} lasts {value}, which has no written duration")]
    InexpressibleTupletDuration { span: String, value: Fraction },

    /// Meter change found inside a measure; applies from the next barline
    #[error("Staff {staff}: meter change inside measure {measure} deferred to the next measure")]
    DeferredMeterChange { staff: u32, measure: u32 },
}
