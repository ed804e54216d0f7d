//! Pending tuplet ratios keyed by participant identifier
//!
//! A span marker registers its multiplier against every id in its `plist`;
//! the participant picks up the product of all ratios registered for it
//! (one per enclosing tuplet) when it is reached.

use crate::models::{Event, Fraction, TupletSpan};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct TupletRatioTable {
    pending: HashMap<String, Vec<Fraction>>,
}

impl TupletRatioTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `span`'s multiplier for each participant it names
    pub fn register(&mut self, span: &TupletSpan) {
        let Some(multiplier) = span.multiplier() else {
            return;
        };
        for id in &span.plist {
            self.pending.entry(id.clone()).or_default().push(multiplier);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Product of every ratio registered for `id`, removing the entry
    pub fn take(&mut self, id: &str) -> Option<Fraction> {
        self.pending.remove(id).map(|ratios| {
            ratios
                .into_iter()
                .fold(Fraction::from_integer(1), |product, ratio| product * ratio)
        })
    }

    /// Nominal duration of `event` scaled by its pending ratios
    pub fn scaled(&mut self, event: &Event) -> Fraction {
        let nominal = event.nominal();
        match event.id().and_then(|id| self.take(id)) {
            Some(ratio) => nominal * ratio,
            None => nominal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
