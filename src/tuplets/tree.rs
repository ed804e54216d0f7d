//! Canonical in-memory tuplet tree
//!
//! Containers live in an arena and refer to nested containers by index, so
//! the tree can be cloned, compared and serialised without pointer links.

use crate::errors::{ConversionError, ConversionResult};
use crate::models::{Duration, Event, Fraction, TupletRatio};
use serde::{Deserialize, Serialize};

/// Index of a container inside its `TupletTree`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub usize);

/// How a tuplet states its scaling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TupletSpec {
    /// Multiplier applied to the children's nominal durations
    Ratio(TupletRatio),
    /// Fixed target duration; the ratio follows from the children
    Duration(Duration),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TupletChild {
    Event(Event),
    Tuplet(ContainerId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TupletContainer {
    #[serde(default)]
    pub id: Option<String>,
    pub spec: TupletSpec,
    #[serde(default)]
    pub children: Vec<TupletChild>,
}

/// A tuplet with its nested tuplets; container 0 is the root
///
/// Every nested container is referenced exactly once, by a container with
/// a lower index, so the arena is always a tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TupletTreeFields")]
pub struct TupletTree {
    containers: Vec<TupletContainer>,
}

/// Unchecked serde form of `TupletTree`
#[derive(Deserialize)]
struct TupletTreeFields {
    containers: Vec<TupletContainer>,
}

impl TryFrom<TupletTreeFields> for TupletTree {
    type Error = ConversionError;

    fn try_from(fields: TupletTreeFields) -> ConversionResult<Self> {
        let containers = fields.containers;
        if containers.is_empty() {
            return Err(ConversionError::invalid_value("containers", "[]", "a tuplet tree needs a root"));
        }
        let mut referenced = vec![false; containers.len()];
        for (parent, container) in containers.iter().enumerate() {
            for child in &container.children {
                let TupletChild::Tuplet(ContainerId(index)) = child else {
                    continue;
                };
                let index = *index;
                if index >= containers.len() {
                    return Err(ConversionError::invalid_value(
                        "containers",
                        &index.to_string(),
                        "nested tuplet index out of range",
                    ));
                }
                if index <= parent {
                    return Err(ConversionError::invalid_value(
                        "containers",
                        &index.to_string(),
                        "nested tuplet must come after its parent",
                    ));
                }
                if referenced[index] {
                    return Err(ConversionError::invalid_value(
                        "containers",
                        &index.to_string(),
                        "nested tuplet referenced twice",
                    ));
                }
                referenced[index] = true;
            }
        }
        Ok(Self { containers })
    }
}

impl TupletTree {
    pub fn new(spec: TupletSpec) -> Self {
        Self {
            containers: vec![TupletContainer {
                id: None,
                spec,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> ContainerId {
        ContainerId(0)
    }

    pub fn container(&self, id: ContainerId) -> &TupletContainer {
        &self.containers[id.0]
    }

    pub fn container_mut(&mut self, id: ContainerId) -> &mut TupletContainer {
        &mut self.containers[id.0]
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers[0].children.is_empty()
    }

    pub fn push_event(&mut self, parent: ContainerId, event: Event) {
        self.containers[parent.0].children.push(TupletChild::Event(event));
    }

    /// Append a nested tuplet to `parent` and return its id
    pub fn push_tuplet(&mut self, parent: ContainerId, spec: TupletSpec) -> ContainerId {
        let id = ContainerId(self.containers.len());
        self.containers.push(TupletContainer {
            id: None,
            spec,
            children: Vec::new(),
        });
        self.containers[parent.0].children.push(TupletChild::Tuplet(id));
        id
    }

    /// Sum of the children's unscaled durations; nested tuplets count
    /// with their notated duration
    pub fn nominal_sum(&self, id: ContainerId) -> Fraction {
        self.container(id)
            .children
            .iter()
            .map(|child| match child {
                TupletChild::Event(event) => event.nominal(),
                TupletChild::Tuplet(nested) => self.duration_of(*nested),
            })
            .fold(Fraction::from_integer(0), |total, value| total + value)
    }

    /// Notated duration of a container
    pub fn duration_of(&self, id: ContainerId) -> Fraction {
        match self.container(id).spec {
            TupletSpec::Duration(duration) => duration.to_fraction(),
            TupletSpec::Ratio(ratio) => {
                if ratio.denominator == 0 {
                    return Fraction::from_integer(0);
                }
                ratio.to_fraction() * self.nominal_sum(id)
            }
        }
    }

    /// Ratio of a container; derived (reduced) for duration-defined
    /// containers, `None` when there are no children to derive it from
    pub fn ratio_of(&self, id: ContainerId) -> Option<TupletRatio> {
        match self.container(id).spec {
            TupletSpec::Ratio(ratio) => Some(ratio),
            TupletSpec::Duration(duration) => {
                let sum = self.nominal_sum(id);
                if sum == Fraction::from_integer(0) {
                    return None;
                }
                let multiplier = duration.to_fraction() / sum;
                Some(TupletRatio::new(
                    *multiplier.numer() as u32,
                    *multiplier.denom() as u32,
                ))
            }
        }
    }

    /// Every leaf event in document order
    pub fn events(&self) -> Vec<&Event> {
        let mut events = Vec::new();
        self.collect_events(self.root(), &mut events);
        events
    }

    fn collect_events<'a>(&'a self, id: ContainerId, events: &mut Vec<&'a Event>) {
        for child in &self.container(id).children {
            match child {
                TupletChild::Event(event) => events.push(event),
                TupletChild::Tuplet(nested) => self.collect_events(*nested, events),
            }
        }
    }

    /// Copy rebuilt in document order with every identifier removed
    pub fn without_ids(&self) -> TupletTree {
        let root = self.container(self.root());
        let mut copy = TupletTree::new(root.spec);
        let to = copy.root();
        self.copy_children(self.root(), &mut copy, to);
        copy
    }

    fn copy_children(&self, from: ContainerId, copy: &mut TupletTree, to: ContainerId) {
        for child in &self.container(from).children {
            match child {
                TupletChild::Event(event) => copy.push_event(to, event.without_ids()),
                TupletChild::Tuplet(nested) => {
                    let nested_copy = copy.push_tuplet(to, self.container(*nested).spec);
                    self.copy_children(*nested, copy, nested_copy);
                }
            }
        }
    }
}
