//! Components and their append-only revision histories
//!
//! A [`Chronology`] owns the versions of one component in insertion order.
//! Versions are pushed, never edited or removed. Duplicate rejection is the
//! authoring layer's job; resolution copes with duplicates regardless.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::stamp::{ComponentId, Stamp};

/// One immutable, STAMP-tagged revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version<P> {
    stamp: Stamp,
    payload: P,
}

impl<P> Version<P> {
    pub fn new(stamp: Stamp, payload: P) -> Self {
        Self { stamp, payload }
    }

    #[inline]
    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// Revision history of a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chronology<P> {
    id: ComponentId,
    versions: Vec<Version<P>>,
}

impl<P> Chronology<P> {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            versions: Vec::new(),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Append a revision
    pub fn push(&mut self, stamp: Stamp, payload: P) {
        self.versions.push(Version::new(stamp, payload));
    }

    /// Builder-style append
    pub fn with_version(mut self, stamp: Stamp, payload: P) -> Self {
        self.push(stamp, payload);
        self
    }

    /// Versions in insertion order
    pub fn versions(&self) -> &[Version<P>] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Read access to published chronologies.
///
/// The backing store guarantees that a newly appended version becomes visible
/// atomically; the resolver only ever reads through this trait.
pub trait ChronologySource {
    type Payload;

    fn chronology(&self, id: ComponentId) -> Option<&Chronology<Self::Payload>>;
}

/// Map-backed store, used by tests and by embedders without their own index
#[derive(Debug, Clone)]
pub struct InMemoryStore<P> {
    chronologies: HashMap<ComponentId, Chronology<P>>,
}

impl<P> Default for InMemoryStore<P> {
    fn default() -> Self {
        Self {
            chronologies: HashMap::new(),
        }
    }
}

impl<P> InMemoryStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version, creating the chronology on first use
    pub fn append(&mut self, id: ComponentId, stamp: Stamp, payload: P) {
        self.chronologies
            .entry(id)
            .or_insert_with(|| Chronology::new(id))
            .push(stamp, payload);
    }

    /// Replace a whole chronology
    pub fn insert(&mut self, chronology: Chronology<P>) {
        self.chronologies.insert(chronology.id(), chronology);
    }

    pub fn len(&self) -> usize {
        self.chronologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chronologies.is_empty()
    }
}

impl<P> ChronologySource for InMemoryStore<P> {
    type Payload = P;

    fn chronology(&self, id: ComponentId) -> Option<&Chronology<P>> {
        self.chronologies.get(&id)
    }
}

impl<P> ChronologySource for HashMap<ComponentId, Chronology<P>> {
    type Payload = P;

    fn chronology(&self, id: ComponentId) -> Option<&Chronology<P>> {
        self.get(&id)
    }
}
