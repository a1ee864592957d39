//! Version resolution
//!
//! Selects the visible "latest" revision(s) of a component for a
//! [`Coordinate`]:
//!
//! 1. Drop revisions the coordinate does not admit (future time, status,
//!    author, module).
//! 2. Rank each survivor by its promotion distance from the nearest
//!    coordinate path; unreachable revisions are dropped.
//! 3. Apply precedence. `PathFirst` keeps the lowest rank, then the latest
//!    time within it. `TimeFirst` keeps the latest time, then the lowest
//!    rank within it.
//! 4. Every revision left after tie-breaking is a winner. More than one
//!    winner is a contradiction in the authored history and is returned as
//!    such; this module never picks one arbitrarily.
//!
//! Winners are reported in insertion order, so identical inputs always give
//! identical output.

use tracing::{debug, trace};

use crate::chronology::{Chronology, ChronologySource, Version};
use crate::coordinate::{Coordinate, Precedence};
use crate::error::{Result, StampError};
use crate::path_graph::PathGraph;
use crate::stamp::ComponentId;

/// Outcome of resolving one component
#[derive(Debug, PartialEq)]
pub enum Latest<'a, P> {
    /// Nothing visible at this coordinate
    Absent,
    /// Exactly one visible winner
    Unique(&'a Version<P>),
    /// Several tied winners, in insertion order
    Contradicted(Vec<&'a Version<P>>),
}

// Manual impls: `P` itself need not be Clone/Copy.
impl<P> Clone for Latest<'_, P> {
    fn clone(&self) -> Self {
        match self {
            Latest::Absent => Latest::Absent,
            Latest::Unique(v) => Latest::Unique(*v),
            Latest::Contradicted(vs) => Latest::Contradicted(vs.clone()),
        }
    }
}

/// What a caller that needs a single answer does with a contradiction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContradictionPolicy {
    /// Any winner will do; the first in insertion order is taken
    AnyOne,
    /// Treat the contradiction as an error
    #[default]
    Fail,
}

impl<'a, P> Latest<'a, P> {
    fn from_winners(mut winners: Vec<&'a Version<P>>) -> Self {
        match winners.len() {
            0 => Latest::Absent,
            1 => Latest::Unique(winners.remove(0)),
            _ => Latest::Contradicted(winners),
        }
    }

    /// All winners, in insertion order
    pub fn versions(&self) -> Vec<&'a Version<P>> {
        match self {
            Latest::Absent => Vec::new(),
            Latest::Unique(v) => vec![*v],
            Latest::Contradicted(vs) => vs.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Latest::Absent => 0,
            Latest::Unique(_) => 1,
            Latest::Contradicted(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Latest::Absent)
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, Latest::Contradicted(_))
    }

    /// The unambiguous winner, if there is exactly one
    pub fn unique(&self) -> Option<&'a Version<P>> {
        match self {
            Latest::Unique(v) => Some(*v),
            _ => None,
        }
    }

    /// Collapse to at most one version under an explicit policy
    pub fn pick(&self, policy: ContradictionPolicy, component: ComponentId) -> Result<Option<&'a Version<P>>> {
        match (self, policy) {
            (Latest::Absent, _) => Ok(None),
            (Latest::Unique(v), _) => Ok(Some(*v)),
            (Latest::Contradicted(vs), ContradictionPolicy::AnyOne) => Ok(vs.first().copied()),
            (Latest::Contradicted(vs), ContradictionPolicy::Fail) => Err(StampError::Contradiction {
                component,
                count: vs.len(),
            }),
        }
    }
}

/// Stateless resolver over a path graph.
///
/// Holds only a shared borrow, so it can be used from many threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'g> {
    paths: &'g PathGraph,
}

impl<'g> Resolver<'g> {
    pub fn new(paths: &'g PathGraph) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &'g PathGraph {
        self.paths
    }

    /// Look up a component and resolve it; `None` uses the current default
    /// coordinate
    pub fn resolve_latest<'s, S>(
        &self,
        store: &'s S,
        component: ComponentId,
        coordinate: Option<&Coordinate>,
    ) -> Result<Latest<'s, S::Payload>>
    where
        S: ChronologySource,
        S::Payload: PartialEq,
    {
        let chronology = store
            .chronology(component)
            .ok_or(StampError::ComponentNotFound(component))?;
        match coordinate {
            Some(coordinate) => self.resolve(chronology, coordinate),
            None => self.resolve(chronology, &crate::coordinate::current_default()),
        }
    }

    /// Resolve the visible winner(s) of one chronology
    pub fn resolve<'c, P: PartialEq>(
        &self,
        chronology: &'c Chronology<P>,
        coordinate: &Coordinate,
    ) -> Result<Latest<'c, P>> {
        let mut ranked: Vec<(usize, &'c Version<P>)> = Vec::new();
        for version in chronology.versions() {
            if !coordinate.admits(version.stamp()) {
                continue;
            }
            match self.path_rank(version, coordinate)? {
                Some(rank) => ranked.push((rank, version)),
                None => trace!(
                    component = %chronology.id(),
                    path = %version.stamp().path,
                    "version not reachable from coordinate paths"
                ),
            }
        }

        let winners = select(ranked, coordinate.precedence());
        let winners = collapse_duplicates(winners);
        let latest = Latest::from_winners(winners);

        if latest.is_contradiction() {
            debug!(
                component = %chronology.id(),
                winners = latest.len(),
                %coordinate,
                "contradictory versions"
            );
        } else {
            debug!(
                component = %chronology.id(),
                visible = !latest.is_empty(),
                "resolved latest version"
            );
        }
        Ok(latest)
    }

    /// Whether `version` survives the filters and path visibility, before
    /// any precedence is applied
    pub fn is_visible<P>(&self, version: &Version<P>, coordinate: &Coordinate) -> Result<bool> {
        if !coordinate.admits(version.stamp()) {
            return Ok(false);
        }
        Ok(self.path_rank(version, coordinate)?.is_some())
    }

    /// Minimum promotion distance from any coordinate path
    fn path_rank<P>(&self, version: &Version<P>, coordinate: &Coordinate) -> Result<Option<usize>> {
        let stamp = version.stamp();
        let mut best: Option<usize> = None;
        for &query in coordinate.paths() {
            let distance = self.paths.distance(stamp.path, query, coordinate.time())?;
            best = match (best, distance) {
                (Some(b), Some(d)) => Some(b.min(d)),
                (b, d) => b.or(d),
            };
        }
        Ok(best)
    }
}

fn keep_lowest_rank<'a, P>(ranked: Vec<(usize, &'a Version<P>)>) -> Vec<(usize, &'a Version<P>)> {
    let Some(best) = ranked.iter().map(|(rank, _)| *rank).min() else {
        return ranked;
    };
    ranked.into_iter().filter(|(rank, _)| *rank == best).collect()
}

fn keep_latest<'a, P>(ranked: Vec<(usize, &'a Version<P>)>) -> Vec<(usize, &'a Version<P>)> {
    let Some(best) = ranked.iter().map(|(_, v)| v.stamp().time).max() else {
        return ranked;
    };
    ranked
        .into_iter()
        .filter(|(_, v)| v.stamp().time == best)
        .collect()
}

fn select<'a, P>(ranked: Vec<(usize, &'a Version<P>)>, precedence: Precedence) -> Vec<&'a Version<P>> {
    let survivors = match precedence {
        Precedence::PathFirst => keep_latest(keep_lowest_rank(ranked)),
        Precedence::TimeFirst => keep_lowest_rank(keep_latest(ranked)),
    };
    survivors.into_iter().map(|(_, v)| v).collect()
}

/// Identical STAMP and payload assert the same fact twice; keep the first
fn collapse_duplicates<'a, P: PartialEq>(winners: Vec<&'a Version<P>>) -> Vec<&'a Version<P>> {
    let mut kept: Vec<&'a Version<P>> = Vec::with_capacity(winners.len());
    for version in winners {
        if !kept.iter().any(|k| *k == version) {
            kept.push(version);
        }
    }
    kept
}
