//! Stamp coordinates
//!
//! A [`Coordinate`] selects which revisions are visible: status, time,
//! author, module, path and the precedence rule used to break ties.
//!
//! ## Default coordinate
//!
//! Callers that omit a coordinate get [`current_default`]. It is read at call
//! time, in this order:
//!
//! 1. the innermost [`with_default`] override on the current thread
//! 2. the process fallback installed once by [`set_process_default`]
//! 3. [`Coordinate::development_latest`]
//!
//! Overrides are thread-scoped, so a test swapping the default does not
//! affect resolutions running concurrently on other threads.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use crate::metadata;
use crate::stamp::{ComponentId, Stamp, Status, StampTime};

/// Tie-break policy when several revisions are visible at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Branch proximity first, then recency
    #[default]
    PathFirst,
    /// Recency first, then branch proximity
    TimeFirst,
}

/// Immutable query parameters for version resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    statuses: BTreeSet<Status>,
    time: StampTime,
    authors: Option<BTreeSet<ComponentId>>,
    /// Empty means no module filter
    modules: BTreeSet<ComponentId>,
    /// Never empty
    paths: Vec<ComponentId>,
    precedence: Precedence,
}

impl Coordinate {
    /// Active revisions on `path` as of `time`, path precedence, no filters
    pub fn new(path: ComponentId, time: impl Into<StampTime>) -> Self {
        Self {
            statuses: BTreeSet::from([Status::Active]),
            time: time.into(),
            authors: None,
            modules: BTreeSet::new(),
            paths: vec![path],
            precedence: Precedence::PathFirst,
        }
    }

    /// Latest active revisions as seen from the development path
    pub fn development_latest() -> Self {
        Self::new(metadata::DEVELOPMENT_PATH, StampTime::LATEST)
    }

    /// Latest active revisions as seen from the master path
    pub fn master_latest() -> Self {
        Self::new(metadata::MASTER_PATH, StampTime::LATEST)
    }

    pub fn at_time(mut self, time: impl Into<StampTime>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Restrict to these modules; an empty set removes the filter
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = ComponentId>) -> Self {
        self.modules = modules.into_iter().collect();
        self
    }

    pub fn with_authors(mut self, authors: impl IntoIterator<Item = ComponentId>) -> Self {
        self.authors = Some(authors.into_iter().collect());
        self
    }

    pub fn without_author_filter(mut self) -> Self {
        self.authors = None;
        self
    }

    /// Replace the path set with a single path
    pub fn with_path(mut self, path: ComponentId) -> Self {
        self.paths = vec![path];
        self
    }

    /// Add another path to view from; duplicates are ignored
    pub fn also_path(mut self, path: ComponentId) -> Self {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        self
    }

    pub fn statuses(&self) -> &BTreeSet<Status> {
        &self.statuses
    }

    pub fn time(&self) -> StampTime {
        self.time
    }

    pub fn authors(&self) -> Option<&BTreeSet<ComponentId>> {
        self.authors.as_ref()
    }

    pub fn modules(&self) -> &BTreeSet<ComponentId> {
        &self.modules
    }

    pub fn paths(&self) -> &[ComponentId] {
        &self.paths
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Status, time, author and module filters. Path visibility is decided
    /// separately against the path graph.
    pub fn admits(&self, stamp: &Stamp) -> bool {
        stamp.time <= self.time
            && self.statuses.contains(&stamp.status)
            && self
                .authors
                .as_ref()
                .map_or(true, |authors| authors.contains(&stamp.author))
            && (self.modules.is_empty() || self.modules.contains(&stamp.module))
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::development_latest()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.paths.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{:?} @ {} on [{}]",
            self.precedence,
            self.time,
            paths.join(", ")
        )?;
        if !self.modules.is_empty() {
            write!(f, " modules={}", self.modules.len())?;
        }
        if let Some(authors) = &self.authors {
            write!(f, " authors={}", authors.len())?;
        }
        Ok(())
    }
}

static PROCESS_DEFAULT: OnceLock<Coordinate> = OnceLock::new();

thread_local! {
    static SCOPED_DEFAULT: RefCell<Vec<Coordinate>> = const { RefCell::new(Vec::new()) };
}

/// Install the process-wide fallback. Only the first call wins; returns
/// whether this call installed it.
pub fn set_process_default(coordinate: Coordinate) -> bool {
    PROCESS_DEFAULT.set(coordinate).is_ok()
}

/// The coordinate used when a caller passes none
pub fn current_default() -> Coordinate {
    let scoped = SCOPED_DEFAULT.with(|stack| stack.borrow().last().cloned());
    scoped
        .or_else(|| PROCESS_DEFAULT.get().cloned())
        .unwrap_or_else(Coordinate::development_latest)
}

/// Resolve an optional caller-supplied coordinate against the default
pub fn or_default(coordinate: Option<&Coordinate>) -> Coordinate {
    coordinate.cloned().unwrap_or_else(current_default)
}

/// Run `f` with `coordinate` as the default on this thread
pub fn with_default<R>(coordinate: Coordinate, f: impl FnOnce() -> R) -> R {
    struct Restore;

    impl Drop for Restore {
        fn drop(&mut self) {
            SCOPED_DEFAULT.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }

    SCOPED_DEFAULT.with(|stack| stack.borrow_mut().push(coordinate));
    let _restore = Restore;
    f()
}
