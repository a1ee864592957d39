//! STAMP primitives: Status, Time, Author, Module, Path
//!
//! Every revision of a component carries one immutable [`Stamp`]. Authors,
//! modules and paths are themselves components, referenced by [`ComponentId`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer identity of a component (concept, path, assemblage, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i32);

impl ComponentId {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i32> for ComponentId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed 64-bit instant in epoch milliseconds.
///
/// `i64::MAX` doubles as the "uncommitted" sentinel for revisions and as
/// "latest" for coordinates, so a coordinate at [`StampTime::LATEST`] sees
/// uncommitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampTime(pub i64);

impl StampTime {
    pub const UNCOMMITTED: StampTime = StampTime(i64::MAX);
    pub const LATEST: StampTime = StampTime(i64::MAX);
    pub const EPOCH: StampTime = StampTime(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn is_uncommitted(self) -> bool {
        self == Self::UNCOMMITTED
    }

    /// The wall-clock instant, or `None` for the sentinel and out-of-range values
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.is_uncommitted() {
            return None;
        }
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for StampTime {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }
}

impl fmt::Display for StampTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(at) => write!(f, "{}", at.to_rfc3339()),
            None if self.is_uncommitted() => f.write_str("uncommitted"),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// The five-dimensional key distinguishing revisions of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub status: Status,
    pub time: StampTime,
    pub author: ComponentId,
    pub module: ComponentId,
    pub path: ComponentId,
}

impl Stamp {
    pub fn new(
        status: Status,
        time: StampTime,
        author: ComponentId,
        module: ComponentId,
        path: ComponentId,
    ) -> Self {
        Self {
            status,
            time,
            author,
            module,
            path,
        }
    }

    /// Active stamp authored by the default user in the core module
    pub fn active(time: impl Into<StampTime>, path: ComponentId) -> Self {
        Self::new(
            Status::Active,
            time.into(),
            crate::metadata::USER,
            crate::metadata::CORE_MODULE,
            path,
        )
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_author(mut self, author: ComponentId) -> Self {
        self.author = author;
        self
    }

    pub fn with_module(mut self, module: ComponentId) -> Self {
        self.module = module;
        self
    }
}

impl From<i64> for StampTime {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} author={} module={} path={}]",
            self.status, self.time, self.author, self.module, self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncommitted_sorts_after_every_commit() {
        assert!(StampTime::from_millis(1_700_000_000_000) < StampTime::UNCOMMITTED);
        assert!(StampTime::UNCOMMITTED.is_uncommitted());
        assert_eq!(StampTime::UNCOMMITTED.to_string(), "uncommitted");
    }

    #[test]
    fn test_time_from_datetime() {
        let at = Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap();
        let time = StampTime::from(at);
        assert_eq!(time.to_datetime(), Some(at));
    }

    #[test]
    fn test_stamp_builders() {
        let stamp = Stamp::active(10, ComponentId(5))
            .with_status(Status::Inactive)
            .with_module(ComponentId(9));
        assert_eq!(stamp.status, Status::Inactive);
        assert_eq!(stamp.module, ComponentId(9));
        assert_eq!(stamp.path, ComponentId(5));
        assert_eq!(stamp.time, StampTime(10));
    }
}
