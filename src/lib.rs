//! STAMP Versioning Core
//!
//! Every fact about a terminology component is an append-only sequence of
//! revisions, each tagged with a STAMP: Status, Time, Author, Module, Path.
//! This crate answers "what is true as of this coordinate" and carries the
//! typed values attribute records are made of.
//!
//! ## Features
//!
//! - **Version Resolution**: deterministic latest-version selection with
//!   path-first or time-first precedence
//! - **Path Promotion Graph**: branch ancestry with fork times and cycle
//!   detection
//! - **Contradiction Surfacing**: tied winners are returned, never collapsed
//! - **Typed Values**: canonical, tag-identified byte encodings
//! - **Assemblage Schemas**: versioned column descriptors resolved through
//!   the same engine
//!
//! ## Architecture
//!
//! ```text
//! Coordinate ──► Resolver ──► PathGraph
//!                   ▲
//!                   │ (nested resolution of the assemblage)
//! TypedValue ──► SchemaRegistry
//! ```

pub mod chronology;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod metadata;
pub mod path_graph;
pub mod resolve;
pub mod schema;
pub mod stamp;
pub mod value;

pub use chronology::{Chronology, ChronologySource, InMemoryStore, Version};
pub use config::StampConfig;
pub use coordinate::{Coordinate, Precedence};
pub use error::{Result, StampError};
pub use path_graph::{Origin, PathGraph, PathGraphBuilder};
pub use resolve::{ContradictionPolicy, Latest, Resolver};
pub use schema::{AttributeRecord, ColumnDescriptor, ColumnLookup, SchemaRegistry, UsageDescription};
pub use stamp::{ComponentId, Stamp, StampTime, Status};
pub use value::{ColumnRef, DataType, TypedValue, Value};
