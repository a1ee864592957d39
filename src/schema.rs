//! Assemblage schemas (usage descriptions)
//!
//! An assemblage is a component whose payload is a [`UsageDescription`]: the
//! ordered columns every attribute record of that assemblage carries. The
//! schema is versioned like any other component, so the columns visible
//! depend on the coordinate. Column order defines the index a
//! [`TypedValue`] back-reference points at.
//!
//! The registry is an ordinary client of [`Resolver`]; resolution has no
//! special case for schema lookups.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chronology::ChronologySource;
use crate::coordinate::{self, Coordinate};
use crate::error::{Result, StampError};
use crate::resolve::{Latest, Resolver};
use crate::stamp::ComponentId;
use crate::value::{DataType, TypedValue};

/// One column of an assemblage schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<TypedValue>,
    #[serde(default)]
    pub required: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: None,
            data_type,
            default_value: None,
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default; it must have the column's type
    pub fn with_default(mut self, value: TypedValue) -> Result<Self> {
        if value.data_type() != self.data_type {
            return Err(StampError::MalformedValue {
                data_type: self.data_type,
                reason: format!(
                    "default for column '{}' has type {}",
                    self.name,
                    value.data_type()
                ),
            });
        }
        self.default_value = Some(value);
        Ok(self)
    }
}

/// Payload of an assemblage component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDescription {
    pub description: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl UsageDescription {
    pub fn new(description: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            description: description.into(),
            columns,
        }
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Payload of an attribute record: typed data about one component,
/// classified by an assemblage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub referenced_component: ComponentId,
    pub assemblage: ComponentId,
    pub data: Vec<TypedValue>,
}

impl AttributeRecord {
    pub fn new(referenced_component: ComponentId, assemblage: ComponentId, data: Vec<TypedValue>) -> Self {
        Self {
            referenced_component,
            assemblage,
            data,
        }
    }

    /// The data with each value attached to its column position
    pub fn columns(&self) -> Vec<TypedValue> {
        self.data
            .iter()
            .enumerate()
            .map(|(index, value)| value.clone().with_column(self.assemblage, index))
            .collect()
    }
}

/// Column name lookup, as needed by [`TypedValue::resolved_name`]
pub trait ColumnLookup {
    /// Ordered columns of `assemblage` at `coordinate`
    fn columns(&self, assemblage: ComponentId, coordinate: &Coordinate) -> Result<&[ColumnDescriptor]>;

    fn column_name(&self, assemblage: ComponentId, index: usize, coordinate: &Coordinate) -> Result<String> {
        let columns = self.columns(assemblage, coordinate)?;
        columns
            .get(index)
            .map(|c| c.name.clone())
            .ok_or(StampError::ColumnIndexOutOfRange {
                assemblage,
                index,
                columns: columns.len(),
            })
    }
}

/// Resolves assemblage schemas from a store of usage descriptions
#[derive(Debug)]
pub struct SchemaRegistry<'a, S> {
    resolver: Resolver<'a>,
    store: &'a S,
}

impl<'a, S> SchemaRegistry<'a, S>
where
    S: ChronologySource<Payload = UsageDescription>,
{
    pub fn new(resolver: Resolver<'a>, store: &'a S) -> Self {
        Self { resolver, store }
    }

    /// The unambiguous usage description of `assemblage`.
    ///
    /// Zero or several visible schema versions fail with
    /// [`StampError::SchemaUnresolved`]: a value cannot be typed under two
    /// schemas at once.
    pub fn usage(&self, assemblage: ComponentId, coordinate: Option<&Coordinate>) -> Result<&'a UsageDescription> {
        let coordinate = coordinate::or_default(coordinate);
        let latest = match self.resolver.resolve_latest(self.store, assemblage, Some(&coordinate)) {
            Ok(latest) => latest,
            Err(StampError::ComponentNotFound(_)) => Latest::Absent,
            Err(e) => return Err(e),
        };
        match latest {
            Latest::Unique(version) => Ok(version.payload()),
            other => {
                debug!(%assemblage, visible = other.len(), %coordinate, "schema unresolved");
                Err(StampError::SchemaUnresolved {
                    assemblage,
                    visible: other.len(),
                })
            }
        }
    }

    /// Ordered column descriptors of `assemblage`
    pub fn describe(&self, assemblage: ComponentId, coordinate: Option<&Coordinate>) -> Result<&'a [ColumnDescriptor]> {
        Ok(&self.usage(assemblage, coordinate)?.columns)
    }

    /// One column, by index
    pub fn describe_column(
        &self,
        assemblage: ComponentId,
        index: usize,
        coordinate: Option<&Coordinate>,
    ) -> Result<&'a ColumnDescriptor> {
        let columns = self.describe(assemblage, coordinate)?;
        columns.get(index).ok_or(StampError::ColumnIndexOutOfRange {
            assemblage,
            index,
            columns: columns.len(),
        })
    }
}

impl<'a, S> ColumnLookup for SchemaRegistry<'a, S>
where
    S: ChronologySource<Payload = UsageDescription>,
{
    fn columns(&self, assemblage: ComponentId, coordinate: &Coordinate) -> Result<&[ColumnDescriptor]> {
        self.describe(assemblage, Some(coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronology::InMemoryStore;
    use crate::metadata::MASTER_PATH;
    use crate::path_graph::PathGraph;
    use crate::stamp::Stamp;

    const REASON: ComponentId = ComponentId(700);

    fn store() -> InMemoryStore<UsageDescription> {
        let mut store = InMemoryStore::new();
        store.append(
            REASON,
            Stamp::active(10, MASTER_PATH),
            UsageDescription::new(
                "Reason for retirement",
                vec![ColumnDescriptor::new("status", DataType::String).required()],
            ),
        );
        store
    }

    #[test]
    fn test_describe_returns_ordered_columns() {
        let graph = PathGraph::default();
        let store = store();
        let registry = SchemaRegistry::new(Resolver::new(&graph), &store);

        let columns = registry
            .describe(REASON, Some(&Coordinate::master_latest()))
            .unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "status");
        assert!(columns[0].required);
    }

    #[test]
    fn test_unknown_assemblage_is_unresolved() {
        let graph = PathGraph::default();
        let store = store();
        let registry = SchemaRegistry::new(Resolver::new(&graph), &store);

        let err = registry
            .describe(ComponentId(1), Some(&Coordinate::master_latest()))
            .unwrap_err();
        assert!(matches!(err, StampError::SchemaUnresolved { visible: 0, .. }));
    }

    #[test]
    fn test_tied_schema_versions_are_fatal() {
        let graph = PathGraph::default();
        let mut store = store();
        store.append(
            REASON,
            Stamp::active(10, MASTER_PATH),
            UsageDescription::new("competing", vec![ColumnDescriptor::new("other", DataType::Int)]),
        );
        let registry = SchemaRegistry::new(Resolver::new(&graph), &store);

        let err = registry
            .describe(REASON, Some(&Coordinate::master_latest()))
            .unwrap_err();
        assert!(matches!(err, StampError::SchemaUnresolved { visible: 2, .. }));
    }

    #[test]
    fn test_describe_column_out_of_range() {
        let graph = PathGraph::default();
        let store = store();
        let registry = SchemaRegistry::new(Resolver::new(&graph), &store);

        let err = registry
            .describe_column(REASON, 3, Some(&Coordinate::master_latest()))
            .unwrap_err();
        assert!(matches!(
            err,
            StampError::ColumnIndexOutOfRange { index: 3, columns: 1, .. }
        ));
    }

    #[test]
    fn test_default_must_match_column_type() {
        let ok = ColumnDescriptor::new("count", DataType::Int).with_default(TypedValue::from(0i32));
        assert!(ok.is_ok());

        let err = ColumnDescriptor::new("count", DataType::Int)
            .with_default(TypedValue::from("zero"))
            .unwrap_err();
        assert!(matches!(err, StampError::MalformedValue { data_type: DataType::Int, .. }));
    }

    #[test]
    fn test_attribute_record_attaches_column_positions() {
        let record = AttributeRecord::new(
            ComponentId(1),
            REASON,
            vec![TypedValue::from("retired"), TypedValue::from(3i32)],
        );
        let columns = record.columns();
        assert_eq!(columns[1].column_ref().unwrap().column, 1);
        assert_eq!(columns[1].column_ref().unwrap().assemblage, REASON);
        // attaching does not change identity
        assert_eq!(columns, record.data);
    }

    #[test]
    fn test_registry_names_columns() {
        let graph = PathGraph::default();
        let store = store();
        let registry = SchemaRegistry::new(Resolver::new(&graph), &store);

        let value = TypedValue::from("retired").with_column(REASON, 0);
        let name = value
            .resolved_name(&registry, Some(&Coordinate::master_latest()))
            .unwrap();
        assert_eq!(name, "status");
        assert_eq!(value.cached_name(), Some("status"));
        assert_eq!(value.to_string(), "(STRING - status - retired)");
    }
}
