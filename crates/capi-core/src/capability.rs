//! # Capability Registry
//!
//! Per-deployment declaration of which fields a filter may reference, what
//! they mean, which operators they accept and whether they are mandatory.
//! All lookups are total: unknown input degrades to [`DataCategory::Other`]
//! or an empty answer instead of an error.

use crate::condition::{CompareMethod, DataType};
use serde::{Deserialize, Serialize};

/// Semantic meaning of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataCategory {
    #[default]
    Other,
    Quantity,
    Unit,
    Value,
    MeasurementObject,
    Parameter,
    MeasurementDate,
    Compartment,
}

/// Operator family of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    StringExact,
    #[serde(alias = "stringWildCard")]
    StringWildcard,
    Numeric,
    Date,
    Geo,
}

/// One declared field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorCapability {
    #[serde(alias = "field_name")]
    pub field_name: String,
    #[serde(alias = "data_category")]
    pub data_category: DataCategory,
    #[serde(alias = "query_type")]
    pub query_type: QueryType,
    #[serde(default)]
    pub required: bool,
}

impl ConnectorCapability {
    pub fn new(field_name: &str, data_category: DataCategory, query_type: QueryType) -> Self {
        Self {
            field_name: field_name.to_string(),
            data_category,
            query_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// =============================================================================
// Static tables
// =============================================================================

const STRING_TYPES: &[DataType] = &[DataType::String, DataType::ArrayOfString];
const OBJECT_TYPES: &[DataType] = &[
    DataType::String,
    DataType::ArrayOfString,
    DataType::Bbox,
    DataType::Polygon,
    DataType::Wkt,
    DataType::GeoJson,
];
const VALUE_TYPES: &[DataType] = &[DataType::Numeric, DataType::ArrayOfNumeric];
const DATE_TYPES: &[DataType] = &[DataType::Date];

const EXACT_OPS: &[CompareMethod] = &[
    CompareMethod::Eq,
    CompareMethod::Ne,
    CompareMethod::In,
    CompareMethod::NotIn,
];
const WILDCARD_OPS: &[CompareMethod] = &[
    CompareMethod::Eq,
    CompareMethod::Ne,
    CompareMethod::In,
    CompareMethod::NotIn,
    CompareMethod::Like,
    CompareMethod::StartsWith,
    CompareMethod::EndsWith,
];
const NUMERIC_OPS: &[CompareMethod] = &[
    CompareMethod::Eq,
    CompareMethod::Ne,
    CompareMethod::In,
    CompareMethod::NotIn,
    CompareMethod::Ge,
    CompareMethod::Gt,
    CompareMethod::Le,
    CompareMethod::Lt,
];
const DATE_OPS: &[CompareMethod] = &[
    CompareMethod::Eq,
    CompareMethod::Ne,
    CompareMethod::Ge,
    CompareMethod::Gt,
    CompareMethod::Le,
    CompareMethod::Lt,
];
const GEO_OPS: &[CompareMethod] = &[CompareMethod::Bbox, CompareMethod::Wkt, CompareMethod::GeoJson];

/// Data types a category admits. `Other` admits nothing.
pub fn allowed_data_types(category: DataCategory) -> &'static [DataType] {
    match category {
        DataCategory::Other => &[],
        DataCategory::Quantity
        | DataCategory::Unit
        | DataCategory::Parameter
        | DataCategory::Compartment => STRING_TYPES,
        DataCategory::MeasurementObject => OBJECT_TYPES,
        DataCategory::Value => VALUE_TYPES,
        DataCategory::MeasurementDate => DATE_TYPES,
    }
}

/// Operators a query type accepts.
pub fn allowed_operators(query_type: QueryType) -> &'static [CompareMethod] {
    match query_type {
        QueryType::StringExact => EXACT_OPS,
        QueryType::StringWildcard => WILDCARD_OPS,
        QueryType::Numeric => NUMERIC_OPS,
        QueryType::Date => DATE_OPS,
        QueryType::Geo => GEO_OPS,
    }
}

/// Data type implied by an operator on a field of the given query type.
/// `None` means the combination is not expressible.
pub fn data_type_for(query_type: QueryType, method: CompareMethod) -> Option<DataType> {
    use CompareMethod as M;
    match (query_type, method) {
        (QueryType::StringExact | QueryType::StringWildcard, M::Eq | M::Ne) => Some(DataType::String),
        (QueryType::StringExact | QueryType::StringWildcard, M::In | M::NotIn) => {
            Some(DataType::ArrayOfString)
        }
        (QueryType::StringWildcard, M::Like | M::StartsWith | M::EndsWith) => Some(DataType::String),
        (QueryType::Numeric, M::Eq | M::Ne | M::Ge | M::Gt | M::Le | M::Lt) => Some(DataType::Numeric),
        (QueryType::Numeric, M::In | M::NotIn) => Some(DataType::ArrayOfNumeric),
        (QueryType::Date, M::Eq | M::Ne | M::Ge | M::Gt | M::Le | M::Lt) => Some(DataType::Date),
        (QueryType::Geo, M::Bbox) => Some(DataType::Bbox),
        (QueryType::Geo, M::Wkt) => Some(DataType::Wkt),
        (QueryType::Geo, M::GeoJson) => Some(DataType::GeoJson),
        _ => None,
    }
}

// =============================================================================
// CapabilitySet
// =============================================================================

/// The active, read-only capability declaration of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct CapabilitySet {
    entries: Vec<ConnectorCapability>,
}

impl CapabilitySet {
    /// Field names are normalized to lowercase; a repeated field keeps its
    /// first declaration.
    pub fn new(entries: Vec<ConnectorCapability>) -> Self {
        let mut unique: Vec<ConnectorCapability> = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.field_name = entry.field_name.trim().to_lowercase();
            if !unique.iter().any(|e| e.field_name == entry.field_name) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    /// Fields every C-API deployment understands.
    pub fn builtin() -> Self {
        Self::new(vec![
            ConnectorCapability::new("compartment", DataCategory::Compartment, QueryType::StringExact),
            ConnectorCapability::new("parameter", DataCategory::Parameter, QueryType::StringWildcard),
            ConnectorCapability::new("quantity", DataCategory::Quantity, QueryType::StringWildcard),
            ConnectorCapability::new("unit", DataCategory::Unit, QueryType::StringExact),
            ConnectorCapability::new(
                "measurementobject",
                DataCategory::MeasurementObject,
                QueryType::StringWildcard,
            ),
            ConnectorCapability::new("measurementdate", DataCategory::MeasurementDate, QueryType::Date),
            ConnectorCapability::new("value", DataCategory::Value, QueryType::Numeric),
            ConnectorCapability::new(
                "measurementgeography",
                DataCategory::MeasurementObject,
                QueryType::Geo,
            ),
        ])
    }

    pub fn entries(&self) -> &[ConnectorCapability] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field_name: &str) -> Option<&ConnectorCapability> {
        self.entries.iter().find(|e| e.field_name == field_name)
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.get(field_name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.field_name.as_str()).collect()
    }

    pub fn category_for_field(&self, field_name: &str) -> DataCategory {
        self.get(field_name).map(|e| e.data_category).unwrap_or_default()
    }

    pub fn query_type_for_field(&self, field_name: &str) -> Option<QueryType> {
        self.get(field_name).map(|e| e.query_type)
    }

    pub fn fields_for_category(&self, category: DataCategory) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.data_category == category)
            .map(|e| e.field_name.as_str())
            .collect()
    }

    /// First field declared for a category, if any.
    pub fn field_for_category(&self, category: DataCategory) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.data_category == category)
            .map(|e| e.field_name.as_str())
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.required)
            .map(|e| e.field_name.as_str())
            .collect()
    }

    /// Data type an operator implies on a declared field.
    pub fn data_type_for_field(&self, field_name: &str, method: CompareMethod) -> Option<DataType> {
        self.query_type_for_field(field_name)
            .and_then(|qt| data_type_for(qt, method))
    }
}

impl From<Vec<ConnectorCapability>> for CapabilitySet {
    fn from(entries: Vec<ConnectorCapability>) -> Self {
        Self::new(entries)
    }
}
