//! # Condition Model
//!
//! One parsed clause of a filter expression. The comparison value is a tagged
//! union keyed by [`DataType`], so every comparison site has to handle each
//! shape explicitly.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a statement (`field:operator:value`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CompareMethod {
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    In,
    NotIn,
    Like,
    StartsWith,
    EndsWith,
    Wkt,
    GeoJson,
    Bbox,
}

impl CompareMethod {
    pub const ALL: [CompareMethod; 14] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Ge,
        Self::Gt,
        Self::In,
        Self::NotIn,
        Self::Like,
        Self::StartsWith,
        Self::EndsWith,
        Self::Wkt,
        Self::GeoJson,
        Self::Bbox,
    ];

    /// Case-insensitive operator lookup. `None` for anything unknown.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == lowered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Like => "like",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Wkt => "wkt",
            Self::GeoJson => "geojson",
            Self::Bbox => "bbox",
        }
    }

    /// Multi-value operators whose literal must be a bracketed array.
    pub fn is_set_operator(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for CompareMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a comparison value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    String,
    Numeric,
    Date,
    ArrayOfString,
    ArrayOfNumeric,
    Bbox,
    Polygon,
    Wkt,
    GeoJson,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::ArrayOfString => "arrayOfString",
            Self::ArrayOfNumeric => "arrayOfNumeric",
            Self::Bbox => "bbox",
            Self::Polygon => "polygon",
            Self::Wkt => "wkt",
            Self::GeoJson => "geoJson",
        };
        f.write_str(name)
    }
}

/// A parsed comparison literal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "dataType", content = "compareData", rename_all = "camelCase")]
pub enum CompareValue {
    String(String),
    Numeric(f64),
    Date(DateTime<FixedOffset>),
    ArrayOfString(Vec<String>),
    ArrayOfNumeric(Vec<f64>),
    /// `[x1, y1, x2, y2]` in degrees.
    Bbox([f64; 4]),
    /// Flat `[x, y, x, y, ...]` list in degrees.
    Polygon(Vec<f64>),
    Wkt(String),
    GeoJson(String),
}

impl CompareValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Numeric(_) => DataType::Numeric,
            Self::Date(_) => DataType::Date,
            Self::ArrayOfString(_) => DataType::ArrayOfString,
            Self::ArrayOfNumeric(_) => DataType::ArrayOfNumeric,
            Self::Bbox(_) => DataType::Bbox,
            Self::Polygon(_) => DataType::Polygon,
            Self::Wkt(_) => DataType::Wkt,
            Self::GeoJson(_) => DataType::GeoJson,
        }
    }

    /// Canonical textual form. Parsing this text again yields an equal value.
    pub fn canonical(&self) -> String {
        match self {
            Self::String(s) | Self::Wkt(s) | Self::GeoJson(s) => s.clone(),
            Self::Numeric(n) => n.to_string(),
            Self::Date(d) => d.to_rfc3339(),
            Self::ArrayOfString(items) => {
                serde_json::to_string(items).unwrap_or_else(|_| "[]".into())
            }
            Self::ArrayOfNumeric(items) | Self::Polygon(items) => number_list(items),
            Self::Bbox(b) => number_list(b),
        }
    }

    /// The value written as a filter literal, e.g. `'Q1'` or `['A','B']`.
    pub fn to_filter_literal(&self) -> String {
        match self {
            Self::String(s) | Self::Wkt(s) | Self::GeoJson(s) => quote(s),
            Self::Date(d) => quote(&d.to_rfc3339()),
            Self::ArrayOfString(items) => {
                let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
                format!("[{}]", quoted.join(","))
            }
            _ => self.canonical(),
        }
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}

fn number_list(items: &[f64]) -> String {
    let parts: Vec<String> = items.iter().map(|n| n.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// One validated clause. Immutable once the parser hands it out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field_name: String,
    pub compare_method: CompareMethod,
    #[serde(flatten)]
    pub value: CompareValue,
}

impl Condition {
    pub fn new(field_name: impl Into<String>, compare_method: CompareMethod, value: CompareValue) -> Self {
        Self {
            field_name: field_name.into(),
            compare_method,
            value,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// String-like payload (`string`, `wkt`, `geojson`).
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            CompareValue::String(s) | CompareValue::Wkt(s) | CompareValue::GeoJson(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            CompareValue::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<FixedOffset>> {
        match self.value {
            CompareValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match &self.value {
            CompareValue::ArrayOfString(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number_array(&self) -> Option<&[f64]> {
        match &self.value {
            CompareValue::ArrayOfNumeric(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bbox(&self) -> Option<[f64; 4]> {
        match self.value {
            CompareValue::Bbox(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&[f64]> {
        match &self.value {
            CompareValue::Polygon(items) => Some(items),
            _ => None,
        }
    }

    /// Canonical re-serialization of the comparison value.
    pub fn compare_data_string(&self) -> String {
        self.value.canonical()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.field_name,
            self.compare_method,
            self.value.to_filter_literal()
        )
    }
}
