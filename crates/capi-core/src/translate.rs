//! # Category Translator
//!
//! A source ships a table of [`Map`] entries pairing a generic
//! `(category, name)` with the source's own `(category, name)`. Lookups scan
//! the table in order and return the first match, or the input unchanged.

use crate::capability::DataCategory;
use serde::{Deserialize, Serialize};

/// One translation entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    #[serde(rename = "cApiDataCategory", alias = "capiDataCategory")]
    pub capi_data_category: DataCategory,
    pub capi_name: String,
    pub source_data_category: DataCategory,
    pub source_name: String,
}

impl Map {
    pub fn new(
        capi_data_category: DataCategory,
        capi_name: &str,
        source_data_category: DataCategory,
        source_name: &str,
    ) -> Self {
        Self {
            capi_data_category,
            capi_name: capi_name.to_string(),
            source_data_category,
            source_name: source_name.to_string(),
        }
    }
}

/// Generic vocabulary to source vocabulary.
pub fn to_source(maps: &[Map], category: DataCategory, name: &str) -> (DataCategory, String) {
    maps.iter()
        .find(|m| m.capi_data_category == category && m.capi_name == name)
        .map(|m| (m.source_data_category, m.source_name.clone()))
        .unwrap_or_else(|| (category, name.to_string()))
}

/// Source vocabulary back to generic vocabulary.
pub fn to_generic(maps: &[Map], category: DataCategory, name: &str) -> (DataCategory, String) {
    maps.iter()
        .find(|m| m.source_data_category == category && m.source_name == name)
        .map(|m| (m.capi_data_category, m.capi_name.clone()))
        .unwrap_or_else(|| (category, name.to_string()))
}
