//! Request-shape checks that run before any network I/O.

use crate::storage::SourceCatalog;
use capi_core::{Condition, ErrorResponse, ErrorType, ParserError, SourceDefinition, SourceErrorType};
use std::collections::HashSet;

/// Fields a measurement query may filter on.
pub const MEASUREMENT_FIELDS: [&str; 9] = [
    "compartment",
    "measurementobject",
    "unit",
    "quantity",
    "quality",
    "parameter",
    "measurementdate",
    "value",
    "measurementgeography",
];

/// Split a comma-separated `sources` argument. Blank entries are kept so
/// they can be reported as missing.
pub fn split_sources(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Resolve every requested code against the catalog. Each problem becomes
/// one source error; a duplicated code is reported once.
pub fn validate_sources(
    catalog: &dyn SourceCatalog,
    codes: &[String],
    errors: &mut ErrorResponse,
) -> Vec<SourceDefinition> {
    if codes.is_empty() {
        errors.source("", SourceErrorType::Missing);
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut resolved = Vec::new();
    for code in codes {
        if code.is_empty() {
            errors.source("", SourceErrorType::Missing);
            continue;
        }
        if !seen.insert(code.as_str()) {
            if reported.insert(code.as_str()) {
                errors.source(code, SourceErrorType::Duplicate);
            }
            continue;
        }
        match catalog.source_by_code(code) {
            Some(source) => resolved.push(source),
            None => errors.source(code, SourceErrorType::Unknown),
        }
    }
    resolved
}

/// Report conditions on fields no measurement carries.
pub fn check_measurement_fields(conditions: &[Condition], errors: &mut ErrorResponse) {
    errors.request_error.extend(
        conditions
            .iter()
            .filter(|c| !MEASUREMENT_FIELDS.contains(&c.field_name.as_str()))
            .map(|c| ParserError::new(ErrorType::UnknownField, c.field_name.clone())),
    );
}
