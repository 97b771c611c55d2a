//! # Filter Parser
//!
//! Turns a filter expression into validated [`Condition`]s.
//!
//! Syntax:
//! ```text
//! quantity:eq:'Q1';measurementdate:ge:'2024-01-01';unit:in:['mg/l','ug/l']
//! ```
//!
//! Validation runs as a fixed pipeline over one error accumulator. Once any
//! error is recorded every later stage is skipped, so an empty error list
//! means the whole expression was checked. Conditions are only handed out
//! when the error list is empty.

pub mod split;
pub mod value;

use crate::capability::{allowed_data_types, CapabilitySet};
use crate::condition::{CompareMethod, Condition, DataType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a parser error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Error)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    #[error("unknown field")]
    UnknownField,
    #[error("unknown compare method")]
    UnknownCompareMethod,
    #[error("invalid value")]
    InvalidValue,
    #[error("invalid bounding box")]
    InvalidBbox,
    #[error("invalid syntax")]
    InvalidSyntax,
    #[error("array contains duplicates")]
    ArrayContainsDuplicates,
    #[error("array is empty")]
    ArrayIsEmpty,
    #[error("invalid polygon")]
    InvalidPolygon,
    #[error("invalid well-known text")]
    InvalidWkt,
    #[error("invalid data type")]
    InvalidDataType,
    #[error("required field missing")]
    Required,
    #[error("quote mismatch")]
    QuoteMismatch,
    #[error("bracket mismatch")]
    BracketMismatch,
    #[error("filter required")]
    FilterRequired,
    #[error("array not specified")]
    ArrayNotSpecified,
    #[error("not quoted")]
    NotQuoted,
}

/// One reported problem and the text it refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {context}")]
pub struct ParserError {
    #[serde(rename = "errorType")]
    pub kind: ErrorType,
    pub context: String,
}

impl ParserError {
    pub fn new(kind: ErrorType, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }
}

/// Result of one parse. `conditions` is empty whenever `errors` is not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub conditions: Vec<Condition>,
    pub errors: Vec<ParserError>,
}

impl ParseOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parser bound to one capability set.
#[derive(Debug, Clone, Copy)]
pub struct FilterParser<'a> {
    capabilities: &'a CapabilitySet,
    allow_empty: bool,
    skip_unknown_fields: bool,
}

impl<'a> FilterParser<'a> {
    pub fn new(capabilities: &'a CapabilitySet) -> Self {
        Self {
            capabilities,
            allow_empty: false,
            skip_unknown_fields: false,
        }
    }

    /// Accept a blank expression instead of reporting `FilterRequired`.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Let fields without a capability entry through. Their data type is
    /// taken from the shape of the literal.
    pub fn skip_unknown_fields(mut self, skip: bool) -> Self {
        self.skip_unknown_fields = skip;
        self
    }

    pub fn parse(&self, expression: Option<&str>) -> ParseOutcome {
        let mut pass = Pass::default();
        let text = expression.unwrap_or_default();

        if !self.allow_empty && text.trim().is_empty() {
            pass.push(ErrorType::FilterRequired, "");
        }
        if pass.clean() {
            check_quotes(text, &mut pass);
        }
        if pass.clean() && count(text, '[') != count(text, ']') {
            pass.push(ErrorType::BracketMismatch, text);
        }
        for statement in split::statements(text) {
            if !pass.clean() {
                break;
            }
            self.statement(&statement, &mut pass);
        }
        if pass.clean() {
            self.check_required(&mut pass);
        }

        pass.finish()
    }

    fn statement(&self, statement: &str, pass: &mut Pass) {
        let parts = split::components(statement);
        if parts.len() != 3 || parts[2].trim().is_empty() {
            pass.push(ErrorType::InvalidSyntax, statement);
            return;
        }

        let field = parts[0].trim().to_lowercase();
        let Some(method) = CompareMethod::parse(&parts[1]) else {
            pass.push(ErrorType::UnknownCompareMethod, statement);
            return;
        };
        let raw = parts[2].trim();

        if method.is_set_operator() {
            if let Err(kind) = check_array(raw) {
                pass.push(kind, statement);
                return;
            }
        }

        let data_type = if self.capabilities.contains(&field) {
            let category = self.capabilities.category_for_field(&field);
            match self.capabilities.data_type_for_field(&field, method) {
                Some(dt) if allowed_data_types(category).contains(&dt) => dt,
                _ => {
                    pass.push(ErrorType::InvalidDataType, statement);
                    return;
                }
            }
        } else if self.skip_unknown_fields {
            match shape_of(method, raw) {
                Some(dt) => dt,
                None => {
                    pass.push(ErrorType::InvalidValue, raw);
                    return;
                }
            }
        } else {
            pass.push(ErrorType::UnknownField, field);
            return;
        };

        match value::parse_literal(data_type, raw) {
            Ok(value) => pass.conditions.push(Condition::new(field, method, value)),
            Err(kind) => pass.push(kind, raw),
        }
    }

    fn check_required(&self, pass: &mut Pass) {
        for required in self.capabilities.required_fields() {
            if !pass.conditions.iter().any(|c| c.field_name == required) {
                pass.push(ErrorType::Required, required);
            }
        }
    }
}

/// Convenience wrapper over [`FilterParser`].
pub fn parse(
    expression: Option<&str>,
    allow_empty: bool,
    capabilities: &CapabilitySet,
    skip_unknown_fields: bool,
) -> ParseOutcome {
    FilterParser::new(capabilities)
        .allow_empty(allow_empty)
        .skip_unknown_fields(skip_unknown_fields)
        .parse(expression)
}

// =============================================================================
// Pipeline helpers
// =============================================================================

#[derive(Default)]
struct Pass {
    conditions: Vec<Condition>,
    errors: Vec<ParserError>,
}

impl Pass {
    fn clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, kind: ErrorType, context: impl Into<String>) {
        self.errors.push(ParserError::new(kind, context));
    }

    fn finish(self) -> ParseOutcome {
        let conditions = if self.errors.is_empty() {
            self.conditions
        } else {
            Vec::new()
        };
        ParseOutcome {
            conditions,
            errors: self.errors,
        }
    }
}

fn count(text: &str, needle: char) -> usize {
    text.chars().filter(|c| *c == needle).count()
}

fn check_quotes(text: &str, pass: &mut Pass) {
    if count(text, '\'') % 2 != 0 {
        pass.push(ErrorType::QuoteMismatch, "'");
    }
    if count(text, '"') % 2 != 0 {
        pass.push(ErrorType::QuoteMismatch, "\"");
    }
}

/// Shape check for `in`/`notin` literals ahead of typed parsing.
fn check_array(raw: &str) -> Result<(), ErrorType> {
    if !raw.contains('[') || !raw.contains(']') {
        return Err(ErrorType::ArrayNotSpecified);
    }
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();
    if stripped.trim().is_empty() {
        return Err(ErrorType::ArrayIsEmpty);
    }
    let items: Vec<&str> = stripped.split(',').map(str::trim).collect();
    let duplicated = items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].contains(a));
    if duplicated {
        return Err(ErrorType::ArrayContainsDuplicates);
    }
    Ok(())
}

fn shape_of(method: CompareMethod, raw: &str) -> Option<DataType> {
    match method {
        CompareMethod::Bbox => Some(DataType::Bbox),
        CompareMethod::Wkt => Some(DataType::Wkt),
        CompareMethod::GeoJson => Some(DataType::GeoJson),
        _ => value::infer_data_type(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{allowed_operators, ConnectorCapability, DataCategory, QueryType};
    use crate::condition::CompareValue;

    fn caps() -> CapabilitySet {
        CapabilitySet::new(vec![
            ConnectorCapability::new("quantity", DataCategory::Quantity, QueryType::StringWildcard),
            ConnectorCapability::new("measurementdate", DataCategory::MeasurementDate, QueryType::Date),
            ConnectorCapability::new("unit", DataCategory::Unit, QueryType::StringExact),
            ConnectorCapability::new("value", DataCategory::Value, QueryType::Numeric),
        ])
    }

    fn kinds(outcome: &ParseOutcome) -> Vec<ErrorType> {
        outcome.errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_quantity_and_date() {
        let outcome = parse(
            Some("quantity:eq:'Q1';measurementdate:ge:'2024-01-01'"),
            false,
            &caps(),
            false,
        );
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert_eq!(outcome.conditions.len(), 2);
        assert_eq!(outcome.conditions[0].data_type(), DataType::String);
        assert_eq!(outcome.conditions[0].as_str(), Some("Q1"));
        assert_eq!(outcome.conditions[1].data_type(), DataType::Date);
        assert_eq!(outcome.conditions[1].compare_method, CompareMethod::Ge);
    }

    #[test]
    fn test_unknown_field() {
        let outcome = parse(Some("unknownfield:eq:'X'"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::UnknownField]);
        assert_eq!(outcome.errors[0].context, "unknownfield");
        assert!(outcome.conditions.is_empty());
    }

    #[test]
    fn test_unknown_field_skipped_takes_literal_shape() {
        let outcome = parse(Some("Colour:in:['red','blue'];depth:gt:3"), false, &caps(), true);
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert_eq!(outcome.conditions[0].field_name, "colour");
        assert_eq!(outcome.conditions[0].data_type(), DataType::ArrayOfString);
        assert_eq!(outcome.conditions[1].as_number(), Some(3.0));
    }

    #[test]
    fn test_blank_expression() {
        let outcome = parse(Some("   "), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::FilterRequired]);

        let outcome = parse(None, true, &caps(), false);
        assert!(outcome.is_valid());
        assert!(outcome.conditions.is_empty());
    }

    #[test]
    fn test_quote_and_bracket_mismatch() {
        for expression in ["quantity:eq:'Q1", "quantity:eq:\"Q1", "unit:in:['a','b'"] {
            let outcome = parse(Some(expression), false, &caps(), false);
            assert_eq!(outcome.errors.len(), 1, "{}", expression);
            assert!(outcome.conditions.is_empty());
        }
        let outcome = parse(Some("quantity:eq:'Q1"), false, &caps(), false);
        assert_eq!(outcome.errors[0], ParserError::new(ErrorType::QuoteMismatch, "'"));
        let outcome = parse(Some("unit:in:['a'"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::BracketMismatch]);
    }

    #[test]
    fn test_array_errors() {
        let outcome = parse(Some("unit:in:['mg/l','mg/l']"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::ArrayContainsDuplicates]);

        let outcome = parse(Some("unit:notin:[]"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::ArrayIsEmpty]);

        let outcome = parse(Some("unit:in:'mg/l'"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::ArrayNotSpecified]);

        let outcome = parse(Some("value:in:[1,2,1]"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::ArrayContainsDuplicates]);
    }

    #[test]
    fn test_statement_shape_errors() {
        let outcome = parse(Some("quantity:eq"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::InvalidSyntax]);

        let outcome = parse(Some("quantity:between:'Q1'"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::UnknownCompareMethod]);

        let outcome = parse(Some("unit:like:'mg'"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::InvalidDataType]);

        let outcome = parse(Some("quantity:eq:Q1"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::NotQuoted]);
    }

    #[test]
    fn test_errors_are_sticky() {
        let outcome = parse(Some("nope:eq:'X';other:eq:'Y';value:gt:abc"), false, &caps(), false);
        assert_eq!(kinds(&outcome), vec![ErrorType::UnknownField]);
    }

    #[test]
    fn test_required_fields() {
        let caps = CapabilitySet::new(vec![
            ConnectorCapability::new("quantity", DataCategory::Quantity, QueryType::StringExact),
            ConnectorCapability::new("measurementdate", DataCategory::MeasurementDate, QueryType::Date)
                .required(),
        ]);
        let outcome = parse(Some("quantity:eq:'Q1'"), false, &caps, false);
        assert_eq!(outcome.errors, vec![ParserError::new(ErrorType::Required, "measurementdate")]);
        assert!(outcome.conditions.is_empty());
    }

    #[test]
    fn test_embedded_separators_in_literals() {
        let outcome = parse(
            Some("quantity:eq:'a;b:c';measurementdate:lt:'2024-01-01T10:00:00Z'"),
            false,
            &caps(),
            false,
        );
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert_eq!(outcome.conditions[0].as_str(), Some("a;b:c"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let expression = "unit:in:['a','b'];value:le:10;quantity:like:'Q'";
        let first = parse(Some(expression), false, &caps(), false);
        let second = parse(Some(expression), false, &caps(), false);
        assert_eq!(first, second);
        assert_eq!(first.conditions.len(), 3);
    }

    #[test]
    fn test_conditions_reparse_from_their_display() {
        let outcome = parse(
            Some("unit:notin:['a','b'];value:in:[1.5,2];measurementdate:eq:'2024-05-01'"),
            false,
            &caps(),
            false,
        );
        for condition in &outcome.conditions {
            let again = parse(Some(&condition.to_string()), false, &caps(), false);
            assert_eq!(again.conditions, vec![condition.clone()]);
        }
    }

    #[test]
    fn test_accepted_operators_match_capabilities() {
        let caps = CapabilitySet::builtin();
        for entry in caps.entries() {
            let allowed = allowed_operators(entry.query_type);
            for op in CompareMethod::ALL {
                let literal = match (allowed.contains(&op), caps.data_type_for_field(&entry.field_name, op)) {
                    (true, Some(dt)) => sample_literal(dt),
                    _ if op.is_set_operator() => "['a']".to_string(),
                    _ => "'a'".to_string(),
                };
                let expression = format!("{}:{}:{}", entry.field_name, op, literal);
                let outcome = parse(Some(&expression), false, &caps, false);
                assert_eq!(
                    outcome.is_valid(),
                    allowed.contains(&op),
                    "{} -> {:?}",
                    expression,
                    outcome.errors
                );
            }
        }
    }

    fn sample_literal(data_type: DataType) -> String {
        match data_type {
            DataType::String => "'a'",
            DataType::Numeric => "1",
            DataType::Date => "'2024-01-01'",
            DataType::ArrayOfString => "['a','b']",
            DataType::ArrayOfNumeric => "[1,2]",
            DataType::Bbox => "[0,0,1,1]",
            DataType::Polygon => "[0,0,1,0,1,1]",
            DataType::Wkt => "'POINT (1 2)'",
            DataType::GeoJson => "'{}'",
        }
        .to_string()
    }

    #[test]
    fn test_bbox_condition() {
        let outcome = parse(
            Some("measurementgeography:bbox:[-1,-1,1,1]"),
            false,
            &CapabilitySet::builtin(),
            false,
        );
        assert_eq!(outcome.conditions[0].value, CompareValue::Bbox([-1.0, -1.0, 1.0, 1.0]));
    }
}
