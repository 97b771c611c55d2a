//! # Residual Filter
//!
//! Applies conditions a backend could not evaluate to decoded
//! [`Measurement`]s. The property a condition is checked against follows from
//! the field's [`DataCategory`]; spatial operators always use the point
//! coordinate.

use crate::capability::{CapabilitySet, DataCategory};
use crate::condition::{CompareMethod, Condition};
use crate::measurement::Measurement;
use std::cmp::Ordering;

/// Drop every measurement that fails any of `conditions`. Order is kept.
pub fn retain_matching(
    measurements: &mut Vec<Measurement>,
    conditions: &[Condition],
    capabilities: &CapabilitySet,
) {
    if conditions.is_empty() {
        return;
    }
    let resolved: Vec<(&Condition, DataCategory)> = conditions
        .iter()
        .map(|c| (c, capabilities.category_for_field(&c.field_name)))
        .collect();
    measurements.retain(|m| resolved.iter().all(|(c, category)| matches(m, c, *category)));
}

/// Whether one measurement satisfies one condition.
pub fn matches(measurement: &Measurement, condition: &Condition, category: DataCategory) -> bool {
    match condition.compare_method {
        CompareMethod::Bbox => return in_bbox(measurement, condition),
        CompareMethod::Wkt | CompareMethod::GeoJson => return true,
        _ => {}
    }

    match category {
        DataCategory::Other => true,
        DataCategory::Value => match_number(measurement.value, condition),
        DataCategory::MeasurementDate => match_date(measurement, condition),
        DataCategory::Quantity
        | DataCategory::Unit
        | DataCategory::Parameter
        | DataCategory::Compartment
        | DataCategory::MeasurementObject => {
            let property = string_property(measurement, category).unwrap_or_default();
            match_string(property, condition)
        }
    }
}

fn string_property(m: &Measurement, category: DataCategory) -> Option<&str> {
    match category {
        DataCategory::Quantity => m.quantity.as_deref(),
        DataCategory::Unit => m.unit.as_deref(),
        DataCategory::Parameter => m.parameter.as_deref(),
        DataCategory::Compartment => m.compartment.as_deref(),
        DataCategory::MeasurementObject => m.measurement_object.as_deref(),
        _ => None,
    }
}

fn match_string(property: &str, condition: &Condition) -> bool {
    let value = condition.as_str().unwrap_or_default();
    let list = condition.as_string_array().unwrap_or_default();
    match condition.compare_method {
        CompareMethod::Eq => property == value,
        CompareMethod::Ne => property != value,
        CompareMethod::Like => property.contains(value),
        CompareMethod::StartsWith => property.starts_with(value),
        CompareMethod::EndsWith => property.ends_with(value),
        CompareMethod::In => list.iter().any(|v| v == property),
        CompareMethod::NotIn => !list.iter().any(|v| v == property),
        _ => true,
    }
}

fn match_number(property: Option<f64>, condition: &Condition) -> bool {
    let Some(actual) = property else {
        return matches!(condition.compare_method, CompareMethod::Ne | CompareMethod::NotIn);
    };
    if condition.compare_method.is_set_operator() {
        let listed = condition
            .as_number_array()
            .unwrap_or_default()
            .iter()
            .any(|v| *v == actual);
        return listed == (condition.compare_method == CompareMethod::In);
    }
    match condition.as_number() {
        Some(expected) => ordered(actual.partial_cmp(&expected), condition.compare_method),
        None => true,
    }
}

fn match_date(measurement: &Measurement, condition: &Condition) -> bool {
    let Some(actual) = measurement.measurement_date else {
        return condition.compare_method == CompareMethod::Ne;
    };
    match condition.as_date() {
        Some(expected) => ordered(
            Some(actual.date_naive().cmp(&expected.date_naive())),
            condition.compare_method,
        ),
        None => true,
    }
}

fn ordered(ordering: Option<Ordering>, method: CompareMethod) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match method {
        CompareMethod::Eq => ordering == Ordering::Equal,
        CompareMethod::Ne => ordering != Ordering::Equal,
        CompareMethod::Lt => ordering == Ordering::Less,
        CompareMethod::Le => ordering != Ordering::Greater,
        CompareMethod::Gt => ordering == Ordering::Greater,
        CompareMethod::Ge => ordering != Ordering::Less,
        _ => true,
    }
}

/// Inclusive on all four edges.
fn in_bbox(measurement: &Measurement, condition: &Condition) -> bool {
    let (Some([x1, y1, x2, y2]), Some((x, y))) = (
        condition.as_bbox(),
        measurement.coordinate.as_ref().and_then(|g| g.as_point()),
    ) else {
        return false;
    };
    (x1..=x2).contains(&x) && (y1..=y2).contains(&y)
}
