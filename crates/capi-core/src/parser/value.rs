//! Literal parsing, one function per [`DataType`].
//!
//! Every function takes the raw value component of a statement and returns
//! the typed [`CompareValue`] or the [`ErrorType`] to report.

use super::split::quoted_split;
use super::ErrorType;
use crate::condition::{CompareValue, DataType};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

/// Parse `raw` as a literal of `data_type`.
pub fn parse_literal(data_type: DataType, raw: &str) -> Result<CompareValue, ErrorType> {
    match data_type {
        DataType::String => parse_string(raw),
        DataType::Numeric => parse_numeric(raw),
        DataType::Date => parse_date(raw),
        DataType::ArrayOfString => parse_string_array(raw),
        DataType::ArrayOfNumeric => parse_numeric_array(raw),
        DataType::Bbox => parse_bbox(raw),
        DataType::Polygon => parse_polygon(raw),
        DataType::Wkt => parse_wkt(raw),
        DataType::GeoJson => Ok(parse_geojson(raw)),
    }
}

/// Guess the data type of a literal from its shape alone. Used for fields
/// that have no capability entry.
pub fn infer_data_type(raw: &str) -> Option<DataType> {
    let raw = raw.trim();
    if unquote(raw).is_some() {
        return Some(DataType::String);
    }
    if let Some(inner) = bracketed(raw) {
        let first = inner.trim_start().chars().next();
        return Some(match first {
            Some('\'') | Some('"') => DataType::ArrayOfString,
            _ => DataType::ArrayOfNumeric,
        });
    }
    parse_number(raw).map(|_| DataType::Numeric)
}

/// Strip one matching pair of `'` or `"` around `raw`.
pub fn unquote(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.len() < 2 {
        return None;
    }
    let first = raw.chars().next()?;
    if (first == '\'' || first == '"') && raw.ends_with(first) {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn bracketed(raw: &str) -> Option<&str> {
    raw.trim().strip_prefix('[')?.strip_suffix(']')
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn has_duplicates<T: PartialEq>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| a == b))
}

pub fn parse_string(raw: &str) -> Result<CompareValue, ErrorType> {
    unquote(raw)
        .map(|s| CompareValue::String(s.to_string()))
        .ok_or(ErrorType::NotQuoted)
}

pub fn parse_numeric(raw: &str) -> Result<CompareValue, ErrorType> {
    parse_number(raw)
        .map(CompareValue::Numeric)
        .ok_or(ErrorType::InvalidValue)
}

/// Dates may be quoted. Naive date-times and plain dates are taken as UTC.
pub fn parse_date(raw: &str) -> Result<CompareValue, ErrorType> {
    let text = unquote(raw).unwrap_or(raw).trim();
    parse_date_text(text)
        .map(CompareValue::Date)
        .ok_or(ErrorType::InvalidDataType)
}

pub fn parse_date_text(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d);
    }
    let utc = FixedOffset::east_opt(0)?;
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    let day = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    utc.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).single()
}

pub fn parse_string_array(raw: &str) -> Result<CompareValue, ErrorType> {
    let inner = bracketed(raw).ok_or(ErrorType::ArrayNotSpecified)?;
    if inner.trim().is_empty() {
        return Err(ErrorType::ArrayIsEmpty);
    }

    let mut items = Vec::new();
    for element in quoted_split(inner, ',') {
        let value = unquote(&element).ok_or(ErrorType::NotQuoted)?;
        items.push(value.to_string());
    }
    if has_duplicates(&items) {
        return Err(ErrorType::ArrayContainsDuplicates);
    }
    Ok(CompareValue::ArrayOfString(items))
}

pub fn parse_numeric_array(raw: &str) -> Result<CompareValue, ErrorType> {
    let items = number_list(raw)?;
    if items.is_empty() {
        return Err(ErrorType::ArrayIsEmpty);
    }
    if has_duplicates(&items) {
        return Err(ErrorType::ArrayContainsDuplicates);
    }
    Ok(CompareValue::ArrayOfNumeric(items))
}

fn number_list(raw: &str) -> Result<Vec<f64>, ErrorType> {
    if bracketed(raw).is_none() {
        return Err(ErrorType::ArrayNotSpecified);
    }
    let items: Vec<f64> = serde_json::from_str(raw.trim()).map_err(|_| ErrorType::InvalidValue)?;
    Ok(items)
}

fn in_degree_range(x: f64, y: f64) -> bool {
    (-180.0..=180.0).contains(&x) && (-90.0..=90.0).contains(&y)
}

/// `[x1, y1, x2, y2]` with the lower-left corner first.
pub fn parse_bbox(raw: &str) -> Result<CompareValue, ErrorType> {
    let items = number_list(raw)?;
    let [x1, y1, x2, y2] = <[f64; 4]>::try_from(items).map_err(|_| ErrorType::InvalidBbox)?;
    if !in_degree_range(x1, y1) || !(x1..=180.0).contains(&x2) || !(y1..=90.0).contains(&y2) {
        return Err(ErrorType::InvalidBbox);
    }
    Ok(CompareValue::Bbox([x1, y1, x2, y2]))
}

pub fn parse_polygon(raw: &str) -> Result<CompareValue, ErrorType> {
    let items = number_list(raw)?;
    if items.is_empty() || items.len() % 2 != 0 {
        return Err(ErrorType::InvalidPolygon);
    }
    if items.chunks(2).any(|pair| !in_degree_range(pair[0], pair[1])) {
        return Err(ErrorType::InvalidPolygon);
    }
    Ok(CompareValue::Polygon(items))
}

pub fn parse_wkt(raw: &str) -> Result<CompareValue, ErrorType> {
    let text = unquote(raw).ok_or(ErrorType::NotQuoted)?;
    if !is_wkt(text) {
        return Err(ErrorType::InvalidWkt);
    }
    Ok(CompareValue::Wkt(text.trim().to_string()))
}

/// GeoJSON is not interpreted; surrounding quotes are removed if present.
pub fn parse_geojson(raw: &str) -> CompareValue {
    let text = unquote(raw).unwrap_or(raw).trim();
    CompareValue::GeoJson(text.to_string())
}

// =============================================================================
// WKT structural check
// =============================================================================

fn wkt_head() -> &'static Regex {
    static HEAD: OnceLock<Regex> = OnceLock::new();
    HEAD.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*(POINT|LINESTRING|POLYGON|MULTIPOINT|MULTILINESTRING|MULTIPOLYGON|GEOMETRYCOLLECTION)\s*(?:ZM|Z|M)?\s*(EMPTY|\(.*\))\s*$",
        )
        .expect("static WKT pattern")
    })
}

/// Structural well-known-text check: known geometry keyword, balanced
/// parentheses at the nesting depth the geometry requires, and coordinate
/// tuples of two to four numbers.
pub fn is_wkt(text: &str) -> bool {
    let Some(caps) = wkt_head().captures(text) else {
        return false;
    };
    let kind = caps[1].to_uppercase();
    let body = &caps[2];
    if body.eq_ignore_ascii_case("EMPTY") {
        return true;
    }

    let Some(depth) = max_depth(body) else {
        return false;
    };
    let depth_ok = match kind.as_str() {
        "POINT" | "LINESTRING" => depth == 1,
        "MULTIPOINT" => depth == 1 || depth == 2,
        "POLYGON" | "MULTILINESTRING" => depth == 2,
        "MULTIPOLYGON" => depth == 3,
        _ => return depth >= 1,
    };
    if !depth_ok {
        return false;
    }

    let flat = body.replace(['(', ')'], ",");
    let mut tuples = 0;
    for tuple in flat.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let numbers: Vec<&str> = tuple.split_whitespace().collect();
        if !(2..=4).contains(&numbers.len()) || numbers.iter().any(|n| parse_number(n).is_none()) {
            return false;
        }
        tuples += 1;
    }
    tuples > 0 && (kind != "POINT" || tuples == 1)
}

/// Deepest parenthesis nesting, or `None` when unbalanced.
fn max_depth(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut max = 0usize;
    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                max = max.max(depth);
            }
            ')' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(max)
}
