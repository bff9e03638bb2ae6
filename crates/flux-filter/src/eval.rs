// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Evaluates a parsed [`Filter`] against a [`Properties`] map.

use crate::ast::{CompareOp, Filter, SubstringSegment};
use flux_properties::{Properties, Value};

pub fn matches(filter: &Filter, props: &Properties) -> bool {
    match filter {
        Filter::Empty => true,
        Filter::Present { attr } => props.contains_key(attr),
        Filter::Substring { attr, segments, case_insensitive } => {
            let Some(value) = props.get(attr) else { return false };
            let haystack = value.to_display_string();
            match_substring(&haystack, segments, *case_insensitive)
        }
        Filter::Compare { attr, op, value } => match_compare(attr, *op, value, props),
        Filter::And(items) => items.iter().all(|f| matches(f, props)),
        Filter::Or(items) => items.iter().any(|f| matches(f, props)),
        Filter::Not(inner) => !matches(inner, props),
    }
}

fn match_compare(attr: &str, op: CompareOp, rhs: &str, props: &Properties) -> bool {
    let Some(stored) = props.get(attr) else { return false };
    match op {
        CompareOp::Equal => match_equal(stored, rhs),
        CompareOp::Approx => match_approx(&stored.to_display_string(), rhs),
        CompareOp::GreaterEqual => match_ordered(stored, rhs, std::cmp::Ordering::is_ge),
        CompareOp::LessEqual => match_ordered(stored, rhs, std::cmp::Ordering::is_le),
    }
}

fn match_equal(stored: &Value, rhs: &str) -> bool {
    match stored {
        Value::Long(v) => flux_properties_convert_long(rhs).map(|r| *v == r).unwrap_or(false),
        Value::Double(v) => flux_properties_convert_double(rhs).map(|r| *v == r).unwrap_or(false),
        Value::Version(v) => rhs.parse().map(|r: flux_properties::Version| *v == r).unwrap_or(false),
        Value::String(_) | Value::Bool(_) => stored.to_display_string() == rhs,
    }
}

fn match_ordered(stored: &Value, rhs: &str, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let ordering = match stored {
        Value::Long(v) => flux_properties_convert_long(rhs).map(|r| v.cmp(&r)),
        Value::Double(v) => flux_properties_convert_double(rhs).map(|r| v.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Less)),
        Value::Version(v) => rhs.parse().ok().map(|r: flux_properties::Version| v.cmp(&r)),
        Value::String(_) | Value::Bool(_) => None,
    };
    match ordering {
        Some(o) => accept(o),
        None => accept(stored.to_display_string().as_str().cmp(rhs)),
    }
}

fn match_approx(stored: &str, rhs: &str) -> bool {
    normalize_approx(stored) == normalize_approx(rhs)
}

fn normalize_approx(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn match_substring(haystack: &str, segments: &[SubstringSegment], case_insensitive: bool) -> bool {
    let norm = |s: &str| if case_insensitive { s.to_ascii_lowercase() } else { s.to_string() };
    let haystack = norm(haystack);
    let mut pos = 0usize;
    let mut first = true;
    let mut iter = segments.iter().peekable();
    while let Some(seg) = iter.next() {
        match seg {
            SubstringSegment::Wildcard => {
                // consumed implicitly by the following literal's search, or
                // trailing wildcard which always matches the remainder.
                if iter.peek().is_none() {
                    return true;
                }
            }
            SubstringSegment::Literal(lit) => {
                let lit = norm(lit);
                if first {
                    if !haystack[pos..].starts_with(lit.as_str()) {
                        return false;
                    }
                    pos += lit.len();
                } else {
                    match haystack[pos..].find(lit.as_str()) {
                        Some(offset) => pos += offset + lit.len(),
                        None => return false,
                    }
                }
            }
        }
        first = false;
    }
    // If the pattern didn't end in a wildcard, the last literal must reach
    // the end of the haystack exactly.
    if !matches!(segments.last(), Some(SubstringSegment::Wildcard) | None) {
        return pos == haystack.len();
    }
    true
}

fn flux_properties_convert_long(s: &str) -> Option<i64> {
    s.parse().ok()
}

fn flux_properties_convert_double(s: &str) -> Option<f64> {
    s.parse().ok()
}
