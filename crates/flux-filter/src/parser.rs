// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Recursive-descent parser for the LDAP-style filter grammar:
//!
//! ```text
//! filter     ::= '(' filtercomp ')'
//! filtercomp ::= and | or | not | item
//! and        ::= '&' filter+
//! or         ::= '|' filter+
//! not        ::= '!' filter
//! item       ::= attr ('=' | '~=' | '>=' | '<=') value
//! ```
//!
//! `attr=*` is a presence test; a value containing `*` under `=` is a
//! substring match. `\(`, `\)`, `\*` and `\\` are recognized escapes inside
//! values so a value may contain a literal paren or star.

use crate::ast::{CompareOp, Filter, SubstringSegment};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter parse error: {}", self.message)
    }
}

fn err(message: impl Into<String>) -> ParseError {
    ParseError { message: message.into() }
}

pub fn parse(input: &str) -> Result<Filter, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Filter::Empty);
    }
    let mut chars = trimmed.chars().peekable();
    let node = parse_filter(&mut chars)?;
    skip_ws(&mut chars);
    if chars.next().is_some() {
        return Err(err("unexpected trailing characters after filter"));
    }
    Ok(node)
}

fn skip_ws(chars: &mut Peekable<Chars<'_>>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

fn expect(chars: &mut Peekable<Chars<'_>>, expected: char) -> Result<(), ParseError> {
    skip_ws(chars);
    match chars.next() {
        Some(c) if c == expected => Ok(()),
        Some(c) => Err(err(format!("expected '{expected}', found '{c}'"))),
        None => Err(err(format!("expected '{expected}', found end of input"))),
    }
}

fn parse_filter(chars: &mut Peekable<Chars<'_>>) -> Result<Filter, ParseError> {
    expect(chars, '(')?;
    skip_ws(chars);
    let node = match chars.peek() {
        Some('&') => {
            chars.next();
            Filter::And(parse_filter_list(chars)?)
        }
        Some('|') => {
            chars.next();
            Filter::Or(parse_filter_list(chars)?)
        }
        Some('!') => {
            chars.next();
            let inner = parse_filter(chars)?;
            Filter::Not(Box::new(inner))
        }
        Some(_) => parse_item(chars)?,
        None => return Err(err("unexpected end of input inside filter")),
    };
    expect(chars, ')')?;
    Ok(node)
}

fn parse_filter_list(chars: &mut Peekable<Chars<'_>>) -> Result<Vec<Filter>, ParseError> {
    let mut items = Vec::new();
    skip_ws(chars);
    while chars.peek() == Some(&'(') {
        items.push(parse_filter(chars)?);
        skip_ws(chars);
    }
    if items.is_empty() {
        return Err(err("composite filter requires at least one operand"));
    }
    Ok(items)
}

fn parse_item(chars: &mut Peekable<Chars<'_>>) -> Result<Filter, ParseError> {
    let attr = parse_attr(chars)?;
    let op = parse_op(chars)?;
    let raw_value = parse_value(chars)?;

    if op == CompareOp::Equal && raw_value == "*" {
        return Ok(Filter::Present { attr });
    }
    if op == CompareOp::Equal && raw_value.contains('*') {
        return Ok(Filter::Substring { attr, segments: split_wildcards(&raw_value), case_insensitive: false });
    }
    Ok(Filter::Compare { attr, op, value: raw_value })
}

fn parse_attr(chars: &mut Peekable<Chars<'_>>) -> Result<String, ParseError> {
    skip_ws(chars);
    let mut attr = String::new();
    while let Some(&c) = chars.peek() {
        if c == '=' || c == '~' || c == '>' || c == '<' || c == ')' || c == '(' {
            break;
        }
        attr.push(c);
        chars.next();
    }
    let attr = attr.trim().to_string();
    if attr.is_empty() {
        return Err(err("missing attribute name"));
    }
    Ok(attr)
}

fn parse_op(chars: &mut Peekable<Chars<'_>>) -> Result<CompareOp, ParseError> {
    let two: String = {
        let mut clone = chars.clone();
        let a = clone.next();
        let b = clone.next();
        [a, b].into_iter().flatten().collect()
    };
    match two.as_str() {
        "~=" => {
            chars.next();
            chars.next();
            Ok(CompareOp::Approx)
        }
        ">=" => {
            chars.next();
            chars.next();
            Ok(CompareOp::GreaterEqual)
        }
        "<=" => {
            chars.next();
            chars.next();
            Ok(CompareOp::LessEqual)
        }
        _ => match chars.next() {
            Some('=') => Ok(CompareOp::Equal),
            Some(c) => Err(err(format!("expected comparison operator, found '{c}'"))),
            None => Err(err("expected comparison operator, found end of input")),
        },
    }
}

fn parse_value(chars: &mut Peekable<Chars<'_>>) -> Result<String, ParseError> {
    let mut value = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ')' => break,
            '\\' => {
                chars.next();
                match chars.next() {
                    Some(escaped @ ('(' | ')' | '*' | '\\')) => value.push(escaped),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(err("dangling escape at end of input")),
                }
            }
            _ => {
                value.push(c);
                chars.next();
            }
        }
    }
    Ok(value)
}

fn split_wildcards(raw: &str) -> Vec<SubstringSegment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    for c in raw.chars() {
        if c == '*' {
            if !literal.is_empty() {
                segments.push(SubstringSegment::Literal(std::mem::take(&mut literal)));
            }
            if !matches!(segments.last(), Some(SubstringSegment::Wildcard)) {
                segments.push(SubstringSegment::Wildcard);
            }
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        segments.push(SubstringSegment::Literal(literal));
    }
    segments
}
