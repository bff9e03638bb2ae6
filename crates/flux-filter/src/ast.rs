// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The parsed filter tree.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    Approx,
    GreaterEqual,
    LessEqual,
}

impl CompareOp {
    pub(crate) fn token(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::Approx => "~=",
            CompareOp::GreaterEqual => ">=",
            CompareOp::LessEqual => "<=",
        }
    }
}

/// One node of a parsed filter. `Empty` is the result of parsing an empty
/// filter string and always matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Empty,
    Present { attr: String },
    Substring { attr: String, segments: Vec<SubstringSegment>, case_insensitive: bool },
    Compare { attr: String, op: CompareOp, value: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// A segment of a `*`-wildcarded value: a literal run, or a wildcard gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstringSegment {
    Literal(String),
    Wildcard,
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Empty => Ok(()),
            Filter::Present { attr } => write!(f, "({attr}=*)"),
            Filter::Substring { attr, segments, case_insensitive } => {
                write!(f, "({attr}{}", if *case_insensitive { "~=" } else { "=" })?;
                for seg in segments {
                    match seg {
                        SubstringSegment::Literal(s) => f.write_str(s)?,
                        SubstringSegment::Wildcard => f.write_str("*")?,
                    }
                }
                write!(f, ")")
            }
            Filter::Compare { attr, op, value } => write!(f, "({attr}{}{value})", op.token()),
            Filter::And(items) => {
                write!(f, "(&")?;
                for item in items {
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Filter::Or(items) => {
                write!(f, "(|")?;
                for item in items {
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{inner})"),
        }
    }
}
