// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! LDAP-style filter parsing and evaluation, as used by the service registry
//! for `find`/`track`/`use` queries.

#![forbid(unsafe_code)]

mod ast;
mod eval;
mod parser;

pub use ast::{CompareOp, Filter, SubstringSegment};
pub use parser::ParseError;

use flux_properties::Properties;

impl Filter {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        parser::parse(input)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::Empty)
    }

    pub fn matches(&self, props: &Properties) -> bool {
        eval::matches(self, props)
    }
}

impl std::str::FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}
