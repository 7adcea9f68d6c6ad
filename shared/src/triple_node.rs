/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
use crate::terms::Term;
use crate::triple::{Position, TriplePattern};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One occurrence of a term inside one triple pattern.
///
/// Identity is the pair (pattern, position): `?x` in two different patterns
/// of the same graph pattern is two nodes that have to be kept in sync.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripleNode {
    pub pattern: TriplePattern,
    pub position: Position,
}

impl TripleNode {
    pub fn new(pattern: TriplePattern, position: Position) -> Self {
        Self { pattern, position }
    }

    pub fn term(&self) -> &Term {
        self.pattern.term(self.position)
    }

    pub fn variable_name(&self) -> Option<&str> {
        self.term().variable_name()
    }

    pub fn is_var(&self) -> bool {
        self.term().is_var()
    }
}

/// Prints the pattern with the occurrence fenced, e.g. `?s <type> |?t|`.
impl fmt::Display for TripleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Position::ALL
            .iter()
            .map(|&pos| {
                let term = self.pattern.term(pos);
                if pos == self.position {
                    format!("|{}|", term)
                } else {
                    term.to_string()
                }
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
