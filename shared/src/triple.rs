/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
use crate::parser::{parse_triple_pattern_str, ParseError};
use crate::terms::Term;
use crate::triple_node::TripleNode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Unordered conjunction of triple patterns. Duplicates collapse.
pub type GraphPattern = BTreeSet<TriplePattern>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    Subject = 0,
    Predicate = 1,
    Object = 2,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Subject, Position::Predicate, Position::Object];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(PartialEq, Debug, Clone, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn term(&self, position: Position) -> &Term {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }

    pub fn variables(&self) -> BTreeSet<&str> {
        Position::ALL
            .iter()
            .filter_map(|&pos| self.term(pos).variable_name())
            .collect()
    }

    /// Occurrences of variables in this pattern, one per position.
    pub fn variable_nodes(&self) -> Vec<TripleNode> {
        Position::ALL
            .iter()
            .filter(|&&pos| self.term(pos).is_var())
            .map(|&pos| TripleNode::new(self.clone(), pos))
            .collect()
    }

    /// Aligns this pattern with `other` position by position.
    ///
    /// Every position where at least one side is a variable yields a
    /// correspondence from this pattern's occurrence to the other's. Two
    /// constants must be equal and yield nothing. Returns `None` as soon as two
    /// constants differ. An empty map means both patterns are the same ground
    /// triple.
    pub fn find_matches(&self, other: &TriplePattern) -> Option<BTreeMap<TripleNode, TripleNode>> {
        let mut mapping = BTreeMap::new();
        for pos in Position::ALL {
            let ours = self.term(pos);
            let theirs = other.term(pos);
            if ours.is_var() || theirs.is_var() {
                mapping.insert(
                    TripleNode::new(self.clone(), pos),
                    TripleNode::new(other.clone(), pos),
                );
            } else if ours != theirs {
                return None;
            }
        }
        Some(mapping)
    }

    pub fn is_ground(&self) -> bool {
        Position::ALL.iter().all(|&pos| self.term(pos).is_constant())
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

impl FromStr for TriplePattern {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_triple_pattern_str(s)
    }
}

/// All variable names used in `pattern`.
pub fn graph_pattern_variables(pattern: &GraphPattern) -> BTreeSet<String> {
    pattern
        .iter()
        .flat_map(|tp| tp.variables().into_iter().map(str::to_string))
        .collect()
}

pub fn format_graph_pattern(pattern: &GraphPattern) -> String {
    pattern
        .iter()
        .map(|tp| tp.to_string())
        .collect::<Vec<_>>()
        .join(" . ")
}
