/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
pub mod search;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use shared::triple::{GraphPattern, TriplePattern};
use shared::triple_node::TripleNode;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use search::find_matches;

bitflags! {
    /// Policy switches for [`find_matches`]. They compose freely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct MatchFlags: u8 {
        /// Every triple pattern of the matching side must take part.
        const FULLY_COVERED = 0b0001;
        /// Drop matches that are strictly contained in another one.
        const ONLY_BIGGEST = 0b0010;
        /// A fully covered match must live in a single combination, no reuse
        /// of objective patterns across separate matches.
        const ONE_TO_ONE = 0b0100;
    }
}

/// Named presets for the flags used when planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MatchStrategy {
    FindAllMatches,
    #[default]
    FindOnlyBiggestMatches,
    FindOnlyFullMatches,
}

impl MatchStrategy {
    pub fn flags(self) -> MatchFlags {
        match self {
            MatchStrategy::FindAllMatches => MatchFlags::empty(),
            MatchStrategy::FindOnlyBiggestMatches => MatchFlags::ONLY_BIGGEST,
            MatchStrategy::FindOnlyFullMatches => {
                MatchFlags::FULLY_COVERED | MatchFlags::ONLY_BIGGEST
            }
        }
    }
}

impl From<MatchStrategy> for MatchFlags {
    fn from(strategy: MatchStrategy) -> Self {
        strategy.flags()
    }
}

/// A correspondence between triple patterns of a requesting pattern A and an
/// offering pattern B.
///
/// `matching_patterns` says which pattern of A sits on which pattern of B,
/// `mapping` holds every occurrence pair that involves a variable. Constant to
/// constant pairs are implied and left out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Match {
    matching_patterns: BTreeMap<TriplePattern, TriplePattern>,
    mapping: BTreeMap<TripleNode, TripleNode>,
}

impl Match {
    pub fn new(
        from: TriplePattern,
        upon: TriplePattern,
        mapping: BTreeMap<TripleNode, TripleNode>,
    ) -> Self {
        let mut matching_patterns = BTreeMap::new();
        matching_patterns.insert(from, upon);
        Match {
            matching_patterns,
            mapping,
        }
    }

    /// Single pattern match, `None` when two constants disagree.
    pub fn between(from: &TriplePattern, upon: &TriplePattern) -> Option<Self> {
        from.find_matches(upon)
            .map(|mapping| Match::new(from.clone(), upon.clone(), mapping))
    }

    pub fn empty() -> Self {
        Match {
            matching_patterns: BTreeMap::new(),
            mapping: BTreeMap::new(),
        }
    }

    pub fn matching_patterns(&self) -> &BTreeMap<TriplePattern, TriplePattern> {
        &self.matching_patterns
    }

    pub fn mapping(&self) -> &BTreeMap<TripleNode, TripleNode> {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.matching_patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matching_patterns.is_empty()
    }

    /// Patterns of A covered by this match.
    pub fn covered(&self) -> GraphPattern {
        self.matching_patterns.keys().cloned().collect()
    }

    /// Patterns of B used by this match.
    pub fn covered_upon(&self) -> GraphPattern {
        self.matching_patterns.values().cloned().collect()
    }

    /// Combines two matches into one covering both sets of pattern pairs.
    ///
    /// Fails when a pattern of either side is used twice or when the
    /// occurrence mappings disagree: the same term must always correspond to
    /// the same term, in both directions. Symmetric in its arguments.
    pub fn merge(&self, other: &Match) -> Option<Match> {
        for (from, upon) in &other.matching_patterns {
            if self.matching_patterns.contains_key(from)
                || self.matching_patterns.values().any(|v| v == upon)
            {
                return None;
            }
        }

        for (a1, b1) in &self.mapping {
            for (a2, b2) in &other.mapping {
                let same_from = a1.term() == a2.term();
                let same_upon = b1.term() == b2.term();
                if same_from != same_upon {
                    return None;
                }
            }
        }

        let mut matching_patterns = self.matching_patterns.clone();
        matching_patterns.extend(
            other
                .matching_patterns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let mut mapping = self.mapping.clone();
        mapping.extend(other.mapping.iter().map(|(k, v)| (k.clone(), v.clone())));

        Some(Match {
            matching_patterns,
            mapping,
        })
    }

    /// Swaps the roles of A and B.
    pub fn inverse(&self) -> Match {
        Match {
            matching_patterns: self
                .matching_patterns
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
            mapping: self
                .mapping
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
        }
    }

    pub fn invert_all(matches: &BTreeSet<Match>) -> BTreeSet<Match> {
        matches.iter().map(Match::inverse).collect()
    }

    /// True when every pair of `other` is also part of `self`.
    pub fn is_sub_match(&self, other: &Match) -> bool {
        other
            .matching_patterns
            .iter()
            .all(|(k, v)| self.matching_patterns.get(k) == Some(v))
            && other
                .mapping
                .iter()
                .all(|(k, v)| self.mapping.get(k) == Some(v))
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .matching_patterns
            .iter()
            .map(|(from, upon)| format!("{} = {}", from, upon))
            .collect();
        write!(f, "Match {{{}}}", pairs.join(", "))
    }
}
