/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::node::ReasoningNode;
use log::debug;
use serde::{Deserialize, Serialize};
use shared::terms::Term;
use shared::triple::TriplePattern;
use std::collections::BTreeSet;
use std::fmt;

/// Triple patterns that all have to be supplied before a request can be
/// answered. Alternative gaps are separate values.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KnowledgeGap(BTreeSet<TriplePattern>);

impl KnowledgeGap {
    pub fn new() -> Self {
        KnowledgeGap(BTreeSet::new())
    }

    pub fn single(pattern: TriplePattern) -> Self {
        let mut gap = KnowledgeGap::new();
        gap.insert(pattern);
        gap
    }

    pub fn insert(&mut self, pattern: TriplePattern) -> bool {
        self.0.insert(pattern)
    }

    pub fn remove(&mut self, pattern: &TriplePattern) -> bool {
        self.0.remove(pattern)
    }

    pub fn contains(&self, pattern: &TriplePattern) -> bool {
        self.0.contains(pattern)
    }

    pub fn patterns(&self) -> &BTreeSet<TriplePattern> {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriplePattern> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TriplePattern> for KnowledgeGap {
    fn from_iter<I: IntoIterator<Item = TriplePattern>>(iter: I) -> Self {
        KnowledgeGap(iter.into_iter().collect())
    }
}

impl fmt::Display for KnowledgeGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<String> = self.0.iter().map(|tp| tp.to_string()).collect();
        write!(f, "[{}]", patterns.join(" . "))
    }
}

/// What to do with a new pattern given one already in a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripleMatchType {
    Add,
    Replace,
    Ignore,
}

/// The new pattern replaces an existing one it specialises (a variable
/// becomes a constant), is ignored when it generalises it, and is added when
/// the two are unrelated or mixed.
fn triple_match_type(existing: &TriplePattern, new: &TriplePattern) -> TripleMatchType {
    let Some(mapping) = existing.find_matches(new) else {
        return TripleMatchType::Add;
    };
    let types: Vec<TripleMatchType> = mapping
        .iter()
        .filter_map(|(from, to)| match (from.term(), to.term()) {
            (Term::Variable(_), Term::Constant(_)) => Some(TripleMatchType::Replace),
            (Term::Constant(_), Term::Variable(_)) => Some(TripleMatchType::Ignore),
            _ => None,
        })
        .collect();
    match types.first() {
        None => TripleMatchType::Ignore,
        Some(first) if types.iter().all(|t| t == first) => *first,
        Some(_) => TripleMatchType::Add,
    }
}

pub fn merge_gap(gap: &KnowledgeGap, to_add: &KnowledgeGap) -> KnowledgeGap {
    let mut result = gap.clone();
    for new in to_add.iter() {
        let actions: Vec<(&TriplePattern, TripleMatchType)> = gap
            .iter()
            .map(|existing| (existing, triple_match_type(existing, new)))
            .collect();
        let replaces: Vec<&TriplePattern> = actions
            .iter()
            .filter(|(_, action)| *action == TripleMatchType::Replace)
            .map(|(existing, _)| *existing)
            .collect();
        if replaces.len() == 1 {
            result.remove(replaces[0]);
            result.insert(new.clone());
        } else if !actions.iter().any(|(_, action)| *action == TripleMatchType::Ignore) {
            result.insert(new.clone());
        }
    }
    result
}

/// Combines two sets of alternatives pairwise.
pub fn merge_gaps(
    existing: BTreeSet<KnowledgeGap>,
    to_add: BTreeSet<KnowledgeGap>,
) -> BTreeSet<KnowledgeGap> {
    if existing.is_empty() {
        return to_add;
    }
    if to_add.is_empty() {
        return existing;
    }
    let mut merged = BTreeSet::new();
    for gap in &existing {
        for other in &to_add {
            merged.insert(merge_gap(gap, other));
        }
    }
    merged
}

/// Gaps of the subtree rooted at `node`.
///
/// An antecedent pattern is covered when one of the children matched on it
/// is a data source or is itself free of gaps. Otherwise the children's gaps
/// stand in for it, or the pattern itself when nothing matched it.
pub fn find_knowledge_gaps(node: &ReasoningNode) -> BTreeSet<KnowledgeGap> {
    let mut existing = BTreeSet::new();
    for pattern in node.rule().antecedent() {
        let mut collected = BTreeSet::new();
        let mut covered = false;
        for child in node.children_covering(pattern) {
            if child.rule().antecedent().is_empty() {
                covered = true;
                break;
            }
            let child_gaps = find_knowledge_gaps(child);
            if child_gaps.is_empty() {
                covered = true;
                break;
            }
            collected.extend(child_gaps);
        }
        if covered {
            continue;
        }
        if collected.is_empty() {
            collected.insert(KnowledgeGap::single(pattern.clone()));
        }
        debug!("Pattern {} is not covered, gaps: {:?}", pattern, collected);
        existing = merge_gaps(existing, collected);
    }
    existing
}
