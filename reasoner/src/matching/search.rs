/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{Match, MatchFlags};
use log::trace;
use shared::triple::{GraphPattern, TriplePattern};
use std::collections::BTreeSet;

/// Pairwise single-pattern matches, indexed by the pattern of A they start
/// from. Each entry keeps the index of the B pattern so the search can rule
/// out reuse before trying a merge.
struct Candidates {
    per_pattern: Vec<Vec<(usize, Match)>>,
}

impl Candidates {
    fn build(from: &[&TriplePattern], upon: &[&TriplePattern]) -> Self {
        let per_pattern = from
            .iter()
            .map(|a| {
                upon.iter()
                    .enumerate()
                    .filter_map(|(j, b)| Match::between(a, b).map(|m| (j, m)))
                    .collect()
            })
            .collect();
        Candidates { per_pattern }
    }
}

/// Enumerates the consistent ways to align some or all patterns of `from`
/// onto patterns of `upon`.
///
/// Without flags every non-empty, internally consistent and injective
/// combination is returned, partial ones included. An empty `from` matches
/// trivially with one empty match.
pub fn find_matches(from: &GraphPattern, upon: &GraphPattern, flags: MatchFlags) -> BTreeSet<Match> {
    if from.is_empty() {
        let mut result = BTreeSet::new();
        result.insert(Match::empty());
        return result;
    }

    let from_patterns: Vec<&TriplePattern> = from.iter().collect();
    let upon_patterns: Vec<&TriplePattern> = upon.iter().collect();
    let candidates = Candidates::build(&from_patterns, &upon_patterns);

    let mut found = BTreeSet::new();
    let mut used = vec![false; upon_patterns.len()];
    extend(&candidates, 0, None, &mut used, &mut found);
    trace!(
        "Found {} raw matches between {} and {} triple patterns",
        found.len(),
        from_patterns.len(),
        upon_patterns.len()
    );

    if flags.contains(MatchFlags::FULLY_COVERED) {
        found = if flags.contains(MatchFlags::ONE_TO_ONE) {
            found
                .into_iter()
                .filter(|m| m.len() == from_patterns.len())
                .collect()
        } else {
            found
                .into_iter()
                .filter(|m| is_saturated(m, &from_patterns, &candidates))
                .collect()
        };
    }

    if flags.contains(MatchFlags::ONLY_BIGGEST) {
        found = keep_biggest(found);
    }

    found
}

/// Backtracking over the patterns of A: each one is either left out or put
/// on an unused pattern of B. A failed merge prunes the whole branch.
fn extend(
    candidates: &Candidates,
    index: usize,
    current: Option<Match>,
    used: &mut [bool],
    found: &mut BTreeSet<Match>,
) {
    if index == candidates.per_pattern.len() {
        if let Some(m) = current {
            found.insert(m);
        }
        return;
    }

    extend(candidates, index + 1, current.clone(), used, found);

    for (upon_index, single) in &candidates.per_pattern[index] {
        if used[*upon_index] {
            continue;
        }
        let merged = match &current {
            None => Some(single.clone()),
            Some(m) => m.merge(single),
        };
        if let Some(merged) = merged {
            used[*upon_index] = true;
            extend(candidates, index + 1, Some(merged), used, found);
            used[*upon_index] = false;
        }
    }
}

/// A match covers A fully when every left out pattern of A could only be
/// served by a separate match: it has candidates, but none of them fits into
/// this one.
fn is_saturated(m: &Match, from: &[&TriplePattern], candidates: &Candidates) -> bool {
    from.iter()
        .zip(&candidates.per_pattern)
        .filter(|(pattern, _)| !m.matching_patterns().contains_key(**pattern))
        .all(|(_, singles)| {
            !singles.is_empty() && singles.iter().all(|(_, single)| m.merge(single).is_none())
        })
}

fn keep_biggest(found: BTreeSet<Match>) -> BTreeSet<Match> {
    let mut by_size: Vec<Match> = found.into_iter().collect();
    by_size.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut kept: Vec<Match> = Vec::new();
    for m in by_size {
        let contained = kept
            .iter()
            .any(|bigger| bigger.len() > m.len() && bigger.is_sub_match(&m));
        if !contained {
            kept.push(m);
        }
    }
    kept.into_iter().collect()
}
