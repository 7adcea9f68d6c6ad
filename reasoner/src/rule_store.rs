/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::config::ReasonerConfig;
use crate::error::ReasonerError;
use crate::matching::{Match, MatchFlags};
use crate::rule::{Rule, RuleId};
use log::{debug, trace};
use shared::parser::{parse_triple_pattern_str, ParseError};
use shared::triple::GraphPattern;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

const ARROW: &str = "->";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    Antecedent,
    Consequent,
}

/// Another rule together with every way it connects to the asking rule.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub rule: Arc<Rule>,
    pub matches: BTreeSet<Match>,
}

type NeighborKey = (RuleId, MatchFlags, Direction);

/// The rules of one reasoning session and the dependency graph between them.
///
/// Neighbor lists are computed on first use and cached per rule, flag set
/// and direction. Any change to the rule set drops the whole cache.
#[derive(Debug)]
pub struct RuleStore {
    rules: BTreeMap<RuleId, Arc<Rule>>,
    neighbor_flags: MatchFlags,
    neighbor_cache: RwLock<HashMap<NeighborKey, Arc<Vec<Neighbor>>>>,
}

impl Default for RuleStore {
    fn default() -> Self {
        RuleStore::new()
    }
}

impl RuleStore {
    pub fn new() -> Self {
        RuleStore::with_config(&ReasonerConfig::default())
    }

    pub fn with_config(config: &ReasonerConfig) -> Self {
        RuleStore {
            rules: BTreeMap::new(),
            neighbor_flags: config.neighbor_flags,
            neighbor_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_rule(&mut self, rule: Rule) -> Arc<Rule> {
        let rule = Arc::new(rule);
        self.add_shared_rule(rule.clone());
        rule
    }

    pub fn add_shared_rule(&mut self, rule: Arc<Rule>) {
        trace!("Adding rule {}", rule);
        self.rules.insert(rule.id(), rule);
        self.invalidate();
    }

    pub fn add_rules<I: IntoIterator<Item = Rule>>(&mut self, rules: I) {
        for rule in rules {
            self.rules.insert(rule.id(), Arc::new(rule));
        }
        self.invalidate();
    }

    pub fn remove_rule(&mut self, id: RuleId) -> Option<Arc<Rule>> {
        let removed = self.rules.remove(&id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    pub fn get(&self, id: RuleId) -> Option<&Arc<Rule>> {
        self.rules.get(&id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn neighbor_flags(&self) -> MatchFlags {
        self.neighbor_flags
    }

    /// Number of cached neighbor lists.
    pub fn cached_entries(&self) -> usize {
        self.neighbor_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn invalidate(&mut self) {
        self.neighbor_cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Rules whose consequent can deliver data for the antecedent of `rule`,
    /// with the store's default flags.
    pub fn antecedent_neighbors(&self, rule: &Rule) -> Arc<Vec<Neighbor>> {
        self.antecedent_neighbors_with(rule, self.neighbor_flags)
    }

    pub fn antecedent_neighbors_with(&self, rule: &Rule, flags: MatchFlags) -> Arc<Vec<Neighbor>> {
        self.neighbors(rule, flags, Direction::Antecedent)
    }

    /// Rules whose antecedent can consume the consequent of `rule`.
    pub fn consequent_neighbors(&self, rule: &Rule) -> Arc<Vec<Neighbor>> {
        self.consequent_neighbors_with(rule, self.neighbor_flags)
    }

    pub fn consequent_neighbors_with(&self, rule: &Rule, flags: MatchFlags) -> Arc<Vec<Neighbor>> {
        self.neighbors(rule, flags, Direction::Consequent)
    }

    fn neighbors(&self, rule: &Rule, flags: MatchFlags, direction: Direction) -> Arc<Vec<Neighbor>> {
        let key = (rule.id(), flags, direction);
        {
            let cache = self
                .neighbor_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(neighbors) = cache.get(&key) {
                return neighbors.clone();
            }
        }

        let neighbors = Arc::new(self.compute_neighbors(rule, flags, direction));
        debug!(
            "Computed {} {:?} neighbors for rule {}",
            neighbors.len(),
            direction,
            rule.id()
        );

        self.neighbor_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, neighbors.clone());
        neighbors
    }

    /// The candidate side is matched onto `rule`, so coverage flags apply to
    /// what the candidate offers or asks: several candidates may each serve a
    /// part of `rule`. The matches are stored inverted, from `rule` outward.
    /// Self matches are left out.
    fn compute_neighbors(&self, rule: &Rule, flags: MatchFlags, direction: Direction) -> Vec<Neighbor> {
        let side = match direction {
            Direction::Antecedent => rule.antecedent(),
            Direction::Consequent => rule.consequent(),
        };
        if side.is_empty() {
            return Vec::new();
        }
        self.rules
            .values()
            .filter(|candidate| candidate.id() != rule.id())
            .filter_map(|candidate| {
                let matches = match direction {
                    Direction::Antecedent => candidate.consequent_matches(side, flags),
                    Direction::Consequent => candidate.antecedent_matches(side, flags),
                };
                if matches.is_empty() {
                    None
                } else {
                    Some(Neighbor {
                        rule: candidate.clone(),
                        matches: Match::invert_all(&matches),
                    })
                }
            })
            .collect()
    }

    /// Reads rules from text and adds them to the store.
    pub fn load_rules(&mut self, text: &str) -> Result<usize, ReasonerError> {
        let rules = read_rules(text)?;
        let count = rules.len();
        self.add_rules(rules);
        Ok(count)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, ReasonerError> {
        let rules = read_file(path)?;
        let count = rules.len();
        self.add_rules(rules);
        Ok(count)
    }
}

/// Parses the line based rule format.
///
/// One triple pattern per line. A line holding only `->` switches between
/// antecedent and consequent, a blank line ends the current rule. Rules get
/// the handler that [`Rule::new`] picks for their shape.
pub fn read_rules(text: &str) -> Result<Vec<Rule>, ReasonerError> {
    let mut rules = Vec::new();
    let mut is_antecedent = true;
    let mut antecedent = GraphPattern::new();
    let mut consequent = GraphPattern::new();

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !antecedent.is_empty() || !consequent.is_empty() {
                rules.push(Rule::new(
                    std::mem::take(&mut antecedent),
                    std::mem::take(&mut consequent),
                )?);
            }
            is_antecedent = true;
        } else if trimmed == ARROW {
            is_antecedent = !is_antecedent;
        } else {
            let tp = parse_triple_pattern_str(trimmed).map_err(|e| ParseError {
                line: index + 1,
                ..e
            })?;
            if is_antecedent {
                antecedent.insert(tp);
            } else {
                consequent.insert(tp);
            }
        }
    }
    if !antecedent.is_empty() || !consequent.is_empty() {
        rules.push(Rule::new(antecedent, consequent)?);
    }

    Ok(rules)
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<Rule>, ReasonerError> {
    let text = std::fs::read_to_string(path)?;
    read_rules(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::StaticBindingSetHandler;
    use shared::parser::parse_graph_pattern_str;

    fn gp(s: &str) -> GraphPattern {
        parse_graph_pattern_str(s).unwrap()
    }

    fn data_rule(consequent: &str) -> Rule {
        Rule::with_handler(
            GraphPattern::new(),
            gp(consequent),
            Arc::new(StaticBindingSetHandler::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_antecedent_neighbors() {
        let mut store = RuleStore::new();
        let sensors = store.add_rule(data_rule("?s <type> <Sensor> . ?s <hasVal> ?v"));
        let devices = store.add_rule(data_rule("?d <type> <Device>"));
        let convert = store.add_rule(
            Rule::new(gp("?s <type> <Sensor> . ?s <hasVal> ?v"), gp("?s <hasValue> ?v")).unwrap(),
        );

        let neighbors = store.antecedent_neighbors(&convert);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].rule.id(), sensors.id());
        assert_eq!(neighbors[0].matches.len(), 1);

        assert!(store.antecedent_neighbors(&devices).is_empty());
        let consumers = store.consequent_neighbors(&sensors);
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].rule.id(), convert.id());
    }

    #[test]
    fn test_antecedent_served_by_two_sources() {
        let mut store = RuleStore::new();
        let types = store.add_rule(data_rule("?s <type> <Sensor>"));
        let values = store.add_rule(data_rule("?s <hasVal> ?v"));
        let convert = store.add_rule(
            Rule::new(gp("?x <type> <Sensor> . ?x <hasVal> ?y"), gp("?x <hasValue> ?y")).unwrap(),
        );

        let neighbors = store.antecedent_neighbors(&convert);
        assert_eq!(neighbors.len(), 2);
        for neighbor in neighbors.iter() {
            assert_eq!(neighbor.matches.len(), 1);
            let m = neighbor.matches.iter().next().unwrap();
            assert!(m.covered().is_subset(convert.antecedent()));
            assert_eq!(&m.covered_upon(), neighbor.rule.consequent());
        }
        let ids: BTreeSet<RuleId> = neighbors.iter().map(|n| n.rule.id()).collect();
        assert!(ids.contains(&types.id()) && ids.contains(&values.id()));

        assert!(store.consequent_neighbors(&values).is_empty());
        let consumers = store.consequent_neighbors_with(&values, MatchFlags::ONLY_BIGGEST);
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].rule.id(), convert.id());
        let m = consumers[0].matches.iter().next().unwrap();
        assert_eq!(&m.covered(), values.consequent());
    }

    #[test]
    fn test_self_matches_are_excluded() {
        let mut store = RuleStore::new();
        let transitive = store.add_rule(
            Rule::new(gp("?a <p> ?b . ?b <p> ?c"), gp("?a <p> ?c")).unwrap(),
        );
        assert!(store.antecedent_neighbors(&transitive).is_empty());
    }

    #[test]
    fn test_cache_invalidation() {
        let mut store = RuleStore::new();
        let convert = store.add_rule(
            Rule::new(gp("?s <type> <Sensor>"), gp("?s <type> <Device>")).unwrap(),
        );
        assert!(store.antecedent_neighbors(&convert).is_empty());
        assert_eq!(store.cached_entries(), 1);

        let sensors = store.add_rule(data_rule("?x <type> <Sensor>"));
        assert_eq!(store.cached_entries(), 0);
        assert_eq!(store.antecedent_neighbors(&convert).len(), 1);

        store.remove_rule(sensors.id());
        assert_eq!(store.cached_entries(), 0);
        assert!(store.antecedent_neighbors(&convert).is_empty());
    }

    #[test]
    fn test_read_rules() {
        let text = "\
?a <p> ?b
?b <p> ?c
->
?a <p> ?c

?x <type> <Sensor>
->
?x <type> <Device>
";
        let rules = read_rules(text).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].antecedent().len(), 2);
        assert_eq!(rules[0].consequent().len(), 1);
        assert!(rules[1].handler().is_some());

        let mut store = RuleStore::new();
        assert_eq!(store.load_rules(text).unwrap(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_read_rules_reports_line() {
        let err = read_rules("?a <p> ?b\n->\n?a <q>\n").unwrap_err();
        match err {
            ReasonerError::Parse(e) => assert_eq!(e.line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
