/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{Binding, BindingSet};
use crate::config::ReasonerConfig;
use crate::error::ReasonerError;
use crate::matching::Match;
use log::{trace, warn};
use rayon::prelude::*;
use shared::terms::Term;
use shared::triple::GraphPattern;
use shared::triple_node::TripleNode;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

/// Values for variable occurrences of one graph pattern.
///
/// Two occurrences of the same variable are separate keys. They are kept in
/// agreement by `is_conflicting` which compares by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleVarBinding {
    values: BTreeMap<TripleNode, String>,
}

impl TripleVarBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spreads a flat binding over every occurrence of its variables in
    /// `pattern`. Variables without a value stay unbound.
    pub fn from_binding(pattern: &GraphPattern, binding: &Binding) -> Self {
        let mut tvb = TripleVarBinding::new();
        for tp in pattern {
            for node in tp.variable_nodes() {
                let value = node.variable_name().and_then(|name| binding.get(name));
                if let Some(value) = value {
                    tvb.put(node, value);
                }
            }
        }
        tvb
    }

    pub fn put(&mut self, node: TripleNode, value: &str) {
        debug_assert!(node.is_var(), "only variable occurrences carry values");
        self.values.insert(node, value.to_string());
    }

    pub fn get(&self, node: &TripleNode) -> Option<&str> {
        self.values.get(node).map(String::as_str)
    }

    pub fn contains_node(&self, node: &TripleNode) -> bool {
        self.values.contains_key(node)
    }

    /// Value of any occurrence of `variable`.
    pub fn var_value(&self, variable: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(node, _)| node.variable_name() == Some(variable))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_var(&self, variable: &str) -> bool {
        self.var_value(variable).is_some()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TripleNode> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TripleNode, &str)> {
        self.values.iter().map(|(node, value)| (node, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when some variable has a different value in `other`.
    pub fn is_conflicting(&self, other: &TripleVarBinding) -> bool {
        self.values.iter().any(|(node, value)| {
            node.variable_name()
                .and_then(|name| other.var_value(name))
                .map_or(false, |theirs| theirs != value)
        })
    }

    /// Union of both bindings. Callers check `is_conflicting` first.
    pub fn merge(&self, other: &TripleVarBinding) -> TripleVarBinding {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        TripleVarBinding { values }
    }

    pub fn to_binding(&self) -> Result<Binding, ReasonerError> {
        let mut binding = Binding::new();
        for (node, value) in &self.values {
            let Some(name) = node.variable_name() else {
                continue;
            };
            if let Some(existing) = binding.get(name) {
                if existing != value {
                    return Err(ReasonerError::ConflictingBinding {
                        variable: name.to_string(),
                        first: existing.to_string(),
                        second: value.clone(),
                    });
                }
            } else {
                binding.put(name, value);
            }
        }
        Ok(binding)
    }
}

impl fmt::Display for TripleVarBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .values
            .iter()
            .map(|(node, value)| format!("{}={}", node.term(), value))
            .collect();
        write!(f, "{{{}}}", entries.join(","))
    }
}

/// A relation over the variable occurrences of a fixed graph pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleVarBindingSet {
    graph_pattern: GraphPattern,
    bindings: BTreeSet<TripleVarBinding>,
}

impl TripleVarBindingSet {
    pub fn new(graph_pattern: GraphPattern) -> Self {
        TripleVarBindingSet {
            graph_pattern,
            bindings: BTreeSet::new(),
        }
    }

    pub fn from_binding_set(graph_pattern: &GraphPattern, binding_set: &BindingSet) -> Self {
        let bindings = binding_set
            .iter()
            .map(|b| TripleVarBinding::from_binding(graph_pattern, b))
            .collect();
        TripleVarBindingSet {
            graph_pattern: graph_pattern.clone(),
            bindings,
        }
    }

    /// Flat view. Fails only if one binding carries two values for a variable.
    pub fn to_binding_set(&self) -> Result<BindingSet, ReasonerError> {
        self.bindings.iter().map(TripleVarBinding::to_binding).collect()
    }

    pub fn graph_pattern(&self) -> &GraphPattern {
        &self.graph_pattern
    }

    pub fn bindings(&self) -> &BTreeSet<TripleVarBinding> {
        &self.bindings
    }

    pub fn add(&mut self, binding: TripleVarBinding) {
        self.bindings.insert(binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Every variable occurrence of the graph pattern.
    pub fn variable_nodes(&self) -> BTreeSet<TripleNode> {
        self.graph_pattern
            .iter()
            .flat_map(|tp| tp.variable_nodes())
            .collect()
    }

    /// Bindings that give a value to every variable occurrence.
    pub fn full_bindings(&self) -> TripleVarBindingSet {
        let nodes = self.variable_nodes();
        self.filtered(|b| nodes.iter().all(|n| b.contains_node(n)))
    }

    /// Bindings that leave at least one occurrence open.
    pub fn partial_bindings(&self) -> TripleVarBindingSet {
        let nodes = self.variable_nodes();
        self.filtered(|b| !nodes.iter().all(|n| b.contains_node(n)))
    }

    fn filtered<F>(&self, keep: F) -> TripleVarBindingSet
    where
        F: Fn(&TripleVarBinding) -> bool,
    {
        TripleVarBindingSet {
            graph_pattern: self.graph_pattern.clone(),
            bindings: self.bindings.iter().filter(|b| keep(b)).cloned().collect(),
        }
    }

    /// Join on shared variables.
    ///
    /// Every pair of non-conflicting bindings yields their union. Disjoint
    /// patterns give the full cross product. The result lives on the union of
    /// both graph patterns.
    pub fn merge(&self, other: &TripleVarBindingSet) -> TripleVarBindingSet {
        self.merge_with(other, &ReasonerConfig::default())
    }

    pub fn merge_with(
        &self,
        other: &TripleVarBindingSet,
        config: &ReasonerConfig,
    ) -> TripleVarBindingSet {
        let total = self.len().saturating_mul(other.len());
        trace!("Merging {} bindings with our {} bindings.", other.len(), self.len());
        if total > config.large_merge_warning {
            warn!(
                "Merging 2 large binding sets ({} * {} = {}). This can take some time.",
                self.len(),
                other.len(),
                total
            );
        }

        let bindings: BTreeSet<TripleVarBinding> = if total > config.parallel_merge_threshold {
            self.bindings
                .par_iter()
                .flat_map_iter(|a| {
                    other
                        .bindings
                        .iter()
                        .filter(move |b| !a.is_conflicting(b))
                        .map(move |b| a.merge(b))
                })
                .collect()
        } else {
            self.bindings
                .iter()
                .flat_map(|a| {
                    other
                        .bindings
                        .iter()
                        .filter(move |b| !a.is_conflicting(b))
                        .map(move |b| a.merge(b))
                })
                .collect()
        };

        let mut graph_pattern = self.graph_pattern.clone();
        graph_pattern.extend(other.graph_pattern.iter().cloned());
        TripleVarBindingSet {
            graph_pattern,
            bindings,
        }
    }

    /// Adds the bindings of `other`. Both sets are expected to live on the
    /// same graph pattern; the result takes the union of both patterns.
    pub fn union(&mut self, other: &TripleVarBindingSet) {
        self.graph_pattern.extend(other.graph_pattern.iter().cloned());
        self.bindings.extend(other.bindings.iter().cloned());
    }

    /// Re-expresses every binding on `target` through each of `matches`.
    ///
    /// The matches go from this set's pattern to `target`. Values follow the
    /// occurrence mapping; a binding that contradicts a constant of the other
    /// side, or that would give one target variable two values, is dropped
    /// for that match. Occurrences without a value stay open. Results of all
    /// matches are collected in one set.
    pub fn translate<'a, I>(&self, target: &GraphPattern, matches: I) -> TripleVarBindingSet
    where
        I: IntoIterator<Item = &'a Match>,
    {
        let start = Instant::now();
        let matches: Vec<&Match> = matches.into_iter().collect();
        let mut result = TripleVarBindingSet::new(target.clone());
        for from in &self.bindings {
            for m in &matches {
                if let Some(translated) = translate_binding(from, m) {
                    result.add(translated);
                }
            }
        }
        trace!(
            "Translated binding set with '{}' bindings and '{}' matches in '{}ms'.",
            self.len(),
            matches.len(),
            start.elapsed().as_millis()
        );
        result
    }

    /// Keeps bindings that agree with at least one binding of `filter`. An
    /// empty filter, or an empty binding in it, lets everything through.
    pub fn keep_compatible(&self, filter: &TripleVarBindingSet) -> TripleVarBindingSet {
        if filter.is_empty() {
            return self.clone();
        }
        self.filtered(|b| {
            filter
                .bindings
                .iter()
                .any(|f| f.is_empty() || !b.is_conflicting(f))
        })
    }
}

fn translate_binding(from: &TripleVarBinding, m: &Match) -> Option<TripleVarBinding> {
    let mut to = TripleVarBinding::new();
    for (from_node, to_node) in m.mapping() {
        match (from_node.term(), to_node.term()) {
            (Term::Variable(_), Term::Variable(to_var)) => {
                if let Some(value) = from.get(from_node) {
                    let conflict = to.var_value(to_var).map_or(false, |v| v != value);
                    if conflict {
                        return None;
                    }
                    to.put(to_node.clone(), value);
                }
            }
            (Term::Variable(_), Term::Constant(constant)) => {
                if from.get(from_node).map_or(false, |v| v != constant) {
                    return None;
                }
            }
            (Term::Constant(constant), Term::Variable(to_var)) => {
                let conflict = to.var_value(to_var).map_or(false, |v| v != constant);
                if conflict {
                    return None;
                }
                to.put(to_node.clone(), constant);
            }
            (Term::Constant(_), Term::Constant(_)) => {}
        }
    }
    Some(to)
}

impl fmt::Display for TripleVarBindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.bindings.iter().map(|b| b.to_string()).collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::find_matches;
    use crate::matching::MatchFlags;
    use shared::parser::parse_graph_pattern_str;
    use shared::triple::Position;

    fn gp(s: &str) -> GraphPattern {
        parse_graph_pattern_str(s).unwrap()
    }

    fn binding(pairs: &[(&str, &str)]) -> Binding {
        pairs.iter().copied().collect()
    }

    fn set(pattern: &GraphPattern, bindings: &[&[(&str, &str)]]) -> TripleVarBindingSet {
        let flat: BindingSet = bindings.iter().map(|b| binding(b)).collect();
        TripleVarBindingSet::from_binding_set(pattern, &flat)
    }

    #[test]
    fn test_round_trip_flat_bindings() {
        let pattern = gp("?s <type> <Sensor> . ?s <hasVal> ?v");
        let flat: BindingSet = vec![
            binding(&[("s", "<sens1>"), ("v", "\"22\"")]),
            binding(&[("s", "<sens2>"), ("v", "\"21\"")]),
        ]
        .into_iter()
        .collect();
        let tvbs = TripleVarBindingSet::from_binding_set(&pattern, &flat);
        assert_eq!(tvbs.len(), 2);
        assert_eq!(tvbs.bindings().iter().next().unwrap().len(), 3);
        assert_eq!(tvbs.to_binding_set().unwrap(), flat);
    }

    #[test]
    fn test_conflicting_occurrences_are_an_error() {
        let pattern = gp("?s <p> ?o . ?s <q> ?o");
        let tp1 = "?s <p> ?o".parse().unwrap();
        let tp2 = "?s <q> ?o".parse().unwrap();
        let mut tvb = TripleVarBinding::new();
        tvb.put(TripleNode::new(tp1, Position::Subject), "<a>");
        tvb.put(TripleNode::new(tp2, Position::Subject), "<b>");
        let mut tvbs = TripleVarBindingSet::new(pattern);
        tvbs.add(tvb);
        assert!(matches!(
            tvbs.to_binding_set(),
            Err(ReasonerError::ConflictingBinding { .. })
        ));
    }

    #[test]
    fn test_merge_joins_on_shared_variables() {
        let p1 = gp("?s <type> <Sensor>");
        let p2 = gp("?s <hasVal> ?v");
        let a = set(&p1, &[&[("s", "<sens1>")], &[("s", "<sens2>")]]);
        let b = set(
            &p2,
            &[&[("s", "<sens1>"), ("v", "\"22\"")], &[("s", "<sens3>"), ("v", "\"1\"")]],
        );
        let merged = a.merge(&b);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.graph_pattern().len(), 2);
        let flat = merged.to_binding_set().unwrap();
        assert!(flat.contains(&binding(&[("s", "<sens1>"), ("v", "\"22\"")])));
    }

    #[test]
    fn test_merge_is_symmetric() {
        let p1 = gp("?s <type> ?t");
        let p2 = gp("?s <hasVal> ?v");
        let a = set(&p1, &[&[("s", "<a>"), ("t", "<T>")], &[("s", "<b>"), ("t", "<T>")]]);
        let b = set(
            &p2,
            &[&[("s", "<a>"), ("v", "\"1\"")], &[("s", "<b>"), ("v", "\"2\"")], &[("s", "<c>"), ("v", "\"3\"")]],
        );
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).len(), 2);
    }

    #[test]
    fn test_merge_disjoint_is_cross_product() {
        let a = set(&gp("?a <p> ?b"), &[&[("a", "<1>"), ("b", "<2>")], &[("a", "<3>"), ("b", "<4>")]]);
        let b = set(&gp("?c <q> ?d"), &[&[("c", "<5>"), ("d", "<6>")], &[("c", "<7>"), ("d", "<8>")]]);
        assert_eq!(a.merge(&b).len(), 4);
    }

    #[test]
    fn test_parallel_merge_matches_sequential() {
        let p1 = gp("?s <type> ?t");
        let p2 = gp("?s <hasVal> ?v");
        let mut a = TripleVarBindingSet::new(p1.clone());
        let mut b = TripleVarBindingSet::new(p2.clone());
        for i in 0..50 {
            let s = format!("<s{}>", i % 10);
            let t = format!("<t{}>", i);
            let v = format!("\"{}\"", i);
            a.add(TripleVarBinding::from_binding(&p1, &binding(&[("s", s.as_str()), ("t", t.as_str())])));
            b.add(TripleVarBinding::from_binding(&p2, &binding(&[("s", s.as_str()), ("v", v.as_str())])));
        }
        let parallel = ReasonerConfig {
            parallel_merge_threshold: 0,
            ..ReasonerConfig::default()
        };
        assert_eq!(a.merge_with(&b, &parallel), a.merge(&b));
    }

    #[test]
    fn test_union_keeps_partial_bindings() {
        let pattern = gp("?s <type> ?t . ?s <name> ?n");
        let mut a = set(&pattern, &[&[("s", "<a>"), ("t", "<T>")]]);
        let b = set(&pattern, &[&[("s", "<b>"), ("n", "\"B\"")]]);
        a.union(&b);
        assert_eq!(a.len(), 2);
        assert!(a.full_bindings().is_empty());
        assert_eq!(a.partial_bindings().len(), 2);
    }

    #[test]
    fn test_translate_renames_variables() {
        let from = gp("?id <type> <Target> . ?id <hasName> ?name");
        let to = gp("?x <type> <Target> . ?x <hasName> ?y");
        let matches = find_matches(&from, &to, MatchFlags::ONLY_BIGGEST);
        assert_eq!(matches.len(), 1);
        let source = set(&from, &[&[("id", "<target0>"), ("name", "\"Eek\"")]]);
        let translated = source.translate(&to, &matches);
        let flat = translated.full_bindings().to_binding_set().unwrap();
        assert_eq!(flat.len(), 1);
        assert!(flat.contains(&binding(&[("x", "<target0>"), ("y", "\"Eek\"")])));
    }

    #[test]
    fn test_translate_emptiness() {
        let from = gp("?s ?p ?o");
        let to = gp("?a <p> ?a");
        let matches = find_matches(&from, &to, MatchFlags::empty());
        assert_eq!(matches.len(), 1);
        let source = set(&from, &[&[("s", "<x>"), ("p", "<p>"), ("o", "<y>")]]);
        assert!(source.translate(&to, &matches).is_empty());

        let same = set(&from, &[&[("s", "<x>"), ("p", "<p>"), ("o", "<x>")]]);
        assert_eq!(same.translate(&to, &matches).len(), 1);
    }

    #[test]
    fn test_translate_drops_constant_mismatch() {
        let from = gp("?s <type> ?t");
        let to = gp("?x <type> <Sensor>");
        let matches = find_matches(&from, &to, MatchFlags::empty());
        let source = set(&from, &[&[("s", "<a>"), ("t", "<Sensor>")], &[("s", "<b>"), ("t", "<Device>")]]);
        let translated = source.translate(&to, &matches).to_binding_set().unwrap();
        assert_eq!(translated.len(), 1);
        assert!(translated.contains(&binding(&[("x", "<a>")])));
    }

    #[test]
    fn test_translate_constant_into_variable() {
        let from = gp("?x <type> <Sensor>");
        let to = gp("?s <type> ?t");
        let matches = find_matches(&from, &to, MatchFlags::empty());
        let source = set(&from, &[&[("x", "<a>")]]);
        let translated = source.translate(&to, &matches).to_binding_set().unwrap();
        assert!(translated.contains(&binding(&[("s", "<a>"), ("t", "<Sensor>")])));
    }

    #[test]
    fn test_translate_empty_binding_passes() {
        let from = gp("?x <type> <Sensor>");
        let to = gp("?s <type> ?t");
        let matches = find_matches(&from, &to, MatchFlags::empty());
        let mut source = TripleVarBindingSet::new(from);
        source.add(TripleVarBinding::new());
        let translated = source.translate(&to, &matches);
        assert_eq!(translated.len(), 1);
        let only = translated.bindings().iter().next().unwrap();
        assert_eq!(only.var_value("t"), Some("<Sensor>"));
        assert!(TripleVarBindingSet::new(gp("?a <b> ?c")).translate(&to, &matches).is_empty());
    }

    #[test]
    fn test_keep_compatible() {
        let pattern = gp("?s <hasVal> ?v");
        let results = set(&pattern, &[&[("s", "<a>"), ("v", "\"1\"")], &[("s", "<b>"), ("v", "\"2\"")]]);
        let filter = set(&pattern, &[&[("s", "<a>")]]);
        assert_eq!(results.keep_compatible(&filter).len(), 1);

        let mut open = TripleVarBindingSet::new(pattern.clone());
        open.add(TripleVarBinding::new());
        assert_eq!(results.keep_compatible(&open).len(), 2);
        assert_eq!(results.keep_compatible(&TripleVarBindingSet::new(pattern)).len(), 2);
    }
}
