/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::node::{EvalContext, ReasoningNode};
use crate::binding::{BindingSet, TripleVarBindingSet};
use crate::error::ReasonerError;
use crate::matching::{Match, MatchFlags};
use crate::rule::{Rule, RuleId};
use crate::rule_store::RuleStore;
use futures::future::{join_all, BoxFuture};
use log::{error, trace};
use shared::triple::GraphPattern;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A rule that consumes what another rule of a forward plan produces.
///
/// `matches` go from the producer's consequent onto this rule's antecedent.
/// Antecedent patterns the producer does not serve are filled by backward
/// chaining through the children of `node`.
#[derive(Debug)]
pub struct ReactionNode {
    node: ReasoningNode,
    matches: BTreeSet<Match>,
    consumers: Vec<ReactionNode>,
}

impl ReactionNode {
    /// Builds the reactions to everything `producer` puts out.
    ///
    /// A rule reacts at most once along a chain; `path` holds the rules
    /// already on it.
    pub(crate) fn expand_consumers(
        producer: &Rule,
        store: &RuleStore,
        flags: MatchFlags,
        path: &mut Vec<RuleId>,
    ) -> Vec<ReactionNode> {
        let neighbors = store.consequent_neighbors_with(producer, flags);
        let mut consumers = Vec::new();
        for neighbor in neighbors.iter() {
            if path.contains(&neighbor.rule.id()) {
                trace!("Rule {} already reacts on this chain", neighbor.rule.id());
                continue;
            }
            let served: GraphPattern = neighbor
                .matches
                .iter()
                .flat_map(Match::covered_upon)
                .collect();

            let mut node = ReasoningNode::new(neighbor.rule.clone(), None);
            node.expand(store, flags, &mut Vec::new());
            node.drop_children_covering(&served);

            path.push(neighbor.rule.id());
            let next = ReactionNode::expand_consumers(&neighbor.rule, store, flags, path);
            path.pop();

            consumers.push(ReactionNode {
                node,
                matches: neighbor.matches.clone(),
                consumers: next,
            });
        }
        consumers
    }

    pub fn node(&self) -> &ReasoningNode {
        &self.node
    }

    pub fn rule(&self) -> &Arc<Rule> {
        self.node.rule()
    }

    pub fn matches(&self) -> &BTreeSet<Match> {
        &self.matches
    }

    pub fn consumers(&self) -> &[ReactionNode] {
        &self.consumers
    }

    pub fn size(&self) -> usize {
        self.node.size() + self.consumers.iter().map(ReactionNode::size).sum::<usize>()
    }

    pub(crate) fn optimize(&mut self) {
        self.node.optimize();
        for consumer in &mut self.consumers {
            consumer.optimize();
        }
    }

    /// Applies this rule to what its producer put out and passes the result
    /// on to its own consumers.
    ///
    /// Every match of the producer contributes separately, so one producer
    /// can serve several antecedent patterns that are then joined. Returns
    /// the handler's output, empty when the rule did not fire.
    pub(crate) fn react<'a>(
        &'a mut self,
        produced: &'a TripleVarBindingSet,
        ctx: EvalContext<'a>,
    ) -> BoxFuture<'a, Result<BindingSet, ReasonerError>> {
        Box::pin(async move {
            let rule = self.node.rule().clone();
            let antecedent = rule.antecedent();

            let mut seeds = Vec::new();
            let mut filter = TripleVarBindingSet::new(antecedent.clone());
            for m in &self.matches {
                let translated = produced.translate(antecedent, [m]);
                if !translated.is_empty() {
                    filter.union(&translated);
                    seeds.push((m.covered_upon(), translated));
                }
            }
            if seeds.is_empty() {
                trace!("Nothing produced for rule {}", rule.id());
                return Ok(BindingSet::new());
            }

            let input = self.node.gather(filter, seeds, ctx).await?;
            let output = self.node.apply_rule(input, ctx.board).await?;
            if output.is_empty() || self.consumers.is_empty() {
                return Ok(output);
            }

            let result = TripleVarBindingSet::from_binding_set(rule.consequent(), &output);
            let result = &result;
            let pending = self.consumers.iter_mut().map(|consumer| async move {
                if let Err(e) = consumer.react(result, ctx).await {
                    error!("Reaction of rule {} failed: {}", consumer.rule(), e);
                }
            });
            join_all(pending).await;
            Ok::<_, ReasonerError>(output)
        })
    }

    pub(crate) fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        self.node.fmt_tree(f, depth)?;
        for consumer in &self.consumers {
            consumer.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}
