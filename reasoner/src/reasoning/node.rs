/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::knowledge_gap::find_knowledge_gaps;
use super::task_board::{TaskBoard, TaskOutcome};
use crate::binding::{BindingSet, TripleVarBindingSet};
use crate::config::ReasonerConfig;
use crate::error::{HandlerError, ReasonerError};
use crate::matching::{Match, MatchFlags};
use crate::rule::{BindingSetHandler, Rule, RuleId};
use crate::rule_store::RuleStore;
use futures::future::{join_all, BoxFuture};
use log::{debug, error, trace};
use shared::triple::{GraphPattern, TriplePattern};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Built, nothing sent down yet.
    Pending,
    /// Waiting for every child to report.
    AwaitingChildren,
    /// Child results merged, handler may run.
    Ready,
    /// Result handed to the parent.
    Done,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "PENDING",
            NodeState::AwaitingChildren => "AWAITING_CHILDREN",
            NodeState::Ready => "READY",
            NodeState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Rule and pattern subset that identify a node on a root to leaf path.
pub(crate) type PathKey = (RuleId, BTreeMap<TriplePattern, TriplePattern>);

/// Shared state of one plan execution.
#[derive(Clone, Copy)]
pub(crate) struct EvalContext<'a> {
    pub config: &'a ReasonerConfig,
    pub board: &'a TaskBoard,
}

/// Joins contributions, each tagged with the antecedent patterns it answers
/// for, and keeps the bindings whose contributions together cover every
/// pattern of `antecedent` with every variable occurrence bound.
pub(crate) fn combine_by_coverage(
    antecedent: &GraphPattern,
    contributions: Vec<(GraphPattern, TripleVarBindingSet)>,
    config: &ReasonerConfig,
) -> TripleVarBindingSet {
    let mut by_coverage: BTreeMap<GraphPattern, TripleVarBindingSet> = BTreeMap::new();
    for (covered, result) in contributions {
        if result.is_empty() {
            continue;
        }
        let mut joined: Vec<(GraphPattern, TripleVarBindingSet)> = by_coverage
            .iter()
            .filter(|(existing, _)| !covered.is_subset(existing))
            .map(|(existing, set)| {
                let coverage: GraphPattern = existing.union(&covered).cloned().collect();
                (coverage, set.merge_with(&result, config))
            })
            .collect();
        joined.push((covered, result));

        for (coverage, set) in joined {
            if set.is_empty() {
                continue;
            }
            match by_coverage.entry(coverage) {
                Entry::Occupied(mut entry) => entry.get_mut().union(&set),
                Entry::Vacant(entry) => {
                    entry.insert(set);
                }
            }
        }
    }

    by_coverage
        .remove(antecedent)
        .map(|set| set.full_bindings())
        .unwrap_or_else(|| TripleVarBindingSet::new(antecedent.clone()))
}

/// One rule instance in a reasoning tree.
///
/// `parent_match` goes from the parent's antecedent onto this node's
/// consequent; the root has none. Bindings travel down through the match
/// and back up through its inverse.
#[derive(Debug)]
pub struct ReasoningNode {
    rule: Arc<Rule>,
    parent_match: Option<Match>,
    children: Vec<ReasoningNode>,
    state: NodeState,
    to_handler: Option<BindingSet>,
    from_handler: Option<BindingSet>,
    handler_started: Option<Instant>,
    handler_finished: Option<Instant>,
}

impl ReasoningNode {
    pub(crate) fn new(rule: Arc<Rule>, parent_match: Option<Match>) -> Self {
        ReasoningNode {
            rule,
            parent_match,
            children: Vec::new(),
            state: NodeState::Pending,
            to_handler: None,
            from_handler: None,
            handler_started: None,
            handler_finished: None,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn parent_match(&self) -> Option<&Match> {
        self.parent_match.as_ref()
    }

    pub fn children(&self) -> &[ReasoningNode] {
        &self.children
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Bindings last sent to this node's handler.
    pub fn to_handler(&self) -> Option<&BindingSet> {
        self.to_handler.as_ref()
    }

    /// Bindings last received from this node's handler.
    pub fn from_handler(&self) -> Option<&BindingSet> {
        self.from_handler.as_ref()
    }

    /// Wall time spent in the handler, once it has returned.
    pub fn handler_time(&self) -> Option<Duration> {
        match (self.handler_started, self.handler_finished) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Children whose match covers `pattern` of this node's antecedent.
    pub fn children_covering<'a>(
        &'a self,
        pattern: &'a TriplePattern,
    ) -> impl Iterator<Item = &'a ReasoningNode> + 'a {
        self.children.iter().filter(move |child| {
            child
                .parent_match
                .as_ref()
                .map_or(false, |m| m.matching_patterns().contains_key(pattern))
        })
    }

    /// Antecedent patterns this node's match covers in its parent.
    pub fn covered_in_parent(&self) -> GraphPattern {
        self.parent_match
            .as_ref()
            .map(Match::covered)
            .unwrap_or_default()
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ReasoningNode::size).sum::<usize>()
    }

    /// Grows the subtree below this node from the store's neighbor graph.
    ///
    /// A neighbor that already sits on the path from the root with the same
    /// pattern pairs is not expanded again.
    pub(crate) fn expand(&mut self, store: &RuleStore, flags: MatchFlags, path: &mut Vec<PathKey>) {
        if self.rule.antecedent().is_empty() {
            return;
        }
        let neighbors = store.antecedent_neighbors_with(&self.rule, flags);
        for neighbor in neighbors.iter() {
            for m in &neighbor.matches {
                let key = (neighbor.rule.id(), m.matching_patterns().clone());
                if path.contains(&key) {
                    trace!("Skipping rule {} already on the path", neighbor.rule.id());
                    continue;
                }
                let mut child = ReasoningNode::new(neighbor.rule.clone(), Some(m.clone()));
                path.push(key);
                child.expand(store, flags, path);
                path.pop();
                self.children.push(child);
            }
        }
        trace!(
            "Expanded rule {} with {} children",
            self.rule.id(),
            self.children.len()
        );
    }

    /// Drops the children whose match touches any of `patterns`.
    pub(crate) fn drop_children_covering(&mut self, patterns: &GraphPattern) {
        self.children.retain(|child| child.covered_in_parent().is_disjoint(patterns));
    }

    /// Drops children made redundant by a sibling and orders the rest by
    /// how much of the antecedent they cover.
    pub(crate) fn optimize(&mut self) {
        for child in &mut self.children {
            child.optimize();
        }

        let gap_free: Vec<bool> = self
            .children
            .iter()
            .map(|child| child.rule.antecedent().is_empty() || find_knowledge_gaps(child).is_empty())
            .collect();
        let coverage: Vec<GraphPattern> = self
            .children
            .iter()
            .map(ReasoningNode::covered_in_parent)
            .collect();

        let mut keep = vec![true; self.children.len()];
        for i in 0..self.children.len() {
            for j in 0..self.children.len() {
                if i == j || !keep[j] {
                    continue;
                }
                let (a, b) = (&self.children[i], &self.children[j]);
                let subsumed_match = a.rule.id() == b.rule.id()
                    && match (&a.parent_match, &b.parent_match) {
                        (Some(ma), Some(mb)) => ma != mb && mb.is_sub_match(ma),
                        _ => false,
                    };
                let covered_better = !gap_free[i]
                    && gap_free[j]
                    && coverage[i].is_subset(&coverage[j]);
                if subsumed_match || covered_better {
                    keep[i] = false;
                    break;
                }
            }
        }

        let before = self.children.len();
        let mut kept = keep.into_iter();
        self.children.retain(|_| kept.next().unwrap_or(true));
        self.children
            .sort_by_key(|child| std::cmp::Reverse(child.covered_in_parent().len()));
        if before != self.children.len() {
            debug!(
                "Pruned {} children of rule {}",
                before - self.children.len(),
                self.rule.id()
            );
        }
    }

    pub(crate) fn transition(&mut self, state: NodeState) {
        trace!("Rule {}: {} -> {}", self.rule.id(), self.state, state);
        self.state = state;
    }

    async fn call_handler(
        &mut self,
        handler: Arc<dyn BindingSetHandler>,
        input: BindingSet,
    ) -> Result<BindingSet, HandlerError> {
        self.to_handler = Some(input.clone());
        self.handler_started = Some(Instant::now());
        let result = handler.handle(input).await;
        self.handler_finished = Some(Instant::now());
        if let Ok(output) = &result {
            self.from_handler = Some(output.clone());
        }
        result
    }

    /// Copies the outcome of this node's batched task as if its handler had
    /// been called with `input`.
    fn apply_task(&mut self, input: BindingSet, outcome: &TaskOutcome) -> Result<BindingSet, HandlerError> {
        self.to_handler = Some(input);
        self.handler_started = Some(outcome.started);
        self.handler_finished = Some(outcome.finished);
        if let Ok(output) = &outcome.result {
            self.from_handler = Some(output.clone());
        }
        outcome.result.clone()
    }

    /// Puts the handler calls of data source leaves below this node on the
    /// board, with the requests evaluation will make for `filter`.
    pub(crate) fn schedule_tasks(&self, filter: &TripleVarBindingSet, board: &mut TaskBoard) {
        for child in &self.children {
            let Some(m) = &child.parent_match else {
                continue;
            };
            let Ok(request) = filter.translate(child.rule.consequent(), [m]).to_binding_set() else {
                continue;
            };
            if child.rule.antecedent().is_empty() {
                if child.rule.handler().is_some() {
                    board.add_task(&child.rule, request);
                }
            } else {
                let antecedent_filter =
                    TripleVarBindingSet::from_binding_set(child.rule.antecedent(), &request);
                child.schedule_tasks(&antecedent_filter, board);
            }
        }
    }

    /// Runs every child and gathers their results on this node's antecedent.
    ///
    /// Children run concurrently and are all awaited before merging. A
    /// failing child contributes nothing. `seeds` are bindings that arrive
    /// from outside the tree for the listed antecedent patterns.
    async fn evaluate_antecedent(
        &mut self,
        filter: TripleVarBindingSet,
        seeds: Vec<(GraphPattern, TripleVarBindingSet)>,
        ctx: EvalContext<'_>,
    ) -> TripleVarBindingSet {
        let rule = self.rule.clone();
        let antecedent = rule.antecedent();
        let filter = &filter;

        let pending = self.children.iter_mut().map(|child| async move {
            let Some(m) = child.parent_match.clone() else {
                return None;
            };
            let down = filter.translate(child.rule.consequent(), [&m]);
            let outcome = child.evaluate(down, ctx).await;
            match outcome {
                Ok(result) => Some((m.covered(), result.translate(antecedent, [&m.inverse()]))),
                Err(e) => {
                    error!("Rule {} failed, its branch contributes no bindings: {}", child.rule, e);
                    None
                }
            }
        });
        let mut contributions = seeds;
        contributions.extend(join_all(pending).await.into_iter().flatten());

        let full = combine_by_coverage(antecedent, contributions, ctx.config).keep_compatible(filter);
        trace!("Rule {} gathered {} full bindings", rule.id(), full.len());
        full
    }

    /// Flat antecedent bindings for this node, moving it to `Ready`.
    pub(crate) async fn gather(
        &mut self,
        filter: TripleVarBindingSet,
        seeds: Vec<(GraphPattern, TripleVarBindingSet)>,
        ctx: EvalContext<'_>,
    ) -> Result<BindingSet, ReasonerError> {
        self.transition(NodeState::AwaitingChildren);
        let bindings = self
            .evaluate_antecedent(filter, seeds, ctx)
            .await
            .to_binding_set()?;
        self.transition(NodeState::Ready);
        Ok(bindings)
    }

    /// Feeds `input` to this node's handler. Empty input is not handled,
    /// except by rules without antecedent.
    pub(crate) async fn apply_rule(
        &mut self,
        input: BindingSet,
        board: &TaskBoard,
    ) -> Result<BindingSet, HandlerError> {
        let rule = self.rule.clone();
        let output = match (board.outcome(rule.id()), rule.handler()) {
            (Some(outcome), _) if rule.antecedent().is_empty() => self.apply_task(input, outcome)?,
            (_, Some(handler)) if rule.antecedent().is_empty() || !input.is_empty() => {
                self.call_handler(handler.clone(), input).await?
            }
            _ => BindingSet::new(),
        };
        self.transition(NodeState::Done);
        Ok(output)
    }

    /// Evaluates this node for a filter over its consequent and returns its
    /// results on the consequent.
    fn evaluate<'a>(
        &'a mut self,
        filter: TripleVarBindingSet,
        ctx: EvalContext<'a>,
    ) -> BoxFuture<'a, Result<TripleVarBindingSet, ReasonerError>> {
        Box::pin(async move {
            let rule = self.rule.clone();
            let input = if rule.antecedent().is_empty() {
                self.transition(NodeState::Ready);
                filter.to_binding_set()?
            } else {
                let antecedent_filter =
                    TripleVarBindingSet::from_binding_set(rule.antecedent(), &filter.to_binding_set()?);
                self.gather(antecedent_filter, Vec::new(), ctx).await?
            };
            let output = self.apply_rule(input, ctx.board).await?;
            let result =
                TripleVarBindingSet::from_binding_set(rule.consequent(), &output).keep_compatible(&filter);
            Ok::<_, ReasonerError>(result)
        })
    }

    /// Evaluates the whole tree with this node as root.
    ///
    /// A root with a handler passes the gathered bindings to it and returns
    /// its answer; its failure fails the evaluation.
    pub(crate) async fn evaluate_root(
        &mut self,
        initial: &BindingSet,
        config: &ReasonerConfig,
    ) -> Result<BindingSet, ReasonerError> {
        let rule = self.rule.clone();
        let filter = TripleVarBindingSet::from_binding_set(rule.antecedent(), initial);

        let mut board = TaskBoard::new();
        if config.task_batching {
            self.schedule_tasks(&filter, &mut board);
            board.execute_scheduled_tasks().await;
        }
        let ctx = EvalContext {
            config,
            board: &board,
        };

        let bindings = self.gather(filter, Vec::new(), ctx).await?;
        if rule.consequent().is_empty() {
            self.transition(NodeState::Done);
            return Ok(bindings);
        }
        Ok(self.apply_rule(bindings, &board).await?)
    }

    pub(crate) fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}[{}] {}", "  ".repeat(depth), self.state, self.rule)?;
        if let Some(m) = &self.parent_match {
            write!(f, " via {} pattern(s)", m.len())?;
        }
        if let Some(time) = self.handler_time() {
            write!(f, " handler {}ms", time.as_millis())?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}
