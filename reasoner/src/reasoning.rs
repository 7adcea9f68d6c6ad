/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */
pub mod knowledge_gap;
pub mod node;
pub mod reaction;
pub mod task_board;
pub mod to_dot;

use crate::binding::{Binding, BindingSet, TripleVarBindingSet};
use crate::config::ReasonerConfig;
use crate::error::ReasonerError;
use crate::matching::MatchFlags;
use crate::rule::Rule;
use crate::rule_store::RuleStore;
use futures::future::join_all;
use log::{debug, error};
use node::EvalContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub use knowledge_gap::{find_knowledge_gaps, merge_gap, merge_gaps, KnowledgeGap};
pub use node::{NodeState, ReasoningNode};
pub use reaction::ReactionNode;
pub use task_board::TaskBoard;

/// What one plan execution hands back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub bindings: BindingSet,
    pub knowledge_gaps: BTreeSet<KnowledgeGap>,
}

/// Reasoning tree for one ask or post.
///
/// A start rule with an antecedent is an ask and is answered by backward
/// chaining. A start rule with only a consequent is a post: the rules that
/// consume its data react, and their output is passed on forward.
///
/// Built once from a rule store, optionally optimized, then executed. The
/// tree only holds `Arc`s of the store's rules, so the store can be dropped
/// or changed once the plan exists.
#[derive(Debug)]
pub struct ReasonerPlan {
    root: ReasoningNode,
    reactions: Vec<ReactionNode>,
    config: ReasonerConfig,
}

impl ReasonerPlan {
    pub fn new(store: &RuleStore, start: Arc<Rule>) -> Result<Self, ReasonerError> {
        ReasonerPlan::with_config(store, start, ReasonerConfig::default())
    }

    pub fn with_config(
        store: &RuleStore,
        start: Arc<Rule>,
        config: ReasonerConfig,
    ) -> Result<Self, ReasonerError> {
        if start.antecedent().is_empty() && start.consequent().is_empty() {
            return Err(ReasonerError::InvalidObjective);
        }
        let begin = Instant::now();
        let flags: MatchFlags = config.plan_strategy.into();
        let mut root = ReasoningNode::new(start.clone(), None);
        let reactions = if start.antecedent().is_empty() {
            ReactionNode::expand_consumers(&start, store, flags, &mut vec![start.id()])
        } else {
            root.expand(store, flags, &mut Vec::new());
            Vec::new()
        };
        let plan = ReasonerPlan {
            root,
            reactions,
            config,
        };
        debug!(
            "Built {} plan for {} with {} nodes in {}ms",
            if plan.is_backward() { "backward" } else { "forward" },
            plan.root.rule(),
            plan.size(),
            begin.elapsed().as_millis()
        );
        Ok(plan)
    }

    pub fn root(&self) -> &ReasoningNode {
        &self.root
    }

    /// Rules reacting directly to the data a forward plan posts.
    pub fn reactions(&self) -> &[ReactionNode] {
        &self.reactions
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn is_backward(&self) -> bool {
        !self.root.rule().antecedent().is_empty()
    }

    pub fn size(&self) -> usize {
        self.root.size() + self.reactions.iter().map(ReactionNode::size).sum::<usize>()
    }

    pub fn optimize(&mut self) {
        let before = self.size();
        self.root.optimize();
        for reaction in &mut self.reactions {
            reaction.optimize();
        }
        debug!("Optimized plan from {} to {} nodes", before, self.size());
    }

    /// Parts of the objective that no chain of rules can supply. Always
    /// empty for forward plans.
    pub fn knowledge_gaps(&self) -> BTreeSet<KnowledgeGap> {
        find_knowledge_gaps(&self.root)
    }

    /// Runs the plan. An empty `initial` set means no restrictions.
    ///
    /// Backward plans answer with bindings for the objective. Forward plans
    /// take `initial` as the posted data and answer with everything the
    /// directly reacting rules returned.
    pub async fn execute(&mut self, initial: BindingSet) -> Result<ReasoningResult, ReasonerError> {
        let mut initial = initial;
        if initial.is_empty() {
            initial.add(Binding::new());
        }
        let knowledge_gaps = if self.config.knowledge_gaps_enabled {
            self.knowledge_gaps()
        } else {
            BTreeSet::new()
        };

        let start = Instant::now();
        let timeout = self.config.timeout;
        let evaluation = async {
            if self.is_backward() {
                self.root.evaluate_root(&initial, &self.config).await
            } else {
                self.post(&initial).await
            }
        };
        let bindings = match timeout {
            Some(limit) => tokio::time::timeout(limit, evaluation)
                .await
                .map_err(|_| ReasonerError::Timeout(limit))??,
            None => evaluation.await?,
        };
        debug!(
            "Executed plan in {}ms: {} bindings, {} knowledge gaps",
            start.elapsed().as_millis(),
            bindings.len(),
            knowledge_gaps.len()
        );

        Ok(ReasoningResult {
            bindings,
            knowledge_gaps,
        })
    }

    async fn post(&mut self, initial: &BindingSet) -> Result<BindingSet, ReasonerError> {
        let rule = self.root.rule().clone();
        let produced = TripleVarBindingSet::from_binding_set(rule.consequent(), initial);
        self.root.transition(NodeState::Ready);

        let board = TaskBoard::new();
        let ctx = EvalContext {
            config: &self.config,
            board: &board,
        };
        let produced = &produced;
        let pending = self.reactions.iter_mut().map(|reaction| async move {
            match reaction.react(produced, ctx).await {
                Ok(output) => Some(output),
                Err(e) => {
                    error!("Reaction of rule {} failed: {}", reaction.rule(), e);
                    None
                }
            }
        });

        let mut bindings = BindingSet::new();
        for output in join_all(pending).await.into_iter().flatten() {
            for binding in output {
                bindings.add(binding);
            }
        }
        self.root.transition(NodeState::Done);
        Ok(bindings)
    }
}

impl fmt::Display for ReasonerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt_tree(f, 0)?;
        for reaction in &self.reactions {
            reaction.fmt_tree(f, 1)?;
        }
        Ok(())
    }
}
