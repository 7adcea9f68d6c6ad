/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::matching::{MatchFlags, MatchStrategy};
use std::time::Duration;

/// Configuration for planning and executing reasoning
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// Match policy used when a plan looks for children of a node
    pub plan_strategy: MatchStrategy,
    /// Match policy of the rule store's default neighbor graph
    pub neighbor_flags: MatchFlags,
    /// Caller level cutoff for `execute`, none means wait forever
    pub timeout: Option<Duration>,
    /// Cross product size of a binding set merge that gets a warning
    pub large_merge_warning: usize,
    /// Cross product size above which merges run on the rayon pool
    pub parallel_merge_threshold: usize,
    /// Report knowledge gaps and skip evaluation of uncoverable plans
    pub knowledge_gaps_enabled: bool,
    /// Call each data source handler once per execution with the union of
    /// every request made to it
    pub task_batching: bool,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            plan_strategy: MatchStrategy::FindOnlyBiggestMatches,
            neighbor_flags: MatchFlags::ONLY_BIGGEST | MatchFlags::FULLY_COVERED,
            timeout: None,
            large_merge_warning: 300_000,
            parallel_merge_threshold: 10_000,
            knowledge_gaps_enabled: true,
            task_batching: true,
        }
    }
}

impl ReasonerConfig {
    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.plan_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
