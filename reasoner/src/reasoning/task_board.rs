/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::binding::BindingSet;
use crate::error::HandlerError;
use crate::rule::{Rule, RuleId};
use futures::future::join_all;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// What one batched handler call returned.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub result: Result<BindingSet, HandlerError>,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug)]
struct Task {
    rule: Arc<Rule>,
    input: BindingSet,
    requests: usize,
    outcome: Option<TaskOutcome>,
}

impl Task {
    async fn run(&mut self) {
        let Some(handler) = self.rule.handler().cloned() else {
            return;
        };
        let started = Instant::now();
        let result = handler.handle(self.input.clone()).await;
        self.outcome = Some(TaskOutcome {
            result,
            started,
            finished: Instant::now(),
        });
    }
}

/// Collects the handler calls of a plan's data source rules so every rule is
/// asked once, with the union of all requests made to it.
///
/// Each requesting node keeps only the answers compatible with its own
/// request.
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<RuleId, Task>,
}

impl TaskBoard {
    pub fn new() -> Self {
        TaskBoard::default()
    }

    pub fn add_task(&mut self, rule: &Arc<Rule>, input: BindingSet) {
        let task = self.tasks.entry(rule.id()).or_insert_with(|| Task {
            rule: rule.clone(),
            input: BindingSet::new(),
            requests: 0,
            outcome: None,
        });
        for binding in input.iter() {
            task.input.add(binding.clone());
        }
        task.requests += 1;
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn has_task(&self, rule: RuleId) -> bool {
        self.tasks.contains_key(&rule)
    }

    /// Number of requests folded into the task of `rule`.
    pub fn requests(&self, rule: RuleId) -> usize {
        self.tasks.get(&rule).map_or(0, |task| task.requests)
    }

    /// Runs every scheduled task concurrently and waits for all of them.
    pub async fn execute_scheduled_tasks(&mut self) {
        let requests: usize = self.tasks.values().map(|task| task.requests).sum();
        debug!(
            "Executing {} scheduled tasks for {} requests",
            self.tasks.len(),
            requests
        );
        join_all(self.tasks.values_mut().map(Task::run)).await;
    }

    pub fn outcome(&self, rule: RuleId) -> Option<&TaskOutcome> {
        self.tasks.get(&rule).and_then(|task| task.outcome.as_ref())
    }
}
