/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::binding::{Binding, BindingSet};
use crate::error::{HandlerError, ReasonerError};
use crate::matching::{find_matches, Match, MatchFlags};
use futures::future::{self, BoxFuture};
use shared::triple::{format_graph_pattern, graph_pattern_variables, GraphPattern};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_RULE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(usize);

impl RuleId {
    fn next() -> Self {
        RuleId(NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Produces bindings for one side of a rule given bindings for the other.
///
/// Implementations may be remote and slow. They must not block the calling
/// thread; the returned future is polled by the plan.
pub trait BindingSetHandler: Send + Sync {
    fn handle(&self, bindings: BindingSet) -> BoxFuture<'static, Result<BindingSet, HandlerError>>;
}

/// Projects consequent variables out of antecedent bindings.
#[derive(Debug, Clone)]
pub struct TrivialBindingSetHandler {
    variables: BTreeSet<String>,
}

impl TrivialBindingSetHandler {
    pub fn new(antecedent: &GraphPattern, consequent: &GraphPattern) -> Result<Self, ReasonerError> {
        let available = graph_pattern_variables(antecedent);
        let variables = graph_pattern_variables(consequent);
        if let Some(missing) = variables.difference(&available).next() {
            return Err(ReasonerError::UnprojectableConsequent(missing.clone()));
        }
        Ok(TrivialBindingSetHandler { variables })
    }
}

impl BindingSetHandler for TrivialBindingSetHandler {
    fn handle(&self, bindings: BindingSet) -> BoxFuture<'static, Result<BindingSet, HandlerError>> {
        let mut projected = BindingSet::new();
        for b in &bindings {
            let mut out = Binding::new();
            for var in &self.variables {
                match b.get(var) {
                    Some(value) => out.put(var, value),
                    None => {
                        return Box::pin(future::ready(Err(HandlerError::MissingVariable(
                            var.clone(),
                        ))))
                    }
                }
            }
            projected.add(out);
        }
        Box::pin(future::ready(Ok(projected)))
    }
}

/// Answers every request with the same bindings, like a fixed fact table.
#[derive(Debug, Clone, Default)]
pub struct StaticBindingSetHandler {
    bindings: BindingSet,
}

impl StaticBindingSetHandler {
    pub fn new(bindings: BindingSet) -> Self {
        StaticBindingSetHandler { bindings }
    }
}

impl BindingSetHandler for StaticBindingSetHandler {
    fn handle(&self, _bindings: BindingSet) -> BoxFuture<'static, Result<BindingSet, HandlerError>> {
        Box::pin(future::ready(Ok(self.bindings.clone())))
    }
}

/// Wraps an async closure.
pub struct FnBindingSetHandler<F> {
    f: F,
}

impl<F, Fut> FnBindingSetHandler<F>
where
    F: Fn(BindingSet) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BindingSet, HandlerError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        FnBindingSetHandler { f }
    }
}

impl<F, Fut> BindingSetHandler for FnBindingSetHandler<F>
where
    F: Fn(BindingSet) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BindingSet, HandlerError>> + Send + 'static,
{
    fn handle(&self, bindings: BindingSet) -> BoxFuture<'static, Result<BindingSet, HandlerError>> {
        Box::pin((self.f)(bindings))
    }
}

/// An antecedent graph pattern, a consequent graph pattern and the handler
/// that turns bindings of one into bindings of the other.
///
/// A rule with only a consequent is a data source, one with only an
/// antecedent is a goal. Rules are immutable once built and are shared
/// between the store and the plans through `Arc`.
#[derive(Clone)]
pub struct Rule {
    id: RuleId,
    name: Option<String>,
    antecedent: GraphPattern,
    consequent: GraphPattern,
    handler: Option<Arc<dyn BindingSetHandler>>,
}

impl Rule {
    /// Builds a rule with the default handler for its shape.
    ///
    /// Both sides present: the trivial projection. Only an antecedent: a goal
    /// without handler. Only a consequent needs an explicit handler, see
    /// [`Rule::with_handler`].
    pub fn new(antecedent: GraphPattern, consequent: GraphPattern) -> Result<Rule, ReasonerError> {
        match (antecedent.is_empty(), consequent.is_empty()) {
            (true, true) => Err(ReasonerError::EmptyRule),
            (true, false) => Err(ReasonerError::MissingHandler),
            (false, true) => Ok(Rule::build(antecedent, consequent, None)),
            (false, false) => {
                let handler = TrivialBindingSetHandler::new(&antecedent, &consequent)?;
                Ok(Rule::build(antecedent, consequent, Some(Arc::new(handler))))
            }
        }
    }

    pub fn with_handler(
        antecedent: GraphPattern,
        consequent: GraphPattern,
        handler: Arc<dyn BindingSetHandler>,
    ) -> Result<Rule, ReasonerError> {
        if antecedent.is_empty() && consequent.is_empty() {
            return Err(ReasonerError::EmptyRule);
        }
        Ok(Rule::build(antecedent, consequent, Some(handler)))
    }

    /// The goal of a reasoning request.
    pub fn objective(antecedent: GraphPattern) -> Result<Rule, ReasonerError> {
        if antecedent.is_empty() {
            return Err(ReasonerError::InvalidObjective);
        }
        Ok(Rule::build(antecedent, GraphPattern::new(), None))
    }

    /// The start of a forward plan: data put out by a knowledge base.
    pub fn proactive(consequent: GraphPattern) -> Result<Rule, ReasonerError> {
        if consequent.is_empty() {
            return Err(ReasonerError::EmptyRule);
        }
        Ok(Rule::build(GraphPattern::new(), consequent, None))
    }

    fn build(
        antecedent: GraphPattern,
        consequent: GraphPattern,
        handler: Option<Arc<dyn BindingSetHandler>>,
    ) -> Rule {
        Rule {
            id: RuleId::next(),
            name: None,
            antecedent,
            consequent,
            handler,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn antecedent(&self) -> &GraphPattern {
        &self.antecedent
    }

    pub fn consequent(&self) -> &GraphPattern {
        &self.consequent
    }

    pub fn handler(&self) -> Option<&Arc<dyn BindingSetHandler>> {
        self.handler.as_ref()
    }

    /// Aligns this rule's consequent onto `objective`.
    pub fn consequent_matches(&self, objective: &GraphPattern, flags: MatchFlags) -> BTreeSet<Match> {
        if self.consequent.is_empty() {
            return BTreeSet::new();
        }
        find_matches(&self.consequent, objective, flags)
    }

    /// Aligns this rule's antecedent onto `pattern`.
    pub fn antecedent_matches(&self, pattern: &GraphPattern, flags: MatchFlags) -> BTreeSet<Match> {
        if self.antecedent.is_empty() {
            return BTreeSet::new();
        }
        find_matches(&self.antecedent, pattern, flags)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("antecedent", &format_graph_pattern(&self.antecedent))
            .field("consequent", &format_graph_pattern(&self.consequent))
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            format_graph_pattern(&self.antecedent),
            format_graph_pattern(&self.consequent)
        )?;
        if let Some(name) = &self.name {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::parser::parse_graph_pattern_str;

    fn gp(s: &str) -> GraphPattern {
        parse_graph_pattern_str(s).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            Rule::new(GraphPattern::new(), GraphPattern::new()),
            Err(ReasonerError::EmptyRule)
        ));
        assert!(matches!(
            Rule::new(GraphPattern::new(), gp("?s <p> ?o")),
            Err(ReasonerError::MissingHandler)
        ));
        assert!(matches!(
            Rule::new(gp("?s <p> ?o"), gp("?s <q> ?x")),
            Err(ReasonerError::UnprojectableConsequent(v)) if v == "x"
        ));
        assert!(matches!(
            Rule::objective(GraphPattern::new()),
            Err(ReasonerError::InvalidObjective)
        ));
        assert!(matches!(
            Rule::proactive(GraphPattern::new()),
            Err(ReasonerError::EmptyRule)
        ));
        assert!(Rule::proactive(gp("?s <p> ?o")).unwrap().handler().is_none());
    }

    #[test]
    fn test_default_handlers() {
        let goal = Rule::new(gp("?s <p> ?o"), GraphPattern::new()).unwrap();
        assert!(goal.handler().is_none());
        let transform = Rule::new(gp("?s <p> ?o"), gp("?o <q> ?s")).unwrap();
        assert!(transform.handler().is_some());
        assert_ne!(goal.id(), transform.id());
    }

    #[tokio::test]
    async fn test_trivial_handler_projects() {
        let handler = TrivialBindingSetHandler::new(&gp("?a <p> ?b . ?b <p> ?c"), &gp("?a <p> ?c")).unwrap();
        let input: BindingSet = vec![Binding::new().with("a", "<1>").with("b", "<2>").with("c", "<3>")]
            .into_iter()
            .collect();
        let output = handler.handle(input).await.unwrap();
        assert!(output.contains(&Binding::new().with("a", "<1>").with("c", "<3>")));
        assert_eq!(output.len(), 1);
    }

    #[tokio::test]
    async fn test_trivial_handler_missing_variable() {
        let handler = TrivialBindingSetHandler::new(&gp("?a <p> ?b"), &gp("?a <q> ?b")).unwrap();
        let input: BindingSet = vec![Binding::new().with("a", "<1>")].into_iter().collect();
        assert_eq!(
            handler.handle(input).await,
            Err(HandlerError::MissingVariable("b".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnBindingSetHandler::new(|bs: BindingSet| async move { Ok::<_, HandlerError>(bs) });
        let input: BindingSet = vec![Binding::new().with("x", "<a>")].into_iter().collect();
        assert_eq!(handler.handle(input.clone()).await.unwrap(), input);
    }

    #[test]
    fn test_consequent_matches() {
        let data = Rule::with_handler(
            GraphPattern::new(),
            gp("?id <type> <Target> . ?id <hasName> ?name"),
            Arc::new(StaticBindingSetHandler::default()),
        )
        .unwrap();
        let objective = gp("?x <type> <Target> . ?x <hasName> ?y");
        let matches = data.consequent_matches(&objective, MatchFlags::FULLY_COVERED);
        assert_eq!(matches.len(), 1);
        assert!(data.antecedent_matches(&objective, MatchFlags::empty()).is_empty());
    }

    #[test]
    fn test_display() {
        let rule = Rule::new(gp("?s <p> ?o"), gp("?o <q> ?s")).unwrap().named("swap");
        assert_eq!(rule.to_string(), "?s <p> ?o -> ?o <q> ?s (swap)");
    }
}
