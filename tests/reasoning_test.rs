extern crate knowledge_engine;
use knowledge_engine::reasoner::reasoning::to_dot::ToDot;
use knowledge_engine::reasoner::rule::{FnBindingSetHandler, StaticBindingSetHandler};
use knowledge_engine::shared::parser::parse_graph_pattern_str;
use knowledge_engine::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gp(s: &str) -> GraphPattern {
        parse_graph_pattern_str(s).unwrap()
    }

    fn data_rule(consequent: &str, bindings: BindingSet) -> Rule {
        Rule::with_handler(
            GraphPattern::new(),
            gp(consequent),
            Arc::new(StaticBindingSetHandler::new(bindings)),
        )
        .unwrap()
    }

    fn bindings(pairs: &[&[(&str, &str)]]) -> BindingSet {
        pairs
            .iter()
            .map(|b| b.iter().copied().collect::<Binding>())
            .collect()
    }

    fn objective(pattern: &str) -> Arc<Rule> {
        Arc::new(Rule::objective(gp(pattern)).unwrap())
    }

    #[tokio::test]
    async fn test_targets_from_fixture() {
        let targets: BindingSet =
            serde_json::from_str(include_str!("fixtures/targets.json")).unwrap();
        assert_eq!(targets.len(), 2);

        let mut store = RuleStore::new();
        store.add_rule(data_rule(
            "?id <https://www.tno.nl/example/type> <https://www.tno.nl/example/Target> . ?id <https://www.tno.nl/example/hasName> ?name",
            targets,
        ));

        let mut plan = ReasonerPlan::new(
            &store,
            objective("?x <https://www.tno.nl/example/type> <https://www.tno.nl/example/Target> . ?x <https://www.tno.nl/example/hasName> ?y"),
        )
        .unwrap();
        plan.optimize();
        let result = plan.execute(BindingSet::new()).await.unwrap();

        let expected = bindings(&[
            &[("x", "<https://www.tno.nl/target0>"), ("y", "\"Eek\"")],
            &[("x", "<https://www.tno.nl/target1>"), ("y", "\"Bla\"")],
        ]);
        assert_eq!(result.bindings, expected);
        assert!(result.knowledge_gaps.is_empty());
    }

    #[tokio::test]
    async fn test_single_knowledge_gap() {
        let mut store = RuleStore::new();
        store.add_rule(data_rule(
            "?id <type> <Target>",
            bindings(&[&[("id", "<target0>")]]),
        ));

        let mut plan =
            ReasonerPlan::new(&store, objective("?x <type> <Target> . ?x <hasColor> ?c")).unwrap();
        let result = plan.execute(BindingSet::new()).await.unwrap();

        assert!(result.bindings.is_empty());
        assert_eq!(result.knowledge_gaps.len(), 1);
        let gap = result.knowledge_gaps.iter().next().unwrap();
        assert_eq!(gap.len(), 1);
        assert!(gap.contains(&"?x <hasColor> ?c".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_gaps_disabled() {
        let store = RuleStore::new();
        let config = ReasonerConfig {
            knowledge_gaps_enabled: false,
            ..ReasonerConfig::default()
        };
        let mut plan =
            ReasonerPlan::with_config(&store, objective("?x <hasColor> ?c"), config).unwrap();
        let result = plan.execute(BindingSet::new()).await.unwrap();
        assert!(result.knowledge_gaps.is_empty());
        assert!(result.bindings.is_empty());
        assert_eq!(plan.knowledge_gaps().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_branch_is_absorbed() {
        let mut store = RuleStore::new();
        let failing = FnBindingSetHandler::new(|_bs: BindingSet| async {
            Err::<BindingSet, _>(HandlerError::msg("knowledge base unreachable"))
        });
        store.add_rule(
            Rule::with_handler(GraphPattern::new(), gp("?s <hasVal> ?v"), Arc::new(failing)).unwrap(),
        );
        store.add_rule(data_rule(
            "?sensor <hasVal> ?value",
            bindings(&[&[("sensor", "<sens1>"), ("value", "\"21\"")]]),
        ));

        let mut plan = ReasonerPlan::new(&store, objective("?x <hasVal> ?y")).unwrap();
        let result = plan.execute(BindingSet::new()).await.unwrap();
        assert_eq!(result.bindings.len(), 1);
        assert!(result
            .bindings
            .contains(&Binding::new().with("x", "<sens1>").with("y", "\"21\"")));
        assert!(plan.root().children().iter().any(|c| c.from_handler().is_none()));
    }

    #[tokio::test]
    async fn test_transitive_rule() {
        let mut store = RuleStore::new();
        store.add_rule(Rule::new(gp("?a <p> ?b . ?b <p> ?c"), gp("?a <p> ?c")).unwrap());
        store.add_rule(data_rule(
            "?s <p> ?o",
            bindings(&[&[("s", "<1>"), ("o", "<2>")], &[("s", "<2>"), ("o", "<3>")]]),
        ));

        let mut plan = ReasonerPlan::new(&store, objective("?x <p> ?y")).unwrap();
        let result = plan.execute(BindingSet::new()).await.unwrap();
        assert_eq!(result.bindings.len(), 3);
        assert!(result
            .bindings
            .contains(&Binding::new().with("x", "<1>").with("y", "<3>")));
    }

    #[tokio::test]
    async fn test_cyclic_rules_from_file() {
        let mut store = RuleStore::new();
        let loaded = store
            .load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/family.rules"))
            .unwrap();
        assert_eq!(loaded, 2);
        store.add_rule(data_rule(
            "?s <https://example.org/parentOf> ?o",
            bindings(&[&[("s", "<alice>"), ("o", "<bob>")]]),
        ));
        store.add_rule(data_rule(
            "?s <https://example.org/childOf> ?o",
            bindings(&[&[("s", "<carol>"), ("o", "<dave>")]]),
        ));

        let mut plan =
            ReasonerPlan::new(&store, objective("?x <https://example.org/childOf> ?y")).unwrap();
        plan.optimize();
        let result = plan.execute(BindingSet::new()).await.unwrap();

        let expected = bindings(&[
            &[("x", "<bob>"), ("y", "<alice>")],
            &[("x", "<carol>"), ("y", "<dave>")],
        ]);
        assert_eq!(result.bindings, expected);
        assert!(result.knowledge_gaps.is_empty());
        assert!(store.to_dot().starts_with("digraph {"));
        assert!(plan.to_dot().contains("->n0[label=\"1\"]"));
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let mut store = RuleStore::new();
        store.add_rule(data_rule("?s <p> ?o", bindings(&[&[("s", "<a>"), ("o", "<b>")]])));
        let mut plan = ReasonerPlan::new(&store, objective("?x <p> ?y . ?x <q> ?z")).unwrap();
        let result = plan.execute(BindingSet::new()).await.unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["bindings"], serde_json::json!([]));
        assert_eq!(json["knowledge_gaps"].as_array().unwrap().len(), 1);
        let back: ReasoningResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
