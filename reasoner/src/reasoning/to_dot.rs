use crate::reasoning::node::ReasoningNode;
use crate::reasoning::reaction::ReactionNode;
use crate::reasoning::ReasonerPlan;
use crate::rule::Rule;
use crate::rule_store::RuleStore;
use shared::triple::{format_graph_pattern, GraphPattern, TriplePattern};

/// Contains a method to convert a specific data structure into a representation in the DOT language
/// For better visualisation
pub trait ToDot {
    fn to_dot(&self) -> String;
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Readable name of a triple pattern: the class for `rdf:type` style
/// patterns, the constants otherwise.
fn pattern_name(pattern: &TriplePattern) -> String {
    let is_type = pattern
        .predicate
        .lexical()
        .map_or(false, |p| p.contains("type"));
    let name = if is_type && pattern.object.is_constant() {
        pattern.object.short_label()
    } else {
        [&pattern.subject, &pattern.predicate, &pattern.object]
            .iter()
            .filter(|term| term.is_constant())
            .map(|term| term.short_label())
            .collect::<Vec<_>>()
            .join(" ")
    };
    if name.is_empty() {
        "unknown".to_string()
    } else {
        escape(&name)
    }
}

fn side_name(pattern: &GraphPattern) -> String {
    pattern.iter().map(pattern_name).collect::<Vec<_>>().join(" ")
}

fn rule_name(rule: &Rule) -> String {
    format!(
        "\"{}{} ->\\n{}\"",
        rule.name().map(|n| format!("{}: ", escape(n))).unwrap_or_default(),
        side_name(rule.antecedent()),
        side_name(rule.consequent())
    )
}

fn rule_tooltip(rule: &Rule) -> String {
    escape(&format!(
        "{} -> {}",
        format_graph_pattern(rule.antecedent()),
        format_graph_pattern(rule.consequent())
    ))
}

impl ToDot for RuleStore {
    fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for rule in self.rules() {
            out.push_str(&format!(
                "{}[label={}, tooltip=\"{}\"]\n",
                rule.id(),
                rule_name(rule),
                rule_tooltip(rule)
            ));
            for neighbor in self.antecedent_neighbors(rule).iter() {
                out.push_str(&format!("{}->{}\n", neighbor.rule.id(), rule.id()));
            }
        }
        out.push('}');
        out
    }
}

/// Writes `node` and its subtree, returning the id given to `node`.
fn plan_nodes(node: &ReasoningNode, parent: Option<usize>, next: &mut usize, out: &mut String) -> usize {
    let id = *next;
    *next += 1;
    let mut label = format!("{} ->\\n{}", side_name(node.rule().antecedent()), side_name(node.rule().consequent()));
    if let Some(time) = node.handler_time() {
        label.push_str(&format!("\\n{}ms", time.as_millis()));
    }
    out.push_str(&format!(
        "n{}[label=\"{}\", tooltip=\"{}\", xlabel=\"{}\"]\n",
        id,
        label,
        rule_tooltip(node.rule()),
        node.state()
    ));
    if let Some(parent) = parent {
        let size = node.parent_match().map_or(0, |m| m.len());
        out.push_str(&format!("n{}->n{}[label=\"{}\"]\n", id, parent, size));
    }
    for child in node.children() {
        plan_nodes(child, Some(id), next, out);
    }
    id
}

// Data flows from producer to consumer, so edges point forward.
fn reaction_nodes(reaction: &ReactionNode, producer: usize, next: &mut usize, out: &mut String) {
    let id = plan_nodes(reaction.node(), None, next, out);
    out.push_str(&format!(
        "n{}->n{}[label=\"{}\", style=dashed]\n",
        producer,
        id,
        reaction.matches().len()
    ));
    for consumer in reaction.consumers() {
        reaction_nodes(consumer, id, next, out);
    }
}

impl ToDot for ReasonerPlan {
    fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        let mut next = 0;
        let root = plan_nodes(self.root(), None, &mut next, &mut out);
        for reaction in self.reactions() {
            reaction_nodes(reaction, root, &mut next, &mut out);
        }
        out.push('}');
        out
    }
}
