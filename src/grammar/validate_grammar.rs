use std::collections::HashSet;

use vector_map::VecMap;

use crate::{
    distribution::WeightedDistribution,
    error::{GrammarError, Warning},
};

use super::node::{NodeArena, NodeId, NodeKind};

type ValidateResult = Result<Vec<Warning>, GrammarError>;

/// Post-parse pass: resolves rule references, checks cut placement and
/// precomputes the generator's choice distributions.
pub fn validate_grammar(nodes: &mut NodeArena, rules: &VecMap<String, NodeId>) -> ValidateResult {
    let checks = [resolve_names, check_cuts, finalize_alternatives];

    let mut warnings = vec![];
    for check in checks {
        warnings.extend(check(nodes, rules)?);
    }

    Ok(warnings)
}

fn resolve_names(nodes: &mut NodeArena, rules: &VecMap<String, NodeId>) -> ValidateResult {
    let ids = nodes.ids().collect::<Vec<_>>();

    for id in ids {
        let position = nodes[id].position;
        let NodeKind::NonTerminal { rule, target } = &mut nodes[id].kind else {
            continue;
        };

        match rules.get(rule.as_str()) {
            Some(expression) => *target = Some(*expression),
            None => {
                return Err(GrammarError::Link {
                    position,
                    rule: rule.clone(),
                })
            }
        }
    }

    Ok(vec![])
}

fn check_cuts(nodes: &mut NodeArena, _rules: &VecMap<String, NodeId>) -> ValidateResult {
    let warnings = nodes
        .ids()
        .filter(|id| matches!(nodes[*id].kind, NodeKind::Cut))
        .filter(|id| {
            let mut ancestor = nodes[*id].parent;
            while let Some(parent) = ancestor {
                if nodes[parent].is_alternative() {
                    return false;
                }
                ancestor = nodes[parent].parent;
            }
            true
        })
        .map(|id| Warning {
            position: nodes[id].position,
            message: "cut has no enclosing alternative in its rule".to_string(),
        })
        .collect();

    Ok(warnings)
}

/// Rules whose expansion can never reach a rule reference cycle. Grows the set
/// until every rule left out references some rule also left out.
fn finite_rules(nodes: &NodeArena, rules: &VecMap<String, NodeId>) -> HashSet<NodeId> {
    let references = rules
        .iter()
        .map(|(_, id)| (*id, nodes.referenced_rules(*id)))
        .collect::<Vec<_>>();

    let mut finite = HashSet::new();
    loop {
        let before = finite.len();
        for (rule, targets) in &references {
            if targets.iter().all(|target| finite.contains(target)) {
                finite.insert(*rule);
            }
        }
        if finite.len() == before {
            return finite;
        }
    }
}

fn finalize_alternatives(nodes: &mut NodeArena, rules: &VecMap<String, NodeId>) -> ValidateResult {
    let finite = finite_rules(nodes, rules);
    nodes.set_finite_rules(finite);
    let ids = nodes.ids().collect::<Vec<_>>();

    for id in ids {
        let NodeKind::Alternative(alternation) = &nodes[id].kind else {
            continue;
        };

        let positions = (0..alternation.children.len()).collect::<Vec<_>>();
        let escapes = alternation
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let weight = if nodes.is_potentially_recursive(*child) {
                    0.0
                } else {
                    1.0
                };
                (i, weight)
            })
            .collect::<Vec<_>>();

        let non_recursive = WeightedDistribution::new(escapes).map_err(|e| {
            GrammarError::parse(nodes[id].position, format!("invalid alternative ({e})"))
        })?;

        if let NodeKind::Alternative(alternation) = &mut nodes[id].kind {
            alternation.weights = WeightedDistribution::uniform(positions);
            alternation.non_recursive = non_recursive;
        }
    }

    Ok(vec![])
}

#[cfg(test)]
mod tests {
    use crate::grammar::parse::parse_source;

    use super::*;

    fn validate(source: &str) -> (NodeArena, ValidateResult) {
        let mut parsed = parse_source(source).unwrap();
        let result = validate_grammar(&mut parsed.nodes, &parsed.rules);
        (parsed.nodes, result)
    }

    #[test]
    fn unresolved_reference_names_the_rule() {
        let (_, result) = validate("A ::= B");
        match result {
            Err(GrammarError::Link { rule, position }) => {
                assert_eq!(rule, "B");
                assert_eq!(position.to_string(), "1:7");
            }
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn references_resolve_to_expressions() {
        let (nodes, result) = validate("A ::= B B ::= \"b\"");
        assert!(result.unwrap().is_empty());

        let targets = nodes
            .ids()
            .filter_map(|id| match &nodes[id].kind {
                NodeKind::NonTerminal { target, .. } => Some(target.unwrap()),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(targets.len(), 1);
        assert!(matches!(
            &nodes[targets[0]].kind,
            NodeKind::Expression { rule, .. } if rule == "B"
        ));
    }

    #[test]
    fn cut_outside_alternative_warns() {
        let (_, result) = validate("A ::= \"a\" ~ \"b\"");
        let warnings = result.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("cut"));

        let (_, result) = validate("A ::= (\"a\" ~ \"b\") | \"c\"");
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn alternatives_get_escape_distributions() {
        let (nodes, result) = validate("A ::= (\"(\" A \")\") | \"x\" | A");
        result.unwrap();

        let alternation = nodes
            .ids()
            .find_map(|id| match &nodes[id].kind {
                NodeKind::Alternative(alternation) => Some(alternation.clone()),
                _ => None,
            })
            .unwrap();

        assert_eq!(alternation.weights.items(), &[0, 1, 2]);
        assert!(alternation.non_recursive.is_viable());

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(alternation.non_recursive.sample(&mut rng), Some(&1));
        }
    }

    #[test]
    fn references_to_terminating_rules_are_escapes() {
        let (nodes, result) = validate(
            r#"
            Factor ::= Number | ("(" Factor ")")
            Number ::= [0-9]
            "#,
        );
        result.unwrap();

        let alternation = nodes
            .ids()
            .find_map(|id| match &nodes[id].kind {
                NodeKind::Alternative(alternation) => Some(alternation.clone()),
                _ => None,
            })
            .unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(alternation.non_recursive.sample(&mut rng), Some(&0));
        }
    }

    #[test]
    fn rules_leading_into_a_cycle_are_not_finite() {
        let mut parsed = parse_source(
            r#"
            Top   ::= Inner "!"
            Inner ::= ("[" Inner "]") | Leaf
            Leaf  ::= "x" Digit?
            Digit ::= [0-9]
            "#,
        )
        .unwrap();
        resolve_names(&mut parsed.nodes, &parsed.rules).unwrap();

        let finite = finite_rules(&parsed.nodes, &parsed.rules);
        let rule = |name: &str| *parsed.rules.get(name).unwrap();

        assert!(finite.contains(&rule("Leaf")));
        assert!(finite.contains(&rule("Digit")));
        assert!(!finite.contains(&rule("Inner")));
        assert!(!finite.contains(&rule("Top")));
    }
}
