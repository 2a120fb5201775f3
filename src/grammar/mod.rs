pub mod charclass;
pub mod generation;
pub mod lexer;
pub mod matching;
pub mod node;
mod parse;
mod quantifier;
mod validate_grammar;

use itertools::Itertools;
use rand::Rng;
use vector_map::VecMap;

use crate::{
    configuration::{EngineConfig, NodeConfig, RuleConfig},
    distribution::WeightedDistribution,
    error::{GrammarError, Warning},
    log::log,
};

use generation::{Generator, Sample};
use matching::{match_text, MatchOutcome};
use node::{GenRepetition, NodeArena, NodeId, NodeKind};
use parse::{parse_source, ParsedGrammar};
use validate_grammar::validate_grammar;

/// A parsed and linked grammar. The node graph is read-only while matching
/// and generating; only generator settings change after parsing.
pub struct Grammar {
    nodes: NodeArena,
    rules: VecMap<String, NodeId>,
    config: EngineConfig,
    warnings: Vec<Warning>,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .field("warnings", &self.warnings)
            .finish()
    }
}

pub fn parse_grammar(content: &str) -> Result<Grammar, GrammarError> {
    Grammar::parse_with_config(content, EngineConfig::default())
}

/// Validated override, applied only once every entry of a rule config passed.
struct NodeUpdate {
    id: NodeId,
    generation: GenRepetition,
    weights: Option<(NodeId, WeightedDistribution<usize>)>,
}

impl Grammar {
    pub fn parse_with_config(content: &str, config: EngineConfig) -> Result<Grammar, GrammarError> {
        let ParsedGrammar { mut nodes, rules } = parse_source(content)?;
        let warnings = validate_grammar(&mut nodes, &rules)?;

        for warning in &warnings {
            log!("{warning}");
        }
        log!(
            "parsed grammar with {} rule(s) and {} node(s)",
            rules.len(),
            nodes.len()
        );

        Ok(Grammar {
            nodes,
            rules,
            config,
            warnings,
        })
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_engine_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    fn root(&self, rule: &str) -> Result<NodeId, GrammarError> {
        self.rules
            .get(rule)
            .copied()
            .ok_or_else(|| GrammarError::UnknownRule(rule.to_string()))
    }

    /// Matches the whole of `text` against `rule`. A mismatch is reported
    /// through the outcome, not as an error.
    pub fn match_rule(&self, rule: &str, text: &str) -> Result<MatchOutcome, GrammarError> {
        let root = self.root(rule)?;
        Ok(match_text(
            &self.nodes,
            root,
            text,
            self.config.create_match_trace,
        ))
    }

    pub fn matches(&self, rule: &str, text: &str) -> Result<bool, GrammarError> {
        Ok(self.match_rule(rule, text)?.is_match())
    }

    pub fn generate(&self, rule: &str) -> Result<String, GrammarError> {
        let sample = self.generate_with(rule, &mut rand::thread_rng())?;
        Ok(sample.text)
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rule: &str, rng: &mut R) -> Result<Sample, GrammarError> {
        let root = self.root(rule)?;
        Ok(Generator::new(&self.nodes, &self.config).generate(root, rng))
    }

    /// Applies generator overrides to the named nodes of `rule`. Either every
    /// override is valid and applied, or nothing changes.
    pub fn set_generator_config(&mut self, rule: &str, config: &RuleConfig) -> Result<(), GrammarError> {
        let root = self.root(rule)?;

        let updates = config
            .iter()
            .map(|(name, node_config)| {
                let id = self.nodes.find_named(root, name).ok_or_else(|| {
                    GrammarError::config(rule, format!("no node named `{name}` in this rule"))
                })?;
                self.resolve_update(rule, name, id, node_config)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for update in &updates {
            self.nodes[update.id].generation = update.generation;
        }
        for update in updates {
            if let Some((target, weights)) = update.weights {
                if let NodeKind::Alternative(alternation) = &mut self.nodes[target].kind {
                    alternation.weights = weights;
                }
            }
        }

        log!(
            "applied generator config to rule `{rule}`: {}",
            config.keys().join(", ")
        );
        Ok(())
    }

    fn resolve_update(
        &self,
        rule: &str,
        name: &str,
        id: NodeId,
        config: &NodeConfig,
    ) -> Result<NodeUpdate, GrammarError> {
        let error = |message: String| GrammarError::config(rule, format!("node `{name}`: {message}"));

        let node = &self.nodes[id];
        let declared = node.repetition;
        let mut generation = node.generation;

        if let Some(min) = config.min {
            if min < declared.min {
                return Err(error(format!(
                    "min {min} is below the grammar's minimum of {}",
                    declared.min
                )));
            }
            generation.min = min;
        }

        if let Some(max) = config.max {
            generation.max = match (usize::try_from(max).ok(), declared.max) {
                (None, None) => None,
                (None, Some(_)) => {
                    return Err(error(
                        "an unbounded max is only allowed for unbounded repetitions".to_string(),
                    ))
                }
                (Some(max), Some(declared_max)) if max > declared_max => {
                    return Err(error(format!(
                        "max {max} is above the grammar's maximum of {declared_max}"
                    )))
                }
                (Some(max), _) => Some(max),
            };
        }

        if let Some(max) = generation.max {
            if generation.min > max {
                return Err(error(format!(
                    "min {} is greater than max {max}",
                    generation.min
                )));
            }
        }

        if let Some(pow) = config.pow {
            if !pow.is_finite() || pow < 0.0 {
                return Err(error(format!("pow must be a non-negative number, got {pow}")));
            }
            generation.pow = pow;
        }

        let weights = match &config.dist {
            None => None,
            Some(dist) => {
                // a group or rule forwards its weights to its alternation
                let (target, alternation) = std::iter::once(id)
                    .chain(node.children().iter().copied())
                    .find_map(|candidate| match &self.nodes[candidate].kind {
                        NodeKind::Alternative(alternation) => Some((candidate, alternation)),
                        _ => None,
                    })
                    .ok_or_else(|| error("dist requires an alternative".to_string()))?;

                if dist.len() != alternation.children.len() {
                    return Err(error(format!(
                        "dist has {} weight(s) but the alternative has {} option(s)",
                        dist.len(),
                        alternation.children.len()
                    )));
                }

                if let Some(weight) = dist.iter().find(|w| !w.is_finite() || **w < 0.0) {
                    return Err(error(format!("invalid weight {weight} in dist")));
                }

                let total = dist.iter().sum::<f64>();
                if !total.is_finite() {
                    return Err(error(format!("dist weights sum to {total}")));
                }

                let weighted = WeightedDistribution::new(dist.iter().copied().enumerate())
                    .map_err(|e| error(format!("invalid dist ({e})")))?;

                Some((target, weighted))
            }
        };

        Ok(NodeUpdate {
            id,
            generation,
            weights,
        })
    }
}
