use rand::Rng;

use crate::{configuration::EngineConfig, log::log};

use super::node::{Node, NodeArena, NodeId, NodeKind};

/// Emitted in place of a subtree the generator refused to expand.
pub const DEPTH_PLACEHOLDER: &str = "<depth-limit>";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub text: String,
    /// how many times the depth ceiling forced a placeholder
    pub depth_overflows: usize,
}

impl Sample {
    pub fn is_complete(&self) -> bool {
        self.depth_overflows == 0
    }
}

pub struct Generator<'g> {
    nodes: &'g NodeArena,
    config: &'g EngineConfig,
}

struct GenerationContext<'r, R: Rng + ?Sized> {
    rng: &'r mut R,
    depth: usize,
    overflows: usize,
    output: String,
}

impl<'r, R: Rng + ?Sized> GenerationContext<'r, R> {
    fn overflow(&mut self) {
        self.overflows += 1;
        self.output.push_str(DEPTH_PLACEHOLDER);
    }
}

impl<'g> Generator<'g> {
    pub fn new(nodes: &'g NodeArena, config: &'g EngineConfig) -> Generator<'g> {
        Generator { nodes, config }
    }

    pub fn generate<R: Rng + ?Sized>(&self, root: NodeId, rng: &mut R) -> Sample {
        let mut context = GenerationContext {
            rng,
            depth: 0,
            overflows: 0,
            output: String::new(),
        };

        self.generate_node(root, &mut context);

        if context.overflows > 0 {
            log!(
                "generation reached depth limit {} and emitted {} placeholder(s)",
                self.config.max_gen_depth,
                context.overflows
            );
        }

        Sample {
            text: context.output,
            depth_overflows: context.overflows,
        }
    }

    /// Draws `round(min + (max - min) * r^pow)` with `r` uniform in `[0, 1)`.
    fn repetitions<R: Rng + ?Sized>(&self, node: &Node, context: &mut GenerationContext<R>) -> usize {
        let bounds = node.generation;
        let max = bounds
            .max
            .unwrap_or(self.config.max_gen_repetition)
            .max(bounds.min);

        if max == bounds.min {
            return max;
        }

        let factor = context.rng.gen::<f64>().powf(bounds.pow);
        (bounds.min as f64 + (max - bounds.min) as f64 * factor).round() as usize
    }

    fn generate_node<R: Rng + ?Sized>(&self, id: NodeId, context: &mut GenerationContext<R>) {
        context.depth += 1;

        let count = self.repetitions(&self.nodes[id], context);
        for _ in 0..count {
            self.generate_one(id, context);
        }

        context.depth -= 1;
    }

    fn generate_one<R: Rng + ?Sized>(&self, id: NodeId, context: &mut GenerationContext<R>) {
        match &self.nodes[id].kind {
            NodeKind::Terminal(literal) => context.output.push_str(literal),

            NodeKind::CharClass(set) => {
                if let Some(c) = set.generate_single(&mut *context.rng) {
                    context.output.push(c);
                }
            }

            NodeKind::NonTerminal { target, .. } => {
                // alternatives normally steer away from recursion past the
                // ceiling; this catches rules that have no way out
                let Some(target) = *target else {
                    return;
                };
                if !self.nodes.is_finite_rule(target)
                    && context.depth > self.config.max_gen_depth.saturating_mul(2)
                {
                    context.overflow();
                } else {
                    self.generate_one(target, context);
                }
            }

            NodeKind::SubExpression(children) | NodeKind::Expression { children, .. } => {
                for child in children {
                    self.generate_node(*child, context);
                }
            }

            NodeKind::Alternative(alternation) => {
                let distribution = if context.depth > self.config.max_gen_depth {
                    &alternation.non_recursive
                } else {
                    &alternation.weights
                };

                let choice = distribution
                    .sample(&mut *context.rng)
                    .and_then(|index| alternation.children.get(*index));

                match choice {
                    Some(child) => self.generate_node(*child, context),
                    None => context.overflow(),
                }
            }

            NodeKind::LookAhead { .. } | NodeKind::Cut => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::{
        configuration::NodeConfig,
        grammar::{parse::parse_source, parse_grammar, validate_grammar::validate_grammar},
    };

    use super::*;

    fn generate(source: &str, rule: &str, config: EngineConfig, seed: u64, runs: usize) -> Vec<Sample> {
        let mut parsed = parse_source(source).unwrap();
        validate_grammar(&mut parsed.nodes, &parsed.rules).unwrap();

        let root = *parsed.rules.get(rule).unwrap();

        let generator = Generator::new(&parsed.nodes, &config);
        let mut rng = StdRng::seed_from_u64(seed);
        (0..runs).map(|_| generator.generate(root, &mut rng)).collect()
    }

    #[test]
    fn bounded_repetition_stays_within_bounds() {
        let samples = generate("R ::= \"ab\"{2,4}", "R", EngineConfig::default(), 1, 500);
        let mut seen = [false; 5];

        for sample in samples {
            assert!(sample.is_complete());
            let count = sample.text.len() / 2;
            assert!((2..=4).contains(&count), "{}", sample.text);
            assert_eq!(sample.text, "ab".repeat(count));
            seen[count] = true;
        }

        assert!(seen[2] && seen[3] && seen[4]);
    }

    #[test]
    fn unbounded_repetition_uses_engine_ceiling() {
        let config = EngineConfig {
            max_gen_repetition: 3,
            ..EngineConfig::default()
        };

        for sample in generate("R ::= [0-9]+", "R", config, 2, 500) {
            assert!((1..=3).contains(&sample.text.len()), "{}", sample.text);
            assert!(sample.text.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn lookaheads_and_cuts_emit_nothing() {
        for sample in generate("R ::= !\"x\" (\"a\" ~ \"b\") | \"c\"", "R", EngineConfig::default(), 3, 50) {
            assert!(sample.text == "ab" || sample.text == "c", "{}", sample.text);
        }
    }

    #[test]
    fn deep_alternatives_pick_non_recursive_options() {
        let config = EngineConfig {
            max_gen_depth: 4,
            ..EngineConfig::default()
        };

        for sample in generate("R ::= (\"(\" R \")\") | \"x\"", "R", config, 4, 300) {
            assert!(sample.is_complete(), "{}", sample.text);
            let opened = sample.text.matches('(').count();
            assert_eq!(opened, sample.text.matches(')').count());
            assert!(sample.text.contains('x'));
        }
    }

    #[test]
    fn inescapable_recursion_emits_placeholder() {
        let config = EngineConfig {
            max_gen_depth: 5,
            ..EngineConfig::default()
        };

        for sample in generate("R ::= \"x\" R", "R", config, 5, 10) {
            assert!(!sample.is_complete());
            assert!(sample.text.ends_with(DEPTH_PLACEHOLDER));
            assert!(sample.text.starts_with('x'));
        }

        let samples = generate("R ::= (\"x\" R) | (\"y\" R)", "R", config, 6, 10);
        assert!(samples.iter().all(|sample| sample.depth_overflows == 1));
    }

    #[test]
    fn large_pow_biases_towards_min() {
        let mean_count = |pow: f64| {
            let mut grammar = parse_grammar("R ::= \"a\"{0,10}.run").unwrap();
            let config = [(
                "run".to_string(),
                NodeConfig {
                    pow: Some(pow),
                    ..NodeConfig::default()
                },
            )]
            .into_iter()
            .collect();
            grammar.set_generator_config("R", &config).unwrap();

            let mut rng = StdRng::seed_from_u64(8);
            let total: usize = (0..2000)
                .map(|_| grammar.generate_with("R", &mut rng).unwrap().text.len())
                .sum();
            total as f64 / 2000.0
        };

        let linear = mean_count(1.0);
        let skewed = mean_count(4.0);

        // E[10 * r] = 5 and E[10 * r^4] = 2
        assert!((linear - 5.0).abs() < 0.5, "{linear}");
        assert!((skewed - 2.0).abs() < 0.5, "{skewed}");
    }

    #[test]
    fn huge_depth_ceiling_does_not_overflow() {
        let config = EngineConfig {
            max_gen_depth: usize::MAX,
            ..EngineConfig::default()
        };

        for sample in generate("R ::= (\"(\" R \")\") | \"x\"", "R", config, 9, 20) {
            assert!(sample.is_complete(), "{}", sample.text);
        }
    }
}
