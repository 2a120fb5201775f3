use rand::{rngs::StdRng, SeedableRng};
use rstest::rstest;

use ebnfgen::{parse_grammar, EngineConfig, Grammar, GrammarError, NodeConfig, RuleConfig};

const ARITHMETIC: &str = r#"
    // integer arithmetic with precedence
    Expr   ::= Term (("+" | "-") Term)*
    Term   ::= Factor (("*" | "/") Factor)*
    Factor ::= Number | ("(" Expr ")")
    Number ::= ("-"? [1-9] [0-9]{0,3}) | "0"
"#;

const JSONISH: &str = r#"
    Value  ::= Object | Array | String | Number | "true" | "false" | "null"
    Object ::= "{" (Member ("," Member)*)? "}"
    Member ::= String ":" Value
    Array  ::= "[" (Value ("," Value)*)? "]"
    String ::= "\"" [a-zA-Z0-9 _\-]*.chars "\""
    Number ::= [0-9]+.digits
"#;

fn grammar_with(source: &str, config: EngineConfig) -> Grammar {
    Grammar::parse_with_config(source, config).unwrap()
}

#[test]
fn numbers_end_to_end() {
    let mut grammar = parse_grammar("Num ::= [0-9]+").unwrap();

    assert!(grammar.matches("Num", "123").unwrap());

    let outcome = grammar.match_rule("Num", "12a").unwrap();
    let failure = outcome.failure().unwrap();
    assert!(failure.is_trailing_input());
    assert!(failure
        .to_string()
        .contains("There are unmatched characters left: 'a'"));

    grammar.set_engine_config(EngineConfig {
        max_gen_repetition: 3,
        ..EngineConfig::default()
    });
    for _ in 0..500 {
        let text = grammar.generate("Num").unwrap();
        assert!((1..=3).contains(&text.len()), "{text}");
        assert!(text.chars().all(|c| c.is_ascii_digit()), "{text}");
    }
}

#[rstest]
#[case(ARITHMETIC, "Expr")]
#[case(JSONISH, "Value")]
#[case("R ::= (\"a\" | \"b\"){2,4} \"c\"? [x-z]*", "R")]
#[case("R ::= &[a-z] [a-z]+ !\"!\" \".\"", "R")]
fn generated_text_matches(#[case] source: &str, #[case] rule: &str) {
    let grammar = grammar_with(
        source,
        EngineConfig {
            max_gen_repetition: 4,
            max_gen_depth: 12,
            ..EngineConfig::default()
        },
    );
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..300 {
        let sample = grammar.generate_with(rule, &mut rng).unwrap();
        assert!(sample.is_complete(), "{:?} hit the depth limit", sample.text);

        let outcome = grammar.match_rule(rule, &sample.text).unwrap();
        assert!(
            outcome.is_match(),
            "generated {:?} does not match {rule}:\n{}",
            sample.text,
            outcome.failure().unwrap()
        );
    }
}

#[rstest]
#[case("R ::= \"a\"{2,4}", &[2, 3, 4], &[0, 1, 5, 6])]
#[case("R ::= \"a\"?", &[0, 1], &[2, 3])]
#[case("R ::= \"a\"+", &[1, 2, 50], &[0])]
#[case("R ::= \"a\"*", &[0, 1, 50], &[])]
#[case("R ::= \"a\"{3}", &[3], &[2, 4])]
#[case("R ::= \"a\"{2,}", &[2, 9], &[1])]
#[case("R ::= \"a\"{,2}", &[0, 2], &[3])]
fn repetition_bounds(#[case] source: &str, #[case] accepted: &[usize], #[case] rejected: &[usize]) {
    let grammar = parse_grammar(source).unwrap();

    for count in accepted {
        assert!(grammar.matches("R", &"a".repeat(*count)).unwrap(), "{source} x{count}");
    }
    for count in rejected {
        assert!(!grammar.matches("R", &"a".repeat(*count)).unwrap(), "{source} x{count}");
    }
}

#[test]
fn ordered_choice_takes_first_success() {
    let grammar = parse_grammar("R ::= \"a\" | \"ab\"").unwrap();

    let outcome = grammar.match_rule("R", "ab").unwrap();
    let failure = outcome.failure().unwrap();
    assert!(failure.is_trailing_input());
    assert_eq!(failure.position().unwrap().index, 1);
}

#[test]
fn cut_prevents_later_options() {
    let grammar = parse_grammar("R ::= (\"x\" ~ \"y\") | \"z\"").unwrap();

    assert!(grammar.matches("R", "xy").unwrap());
    assert!(grammar.matches("R", "z").unwrap());
    assert!(!grammar.matches("R", "xq").unwrap());

    let uncut = parse_grammar("R ::= (\"x\" \"y\") | (\"x\" \"q\")").unwrap();
    assert!(uncut.matches("R", "xq").unwrap());
    let cut = parse_grammar("R ::= (\"x\" ~ \"y\") | (\"x\" \"q\")").unwrap();
    assert!(!cut.matches("R", "xq").unwrap());
}

#[test]
fn min_below_grammar_minimum_is_rejected() {
    let mut grammar = parse_grammar("R ::= [a-z]+.letters").unwrap();

    let config: RuleConfig = [(
        "letters".to_string(),
        NodeConfig {
            min: Some(0),
            ..NodeConfig::default()
        },
    )]
    .into_iter()
    .collect();

    match grammar.set_generator_config("R", &config) {
        Err(GrammarError::Config { rule, message }) => {
            assert_eq!(rule, "R");
            assert!(message.contains("letters"), "{message}");
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn unresolved_reference_is_a_link_error() {
    match parse_grammar("A ::= B") {
        Err(GrammarError::Link { rule, .. }) => assert_eq!(rule, "B"),
        Err(other) => panic!("expected link error, got {other}"),
        Ok(_) => panic!("expected link error"),
    }
}

#[rstest]
#[case("A ::= \"abc")]
#[case("A ::= [abc")]
#[case("A ::= \"a\" /* never closed")]
fn malformed_source_is_a_lex_error(#[case] source: &str) {
    assert!(matches!(parse_grammar(source), Err(GrammarError::Lex { .. })));
}

#[rstest]
#[case("A ::= \"a\" A ::= \"b\"")]
#[case("A ::= (\"a\"")]
#[case("A ::= [^a]")]
#[case("A ::= \"a\"{5,2}")]
fn malformed_grammar_is_a_parse_error(#[case] source: &str) {
    assert!(matches!(parse_grammar(source), Err(GrammarError::Parse { .. })));
}

#[test]
fn depth_overflow_is_visible() {
    let grammar = grammar_with(
        "Loop ::= \"x\" Loop",
        EngineConfig {
            max_gen_depth: 8,
            ..EngineConfig::default()
        },
    );
    let mut rng = StdRng::seed_from_u64(1);

    let sample = grammar.generate_with("Loop", &mut rng).unwrap();
    assert_eq!(sample.depth_overflows, 1);
    assert!(sample.text.ends_with("<depth-limit>"));
}

#[test]
fn shallow_ceiling_still_terminates_through_finite_rules() {
    let grammar = grammar_with(
        r#"
        Factor ::= Number | ("(" Factor ")")
        Number ::= [0-9]
        "#,
        EngineConfig {
            max_gen_depth: 2,
            ..EngineConfig::default()
        },
    );
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..200 {
        let sample = grammar.generate_with("Factor", &mut rng).unwrap();
        assert!(sample.is_complete(), "{}", sample.text);
        assert!(grammar.matches("Factor", &sample.text).unwrap());
    }
}

#[test]
fn char_class_sampling_is_uniform() {
    let grammar = parse_grammar("C ::= [a-c]").unwrap();
    let mut rng = StdRng::seed_from_u64(77);
    let mut counts = [0usize; 3];

    for _ in 0..10_000 {
        let text = grammar.generate_with("C", &mut rng).unwrap().text;
        let c = text.chars().next().unwrap();
        assert!(('a'..='c').contains(&c));
        counts[(c as u8 - b'a') as usize] += 1;
    }

    for count in counts {
        let frequency = count as f64 / 10_000.0;
        assert!((frequency - 1.0 / 3.0).abs() < 0.05, "{counts:?}");
    }
}

#[test]
fn generator_config_shapes_output() {
    let mut grammar = parse_grammar(JSONISH).unwrap();

    let numbers: RuleConfig = [(
        "digits".to_string(),
        NodeConfig {
            min: Some(5),
            max: Some(5),
            ..NodeConfig::default()
        },
    )]
    .into_iter()
    .collect();
    grammar.set_generator_config("Number", &numbers).unwrap();

    let values: RuleConfig = [(
        "Value".to_string(),
        NodeConfig {
            dist: Some(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
            ..NodeConfig::default()
        },
    )]
    .into_iter()
    .collect();
    grammar.set_generator_config("Value", &values).unwrap();

    for _ in 0..50 {
        let text = grammar.generate("Value").unwrap();
        assert_eq!(text.len(), 5, "{text}");
        assert!(grammar.matches("Value", &text).unwrap());
    }
}

#[test]
fn lookahead_never_consumes() {
    let grammar = parse_grammar(
        r#"
        Ident   ::= !Keyword [a-z]+
        Keyword ::= ("if" | "else") ![a-z]
        "#,
    )
    .unwrap();

    assert!(grammar.matches("Ident", "iffy").unwrap());
    assert!(grammar.matches("Ident", "x").unwrap());
    assert!(!grammar.matches("Ident", "if").unwrap());
    assert!(!grammar.matches("Ident", "else").unwrap());
}

#[test]
fn trace_is_recorded_on_request() {
    let mut grammar = parse_grammar(ARITHMETIC).unwrap();
    assert!(grammar.match_rule("Expr", "1+2").unwrap().trace().is_empty());

    grammar.set_engine_config(EngineConfig {
        create_match_trace: true,
        ..EngineConfig::default()
    });
    let outcome = grammar.match_rule("Expr", "1+2").unwrap();
    assert!(outcome.is_match());
    assert!(outcome
        .trace()
        .iter()
        .any(|line| line.trim_start() == "Expression: 'Number' matched"));
}

#[test]
fn failures_render_a_backtrace() {
    let grammar = parse_grammar(ARITHMETIC).unwrap();
    let outcome = grammar.match_rule("Expr", "(1+2").unwrap();

    let rendered = outcome.failure().unwrap().to_string();
    let mut lines = rendered.lines();
    assert_eq!(lines.next(), Some("Matching Error:"));
    assert!(lines.all(|line| line.trim_start().starts_with("at line ")));
}
