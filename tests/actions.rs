//! Semantic action dispatch: productions left without an action pass a
//! single child through; longer productions must have one.

use parsemo::{
    Actions, Associativity, Context, Grammar, GrammarBuilder, Parser,
    ParserAlgo, Settings,
};

fn sum_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_regex("number", r"\d+")
        .term_str("plus", "+")
        .rule("E", &["E", "plus", "E"])
        .assoc(Associativity::Left)
        .rule("E", &["number"])
        .start("E")
        .build()
        .unwrap()
}

fn number(_context: &Context, value: &str) -> f64 {
    value.parse().unwrap()
}

fn add(_context: &Context, children: Vec<f64>) -> f64 {
    children[0] + children[2]
}

#[test]
fn unit_production_without_action_passes_through() {
    // E: number has no action; the number's value flows through.
    let actions = Actions::new()
        .term("number", number)
        .nonterm("E", &[add]);
    let parser = Parser::new(sum_grammar(), Settings::new()).unwrap();
    let value = parser.parse_with_actions("1+2", &actions).unwrap();
    assert!((value - 3.0).abs() < 1e-9);
}

#[test]
fn unit_production_without_action_passes_through_in_glr() {
    let actions = Actions::new()
        .term("number", number)
        .nonterm("E", &[add]);
    let parser = Parser::new(
        sum_grammar(),
        Settings::new().with_parser_algo(ParserAlgo::Glr),
    )
    .unwrap();
    let value = parser.parse_with_actions("1+2", &actions).unwrap();
    assert!((value - 3.0).abs() < 1e-9);
}

#[test]
#[should_panic(expected = "no action for production \"E: E plus E\"")]
fn missing_action_for_longer_production_panics() {
    let actions: Actions<f64> = Actions::new().term("number", number);
    let parser = Parser::new(sum_grammar(), Settings::new()).unwrap();
    let _ = parser.parse_with_actions("1+2", &actions);
}

#[test]
#[should_panic(expected = "no action for production \"E: E plus E\"")]
fn missing_action_for_longer_production_panics_in_glr() {
    let actions: Actions<f64> = Actions::new().term("number", number);
    let parser = Parser::new(
        sum_grammar(),
        Settings::new().with_parser_algo(ParserAlgo::Glr),
    )
    .unwrap();
    let _ = parser.parse_with_actions("1+2", &actions);
}
