//! GLR parsing of a truly ambiguous grammar: every derivation is packed in
//! the forest; asking for a single tree raises an error.

use parsemo::{
    Error, Grammar, GrammarBuilder, Parser, ParserAlgo, Settings,
};

fn layout_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_regex("ws", r"\s+")
        .rule("Layout", &["Layout", "ws"])
        .rule("Layout", &["ws"])
        .start("Layout")
        .build()
        .unwrap()
}

fn sequence_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_str("a", "a")
        .rule("E", &["E", "E"])
        .rule("E", &["a"])
        .start("E")
        .layout(layout_grammar())
        .build()
        .unwrap()
}

fn glr_parser() -> Parser {
    Parser::new(
        sequence_grammar(),
        Settings::new().with_parser_algo(ParserAlgo::Glr),
    )
    .unwrap()
}

#[test]
fn catalan_number_of_derivations() {
    let parser = glr_parser();
    // Two leaves give a single grouping, three leaves give two.
    assert_eq!(parser.parse_forest("a a").unwrap().solutions(), 1);
    let forest = parser.parse_forest("a a a").unwrap();
    assert_eq!(forest.solutions(), 2);
    assert_eq!(forest.trees().len(), 2);
    for tree in forest.trees() {
        assert_eq!(tree.leaf_values(), ["a", "a", "a"]);
    }
}

#[test]
fn single_tree_request_fails_on_ambiguity() {
    let parser = glr_parser();
    assert!(matches!(
        parser.parse("a a a"),
        Err(Error::Ambiguity { solutions: 2 })
    ));
}

#[test]
fn ambiguous_grammar_is_rejected_in_lr_mode() {
    assert!(matches!(
        Parser::new(sequence_grammar(), Settings::new()),
        Err(Error::LRConflict(_))
    ));
}
