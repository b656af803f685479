//! Scannerless keyword/identifier interplay: recognition is driven by the
//! state's expected terminals and ties go to string terminals.

use parsemo::{Grammar, GrammarBuilder, Parser, Settings, TreeNode};

fn keyword_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_str("if", "if")
        .term_regex("id", "[a-z]+")
        .rule("S", &["if"])
        .rule("S", &["id"])
        .start("S")
        .build()
        .unwrap()
}

#[test]
fn keyword_wins_the_tie_against_identifier() {
    let parser = Parser::new(keyword_grammar(), Settings::new()).unwrap();
    let tree = parser.parse("if").unwrap();
    let TreeNode::Term { kind, value, .. } = tree else {
        panic!("expected a terminal");
    };
    assert_eq!(parser.grammar().terminals[kind].name, "if");
    assert_eq!(value, "if");
}

#[test]
fn longer_identifier_beats_the_keyword_prefix() {
    let parser = Parser::new(keyword_grammar(), Settings::new()).unwrap();
    let tree = parser.parse("iffy").unwrap();
    let TreeNode::Term { kind, .. } = tree else {
        panic!("expected a terminal");
    };
    assert_eq!(parser.grammar().terminals[kind].name, "id");
}
