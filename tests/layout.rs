//! Layout (whitespace and comments) is consumed between tokens and never
//! shows up in the tree.

use parsemo::{
    Associativity, Grammar, GrammarBuilder, Parser, Settings,
};

fn layout_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_regex("wsc", r"\s+|/\*.*?\*/")
        .rule("Layout", &["Layout", "wsc"])
        .rule("Layout", &["wsc"])
        .start("Layout")
        .build()
        .unwrap()
}

fn sum_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_regex("id", "[ab]")
        .term_str("add", "+")
        .rule("E", &["E", "add", "E"])
        .assoc(Associativity::Left)
        .rule("E", &["id"])
        .start("E")
        .layout(layout_grammar())
        .build()
        .unwrap()
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let parser = Parser::new(sum_grammar(), Settings::new()).unwrap();
    let tree = parser.parse("a  /*c*/  +  b").unwrap();
    assert_eq!(tree.leaf_values(), ["a", "+", "b"]);
}

#[test]
fn layout_at_both_ends_is_accepted() {
    let parser = Parser::new(sum_grammar(), Settings::new()).unwrap();
    let tree = parser.parse("  a + b /*trailing*/ ").unwrap();
    assert_eq!(tree.leaf_values(), ["a", "+", "b"]);
}

#[test]
fn input_without_layout_still_parses() {
    let parser = Parser::new(sum_grammar(), Settings::new()).unwrap();
    let tree = parser.parse("a+b").unwrap();
    assert_eq!(tree.leaf_values(), ["a", "+", "b"]);
}
