//! The dangling else: the shift/reduce tie is resolved towards shift so the
//! else binds to the innermost if.

use parsemo::{
    Associativity, Grammar, GrammarBuilder, Parser, ProdIndex, Settings,
    TreeNode,
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

fn if_grammar() -> Grammar {
    GrammarBuilder::new()
        .term_str("if", "if")
        .term_str("then", "then")
        .term_str("else", "else")
        .term_regex("cond", "[ab]")
        .term_str("x", "x")
        .rule("S", &["if", "E", "then", "S"])
        .assoc(Associativity::Right)
        .rule("S", &["if", "E", "then", "S", "else", "S"])
        .rule("S", &["x"])
        .rule("E", &["cond"])
        .start("S")
        .layout(layout_grammar())
        .build()
        .unwrap()
}

#[test]
fn else_binds_to_the_inner_if() {
    let parser = Parser::new(if_grammar(), Settings::new()).unwrap();
    let tree = parser
        .parse("if a then if b then x else x")
        .unwrap();

    // The outer statement is the else-less if, the inner one carries the
    // else branch.
    let TreeNode::NonTerm { prod, children, .. } = &tree else {
        panic!("expected a non-terminal root");
    };
    assert_eq!(*prod, ProdIndex(1));
    assert_eq!(children.len(), 4);
    let TreeNode::NonTerm { prod: inner, .. } = &children[3] else {
        panic!("expected a nested if");
    };
    assert_eq!(*inner, ProdIndex(2));
}
