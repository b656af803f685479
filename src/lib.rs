//! Runtime scannerless LR(1)/LALR/GLR parsing for context-free grammars.
//!
//! A grammar given as structured input is compiled into a deterministic
//! pushdown automaton and executed directly against an input string, with no
//! separate tokenizer pass and no code generation step. Operator priorities
//! and associativities resolve table conflicts declaratively; whatever
//! ambiguity remains can be explored with the GLR parser which produces a
//! shared packed parse forest.
//!
//! ```
//! use parsemo::{Associativity, GrammarBuilder, Parser, Settings};
//!
//! let grammar = GrammarBuilder::new()
//!     .term_regex("number", r"\d+")
//!     .term_str("plus", "+")
//!     .rule("E", &["E", "plus", "E"])
//!     .assoc(Associativity::Left)
//!     .rule("E", &["number"])
//!     .start("E")
//!     .build()
//!     .unwrap();
//! let parser = Parser::new(grammar, Settings::new()).unwrap();
//! let tree = parser.parse("1+2+3").unwrap();
//! assert_eq!(tree.leaf_values(), ["1", "+", "2", "+", "3"]);
//! ```

pub mod builder;
pub mod debug;
pub mod error;
pub mod glr;
pub mod grammar;
pub mod index;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod settings;
pub mod table;

pub use builder::{
    Actions, ActionsBuilder, Context, LRBuilder, ProdActionFn, SliceBuilder,
    TermActionFn, TreeBuilder, TreeNode,
};
pub use error::{Error, Result};
pub use glr::Forest;
pub use grammar::{
    Associativity, CustomRecognizerFn, Grammar, GrammarBuilder, Priority,
    DEFAULT_PRIORITY,
};
pub use index::{NonTermIndex, ProdIndex, StateIndex, SymbolIndex, TermIndex};
pub use lexer::{Lexer, Token};
pub use location::{line_col, LineCol};
pub use parser::{LRParser, Parser};
pub use settings::{ParserAlgo, Settings, TableType};
pub use table::{Action, LRTable};
