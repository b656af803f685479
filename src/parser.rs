//! Deterministic LR parsing.

use std::ops::Range;

use crate::builder::{
    Actions, ActionsBuilder, Context, LRBuilder, TreeBuilder, TreeNode,
};
use crate::error::{Error, Result};
use crate::glr::{Forest, GlrParser};
use crate::grammar::Grammar;
use crate::index::{StateIndex, TermIndex};
use crate::lexer::{Lexer, Token};
use crate::location::{line_col, position_context};
use crate::log;
use crate::settings::{ParserAlgo, Settings};
use crate::table::{Action, LRTable};

/// Shift-reduce runtime over a compiled table. Used directly for LR
/// parsing and by the lexer to consume layout (in partial mode).
pub struct LRParser<'g> {
    grammar: &'g Grammar,
    table: &'g LRTable,
    lexer: Lexer<'g>,
    partial: bool,
}

impl<'g> LRParser<'g> {
    pub fn new(
        grammar: &'g Grammar,
        table: &'g LRTable,
        lexer: Lexer<'g>,
        partial: bool,
    ) -> Self {
        Self {
            grammar,
            table,
            lexer,
            partial,
        }
    }

    /// Run the shift-reduce loop from `start`, driving the given builder.
    /// Returns the built value and the position after the consumed input.
    pub fn parse_with_builder<'i, B: LRBuilder<'i>>(
        &self,
        input: &'i str,
        start: usize,
        builder: &mut B,
    ) -> Result<(B::Output, usize)> {
        let mut state_stack = vec![StateIndex(0)];
        let mut span_stack: Vec<Range<usize>> = vec![start..start];
        let mut position = start;

        loop {
            let state = *state_stack.last().unwrap();
            let expected = self.table.expected_terms(state);
            let (layout_position, tokens) =
                self.lexer.next_tokens(input, position, &expected);

            let token = match tokens.into_iter().next() {
                Some(token) => token,
                None if self.partial
                    && expected.contains(&Grammar::STOP_TERM) =>
                {
                    // Longest valid prefix consumed; pretend the input ends
                    // here so pending reductions and accept can run.
                    Token {
                        kind: Grammar::STOP_TERM,
                        value: "",
                        span: layout_position..layout_position,
                    }
                }
                None => {
                    return Err(self.parse_error(
                        input,
                        layout_position,
                        &expected,
                    ))
                }
            };
            log!(
                "State {}, token {:?}",
                state,
                self.grammar.terminals[token.kind].name
            );

            let &action = self
                .table
                .actions(state, token.kind)
                .first()
                .expect("action for an expected terminal");
            match action {
                Action::Shift(target) => {
                    let context = Context {
                        span: token.span.clone(),
                        production: None,
                    };
                    position = token.span.end;
                    state_stack.push(target);
                    span_stack.push(token.span.clone());
                    builder.shift_action(&context, &token);
                }
                Action::Reduce(prod, prod_len, nonterm) => {
                    let span = if prod_len == 0 {
                        position..position
                    } else {
                        let first =
                            &span_stack[span_stack.len() - prod_len];
                        first.start..span_stack.last().unwrap().end
                    };
                    let context = Context {
                        span: span.clone(),
                        production: Some(prod),
                    };
                    builder.reduce_action(&context, prod, prod_len);
                    state_stack.truncate(state_stack.len() - prod_len);
                    span_stack.truncate(span_stack.len() - prod_len);
                    let top = *state_stack.last().unwrap();
                    let target =
                        self.table.goto(top, nonterm).unwrap_or_else(|| {
                            panic!(
                                "GOTO undefined for state {top} and \
                                 non-terminal \"{}\"",
                                self.grammar.nonterminals[nonterm].name
                            )
                        });
                    state_stack.push(target);
                    span_stack.push(span);
                }
                Action::Accept => break,
            }
        }

        Ok((builder.get_result(), position))
    }

    fn parse_error(
        &self,
        input: &str,
        position: usize,
        expected: &[TermIndex],
    ) -> Error {
        Error::Parse {
            position,
            location: line_col(input, position),
            expected: expected
                .iter()
                .map(|&term| self.grammar.terminals[term].name.clone())
                .collect(),
            found: position_context(input, position),
        }
    }
}

/// A grammar compiled into tables, ready to parse. Immutable once built
/// and shareable across threads; each parse call owns its own runtime
/// state.
pub struct Parser {
    grammar: Grammar,
    table: LRTable,
    layout_table: Option<LRTable>,
    settings: Settings,
}

impl Parser {
    /// Compile the grammar per the settings. In LR mode any conflict left
    /// after priority/associativity resolution is fatal. The layout
    /// sub-grammar, if any, must always be conflict free as it is parsed
    /// deterministically.
    pub fn new(grammar: Grammar, settings: Settings) -> Result<Self> {
        let table = LRTable::new(&grammar, &settings)?;
        if settings.parser_algo == ParserAlgo::Lr {
            table.check_lr_conflicts(&grammar)?;
        }
        let layout_table = match &grammar.layout {
            Some(layout) => {
                let layout_table = LRTable::new(layout, &settings)?;
                layout_table.check_lr_conflicts(layout)?;
                Some(layout_table)
            }
            None => None,
        };
        Ok(Self {
            grammar,
            table,
            layout_table,
            settings,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn lexer(&self) -> Lexer<'_> {
        let layout_parser = self
            .grammar
            .layout
            .as_deref()
            .zip(self.layout_table.as_ref())
            .map(|(layout, layout_table)| {
                LRParser::new(
                    layout,
                    layout_table,
                    Lexer::new(layout, None),
                    true,
                )
            });
        Lexer::new(&self.grammar, layout_parser)
    }

    /// Parse into the default generic tree. In GLR mode the parse must
    /// yield exactly one derivation or [`Error::Ambiguity`] is raised.
    pub fn parse<'i>(&self, input: &'i str) -> Result<TreeNode<'i>> {
        match self.settings.parser_algo {
            ParserAlgo::Lr => {
                let parser = LRParser::new(
                    &self.grammar,
                    &self.table,
                    self.lexer(),
                    self.settings.partial_parse,
                );
                let mut builder = TreeBuilder::new();
                parser
                    .parse_with_builder(input, 0, &mut builder)
                    .map(|(tree, _)| tree)
            }
            ParserAlgo::Glr => self.parse_forest(input)?.single_tree(),
        }
    }

    /// Parse dispatching to user semantic actions. In GLR mode all
    /// derivations must evaluate from a single parse tree.
    pub fn parse_with_actions<'i, V: Clone + Default>(
        &self,
        input: &'i str,
        actions: &Actions<V>,
    ) -> Result<V> {
        match self.settings.parser_algo {
            ParserAlgo::Lr => {
                let parser = LRParser::new(
                    &self.grammar,
                    &self.table,
                    self.lexer(),
                    self.settings.partial_parse,
                );
                let mut builder =
                    ActionsBuilder::new(&self.grammar, actions);
                parser
                    .parse_with_builder(input, 0, &mut builder)
                    .map(|(value, _)| value)
            }
            ParserAlgo::Glr => self
                .parse_forest(input)?
                .evaluate_single(&self.grammar, actions),
        }
    }

    /// Nondeterministic parse producing all derivations.
    pub fn parse_forest<'i>(&self, input: &'i str) -> Result<Forest<'i>> {
        let parser = GlrParser::new(
            &self.grammar,
            &self.table,
            self.lexer(),
            self.settings.partial_parse,
        );
        parser.parse(input, 0)
    }
}
