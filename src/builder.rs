//! Building of parse results.
//!
//! Parsers drive an [`LRBuilder`] by calling `shift_action` for every
//! consumed token and `reduce_action` for every applied production. The
//! default [`TreeBuilder`] produces a generic [`TreeNode`] tree;
//! [`ActionsBuilder`] dispatches to user supplied semantic actions;
//! [`SliceBuilder`] just tracks the consumed input region and is used for
//! layout parsing.

use std::collections::HashMap;
use std::ops::Range;

use crate::grammar::Grammar;
use crate::index::{ProdIndex, TermIndex};
use crate::lexer::Token;

/// Passed to semantic actions and builders: the input span covered by the
/// value being built and the production being reduced, if any.
#[derive(Debug, Clone)]
pub struct Context {
    pub span: Range<usize>,
    pub production: Option<ProdIndex>,
}

pub trait LRBuilder<'i> {
    type Output;

    /// Called when a token is shifted.
    fn shift_action(&mut self, context: &Context, token: &Token<'i>);

    /// Called when a production is reduced. The topmost `prod_len` values
    /// built so far are the children of the reduction.
    fn reduce_action(
        &mut self,
        context: &Context,
        prod: ProdIndex,
        prod_len: usize,
    );

    fn get_result(&mut self) -> Self::Output;
}

/// Generic parse tree. Layout is never part of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode<'i> {
    Term {
        kind: TermIndex,
        value: &'i str,
        span: Range<usize>,
    },
    NonTerm {
        prod: ProdIndex,
        children: Vec<TreeNode<'i>>,
        span: Range<usize>,
    },
}

impl<'i> TreeNode<'i> {
    pub fn span(&self) -> Range<usize> {
        match self {
            TreeNode::Term { span, .. } => span.clone(),
            TreeNode::NonTerm { span, .. } => span.clone(),
        }
    }

    /// Leaf lexemes left to right.
    pub fn leaf_values(&self) -> Vec<&'i str> {
        match self {
            TreeNode::Term { value, .. } => vec![value],
            TreeNode::NonTerm { children, .. } => children
                .iter()
                .flat_map(|child| child.leaf_values())
                .collect(),
        }
    }
}

/// The default builder: a [`TreeNode`] per shift/reduce, single-child
/// reductions pass the child through.
#[derive(Debug, Default)]
pub struct TreeBuilder<'i> {
    res_stack: Vec<TreeNode<'i>>,
}

impl<'i> TreeBuilder<'i> {
    pub fn new() -> Self {
        Self { res_stack: vec![] }
    }
}

impl<'i> LRBuilder<'i> for TreeBuilder<'i> {
    type Output = TreeNode<'i>;

    fn shift_action(&mut self, _context: &Context, token: &Token<'i>) {
        self.res_stack.push(TreeNode::Term {
            kind: token.kind,
            value: token.value,
            span: token.span.clone(),
        });
    }

    fn reduce_action(
        &mut self,
        context: &Context,
        prod: ProdIndex,
        prod_len: usize,
    ) {
        let children =
            self.res_stack.split_off(self.res_stack.len() - prod_len);
        if prod_len == 1 {
            let child = children.into_iter().next().unwrap();
            self.res_stack.push(child);
        } else {
            self.res_stack.push(TreeNode::NonTerm {
                prod,
                children,
                span: context.span.clone(),
            });
        }
    }

    fn get_result(&mut self) -> Self::Output {
        self.res_stack.pop().expect("no result on the parse stack")
    }
}

pub type TermActionFn<V> = fn(&Context, &str) -> V;
pub type ProdActionFn<V> = fn(&Context, Vec<V>) -> V;

/// User semantic actions: terminal conversions by terminal name and
/// production actions by non-terminal name, in production declaration
/// order within the non-terminal.
///
/// A production left without an action must have a single-symbol rhs, in
/// which case its child value passes through. Evaluation panics on any
/// other gap, as there is no way to combine several child values without
/// an action.
pub struct Actions<V> {
    terms: HashMap<String, TermActionFn<V>>,
    nonterms: HashMap<String, Vec<ProdActionFn<V>>>,
}

impl<V> Default for Actions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Actions<V> {
    pub fn new() -> Self {
        Self {
            terms: HashMap::new(),
            nonterms: HashMap::new(),
        }
    }

    pub fn term(mut self, name: &str, action: TermActionFn<V>) -> Self {
        self.terms.insert(name.into(), action);
        self
    }

    pub fn nonterm(
        mut self,
        name: &str,
        actions: &[ProdActionFn<V>],
    ) -> Self {
        self.nonterms.insert(name.into(), actions.to_vec());
        self
    }

    pub(crate) fn term_action(&self, name: &str) -> Option<TermActionFn<V>> {
        self.terms.get(name).copied()
    }

    pub(crate) fn prod_action(
        &self,
        name: &str,
        ntidx: usize,
    ) -> Option<ProdActionFn<V>> {
        self.nonterms
            .get(name)
            .and_then(|actions| actions.get(ntidx))
            .copied()
    }
}

/// Dispatches reductions to user actions. A missing terminal action yields
/// the default value; a missing production action is allowed only for
/// single-symbol productions, which pass their child through.
pub struct ActionsBuilder<'a, V> {
    grammar: &'a Grammar,
    actions: &'a Actions<V>,
    res_stack: Vec<V>,
}

impl<'a, V> ActionsBuilder<'a, V> {
    pub fn new(grammar: &'a Grammar, actions: &'a Actions<V>) -> Self {
        Self {
            grammar,
            actions,
            res_stack: vec![],
        }
    }
}

impl<'a, 'i, V: Default> LRBuilder<'i> for ActionsBuilder<'a, V> {
    type Output = V;

    fn shift_action(&mut self, context: &Context, token: &Token<'i>) {
        let name = &self.grammar.terminals[token.kind].name;
        let value = match self.actions.term_action(name) {
            Some(action) => action(context, token.value),
            None => V::default(),
        };
        self.res_stack.push(value);
    }

    fn reduce_action(
        &mut self,
        context: &Context,
        prod: ProdIndex,
        prod_len: usize,
    ) {
        let children =
            self.res_stack.split_off(self.res_stack.len() - prod_len);
        let production = &self.grammar.productions[prod];
        let name = &self.grammar.nonterminals[production.nonterminal].name;
        let value = match self.actions.prod_action(name, production.ntidx) {
            Some(action) => action(context, children),
            None if children.len() == 1 => {
                children.into_iter().next().unwrap()
            }
            None => panic!(
                "no action for production \"{}\"",
                self.grammar.prod_str(prod)
            ),
        };
        self.res_stack.push(value);
    }

    fn get_result(&mut self) -> Self::Output {
        self.res_stack.pop().expect("no result on the parse stack")
    }
}

/// Builds the consumed input slice. Used to run the layout grammar, where
/// only the extent of the match matters.
pub struct SliceBuilder<'i> {
    input: &'i str,
    range: Option<Range<usize>>,
}

impl<'i> SliceBuilder<'i> {
    pub fn new(input: &'i str) -> Self {
        Self { input, range: None }
    }
}

impl<'i> LRBuilder<'i> for SliceBuilder<'i> {
    type Output = &'i str;

    fn shift_action(&mut self, _context: &Context, token: &Token<'i>) {
        let range = self
            .range
            .get_or_insert(token.span.start..token.span.start);
        range.end = token.span.end;
    }

    fn reduce_action(
        &mut self,
        _context: &Context,
        _prod: ProdIndex,
        _prod_len: usize,
    ) {
    }

    fn get_result(&mut self) -> Self::Output {
        match &self.range {
            Some(range) => &self.input[range.clone()],
            None => "",
        }
    }
}
