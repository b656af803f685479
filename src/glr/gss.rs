//! The graph-structured stack and the shared packed parse forest.
//!
//! GSS nodes are parse heads, unique per `(state, position)` within a
//! frontier; edges point from a head to its parents and carry the packed
//! derivations of the grammar symbol between them. Ambiguity shows up as
//! multiple possibilities on one edge. Everything is arena allocated inside
//! the graph and addressed by dense indices.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use petgraph::graph::EdgeReference;
use petgraph::prelude::*;

use crate::builder::{Actions, Context, TreeNode};
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::index::{ProdIndex, StateIndex};
use crate::lexer::Token;

/// A GLR parse head.
#[derive(Debug, Clone)]
pub(crate) struct GssHead<'i> {
    pub state: StateIndex,
    pub frontier: usize,
    /// Input position of this head, before its lookahead.
    pub position: usize,
    pub token_ahead: Option<Token<'i>>,
}

/// Packed derivations of one grammar symbol between two GSS nodes: a
/// terminal leaf for shifts, one or more non-terminal alternatives for
/// reductions of the same span.
#[derive(Debug, Default)]
pub(crate) struct SppfPack<'i> {
    pub possibilities: RefCell<Vec<Rc<SppfTree<'i>>>>,
}

impl<'i> SppfPack<'i> {
    /// Span of the packed symbol. All alternatives cover the same input
    /// region between the two bracketing GSS nodes.
    pub fn span(&self) -> Range<usize> {
        self.possibilities
            .borrow()
            .first()
            .map(|tree| tree.span())
            .unwrap_or(0..0)
    }
}

#[derive(Debug)]
pub(crate) enum SppfTree<'i> {
    Term {
        token: Token<'i>,
    },
    NonTerm {
        prod: ProdIndex,
        span: Range<usize>,
        /// One pack per rhs symbol of the production.
        children: Vec<Rc<SppfPack<'i>>>,
    },
}

impl<'i> SppfTree<'i> {
    pub fn span(&self) -> Range<usize> {
        match self {
            SppfTree::Term { token } => token.span.clone(),
            SppfTree::NonTerm { span, .. } => span.clone(),
        }
    }
}

/// The stack graph. Edges go from a head towards the stack bottom.
pub(crate) struct GssGraph<'i>(DiGraph<GssHead<'i>, Rc<SppfPack<'i>>>);

impl<'i> GssGraph<'i> {
    pub fn new() -> Self {
        Self(DiGraph::new())
    }

    pub fn add_head(&mut self, head: GssHead<'i>) -> NodeIndex {
        self.0.add_node(head)
    }

    pub fn head(&self, head: NodeIndex) -> &GssHead<'i> {
        self.0.node_weight(head).expect("head not in the GSS")
    }

    pub fn head_mut(&mut self, head: NodeIndex) -> &mut GssHead<'i> {
        self.0.node_weight_mut(head).expect("head not in the GSS")
    }

    pub fn add_parent(
        &mut self,
        head: NodeIndex,
        parent: NodeIndex,
        pack: Rc<SppfPack<'i>>,
    ) -> EdgeIndex {
        self.0.add_edge(head, parent, pack)
    }

    pub fn edge_between(
        &self,
        head: NodeIndex,
        parent: NodeIndex,
    ) -> Option<EdgeIndex> {
        self.0.find_edge(head, parent)
    }

    pub fn backedges<'a>(
        &'a self,
        head: NodeIndex,
    ) -> impl Iterator<Item = EdgeReference<'a, Rc<SppfPack<'i>>>> + 'a {
        self.0.edges(head)
    }

    pub fn pack(&self, edge: EdgeIndex) -> &Rc<SppfPack<'i>> {
        self.0.edge_weight(edge).expect("edge not in the GSS")
    }

    /// The head side of an edge.
    pub fn start(&self, edge: EdgeIndex) -> NodeIndex {
        self.0.edge_endpoints(edge).expect("edge not in the GSS").0
    }

    /// The parent side of an edge.
    pub fn end(&self, edge: EdgeIndex) -> NodeIndex {
        self.0.edge_endpoints(edge).expect("edge not in the GSS").1
    }

    /// Add a derivation between two nodes, reusing an existing edge.
    pub fn add_solution(
        &mut self,
        head: NodeIndex,
        parent: NodeIndex,
        solution: Rc<SppfTree<'i>>,
    ) {
        let pack = match self.edge_between(head, parent) {
            Some(edge) => Rc::clone(self.pack(edge)),
            None => {
                let pack = Rc::new(SppfPack::default());
                self.add_parent(head, parent, Rc::clone(&pack));
                pack
            }
        };
        pack.possibilities.borrow_mut().push(solution);
    }
}

/// All accepted derivations of a parse.
pub struct Forest<'i> {
    roots: Vec<Rc<SppfTree<'i>>>,
}

impl<'i> Forest<'i> {
    pub(crate) fn new(roots: Vec<Rc<SppfTree<'i>>>) -> Self {
        Self { roots }
    }

    /// Number of distinct parse trees packed in the forest.
    pub fn solutions(&self) -> usize {
        self.roots.iter().map(|root| tree_count(root)).sum()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.solutions() > 1
    }

    /// Unpack every derivation into a generic tree, in packing order.
    pub fn trees(&self) -> Vec<TreeNode<'i>> {
        self.roots
            .iter()
            .flat_map(|root| expand_tree(root))
            .collect()
    }

    /// The single derivation, or [`Error::Ambiguity`] when the forest
    /// packs more than one.
    pub fn single_tree(&self) -> Result<TreeNode<'i>> {
        let solutions = self.solutions();
        if solutions != 1 {
            return Err(Error::Ambiguity { solutions });
        }
        Ok(self.trees().into_iter().next().expect("a single solution"))
    }

    /// Evaluate user actions bottom-up over every derivation.
    pub fn evaluate<V: Clone + Default>(
        &self,
        grammar: &Grammar,
        actions: &Actions<V>,
    ) -> Vec<V> {
        self.roots
            .iter()
            .flat_map(|root| evaluate_tree(grammar, actions, root))
            .collect()
    }

    /// Evaluate user actions over the single derivation, or raise
    /// [`Error::Ambiguity`].
    pub fn evaluate_single<V: Clone + Default>(
        &self,
        grammar: &Grammar,
        actions: &Actions<V>,
    ) -> Result<V> {
        let solutions = self.solutions();
        if solutions != 1 {
            return Err(Error::Ambiguity { solutions });
        }
        Ok(self
            .evaluate(grammar, actions)
            .into_iter()
            .next()
            .expect("a single solution"))
    }
}

fn tree_count(tree: &SppfTree) -> usize {
    match tree {
        SppfTree::Term { .. } => 1,
        SppfTree::NonTerm { children, .. } => children
            .iter()
            .map(|pack| {
                pack.possibilities
                    .borrow()
                    .iter()
                    .map(|tree| tree_count(tree))
                    .sum::<usize>()
            })
            .product(),
    }
}

/// All generic trees packed under an SPPF node. Single-child reductions
/// pass the child through, matching [`crate::builder::TreeBuilder`].
fn expand_tree<'i>(tree: &SppfTree<'i>) -> Vec<TreeNode<'i>> {
    match tree {
        SppfTree::Term { token } => vec![TreeNode::Term {
            kind: token.kind,
            value: token.value,
            span: token.span.clone(),
        }],
        SppfTree::NonTerm {
            prod,
            span,
            children,
        } => {
            let mut combos: Vec<Vec<TreeNode<'i>>> = vec![vec![]];
            for pack in children {
                let options: Vec<TreeNode<'i>> = pack
                    .possibilities
                    .borrow()
                    .iter()
                    .flat_map(|tree| expand_tree(tree))
                    .collect();
                let mut extended = Vec::with_capacity(
                    combos.len() * options.len(),
                );
                for combo in &combos {
                    for option in &options {
                        let mut combo = combo.clone();
                        combo.push(option.clone());
                        extended.push(combo);
                    }
                }
                combos = extended;
            }
            combos
                .into_iter()
                .map(|children| {
                    if children.len() == 1 {
                        children.into_iter().next().unwrap()
                    } else {
                        TreeNode::NonTerm {
                            prod: *prod,
                            children,
                            span: span.clone(),
                        }
                    }
                })
                .collect()
        }
    }
}

/// All semantic values of an SPPF node under the given actions. Missing
/// actions behave as in [`crate::builder::ActionsBuilder`].
fn evaluate_tree<'i, V: Clone + Default>(
    grammar: &Grammar,
    actions: &Actions<V>,
    tree: &SppfTree<'i>,
) -> Vec<V> {
    match tree {
        SppfTree::Term { token } => {
            let context = Context {
                span: token.span.clone(),
                production: None,
            };
            let name = &grammar.terminals[token.kind].name;
            vec![match actions.term_action(name) {
                Some(action) => action(&context, token.value),
                None => V::default(),
            }]
        }
        SppfTree::NonTerm {
            prod,
            span,
            children,
        } => {
            let mut combos: Vec<Vec<V>> = vec![vec![]];
            for pack in children {
                let options: Vec<V> = pack
                    .possibilities
                    .borrow()
                    .iter()
                    .flat_map(|tree| evaluate_tree(grammar, actions, tree))
                    .collect();
                let mut extended =
                    Vec::with_capacity(combos.len() * options.len());
                for combo in &combos {
                    for option in &options {
                        let mut combo = combo.clone();
                        combo.push(option.clone());
                        extended.push(combo);
                    }
                }
                combos = extended;
            }
            let production = &grammar.productions[*prod];
            let name =
                &grammar.nonterminals[production.nonterminal].name;
            let context = Context {
                span: span.clone(),
                production: Some(*prod),
            };
            combos
                .into_iter()
                .map(|children| {
                    match actions.prod_action(name, production.ntidx) {
                        Some(action) => action(&context, children),
                        None if children.len() == 1 => {
                            children.into_iter().next().unwrap()
                        }
                        None => panic!(
                            "no action for production \"{}\"",
                            grammar.prod_str(*prod)
                        ),
                    }
                })
                .collect()
        }
    }
}
