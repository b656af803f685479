//! The GLR parser: all viable parses are pursued at once over a shared
//! graph-structured stack.
//!
//! The input is processed in frontiers. For each frontier lookahead tokens
//! are found per head (splitting heads on lexical ambiguity), then all
//! possible reductions are performed to saturation, then all shifts are done
//! collectively forming the next frontier. Derivations of the same symbol
//! over the same span are packed on the GSS edge, where priorities and
//! associativities prune decidable ambiguities.

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

#[cfg(debug_assertions)]
use colored::*;
use petgraph::prelude::*;

use crate::error::{Error, Result};
use crate::grammar::{Associativity, Grammar};
use crate::index::{NonTermIndex, ProdIndex, StateIndex, TermIndex};
use crate::lexer::{Lexer, Token};
use crate::location::{line_col, position_context};
use crate::log;
use crate::table::{Action, LRTable};

use super::gss::{Forest, GssGraph, GssHead, SppfPack, SppfTree};

/// The start of a reduction: the head itself for empty reductions, the
/// first edge of the path otherwise.
#[derive(Debug)]
enum ReductionStart {
    Edge(EdgeIndex),
    Node(NodeIndex),
}

/// A pending reduction registered while processing a frontier.
#[derive(Debug)]
struct Reduction {
    start: ReductionStart,
    prod: ProdIndex,
    length: usize,
    nonterm: NonTermIndex,
}

/// A reduction path: the packs along the traversed edges (the children of
/// the reduction) and the node the path ends in.
struct ReductionPath<'i> {
    packs: VecDeque<Rc<SppfPack<'i>>>,
    root_head: NodeIndex,
}

/// Heads of one frontier keyed by `(state, position)`; GSS nodes are unique
/// per such key within a frontier.
type FrontierKey = (StateIndex, usize);
type Subfrontier = BTreeMap<FrontierKey, NodeIndex>;

pub(crate) struct GlrParser<'g> {
    grammar: &'g Grammar,
    table: &'g LRTable,
    lexer: Lexer<'g>,
    partial: bool,
}

impl<'g> GlrParser<'g> {
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

    pub fn parse<'i>(
        &self,
        input: &'i str,
        start: usize,
    ) -> Result<Forest<'i>> {
        let mut gss = GssGraph::new();
        let start_head = gss.add_head(GssHead {
            state: StateIndex(0),
            frontier: 0,
            position: start,
            token_ahead: None,
        });

        let mut frontier_base: BTreeMap<FrontierKey, NodeIndex> =
            BTreeMap::from([((StateIndex(0), start), start_head)]);
        let mut pending_shifts: Vec<(NodeIndex, StateIndex)> = vec![];
        let mut pending_reductions: VecDeque<Reduction> = VecDeque::new();
        let mut accepted_heads: Vec<NodeIndex> = vec![];
        let mut furthest_failure: Option<(usize, Vec<TermIndex>)> = None;
        let mut frontier_idx = 0usize;

        while !frontier_base.is_empty() {
            log!(
                "\n{} {}",
                "Processing frontier".red(),
                frontier_idx
            );
            let frontier = self.create_frontier(
                &mut gss,
                &frontier_base,
                input,
                &mut furthest_failure,
            );
            for (token_kind, mut subfrontier) in frontier {
                self.initial_process_subfrontier(
                    &gss,
                    token_kind,
                    &subfrontier,
                    &mut pending_reductions,
                    &mut pending_shifts,
                    &mut accepted_heads,
                );
                self.reducer(
                    &mut gss,
                    token_kind,
                    &mut subfrontier,
                    frontier_idx,
                    &mut pending_reductions,
                    &mut pending_shifts,
                    &mut accepted_heads,
                );
            }
            frontier_idx += 1;
            frontier_base =
                self.shifter(&mut gss, &mut pending_shifts, frontier_idx);
        }

        if accepted_heads.is_empty() {
            let (position, expected) =
                furthest_failure.unwrap_or((input.len(), vec![]));
            return Err(Error::Parse {
                position,
                location: line_col(input, position),
                expected: expected
                    .iter()
                    .map(|&term| self.grammar.terminals[term].name.clone())
                    .collect(),
                found: position_context(input, position),
            });
        }

        let forest = self.create_forest(&gss, accepted_heads);
        log!(
            "\n{}. {} solution(s) found.",
            "Finished".red(),
            forest.solutions()
        );
        Ok(forest)
    }

    /// Find lookaheads for every head of the frontier base and group heads
    /// per token kind. A head with several possible tokens (lexical
    /// ambiguity) is split into one head per token sharing the parents.
    fn create_frontier<'i>(
        &self,
        gss: &mut GssGraph<'i>,
        frontier_base: &BTreeMap<FrontierKey, NodeIndex>,
        input: &'i str,
        furthest_failure: &mut Option<(usize, Vec<TermIndex>)>,
    ) -> BTreeMap<TermIndex, Subfrontier> {
        let mut frontier: BTreeMap<TermIndex, Subfrontier> = BTreeMap::new();
        for (&(state, position), &head_idx) in frontier_base {
            let expected = self.table.expected_terms(state);
            let (layout_position, mut tokens) =
                self.lexer.next_tokens(input, position, &expected);

            if tokens.is_empty()
                && self.partial
                && expected.contains(&Grammar::STOP_TERM)
            {
                tokens.push(Token {
                    kind: Grammar::STOP_TERM,
                    value: "",
                    span: layout_position..layout_position,
                });
            }
            if tokens.is_empty() {
                // The head dies; remember the failure furthest into the
                // input for error reporting.
                log!("No lookaheads for head {}.", head_idx.index());
                if furthest_failure
                    .as_ref()
                    .map(|&(at, _)| layout_position > at)
                    .unwrap_or(true)
                {
                    *furthest_failure = Some((layout_position, expected));
                }
                continue;
            }

            let mut tokens = tokens.into_iter();
            let token = tokens.next().unwrap();
            let kind = token.kind;
            gss.head_mut(head_idx).token_ahead = Some(token);
            frontier
                .entry(kind)
                .or_default()
                .insert((state, position), head_idx);

            for token in tokens {
                let kind = token.kind;
                let split = self.split_head(gss, head_idx, token);
                log!(
                    "Lexical ambiguity: head {} split into {}.",
                    head_idx.index(),
                    split.index()
                );
                frontier
                    .entry(kind)
                    .or_default()
                    .insert((state, position), split);
            }
        }
        frontier
    }

    /// New head for an additional lookahead, sharing all parent edges.
    fn split_head<'i>(
        &self,
        gss: &mut GssGraph<'i>,
        head_idx: NodeIndex,
        token: Token<'i>,
    ) -> NodeIndex {
        let mut head = gss.head(head_idx).clone();
        head.token_ahead = Some(token);
        let new_head = gss.add_head(head);
        let parents: Vec<_> = gss
            .backedges(head_idx)
            .map(|edge| (edge.target(), Rc::clone(edge.weight())))
            .collect();
        for (parent, pack) in parents {
            gss.add_parent(new_head, parent, pack);
        }
        new_head
    }

    /// Register reductions, shifts and accepts for the heads present at the
    /// start of a subfrontier.
    fn initial_process_subfrontier(
        &self,
        gss: &GssGraph<'_>,
        token_kind: TermIndex,
        subfrontier: &Subfrontier,
        pending_reductions: &mut VecDeque<Reduction>,
        pending_shifts: &mut Vec<(NodeIndex, StateIndex)>,
        accepted_heads: &mut Vec<NodeIndex>,
    ) {
        for (&(state, _), &head_idx) in subfrontier {
            for &action in self.table.actions(state, token_kind) {
                match action {
                    Action::Shift(target) => {
                        pending_shifts.push((head_idx, target))
                    }
                    Action::Reduce(prod, length, nonterm) => {
                        if length == 0 {
                            pending_reductions.push_back(Reduction {
                                start: ReductionStart::Node(head_idx),
                                prod,
                                length,
                                nonterm,
                            });
                        } else {
                            for edge in gss.backedges(head_idx) {
                                pending_reductions.push_back(Reduction {
                                    start: ReductionStart::Edge(edge.id()),
                                    prod,
                                    length,
                                    nonterm,
                                });
                            }
                        }
                    }
                    Action::Accept => {
                        log!(
                            "{}",
                            format!("Accepting head {}.", head_idx.index())
                                .red()
                        );
                        accepted_heads.push(head_idx)
                    }
                }
            }
        }
    }

    /// Perform reductions until saturation. Newly created heads and edges
    /// register follow-up reductions/shifts for the same lookahead.
    #[allow(clippy::too_many_arguments)]
    fn reducer<'i>(
        &self,
        gss: &mut GssGraph<'i>,
        token_kind: TermIndex,
        subfrontier: &mut Subfrontier,
        frontier_idx: usize,
        pending_reductions: &mut VecDeque<Reduction>,
        pending_shifts: &mut Vec<(NodeIndex, StateIndex)>,
        accepted_heads: &mut Vec<NodeIndex>,
    ) {
        while let Some(reduction) = pending_reductions.pop_front() {
            let start_head = match reduction.start {
                ReductionStart::Edge(edge) => gss.start(edge),
                ReductionStart::Node(node) => node,
            };
            log!(
                "{} \"{}\" over head {} by length {}",
                "Reducing by".green(),
                self.grammar.prod_str(reduction.prod),
                start_head.index(),
                reduction.length
            );

            for path in self.find_reduction_paths(gss, &reduction) {
                let root_state = gss.head(path.root_head).state;
                let next_state = self
                    .table
                    .goto(root_state, reduction.nonterm)
                    .unwrap_or_else(|| {
                        panic!(
                            "GOTO undefined for state {root_state} and \
                             non-terminal \"{}\"",
                            self.grammar.nonterminals[reduction.nonterm]
                                .name
                        )
                    });
                let actions = self.table.actions(next_state, token_kind);
                if actions.is_empty() {
                    log!(
                        "No actions for state {} and lookahead {}. \
                         Skipping.",
                        next_state,
                        self.grammar.terminals[token_kind].name
                    );
                    continue;
                }

                let position = gss.head(start_head).position;
                let mut head_created = false;
                let head = match subfrontier.get(&(next_state, position)) {
                    Some(&head) => head,
                    None => {
                        let token =
                            gss.head(start_head).token_ahead.clone();
                        let new_head = gss.add_head(GssHead {
                            state: next_state,
                            frontier: frontier_idx,
                            position,
                            token_ahead: token,
                        });
                        subfrontier
                            .insert((next_state, position), new_head);
                        head_created = true;
                        new_head
                    }
                };

                let mut edge_created = false;
                let edge = match gss.edge_between(head, path.root_head) {
                    Some(edge) => edge,
                    None => {
                        edge_created = true;
                        gss.add_parent(
                            head,
                            path.root_head,
                            Rc::new(SppfPack::default()),
                        )
                    }
                };

                let span = match (path.packs.front(), path.packs.back()) {
                    (Some(first), Some(last)) => {
                        first.span().start..last.span().end
                    }
                    _ => {
                        let at = gss.head(path.root_head).position;
                        at..at
                    }
                };
                let solution = Rc::new(SppfTree::NonTerm {
                    prod: reduction.prod,
                    span,
                    children: path.packs.iter().map(Rc::clone).collect(),
                });

                let pack = Rc::clone(gss.pack(edge));
                if !self.pack_solution(&pack, solution) {
                    continue;
                }

                // Follow-up actions for the (possibly new) head and edge.
                for &action in actions {
                    match action {
                        Action::Reduce(prod, length, nonterm) => {
                            if (edge_created && length > 0) || head_created
                            {
                                pending_reductions.push_back(Reduction {
                                    start: if length > 0 {
                                        ReductionStart::Edge(edge)
                                    } else {
                                        ReductionStart::Node(head)
                                    },
                                    prod,
                                    length,
                                    nonterm,
                                });
                            }
                        }
                        Action::Shift(target) => {
                            if head_created {
                                pending_shifts.push((head, target));
                            }
                        }
                        Action::Accept => {
                            if head_created {
                                log!(
                                    "{}",
                                    format!(
                                        "Accepting head {}.",
                                        head.index()
                                    )
                                    .red()
                                );
                                accepted_heads.push(head);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Add a derivation to a pack, disambiguating against already packed
    /// derivations of the same span:
    ///
    /// * a strictly higher priority production at the root wins;
    /// * between two packings of the same production, associativity picks
    ///   the left- or right-leaning one;
    /// * identical derivations are dropped;
    /// * anything else is true ambiguity and both are kept.
    ///
    /// Returns whether the derivation was packed.
    fn pack_solution<'i>(
        &self,
        pack: &SppfPack<'i>,
        solution: Rc<SppfTree<'i>>,
    ) -> bool {
        let SppfTree::NonTerm {
            prod: new_prod,
            span: new_span,
            children: new_children,
        } = &*solution
        else {
            unreachable!("reductions pack non-terminals");
        };

        let mut possibilities = pack.possibilities.borrow_mut();
        for packed in possibilities.iter_mut() {
            let SppfTree::NonTerm {
                prod: old_prod,
                span: old_span,
                children: old_children,
            } = &**packed
            else {
                continue;
            };
            if old_span != new_span {
                continue;
            }

            if old_prod == new_prod {
                let identical = old_children.len() == new_children.len()
                    && old_children
                        .iter()
                        .zip(new_children)
                        .all(|(a, b)| Rc::ptr_eq(a, b));
                if identical {
                    return false;
                }
                match self.grammar.productions[*new_prod].assoc {
                    Associativity::Left => {
                        // Left associativity keeps the packing with the
                        // wider first child (the left-leaning tree).
                        let keep_new = child_width(new_children, 0)
                            > child_width(old_children, 0);
                        if keep_new {
                            *packed = solution;
                        }
                        return keep_new;
                    }
                    Associativity::Right => {
                        let last_new = new_children.len() - 1;
                        let last_old = old_children.len() - 1;
                        let keep_new = child_width(new_children, last_new)
                            > child_width(old_children, last_old);
                        if keep_new {
                            *packed = solution;
                        }
                        return keep_new;
                    }
                    Associativity::None => continue,
                }
            }

            let new_prio = self.grammar.productions[*new_prod].prio;
            let old_prio = self.grammar.productions[*old_prod].prio;
            if new_prio > old_prio {
                *packed = solution;
                return true;
            }
            if new_prio < old_prio {
                return false;
            }
        }
        possibilities.push(solution);
        true
    }

    /// Backtrace through the GSS enumerating all paths of the reduction's
    /// length.
    fn find_reduction_paths<'i>(
        &self,
        gss: &GssGraph<'i>,
        reduction: &Reduction,
    ) -> Vec<ReductionPath<'i>> {
        let mut paths = vec![];
        match reduction.start {
            ReductionStart::Node(head) => {
                debug_assert!(
                    reduction.length == 0,
                    "node based reductions must be empty"
                );
                paths.push(ReductionPath {
                    packs: VecDeque::new(),
                    root_head: head,
                });
            }
            ReductionStart::Edge(start_edge) => {
                debug_assert!(
                    reduction.length != 0,
                    "edge based reductions must not be empty"
                );
                struct PendingPath<'i> {
                    current_root: NodeIndex,
                    left_to_go: usize,
                    packs: VecDeque<Rc<SppfPack<'i>>>,
                }
                let mut pending = VecDeque::from([PendingPath {
                    current_root: gss.end(start_edge),
                    left_to_go: reduction.length - 1,
                    packs: VecDeque::from([Rc::clone(
                        gss.pack(start_edge),
                    )]),
                }]);

                while let Some(path) = pending.pop_front() {
                    if path.left_to_go > 0 {
                        for edge in gss.backedges(path.current_root) {
                            let mut packs = path.packs.clone();
                            packs.push_front(Rc::clone(edge.weight()));
                            pending.push_back(PendingPath {
                                current_root: edge.target(),
                                left_to_go: path.left_to_go - 1,
                                packs,
                            });
                        }
                    } else {
                        paths.push(ReductionPath {
                            packs: path.packs,
                            root_head: path.current_root,
                        });
                    }
                }
            }
        }
        paths
    }

    /// Do all pending shifts collectively, creating the next frontier
    /// base. Shifted heads are shared per `(state, position)`.
    fn shifter<'i>(
        &self,
        gss: &mut GssGraph<'i>,
        pending_shifts: &mut Vec<(NodeIndex, StateIndex)>,
        frontier_idx: usize,
    ) -> BTreeMap<FrontierKey, NodeIndex> {
        let mut frontier_base = BTreeMap::new();
        while let Some((head_idx, state)) = pending_shifts.pop() {
            let token = gss
                .head(head_idx)
                .token_ahead
                .clone()
                .expect("shifting head must have a token ahead");
            let position = token.span.end;
            log!(
                "{} head {} by token {:?}",
                "Shifting".green(),
                head_idx.index(),
                token.value
            );
            let shifted = *frontier_base
                .entry((state, position))
                .or_insert_with(|| {
                    gss.add_head(GssHead {
                        state,
                        frontier: frontier_idx,
                        position,
                        token_ahead: None,
                    })
                });
            gss.add_solution(
                shifted,
                head_idx,
                Rc::new(SppfTree::Term { token }),
            );
        }
        frontier_base
    }

    /// Collect accepted derivations: everything packed on the back edges
    /// of accepted heads.
    fn create_forest<'i>(
        &self,
        gss: &GssGraph<'i>,
        accepted_heads: Vec<NodeIndex>,
    ) -> Forest<'i> {
        let mut roots: Vec<Rc<SppfTree<'i>>> = vec![];
        for head in accepted_heads {
            for edge in gss.backedges(head) {
                for tree in edge.weight().possibilities.borrow().iter() {
                    if !roots.iter().any(|root| Rc::ptr_eq(root, tree)) {
                        roots.push(Rc::clone(tree));
                    }
                }
            }
        }
        Forest::new(roots)
    }
}

fn child_width(children: &[Rc<SppfPack<'_>>], index: usize) -> usize {
    let span = children[index].span();
    span.end - span.start
}
