//! Calculating LR tables.
//!
//! States are sets of LR(1) items. An item is a production with a dot
//! position and a follow set; items are keyed by `(production, position)` and
//! their follow sets are merged, which keeps the item sets canonical. State
//! identity is structural: in LR(1) mode two states are the same if their
//! kernels match including follows, in LALR mode if their LR(0) cores match
//! (follows are then unioned and the state is re-processed until the
//! follow sets stabilize).

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::grammar::{Associativity, Grammar};
use crate::index::{
    NonTermIndex, NonTermVec, ProdIndex, StateIndex, StateVec, SymbolIndex,
    SymbolVec, TermIndex, TermVec,
};
use crate::settings::{Settings, TableType};

type Follow = HashSet<SymbolIndex>;
type Firsts = HashSet<SymbolIndex>;
pub type FirstSets = SymbolVec<Firsts>;

/// LR items of a state: `(production, dot position) -> follow set`.
type ItemMap = IndexMap<(ProdIndex, usize), Follow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(StateIndex),
    /// Production, its rhs length and its lhs non-terminal.
    Reduce(ProdIndex, usize, NonTermIndex),
    Accept,
}

/// LR state: items plus the ACTION and GOTO rows for this state.
#[derive(Debug)]
pub struct LRState {
    pub index: StateIndex,
    /// The symbol whose transition leads into this state.
    pub symbol: SymbolIndex,
    items: ItemMap,
    pub actions: TermVec<Vec<Action>>,
    pub gotos: NonTermVec<Option<StateIndex>>,
}

#[derive(Debug)]
pub struct LRTable {
    pub states: StateVec<LRState>,
}

impl LRTable {
    /// Calculate the LR table (all states with ACTIONs and GOTOs) for the
    /// given grammar. Conflict cells are resolved by priorities and
    /// associativities; whatever remains is kept (GLR) and reported through
    /// [`LRTable::get_conflicts`].
    pub fn new(grammar: &Grammar, settings: &Settings) -> Result<Self> {
        let first_sets = first_sets(grammar);
        check_empty_sets(grammar, &first_sets)?;

        let builds = build_states(grammar, &first_sets, settings.table_type);

        let mut states = StateVec::new();
        for (idx, build) in builds.into_iter().enumerate() {
            let mut items = build.kernel;
            closure(&mut items, grammar, &first_sets);

            let mut state = LRState {
                index: StateIndex(idx),
                symbol: build.symbol,
                items,
                actions: grammar.new_termvec(vec![]),
                gotos: grammar.new_nontermvec(None),
            };

            // Shifts, accept and gotos first so that reduce insertion sees
            // the shift it may conflict with.
            for (&(prod, position), _) in &state.items {
                let rhs = &grammar.productions[prod].rhs;
                let Some(&symbol) = rhs.get(position) else {
                    continue;
                };
                if symbol == grammar.stop_index() {
                    if prod == Grammar::AUG_PROD {
                        let cell = &mut state.actions[Grammar::STOP_TERM];
                        if !cell.contains(&Action::Accept) {
                            cell.push(Action::Accept);
                        }
                    }
                } else if grammar.is_term(symbol) {
                    let target = build.transitions[&symbol];
                    let cell =
                        &mut state.actions[grammar.symbol_to_term(symbol)];
                    if !cell.contains(&Action::Shift(target)) {
                        cell.push(Action::Shift(target));
                    }
                } else {
                    state.gotos[grammar.symbol_to_nonterm(symbol)] =
                        Some(build.transitions[&symbol]);
                }
            }

            for (&(prod, position), follow) in &state.items {
                if position < grammar.productions[prod].rhs.len()
                    || prod == Grammar::AUG_PROD
                {
                    continue;
                }
                let mut lookaheads: Vec<SymbolIndex> =
                    follow.iter().copied().collect();
                lookaheads.sort();
                for lookahead in lookaheads {
                    let term = grammar.symbol_to_term(lookahead);
                    let cell = &mut state.actions[term];
                    add_reduce(grammar, cell, prod, term);
                }
            }

            states.push(state);
        }

        Ok(Self { states })
    }

    pub fn actions(&self, state: StateIndex, term: TermIndex) -> &[Action] {
        &self.states[state].actions[term]
    }

    pub fn goto(
        &self,
        state: StateIndex,
        nonterm: NonTermIndex,
    ) -> Option<StateIndex> {
        self.states[state].gotos[nonterm]
    }

    /// Terminals with at least one action in the given state, in terminal
    /// index order.
    pub fn expected_terms(&self, state: StateIndex) -> Vec<TermIndex> {
        self.states[state]
            .actions
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(idx, _)| TermIndex(idx))
            .collect()
    }

    /// Cells left with more than one action after resolution.
    pub fn get_conflicts(&self) -> Vec<(StateIndex, TermIndex)> {
        let mut conflicts = vec![];
        for state in &self.states {
            for (tidx, cell) in state.actions.iter().enumerate() {
                if cell.len() > 1 {
                    conflicts.push((state.index, TermIndex(tidx)));
                }
            }
        }
        conflicts
    }

    /// Human readable report of the given conflicts with the involved state
    /// items, used for [`Error::LRConflict`].
    pub fn conflicts_report(
        &self,
        grammar: &Grammar,
        conflicts: &[(StateIndex, TermIndex)],
    ) -> String {
        let mut report = String::new();
        for &(state_idx, term) in conflicts {
            let state = &self.states[state_idx];
            report.push_str(&format!(
                "In state {} ({}) on lookahead \"{}\":\n",
                state_idx,
                grammar.symbol_name(state.symbol),
                grammar.terminals[term].name,
            ));
            for action in &state.actions[term] {
                match action {
                    Action::Shift(target) => report.push_str(&format!(
                        "  shift to state {target}\n"
                    )),
                    Action::Reduce(prod, ..) => report.push_str(&format!(
                        "  reduce by \"{}\"\n",
                        grammar.prod_str(*prod)
                    )),
                    Action::Accept => report.push_str("  accept\n"),
                }
            }
            report.push_str("State items:\n");
            for item in state.item_strings(grammar) {
                report.push_str(&format!("  {item}\n"));
            }
        }
        report
    }

    /// Raise [`Error::LRConflict`] if any cell holds more than one action.
    pub fn check_lr_conflicts(&self, grammar: &Grammar) -> Result<()> {
        let conflicts = self.get_conflicts();
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(Error::LRConflict(
                self.conflicts_report(grammar, &conflicts),
            ))
        }
    }
}

impl LRState {
    /// Render items as `Lhs: a . B c {lookaheads}` for diagnostics.
    fn item_strings(&self, grammar: &Grammar) -> Vec<String> {
        self.items
            .iter()
            .map(|(&(prod, position), follow)| {
                let production = &grammar.productions[prod];
                let mut rhs: Vec<String> = production
                    .rhs
                    .iter()
                    .map(|&s| grammar.symbol_name(s).to_string())
                    .collect();
                rhs.insert(position, ".".to_string());
                let mut lookaheads: Vec<&str> = follow
                    .iter()
                    .map(|&s| grammar.symbol_name(s))
                    .collect();
                lookaheads.sort_unstable();
                format!(
                    "{}: {} {{{}}}",
                    grammar.nonterminals[production.nonterminal].name,
                    rhs.join(" "),
                    lookaheads.join(", ")
                )
            })
            .collect()
    }
}

/// Add a reduce action to a cell, resolving conflicts with the already
/// present actions:
///
/// * shift/reduce: the higher priority side wins; on equal priority the
///   production's associativity decides (left reduces, right shifts, none
///   keeps both).
/// * reduce/reduce: a strictly higher priority production wins, equal
///   priorities keep both.
fn add_reduce(
    grammar: &Grammar,
    cell: &mut Vec<Action>,
    prod: ProdIndex,
    term: TermIndex,
) {
    let production = &grammar.productions[prod];
    let reduce =
        Action::Reduce(prod, production.rhs.len(), production.nonterminal);

    if let Some(shift_pos) =
        cell.iter().position(|a| matches!(a, Action::Shift(_)))
    {
        let term_prio = grammar.term_prio(term);
        if production.prio > term_prio {
            cell.remove(shift_pos);
        } else if production.prio < term_prio {
            return;
        } else {
            match production.assoc {
                Associativity::Left => {
                    cell.remove(shift_pos);
                }
                Associativity::Right => return,
                // Unresolved, keep both actions.
                Associativity::None => {}
            }
        }
    }

    let mut keep_new = true;
    cell.retain(|action| match action {
        Action::Reduce(other, ..) => {
            let other_prio = grammar.productions[*other].prio;
            if production.prio > other_prio {
                false
            } else {
                if production.prio < other_prio {
                    keep_new = false;
                }
                true
            }
        }
        _ => true,
    });
    if keep_new {
        cell.push(reduce);
    }
}

/// Kernel and transitions of a state under construction.
struct StateBuild {
    symbol: SymbolIndex,
    kernel: ItemMap,
    transitions: IndexMap<SymbolIndex, StateIndex>,
}

/// Generate the canonical collection of item sets, BFS over goto
/// transitions starting from `closure({AUG: . <start> STOP, {STOP}})`.
fn build_states(
    grammar: &Grammar,
    first_sets: &FirstSets,
    table_type: TableType,
) -> Vec<StateBuild> {
    let mut kernel0 = ItemMap::new();
    kernel0.insert(
        (Grammar::AUG_PROD, 0),
        Follow::from([grammar.stop_index()]),
    );
    let mut states = vec![StateBuild {
        symbol: grammar.nonterm_to_symbol(Grammar::AUG_NONTERM),
        kernel: kernel0,
        transitions: IndexMap::new(),
    }];

    let mut states_by_core: HashMap<Vec<(ProdIndex, usize)>, Vec<StateIndex>> =
        HashMap::new();
    states_by_core.insert(core_key(&states[0].kernel), vec![StateIndex(0)]);

    let mut queue = VecDeque::from([StateIndex(0)]);
    while let Some(state_idx) = queue.pop_front() {
        let mut items = states[state_idx.0].kernel.clone();
        closure(&mut items, grammar, first_sets);

        // Group items by the grammar symbol right of the dot; each group,
        // with dots advanced, is the kernel of the goto target. No state is
        // created for STOP: the dot in front of STOP accepts instead.
        let mut per_next_symbol: IndexMap<SymbolIndex, ItemMap> =
            IndexMap::new();
        for (&(prod, position), follow) in &items {
            let Some(&symbol) = grammar.productions[prod].rhs.get(position)
            else {
                continue;
            };
            if symbol == grammar.stop_index() {
                continue;
            }
            per_next_symbol
                .entry(symbol)
                .or_default()
                .entry((prod, position + 1))
                .or_default()
                .extend(follow.iter().copied());
        }

        let mut transitions = IndexMap::new();
        for (symbol, kernel) in per_next_symbol {
            let target = find_or_create_state(
                &mut states,
                &mut states_by_core,
                &mut queue,
                kernel,
                symbol,
                table_type,
            );
            transitions.insert(symbol, target);
        }
        states[state_idx.0].transitions = transitions;
    }
    states
}

fn core_key(items: &ItemMap) -> Vec<(ProdIndex, usize)> {
    let mut key: Vec<_> = items.keys().copied().collect();
    key.sort_unstable();
    key
}

/// Find a state this kernel belongs to, or create a new one. In LALR mode a
/// state with the same LR(0) core is reused and its follows are unioned;
/// when that grows them the state is queued for re-processing. In LR(1)
/// mode the follows must match exactly for the state to be reused.
fn find_or_create_state(
    states: &mut Vec<StateBuild>,
    states_by_core: &mut HashMap<Vec<(ProdIndex, usize)>, Vec<StateIndex>>,
    queue: &mut VecDeque<StateIndex>,
    kernel: ItemMap,
    symbol: SymbolIndex,
    table_type: TableType,
) -> StateIndex {
    let candidates = states_by_core.entry(core_key(&kernel)).or_default();
    match table_type {
        TableType::Lalr => {
            if let Some(&existing) = candidates.first() {
                let mut grown = false;
                for (key, follow) in kernel {
                    let entry = states[existing.0]
                        .kernel
                        .get_mut(&key)
                        .expect("same core implies same kernel keys");
                    let before = entry.len();
                    entry.extend(follow);
                    grown |= entry.len() > before;
                }
                if grown && !queue.contains(&existing) {
                    queue.push_back(existing);
                }
                return existing;
            }
        }
        TableType::Lr1 => {
            for &candidate in candidates.iter() {
                if states[candidate.0].kernel == kernel {
                    return candidate;
                }
            }
        }
    }

    let idx = StateIndex(states.len());
    states.push(StateBuild {
        symbol,
        kernel,
        transitions: IndexMap::new(),
    });
    candidates.push(idx);
    queue.push_back(idx);
    idx
}

/// Closes over the items of a state: for every item with a non-terminal
/// right of the dot, items for all of that non-terminal's productions are
/// added with `FIRST` of the remainder (plus the item's own follow when the
/// remainder is nullable) as the follow set.
fn closure(items: &mut ItemMap, grammar: &Grammar, first_sets: &FirstSets) {
    loop {
        let mut new_items: Vec<((ProdIndex, usize), Follow)> = vec![];
        for (&(prod, position), follow) in items.iter() {
            let rhs = &grammar.productions[prod].rhs;
            let Some(&symbol) = rhs.get(position) else {
                continue;
            };
            if !grammar.is_nonterm(symbol) {
                continue;
            }
            let mut new_follow =
                firsts(grammar, first_sets, &rhs[position + 1..]);
            if new_follow.remove(&grammar.empty_index()) {
                new_follow.extend(follow.iter().copied());
            }
            let nonterm = grammar.symbol_to_nonterm(symbol);
            for &production in &grammar.nonterminals[nonterm].productions {
                new_items.push(((production, 0), new_follow.clone()));
            }
        }

        let mut additions = false;
        for (key, follow) in new_items {
            let is_new = !items.contains_key(&key);
            let entry = items.entry(key).or_default();
            let before = entry.len();
            entry.extend(follow);
            additions |= is_new || entry.len() > before;
        }
        if !additions {
            break;
        }
    }
}

/// The sets of terminals that can start sentences derived from each grammar
/// symbol, computed by fixed point iteration. A symbol is nullable iff
/// EMPTY is in its set.
pub fn first_sets(grammar: &Grammar) -> FirstSets {
    let mut first_sets: FirstSets = SymbolVec::new();
    for terminal in &grammar.terminals {
        first_sets.push(Firsts::from([terminal.idx.to_symbol_index()]));
    }
    for _ in &grammar.nonterminals {
        first_sets.push(Firsts::new());
    }
    // AUG always derives the start symbol's firsts; covered by production 0
    // in the loop below.

    let mut additions = true;
    while additions {
        additions = false;
        for production in &grammar.productions {
            let lhs = grammar.nonterm_to_symbol(production.nonterminal);
            let rhs_firsts = firsts(grammar, &first_sets, &production.rhs);
            let before = first_sets[lhs].len();
            first_sets[lhs].extend(rhs_firsts);
            if first_sets[lhs].len() > before {
                additions = true;
            }
        }
    }
    first_sets
}

/// `FIRST` of a sequence of symbols: firsts of each symbol left to right,
/// stopping at the first non-nullable one. If the whole sequence is
/// nullable the result contains EMPTY.
fn firsts(
    grammar: &Grammar,
    first_sets: &FirstSets,
    symbols: &[SymbolIndex],
) -> Firsts {
    let mut result = Firsts::new();
    for &symbol in symbols {
        let mut nullable = false;
        for &first in &first_sets[symbol] {
            if first == grammar.empty_index() {
                nullable = true;
            } else {
                result.insert(first);
            }
        }
        if !nullable {
            return result;
        }
    }
    result.insert(grammar.empty_index());
    result
}

/// Check for grammar symbols that cannot derive any terminal string, i.e.
/// infinite recursion.
fn check_empty_sets(grammar: &Grammar, first_sets: &FirstSets) -> Result<()> {
    for (idx, set) in first_sets.iter().enumerate() {
        if set.is_empty() {
            return Err(Error::Grammar(format!(
                "infinite recursion on grammar symbol \"{}\"",
                grammar.symbol_name(SymbolIndex(idx))
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;
    use crate::settings::ParserAlgo;

    fn expression_grammar() -> Grammar {
        GrammarBuilder::new()
            .term_str("plus", "+")
            .term_str("mul", "*")
            .term_str("open", "(")
            .term_str("close", ")")
            .term_regex("id", "[a-z]+")
            .rule("E", &["T", "Ep"])
            .rule("Ep", &["plus", "T", "Ep"])
            .rule("Ep", &["EMPTY"])
            .rule("T", &["F", "Tp"])
            .rule("Tp", &["mul", "F", "Tp"])
            .rule("Tp", &["EMPTY"])
            .rule("F", &["open", "E", "close"])
            .rule("F", &["id"])
            .start("E")
            .build()
            .unwrap()
    }

    fn symbols(grammar: &Grammar, names: &[&str]) -> Follow {
        names
            .iter()
            .map(|name| grammar.symbol_index(name).unwrap())
            .collect()
    }

    #[test]
    fn first_sets_of_expression_grammar() {
        let grammar = expression_grammar();
        let first_sets = first_sets(&grammar);

        assert_eq!(first_sets.len(), grammar.symbol_len());

        // First of a terminal is the terminal itself.
        assert_eq!(
            first_sets[grammar.symbol_index("id").unwrap()],
            symbols(&grammar, &["id"])
        );
        assert_eq!(
            first_sets[grammar.symbol_index("E").unwrap()],
            symbols(&grammar, &["open", "id"])
        );
        assert_eq!(
            first_sets[grammar.symbol_index("T").unwrap()],
            symbols(&grammar, &["open", "id"])
        );
        // Nullable non-terminals contain EMPTY.
        assert_eq!(
            first_sets[grammar.symbol_index("Ep").unwrap()],
            symbols(&grammar, &["plus", "EMPTY"])
        );
        assert_eq!(
            first_sets[grammar.symbol_index("Tp").unwrap()],
            symbols(&grammar, &["mul", "EMPTY"])
        );
    }

    #[test]
    fn firsts_of_sequence_stops_at_non_nullable() {
        let grammar = expression_grammar();
        let first_sets = first_sets(&grammar);

        let sequence = [
            grammar.symbol_index("Ep").unwrap(),
            grammar.symbol_index("close").unwrap(),
        ];
        assert_eq!(
            firsts(&grammar, &first_sets, &sequence),
            symbols(&grammar, &["plus", "close"])
        );
        // A fully nullable sequence derives EMPTY.
        let sequence = [grammar.symbol_index("Ep").unwrap()];
        assert_eq!(
            firsts(&grammar, &first_sets, &sequence),
            symbols(&grammar, &["plus", "EMPTY"])
        );
    }

    #[test]
    fn closure_of_start_kernel() {
        let grammar = expression_grammar();
        let first_sets = first_sets(&grammar);

        let mut items = ItemMap::new();
        items.insert(
            (Grammar::AUG_PROD, 0),
            Follow::from([grammar.stop_index()]),
        );
        closure(&mut items, &grammar, &first_sets);

        // AUG: . E STOP, E: . T Ep, T: . F Tp, F: . ( E ) and F: . id
        assert_eq!(items.len(), 5);
        let e_item = &items[&(ProdIndex(1), 0)];
        assert_eq!(*e_item, Follow::from([grammar.stop_index()]));
        // Follow of T items is FIRST(Ep) + propagated STOP since Ep is
        // nullable.
        let t_item = &items[&(ProdIndex(4), 0)];
        assert_eq!(*t_item, symbols(&grammar, &["plus", "STOP"]));
    }

    #[test]
    fn goto_exists_for_every_dotted_symbol() {
        let grammar = expression_grammar();
        let settings = Settings::new();
        let table = LRTable::new(&grammar, &settings).unwrap();

        for state in &table.states {
            for (&(prod, position), _) in &state.items {
                let Some(&symbol) =
                    grammar.productions[prod].rhs.get(position)
                else {
                    continue;
                };
                if symbol == grammar.stop_index() {
                    assert!(state.actions[Grammar::STOP_TERM]
                        .contains(&Action::Accept));
                } else if grammar.is_term(symbol) {
                    assert!(state.actions[grammar.symbol_to_term(symbol)]
                        .iter()
                        .any(|a| matches!(a, Action::Shift(_))));
                } else {
                    assert!(state.gotos[grammar.symbol_to_nonterm(symbol)]
                        .is_some());
                }
            }
        }
    }

    #[test]
    fn lr_cells_hold_at_most_one_action() {
        let grammar = expression_grammar();
        let table = LRTable::new(&grammar, &Settings::new()).unwrap();
        table.check_lr_conflicts(&grammar).unwrap();
        for state in &table.states {
            for cell in &state.actions {
                assert!(cell.len() <= 1);
            }
        }
    }

    #[test]
    fn lalr_merges_lr1_states() {
        let grammar = expression_grammar();
        let lalr = LRTable::new(
            &grammar,
            &Settings::new().with_table_type(TableType::Lalr),
        )
        .unwrap();
        let lr1 = LRTable::new(
            &grammar,
            &Settings::new().with_table_type(TableType::Lr1),
        )
        .unwrap();
        assert!(lalr.states.len() <= lr1.states.len());
    }

    #[test]
    fn table_build_is_idempotent() {
        let grammar = expression_grammar();
        let first = LRTable::new(&grammar, &Settings::new()).unwrap();
        let second = LRTable::new(&grammar, &Settings::new()).unwrap();

        assert_eq!(first.states.len(), second.states.len());
        for (a, b) in first.states.iter().zip(second.states.iter()) {
            assert_eq!(a.actions.0, b.actions.0);
            assert_eq!(
                a.gotos.iter().collect::<Vec<_>>(),
                b.gotos.iter().collect::<Vec<_>>()
            );
        }
    }

    fn ambiguous_expression_grammar() -> Grammar {
        GrammarBuilder::new()
            .term_regex("number", r"\d+")
            .term_str("plus", "+")
            .prio(1)
            .term_str("mul", "*")
            .prio(2)
            .rule("E", &["E", "plus", "E"])
            .assoc(Associativity::Left)
            .rule("E", &["E", "mul", "E"])
            .assoc(Associativity::Left)
            .rule("E", &["number"])
            .start("E")
            .build()
            .unwrap()
    }

    #[test]
    fn priorities_resolve_shift_reduce_conflicts() {
        let grammar = ambiguous_expression_grammar();
        let table = LRTable::new(&grammar, &Settings::new()).unwrap();
        // All conflicts resolved by priority/associativity.
        assert!(table.get_conflicts().is_empty());

        // In the state reached after E + E, seeing * must shift (higher
        // priority) while seeing + must reduce (left associativity).
        let plus = TermIndex(3);
        let mul = TermIndex(4);
        let mut checked = false;
        for state in &table.states {
            let is_plus_reduction_state = state
                .items
                .iter()
                .any(|(&(prod, position), _)| {
                    prod == ProdIndex(1) && position == 3
                });
            if is_plus_reduction_state {
                assert!(matches!(
                    state.actions[mul].as_slice(),
                    [Action::Shift(_)]
                ));
                assert!(matches!(
                    state.actions[plus].as_slice(),
                    [Action::Reduce(p, ..)] if *p == ProdIndex(1)
                ));
                checked = true;
            }
        }
        assert!(checked);
    }

    #[test]
    fn unresolved_conflicts_are_kept_for_glr() {
        let grammar = GrammarBuilder::new()
            .term_str("a", "a")
            .rule("E", &["E", "E"])
            .rule("E", &["a"])
            .start("E")
            .build()
            .unwrap();
        let settings =
            Settings::new().with_parser_algo(ParserAlgo::Glr);
        let table = LRTable::new(&grammar, &settings).unwrap();
        assert!(!table.get_conflicts().is_empty());
        assert!(table.check_lr_conflicts(&grammar).is_err());
    }

    #[test]
    fn infinite_recursion_is_detected() {
        let grammar = GrammarBuilder::new()
            .term_str("a", "a")
            .rule("S", &["S", "a"])
            .start("S")
            .build()
            .unwrap();
        assert!(matches!(
            LRTable::new(&grammar, &Settings::new()),
            Err(Error::Grammar(msg)) if msg.contains("infinite recursion")
        ));
    }
}
