//! Canonical in-memory grammar: symbols, productions, priorities.
//!
//! A [`Grammar`] is built once through [`GrammarBuilder`] and frozen. All
//! symbols are identified by dense indices: terminals first (so a terminal's
//! symbol index equals its terminal index), non-terminals after. `STOP`,
//! `EMPTY` and the augmented start symbol are always present and production 0
//! is always `AUG: <start> STOP`.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::error::{Error, Result};
use crate::index::{
    NonTermIndex, NonTermVec, ProdIndex, ProdVec, SymbolIndex, TermIndex,
    TermVec,
};

pub type Priority = u32;
pub const DEFAULT_PRIORITY: Priority = 10;

pub(crate) const STOP: &str = "STOP";
pub(crate) const EMPTY: &str = "EMPTY";
pub(crate) const AUG: &str = "AUG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Associativity {
    #[default]
    None,
    Left,
    Right,
}

/// Custom recognizers get the whole input and the current position and
/// return the length of the match, if any.
pub type CustomRecognizerFn = fn(input: &str, position: usize) -> Option<usize>;

#[derive(Debug)]
pub enum Recognizer {
    /// Zero-length match at end of input only.
    Stop,
    /// Zero-length match anywhere.
    Empty,
    StrMatch(String),
    /// Anchored pattern, longest match.
    RegexMatch(Regex),
    Custom(CustomRecognizerFn),
}

#[derive(Debug)]
pub struct Terminal {
    pub idx: TermIndex,
    pub name: String,
    pub recognizer: Recognizer,
    pub prio: Priority,
}

#[derive(Debug)]
pub struct NonTerminal {
    pub idx: NonTermIndex,
    pub name: String,
    pub productions: Vec<ProdIndex>,
}

#[derive(Debug)]
pub struct Production {
    pub idx: ProdIndex,
    pub nonterminal: NonTermIndex,
    /// Ordinal of this production within its non-terminal, in declaration
    /// order. Used to dispatch user actions.
    pub ntidx: usize,
    pub rhs: Vec<SymbolIndex>,
    pub prio: Priority,
    pub assoc: Associativity,
}

#[derive(Debug)]
pub struct Grammar {
    pub terminals: TermVec<Terminal>,
    pub nonterminals: NonTermVec<NonTerminal>,
    pub productions: ProdVec<Production>,
    /// Symbol index of the user's start non-terminal.
    pub start_index: SymbolIndex,
    pub layout: Option<Box<Grammar>>,
    symbol_by_name: IndexMap<String, SymbolIndex>,
}

impl Grammar {
    pub const STOP_TERM: TermIndex = TermIndex(0);
    pub const EMPTY_TERM: TermIndex = TermIndex(1);
    pub const AUG_NONTERM: NonTermIndex = NonTermIndex(0);
    pub const AUG_PROD: ProdIndex = ProdIndex(0);

    pub fn term_len(&self) -> usize {
        self.terminals.len()
    }

    pub fn symbol_len(&self) -> usize {
        self.terminals.len() + self.nonterminals.len()
    }

    pub fn stop_index(&self) -> SymbolIndex {
        Self::STOP_TERM.to_symbol_index()
    }

    pub fn empty_index(&self) -> SymbolIndex {
        Self::EMPTY_TERM.to_symbol_index()
    }

    pub fn is_term(&self, symbol: SymbolIndex) -> bool {
        symbol.0 < self.term_len()
    }

    pub fn is_nonterm(&self, symbol: SymbolIndex) -> bool {
        !self.is_term(symbol)
    }

    pub fn symbol_to_term(&self, symbol: SymbolIndex) -> TermIndex {
        debug_assert!(self.is_term(symbol));
        TermIndex(symbol.0)
    }

    pub fn symbol_to_nonterm(&self, symbol: SymbolIndex) -> NonTermIndex {
        debug_assert!(self.is_nonterm(symbol));
        NonTermIndex(symbol.0 - self.term_len())
    }

    pub fn nonterm_to_symbol(&self, nonterm: NonTermIndex) -> SymbolIndex {
        nonterm.to_symbol_index(self.term_len())
    }

    pub fn symbol_name(&self, symbol: SymbolIndex) -> &str {
        if self.is_term(symbol) {
            &self.terminals[self.symbol_to_term(symbol)].name
        } else {
            &self.nonterminals[self.symbol_to_nonterm(symbol)].name
        }
    }

    pub fn symbol_index(&self, name: &str) -> Option<SymbolIndex> {
        self.symbol_by_name.get(name).copied()
    }

    pub fn term_prio(&self, term: TermIndex) -> Priority {
        self.terminals[term].prio
    }

    pub fn new_termvec<T: Clone>(&self, value: T) -> TermVec<T> {
        TermVec(vec![value; self.term_len()])
    }

    pub fn new_nontermvec<T: Clone>(&self, value: T) -> NonTermVec<T> {
        NonTermVec(vec![value; self.nonterminals.len()])
    }

    /// Render a production as `Lhs: Rhs1 Rhs2 ...` for diagnostics.
    pub fn prod_str(&self, prod: ProdIndex) -> String {
        let production = &self.productions[prod];
        let lhs = &self.nonterminals[production.nonterminal].name;
        if production.rhs.is_empty() {
            format!("{lhs}: {EMPTY}")
        } else {
            let rhs: Vec<&str> = production
                .rhs
                .iter()
                .map(|&s| self.symbol_name(s))
                .collect();
            format!("{lhs}: {}", rhs.join(" "))
        }
    }
}

enum RecognizerSpec {
    Str(String),
    Regex(String),
    Custom(CustomRecognizerFn),
}

struct TermSpec {
    name: String,
    spec: RecognizerSpec,
    prio: Option<Priority>,
}

struct RuleSpec {
    lhs: String,
    rhs: Vec<String>,
    prio: Option<Priority>,
    assoc: Associativity,
}

enum LastItem {
    None,
    Term,
    Rule,
}

/// Structured grammar input: terminals with their recognizers, productions
/// as sequences of symbol names, a start symbol and an optional layout
/// grammar. `prio`/`assoc` apply to the most recently declared item.
pub struct GrammarBuilder {
    terms: Vec<TermSpec>,
    rules: Vec<RuleSpec>,
    start: Option<String>,
    layout: Option<Grammar>,
    last: LastItem,
    errors: Vec<String>,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            terms: vec![],
            rules: vec![],
            start: None,
            layout: None,
            last: LastItem::None,
            errors: vec![],
        }
    }

    pub fn term_str(mut self, name: &str, string: &str) -> Self {
        self.terms.push(TermSpec {
            name: name.into(),
            spec: RecognizerSpec::Str(string.into()),
            prio: None,
        });
        self.last = LastItem::Term;
        self
    }

    pub fn term_regex(mut self, name: &str, pattern: &str) -> Self {
        self.terms.push(TermSpec {
            name: name.into(),
            spec: RecognizerSpec::Regex(pattern.into()),
            prio: None,
        });
        self.last = LastItem::Term;
        self
    }

    pub fn term_custom(
        mut self,
        name: &str,
        recognizer: CustomRecognizerFn,
    ) -> Self {
        self.terms.push(TermSpec {
            name: name.into(),
            spec: RecognizerSpec::Custom(recognizer),
            prio: None,
        });
        self.last = LastItem::Term;
        self
    }

    /// Add a production. An rhs of `["EMPTY"]` or `[]` declares an empty
    /// production.
    pub fn rule(mut self, lhs: &str, rhs: &[&str]) -> Self {
        self.rules.push(RuleSpec {
            lhs: lhs.into(),
            rhs: rhs.iter().map(|s| (*s).into()).collect(),
            prio: None,
            assoc: Associativity::None,
        });
        self.last = LastItem::Rule;
        self
    }

    /// Priority of the last declared terminal or production.
    pub fn prio(mut self, prio: Priority) -> Self {
        match self.last {
            LastItem::Term => self.terms.last_mut().unwrap().prio = Some(prio),
            LastItem::Rule => self.rules.last_mut().unwrap().prio = Some(prio),
            LastItem::None => self
                .errors
                .push("prio() must follow a terminal or production".into()),
        }
        self
    }

    /// Associativity of the last declared production.
    pub fn assoc(mut self, assoc: Associativity) -> Self {
        match self.last {
            LastItem::Rule => self.rules.last_mut().unwrap().assoc = assoc,
            _ => self
                .errors
                .push("assoc() must follow a production".into()),
        }
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Layout sub-grammar used to skip whitespace/comments between tokens.
    pub fn layout(mut self, grammar: Grammar) -> Self {
        self.layout = Some(grammar);
        self
    }

    pub fn build(self) -> Result<Grammar> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(Error::Grammar(error));
        }

        let start_name = self
            .start
            .ok_or_else(|| Error::Grammar("start symbol not set".into()))?;

        // Non-terminals in order of first appearance as an lhs.
        let nonterm_names: IndexSet<&str> =
            self.rules.iter().map(|r| r.lhs.as_str()).collect();

        let mut symbol_by_name: IndexMap<String, SymbolIndex> =
            IndexMap::new();

        let mut terminals = TermVec::new();
        let mut term_specs = vec![
            (STOP.to_string(), Recognizer::Stop, None),
            (EMPTY.to_string(), Recognizer::Empty, None),
        ];
        for term in self.terms {
            let recognizer = match term.spec {
                RecognizerSpec::Str(s) => Recognizer::StrMatch(s),
                RecognizerSpec::Regex(pattern) => Recognizer::RegexMatch(
                    Regex::new(&format!("^(?:{pattern})"))?,
                ),
                RecognizerSpec::Custom(f) => Recognizer::Custom(f),
            };
            term_specs.push((term.name, recognizer, term.prio));
        }
        for (name, recognizer, prio) in term_specs {
            let idx = TermIndex(terminals.len());
            if symbol_by_name
                .insert(name.clone(), idx.to_symbol_index())
                .is_some()
            {
                return Err(Error::Grammar(format!(
                    "duplicate terminal \"{name}\""
                )));
            }
            terminals.push(Terminal {
                idx,
                name,
                recognizer,
                prio: prio.unwrap_or(DEFAULT_PRIORITY),
            });
        }
        let term_len = terminals.len();

        let mut nonterminals = NonTermVec::new();
        for name in std::iter::once(AUG).chain(nonterm_names) {
            let idx = NonTermIndex(nonterminals.len());
            if symbol_by_name
                .insert(name.to_string(), idx.to_symbol_index(term_len))
                .is_some()
            {
                return Err(Error::Grammar(format!(
                    "symbol \"{name}\" conflicts with an already defined symbol"
                )));
            }
            nonterminals.push(NonTerminal {
                idx,
                name: name.to_string(),
                productions: vec![],
            });
        }

        let start_index = match symbol_by_name.get(&start_name) {
            Some(&symbol) if symbol.0 >= term_len => symbol,
            Some(_) => {
                return Err(Error::Grammar(format!(
                    "start symbol \"{start_name}\" is a terminal"
                )))
            }
            None => {
                return Err(Error::Grammar(format!(
                    "start symbol \"{start_name}\" is not defined"
                )))
            }
        };

        // Production 0 is reserved for the augmentation.
        let mut productions = ProdVec::new();
        productions.push(Production {
            idx: ProdIndex(0),
            nonterminal: NonTermIndex(0),
            ntidx: 0,
            rhs: vec![start_index, TermIndex(0).to_symbol_index()],
            prio: DEFAULT_PRIORITY,
            assoc: Associativity::None,
        });
        nonterminals[NonTermIndex(0)].productions.push(ProdIndex(0));

        for rule in &self.rules {
            let idx = ProdIndex(productions.len());
            let nonterminal = NonTermIndex(
                symbol_by_name[&rule.lhs].0 - term_len,
            );

            let mut rhs = Vec::with_capacity(rule.rhs.len());
            for name in &rule.rhs {
                let &symbol =
                    symbol_by_name.get(name).ok_or_else(|| {
                        Error::Grammar(format!(
                            "undefined symbol \"{name}\" in production \"{}\"",
                            rule.lhs
                        ))
                    })?;
                if name == STOP || name == AUG {
                    return Err(Error::Grammar(format!(
                        "reserved symbol \"{name}\" in production \"{}\"",
                        rule.lhs
                    )));
                }
                rhs.push(symbol);
            }
            // A sole EMPTY means an empty production; EMPTY combined with
            // other symbols is an error.
            let empty_symbol = TermIndex(1).to_symbol_index();
            if rhs.contains(&empty_symbol) {
                if rhs.len() > 1 {
                    return Err(Error::Grammar(format!(
                        "EMPTY mixed with other symbols in a production of \"{}\"",
                        rule.lhs
                    )));
                }
                rhs.clear();
            }

            let prio = rule.prio.unwrap_or_else(|| {
                rhs.iter()
                    .rev()
                    .find(|&&s| s.0 < term_len)
                    .map(|&s| terminals[TermIndex(s.0)].prio)
                    .unwrap_or(DEFAULT_PRIORITY)
            });

            let ntidx = nonterminals[nonterminal].productions.len();
            nonterminals[nonterminal].productions.push(idx);
            productions.push(Production {
                idx,
                nonterminal,
                ntidx,
                rhs,
                prio,
                assoc: rule.assoc,
            });
        }

        Ok(Grammar {
            terminals,
            nonterminals,
            productions,
            start_index,
            layout: self.layout.map(Box::new),
            symbol_by_name,
        })
    }
}
