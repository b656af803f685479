//! Scannerless token recognition.
//!
//! There is no separate tokenizer pass: the parser asks for the next tokens
//! at the current position giving the set of terminals its state expects,
//! and the lexer tries each terminal's recognizer against the input. When a
//! layout sub-grammar is configured the layout is consumed first, so every
//! recognition attempt at a position sees the same post-layout position.

use std::ops::Range;

use crate::grammar::{Grammar, Recognizer};
use crate::index::TermIndex;
use crate::parser::LRParser;
use crate::{builder::SliceBuilder, log};

#[derive(Debug, Clone)]
pub struct Token<'i> {
    pub kind: TermIndex,
    pub value: &'i str,
    pub span: Range<usize>,
}

pub struct Lexer<'g> {
    grammar: &'g Grammar,
    /// Parser for the layout sub-grammar, run in partial mode before token
    /// recognition.
    layout_parser: Option<Box<LRParser<'g>>>,
}

impl<'g> Lexer<'g> {
    pub fn new(
        grammar: &'g Grammar,
        layout_parser: Option<LRParser<'g>>,
    ) -> Self {
        Self {
            grammar,
            layout_parser: layout_parser.map(Box::new),
        }
    }

    /// Position after any layout (whitespace/comments) at `position`. The
    /// layout match may be empty; a failing layout parse skips nothing.
    pub fn skip_layout(&self, input: &str, position: usize) -> usize {
        let Some(layout_parser) = &self.layout_parser else {
            return position;
        };
        let mut builder = SliceBuilder::new(input);
        match layout_parser.parse_with_builder(input, position, &mut builder)
        {
            Ok((layout, end)) => {
                if !layout.is_empty() {
                    log!("Skipping layout: {layout:?}");
                }
                end
            }
            Err(_) => position,
        }
    }

    /// All maximal matches at `position` for the expected terminals, after
    /// skipping layout. Returns the post-layout position and the tokens in
    /// disambiguation order: longest match first, string recognizers before
    /// regex ones, declaration order among equals. Deterministic callers
    /// take the first token; GLR explores all of them.
    pub fn next_tokens<'i>(
        &self,
        input: &'i str,
        position: usize,
        expected: &[TermIndex],
    ) -> (usize, Vec<Token<'i>>) {
        let position = self.skip_layout(input, position);

        let mut matches: Vec<(TermIndex, usize)> = expected
            .iter()
            .filter_map(|&term| {
                self.recognize(input, position, term)
                    .map(|length| (term, length))
            })
            .collect();

        let max_length =
            matches.iter().map(|&(_, length)| length).max().unwrap_or(0);
        matches.retain(|&(_, length)| length == max_length);

        // String terminals win over regex/custom ones of the same length.
        let is_string = |term: TermIndex| {
            matches!(
                self.grammar.terminals[term].recognizer,
                Recognizer::StrMatch(_)
            )
        };
        if matches.iter().any(|&(term, _)| is_string(term)) {
            matches.retain(|&(term, _)| is_string(term));
        }
        matches.sort_by_key(|&(term, _)| term);

        // EMPTY always matches with zero length when expected.
        if max_length > 0 && expected.contains(&Grammar::EMPTY_TERM) {
            matches.push((Grammar::EMPTY_TERM, 0));
        }

        let tokens = matches
            .into_iter()
            .map(|(kind, length)| Token {
                kind,
                value: &input[position..position + length],
                span: position..position + length,
            })
            .collect();
        (position, tokens)
    }

    fn recognize(
        &self,
        input: &str,
        position: usize,
        term: TermIndex,
    ) -> Option<usize> {
        let length = match &self.grammar.terminals[term].recognizer {
            Recognizer::Stop => (position == input.len()).then_some(0),
            Recognizer::Empty => Some(0),
            Recognizer::StrMatch(s) => {
                input[position..].starts_with(s).then(|| s.len())
            }
            Recognizer::RegexMatch(regex) => {
                regex.find(&input[position..]).map(|m| m.end())
            }
            Recognizer::Custom(recognize) => recognize(input, position),
        };
        log!(
            "    Recognizing {:?} -- {}",
            self.grammar.terminals[term].name,
            match length {
                Some(length) =>
                    format!("recognized {:?}", &input[position..position + length]),
                None => "not recognized".to_string(),
            }
        );
        length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    fn keyword_grammar() -> Grammar {
        GrammarBuilder::new()
            .term_str("if", "if")
            .term_regex("id", "[a-z]+")
            .rule("S", &["if", "id"])
            .rule("S", &["id"])
            .start("S")
            .build()
            .unwrap()
    }

    fn expected(grammar: &Grammar, names: &[&str]) -> Vec<TermIndex> {
        names
            .iter()
            .map(|name| {
                grammar
                    .symbol_to_term(grammar.symbol_index(name).unwrap())
            })
            .collect()
    }

    #[test]
    fn string_terminal_beats_regex_of_same_length() {
        let grammar = keyword_grammar();
        let lexer = Lexer::new(&grammar, None);
        let (_, tokens) =
            lexer.next_tokens("if", 0, &expected(&grammar, &["if", "id"]));
        assert_eq!(tokens.len(), 1);
        assert_eq!(grammar.terminals[tokens[0].kind].name, "if");
        assert_eq!(tokens[0].value, "if");
    }

    #[test]
    fn longest_match_wins() {
        let grammar = keyword_grammar();
        let lexer = Lexer::new(&grammar, None);
        // "ifx" is a longer identifier than the "if" keyword prefix.
        let (_, tokens) =
            lexer.next_tokens("ifx", 0, &expected(&grammar, &["if", "id"]));
        assert_eq!(tokens.len(), 1);
        assert_eq!(grammar.terminals[tokens[0].kind].name, "id");
        assert_eq!(tokens[0].value, "ifx");
    }

    #[test]
    fn stop_matches_only_at_end() {
        let grammar = keyword_grammar();
        let lexer = Lexer::new(&grammar, None);
        let (_, tokens) =
            lexer.next_tokens("if", 0, &expected(&grammar, &["STOP"]));
        assert!(tokens.is_empty());
        let (_, tokens) =
            lexer.next_tokens("if", 2, &expected(&grammar, &["STOP"]));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, Grammar::STOP_TERM);
        assert_eq!(tokens[0].span, 2..2);
    }

    #[test]
    fn custom_recognizer_is_consulted() {
        fn even_digits(input: &str, position: usize) -> Option<usize> {
            let length = input[position..]
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();
            (length > 0 && length % 2 == 0).then_some(length)
        }
        let grammar = GrammarBuilder::new()
            .term_custom("pairs", even_digits)
            .rule("S", &["pairs"])
            .start("S")
            .build()
            .unwrap();
        let lexer = Lexer::new(&grammar, None);
        let (_, tokens) =
            lexer.next_tokens("1234x", 0, &expected(&grammar, &["pairs"]));
        assert_eq!(tokens[0].value, "1234");
        let (_, tokens) =
            lexer.next_tokens("123x", 0, &expected(&grammar, &["pairs"]));
        assert!(tokens.is_empty());
    }
}
