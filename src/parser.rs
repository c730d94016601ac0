//! Parsing entry points.
//!
//! A [`Parser`] couples a compiled [`Grammar`] with an [`EventHandler`]:
//! input text is checked against the alphabet, run through the CYK chart,
//! and the resulting tree is walked to build the handler's output.
//! A [`ParserChain`] tries several parsers in turn and reports the most
//! informative failure when none of them matches.

use crate::chart::{Chart, ChartError, Coverage, ParseTree};
use crate::grammar::{Grammar, GrammarConfig, GrammarError};
use crate::handler::{DebugMode, EventHandler, HandlerError, ParseState};
use crate::intern::{RuleIndex, EOF_SIGN};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Parser error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty input")]
    EmptyInput,
    #[error("{grammar}: character {character:?} at position {position} is not part of the grammar")]
    UnknownCharacter {
        grammar: String,
        character: char,
        position: usize,
    },
    #[error("{grammar}: could not parse '{input}', parsing failed after '{parsed}'")]
    NoDerivation {
        grammar: String,
        input: String,
        parsed: String,
    },
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("no parser matched '{input}': {diagnostic}")]
    NoParserMatched { input: String, diagnostic: String },
    #[error("internal error: {0}")]
    Internal(#[from] ChartError),
}

impl ParseError {
    /// Whether the input simply does not belong to the language, as opposed
    /// to a handler rejecting a grammatical input.
    pub fn is_parsing_failure(&self) -> bool {
        matches!(
            self,
            ParseError::EmptyInput
                | ParseError::UnknownCharacter { .. }
                | ParseError::NoDerivation { .. }
                | ParseError::NoParserMatched { .. }
        )
    }

    /// Rank used by [`ParserChain`] to keep the most useful diagnostic.
    fn informativeness(&self) -> (u8, usize) {
        match self {
            ParseError::Handler(_) => (3, 0),
            ParseError::NoDerivation { parsed, .. } => (2, parsed.chars().count()),
            ParseError::UnknownCharacter { position, .. } => (1, *position),
            _ => (0, 0),
        }
    }
}

/// Derive a parse tree for `text`, accepting the longest start rule prefix.
pub fn parse_tree(grammar: &Grammar, text: &str) -> Result<ParseTree, ParseError> {
    parse_tree_with(grammar, text, Coverage::LongestPrefix)
}

/// Derive a parse tree for `text`.
///
/// Fails fast, before any chart work, when a character is outside the
/// grammar's alphabet. When no span accepted by `coverage` holds the start
/// rule, the error carries the longest parsed prefix.
pub fn parse_tree_with(
    grammar: &Grammar,
    text: &str,
    coverage: Coverage,
) -> Result<ParseTree, ParseError> {
    if text.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let mut input: Vec<char> = Vec::with_capacity(text.len() + 1);
    for (position, c) in text.chars().enumerate() {
        if c == EOF_SIGN || !grammar.knows_char(c) {
            return Err(ParseError::UnknownCharacter {
                grammar: grammar.name().to_string(),
                character: c,
                position,
            });
        }
        input.push(c);
    }
    if grammar.uses_eof() {
        input.push(EOF_SIGN);
    }

    let chart = Chart::fill(grammar, &input)?;
    match chart.tree(coverage)? {
        Some(tree) if tree.complete => Ok(tree),
        partial => Err(ParseError::NoDerivation {
            grammar: grammar.name().to_string(),
            input: text.to_string(),
            parsed: partial.map(|tree| tree.text()).unwrap_or_default(),
        }),
    }
}

/// Parser configuration.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub grammar: GrammarConfig,
    /// Event logging while trees are walked.
    pub debug: DebugMode,
    /// Which start rule spans count as a parse.
    pub coverage: Coverage,
}

/// A compiled grammar together with the handler that turns its trees into
/// `S::Output`.
pub struct Parser<S: ParseState> {
    grammar: Arc<Grammar>,
    handler: EventHandler<S>,
    config: ParserConfig,
}

impl<S: ParseState> std::fmt::Debug for Parser<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("grammar", &self.grammar.name())
            .field("handler", &self.handler)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: ParseState> Parser<S> {
    /// Compile `source` with the default configuration.
    pub fn new(source: &str, handler: EventHandler<S>) -> Result<Self, GrammarError> {
        ParserBuilder::new(source).build(handler)
    }

    /// Attach a handler to an already compiled grammar.
    ///
    /// Every event the handler registered must belong to a rule of the grammar.
    pub fn with_grammar(
        grammar: Arc<Grammar>,
        mut handler: EventHandler<S>,
        config: ParserConfig,
    ) -> Result<Self, GrammarError> {
        handler.sanity_check(&grammar)?;
        handler.set_debug(config.debug);
        Ok(Parser {
            grammar,
            handler,
            config,
        })
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn handler(&self) -> &EventHandler<S> {
        &self.handler
    }

    /// Parse `text`, failing on text outside the language.
    pub fn parse(&self, text: &str) -> Result<S::Output, ParseError> {
        self.parse_with(text, true)?
            .ok_or(ParseError::Handler(HandlerError::NoResult))
    }

    /// Parse `text`.
    ///
    /// With `throw_on_failure` unset, text outside the language yields
    /// `Ok(None)`. Handler errors are returned either way.
    #[instrument(level = "trace", skip(self), fields(grammar = %self.grammar.name()))]
    pub fn parse_with(
        &self,
        text: &str,
        throw_on_failure: bool,
    ) -> Result<Option<S::Output>, ParseError> {
        let tree = match parse_tree_with(&self.grammar, text, self.config.coverage) {
            Ok(tree) => tree,
            Err(err) if err.is_parsing_failure() && !throw_on_failure => {
                debug!(%err, "no parse");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        trace!(nodes = tree.root.size(), parsed = %tree.text(), "parse tree built");
        let mut state = S::default();
        self.handler.dispatch(&self.grammar, &tree.root, &mut state)?;
        match state.finish() {
            Some(output) => Ok(Some(output)),
            None => Err(HandlerError::NoResult.into()),
        }
    }

    /// The parse tree of `text`, without running the handler.
    pub fn parse_tree(&self, text: &str) -> Result<ParseTree, ParseError> {
        parse_tree_with(&self.grammar, text, self.config.coverage)
    }
}

/// Builder for parsers.
#[derive(Debug, Clone)]
pub struct ParserBuilder<'a> {
    source: &'a str,
    config: ParserConfig,
}

impl<'a> ParserBuilder<'a> {
    pub fn new(source: &'a str) -> Self {
        ParserBuilder {
            source,
            config: ParserConfig::default(),
        }
    }

    pub fn config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.config.grammar.quote = quote;
        self
    }

    pub fn max_rule_index(mut self, max: RuleIndex) -> Self {
        self.config.grammar.max_rule_index = max;
        self
    }

    pub fn debug(mut self, debug: DebugMode) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn coverage(mut self, coverage: Coverage) -> Self {
        self.config.coverage = coverage;
        self
    }

    pub fn build<S: ParseState>(self, handler: EventHandler<S>) -> Result<Parser<S>, GrammarError> {
        let grammar = Grammar::compile_with(self.source, &self.config.grammar)?;
        Parser::with_grammar(Arc::new(grammar), handler, self.config)
    }
}

/// Anything that turns text into a value, used to compose parsers.
pub trait TextParser {
    type Output;

    fn name(&self) -> &str;

    /// Parse `text`, reporting every failure as an error.
    fn try_parse(&self, text: &str) -> Result<Self::Output, ParseError>;
}

impl<S: ParseState> TextParser for Parser<S> {
    type Output = S::Output;

    fn name(&self) -> &str {
        self.grammar.name()
    }

    fn try_parse(&self, text: &str) -> Result<S::Output, ParseError> {
        self.parse(text)
    }
}

type BoxedParser<O> = Box<dyn TextParser<Output = O> + Send + Sync>;

/// Ordered fallback over several parsers with the same output type.
pub struct ParserChain<O> {
    parsers: Vec<BoxedParser<O>>,
}

impl<O> Default for ParserChain<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> std::fmt::Debug for ParserChain<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.parsers.iter().map(|p| p.name()))
            .finish()
    }
}

impl<O> ParserChain<O> {
    pub fn new() -> Self {
        ParserChain {
            parsers: Vec::new(),
        }
    }

    pub fn with<P>(mut self, parser: P) -> Self
    where
        P: TextParser<Output = O> + Send + Sync + 'static,
    {
        self.push(parser);
        self
    }

    pub fn push<P>(&mut self, parser: P)
    where
        P: TextParser<Output = O> + Send + Sync + 'static,
    {
        self.parsers.push(Box::new(parser));
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Names of the parsers, in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// First successful result of the parsers in order.
    ///
    /// Every failure, including handler errors, moves on to the next
    /// parser. If all fail, the error carries the most informative
    /// diagnostic seen.
    pub fn parse(&self, text: &str) -> Result<O, ParseError> {
        let mut best: Option<ParseError> = None;
        for parser in &self.parsers {
            match parser.try_parse(text) {
                Ok(output) => return Ok(output),
                Err(err) => {
                    debug!(parser = parser.name(), %err, "parser failed, trying next");
                    let better = match &best {
                        Some(current) => err.informativeness() > current.informativeness(),
                        None => true,
                    };
                    if better {
                        best = Some(err);
                    }
                }
            }
        }

        Err(ParseError::NoParserMatched {
            input: text.to_string(),
            diagnostic: best
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no parsers configured".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::node_number;

    const SUM: &str = "
        grammar Sum;
        sum : number | number '+' sum ;
        number : digit | digit number ;
        digit : '0' | '1' | '2' | '3' | '4' | '5' | '6' | '7' | '8' | '9' ;
    ";

    #[derive(Default)]
    struct Total {
        total: u64,
        depth: usize,
        done: bool,
    }

    impl ParseState for Total {
        type Output = u64;

        fn finish(self) -> Option<u64> {
            self.done.then_some(self.total)
        }
    }

    fn sum_handler() -> EventHandler<Total> {
        EventHandler::new()
            .on_pre("number", |state: &mut Total, node| {
                // number : digit number, only the outermost counts
                if state.depth == 0 {
                    state.total += node_number::<u64>(node)?;
                }
                state.depth += 1;
                Ok(())
            })
            .on_post("number", |state: &mut Total, _| {
                state.depth -= 1;
                Ok(())
            })
            .on_post("sum", |state: &mut Total, _| {
                state.done = true;
                Ok(())
            })
    }

    #[test]
    fn test_parse_sum() {
        let parser = Parser::new(SUM, sum_handler()).unwrap();
        assert_eq!(parser.parse("12").unwrap(), 12);
        assert_eq!(parser.parse("1+2+30").unwrap(), 33);
    }

    #[test]
    fn test_unknown_character_fails_fast() {
        let parser = Parser::new(SUM, sum_handler()).unwrap();
        assert_eq!(
            parser.parse("1+x"),
            Err(ParseError::UnknownCharacter {
                grammar: "Sum".into(),
                character: 'x',
                position: 2
            })
        );
        assert_eq!(parser.parse_with("1+x", false), Ok(None));
    }

    #[test]
    fn test_no_derivation_reports_prefix() {
        let parser = Parser::new(SUM, sum_handler()).unwrap();
        match parser.parse("+12") {
            Err(ParseError::NoDerivation { parsed, input, .. }) => {
                assert_eq!(input, "+12");
                assert_eq!(parsed, "+12");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parser.parse_with("+12", false), Ok(None));
        assert_eq!(parser.parse(""), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_trailing_input_after_start_rule() {
        let parser = Parser::new(SUM, sum_handler()).unwrap();
        assert_eq!(parser.parse("12+"), Ok(12));
        assert_eq!(parser.parse("1+2++"), Ok(3));
        assert_eq!(parser.parse_tree("12+").unwrap().text(), "12");

        let strict = ParserBuilder::new(SUM)
            .coverage(Coverage::WholeInput)
            .build(sum_handler())
            .unwrap();
        match strict.parse("12+") {
            Err(ParseError::NoDerivation { parsed, input, .. }) => {
                assert_eq!(input, "12+");
                assert_eq!(parsed, "12");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(strict.parse_with("12+", false), Ok(None));
        assert_eq!(strict.parse("1+2"), Ok(3));
    }

    #[test]
    fn test_eof_sentinel() {
        let grammar = Grammar::compile("grammar G; s : a EOF ; a : 'x' | 'x' a ;").unwrap();
        let tree = parse_tree(&grammar, "xxx").unwrap();
        assert_eq!(tree.text(), "xxx");
        assert!(matches!(
            parse_tree(&grammar, "x\u{1}"),
            Err(ParseError::UnknownCharacter { position: 1, .. })
        ));
    }

    #[test]
    fn test_builder_rejects_unknown_event() {
        let handler = EventHandler::<Total>::new().on_pre("product", |_, _| Ok(()));
        let err = ParserBuilder::new(SUM).build(handler).unwrap_err();
        assert!(matches!(err, GrammarError::UnknownEvent { .. }));
    }

    #[test]
    fn test_builder_options() {
        let parser = ParserBuilder::new("grammar Q; s : \"a\" | \"b\" s ;")
            .quote('"')
            .debug(DebugMode::Registered)
            .build(EventHandler::<Total>::new().on_post("s", |state, _| {
                state.done = true;
                Ok(())
            }))
            .unwrap();
        assert_eq!(parser.config().grammar.quote, '"');
        assert_eq!(parser.handler().debug(), DebugMode::Registered);
        assert_eq!(parser.parse("bba"), Ok(0));
    }

    #[test]
    fn test_missing_result_is_an_error() {
        let parser = Parser::new(SUM, EventHandler::<Total>::new()).unwrap();
        assert_eq!(
            parser.parse_with("1", false),
            Err(ParseError::Handler(HandlerError::NoResult))
        );
    }

    #[test]
    fn test_chain_prefers_informative_diagnostic() {
        let digits = Parser::new(SUM, sum_handler()).unwrap();
        let letters = Parser::new(
            "grammar Letters; word : 'a' | 'a' word ;",
            EventHandler::<Total>::new(),
        )
        .unwrap();
        let chain = ParserChain::new().with(letters).with(digits);
        assert_eq!(chain.names(), vec!["Letters", "Sum"]);

        assert_eq!(chain.parse("4+5"), Ok(9));
        match chain.parse("+4") {
            Err(ParseError::NoParserMatched { diagnostic, .. }) => {
                assert!(diagnostic.starts_with("Sum:"), "{}", diagnostic)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(chain.parse("zzz").is_err());
    }

    /// Like `sum_handler`, but rejects totals above ten.
    fn small_sum_handler() -> EventHandler<Total> {
        sum_handler().on_post("sum", |state: &mut Total, _| {
            if state.total > 10 {
                return Err(HandlerError::invalid("total above ten"));
            }
            state.done = true;
            Ok(())
        })
    }

    #[test]
    fn test_chain_moves_past_handler_errors() {
        let small = Parser::new(SUM, small_sum_handler()).unwrap();
        assert_eq!(
            small.parse("40+5"),
            Err(ParseError::Handler(HandlerError::invalid("total above ten")))
        );

        let chain = ParserChain::new()
            .with(Parser::new(SUM, small_sum_handler()).unwrap())
            .with(Parser::new(SUM, sum_handler()).unwrap());
        assert_eq!(chain.parse("4+5"), Ok(9));
        assert_eq!(chain.parse("40+5"), Ok(45));

        let letters = Parser::new(
            "grammar Letters; word : 'a' | 'a' word ;",
            EventHandler::<Total>::new(),
        )
        .unwrap();
        let chain = ParserChain::new().with(small).with(letters);
        assert_eq!(
            chain.parse("40+5"),
            Err(ParseError::NoParserMatched {
                input: "40+5".into(),
                diagnostic: "total above ten".into(),
            })
        );
    }

    #[test]
    fn test_empty_chain() {
        let chain: ParserChain<u64> = ParserChain::new();
        assert!(chain.is_empty());
        assert!(matches!(
            chain.parse("1"),
            Err(ParseError::NoParserMatched { .. })
        ));
    }
}
