//! End-to-end tests of grammar compilation, chart parsing and event dispatch.

use lipid_grammar::{
    Coverage, EventHandler, Grammar, ParseError, ParseState, Parser, ParserConfig, Visit,
};
use std::sync::Arc;

/// Records every event of the grammar, in firing order.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl ParseState for Recorder {
    type Output = Vec<String>;

    fn finish(self) -> Option<Vec<String>> {
        Some(self.events)
    }
}

fn recording_parser(source: &str) -> Parser<Recorder> {
    recording_parser_with(source, ParserConfig::default())
}

fn recording_parser_with(source: &str, config: ParserConfig) -> Parser<Recorder> {
    let grammar = Grammar::compile(source).unwrap();
    let mut handler = EventHandler::<Recorder>::new();
    let names: Vec<String> = grammar.rule_names().map(String::from).collect();
    for name in names {
        for suffix in ["_pre_event", "_post_event"] {
            let event = format!("{}{}", name, suffix);
            let recorded = event.clone();
            handler.register(event, move |state: &mut Recorder, _| {
                state.events.push(recorded.clone());
                Ok(())
            });
        }
    }
    Parser::with_grammar(Arc::new(grammar), handler, config).unwrap()
}

const FATTY_ACID: &str = "
    grammar FattyAcid;
    lipid : fa ;
    fa : carbon db ;
    carbon : '1' | '2' ;
    db : ':' num ;
    num : '0' | '1' ;
";

#[test]
fn test_event_order() {
    let parser = recording_parser(FATTY_ACID);
    let events = parser.parse("1:0").unwrap();
    assert_eq!(
        events,
        vec![
            "lipid_pre_event",
            "fa_pre_event",
            "carbon_pre_event",
            "carbon_post_event",
            "db_pre_event",
            "num_pre_event",
            "num_post_event",
            "db_post_event",
            "fa_post_event",
            "lipid_post_event",
        ]
    );
}

#[test]
fn test_start_rule_brackets_every_parse() {
    let parser = recording_parser(FATTY_ACID);
    for input in ["1:0", "2:1", "1:1"] {
        let events = parser.parse(input).unwrap();
        assert_eq!(events.first().map(String::as_str), Some("lipid_pre_event"));
        assert_eq!(events.last().map(String::as_str), Some("lipid_post_event"));
        assert_eq!(events.iter().filter(|e| e.starts_with("lipid_")).count(), 2);
    }
}

#[test]
fn test_unknown_character() {
    let parser = recording_parser(FATTY_ACID);
    assert!(matches!(
        parser.parse_with("1:x", true),
        Err(ParseError::UnknownCharacter { character: 'x', position: 2, .. })
    ));
    assert_eq!(parser.parse_with("1:x", false), Ok(None));
}

#[test]
fn test_three_deep_chain() {
    let parser = recording_parser("grammar Chain; a : b ; b : c ; c : 'x' ;");
    assert_eq!(
        parser.parse("x").unwrap(),
        vec![
            "a_pre_event",
            "b_pre_event",
            "c_pre_event",
            "c_post_event",
            "b_post_event",
            "a_post_event",
        ]
    );
}

#[test]
fn test_ambiguous_grammar_is_deterministic() {
    let source = "grammar Ambiguous; s : s s | 'a' ;";
    let first = recording_parser(source);
    let second = recording_parser(source);

    let reference = first.parse_tree("aaaaa").unwrap();
    for _ in 0..10 {
        assert_eq!(first.parse_tree("aaaaa").unwrap(), reference);
        assert_eq!(second.parse_tree("aaaaa").unwrap(), reference);
    }
}

const SMALL_SUM: &str =
    "grammar Sum; sum : number | number '+' sum ; number : digit | digit number ; digit : '1' | '2' | '3' ;";

#[test]
fn test_start_rule_prefix_parses() {
    let parser = recording_parser(FATTY_ACID);
    let events = parser.parse("1:01").unwrap();
    assert_eq!(events, parser.parse("1:0").unwrap());
    assert_eq!(parser.parse_tree("1:0:").unwrap().text(), "1:0");

    let parser = recording_parser(SMALL_SUM);
    for (input, parsed) in [("12+", "12"), ("1++2", "1"), ("3+21+", "3+21")] {
        assert_eq!(parser.parse_tree(input).unwrap().text(), parsed, "{}", input);
    }
}

#[test]
fn test_partial_parse_diagnostic_is_input_substring() {
    let config = ParserConfig {
        coverage: Coverage::WholeInput,
        ..Default::default()
    };
    let parser = recording_parser_with(SMALL_SUM, config);
    for input in ["12+", "1++2", "3+21+", "+1"] {
        match parser.parse(input) {
            Err(ParseError::NoDerivation { parsed, .. }) => {
                assert!(!parsed.is_empty(), "{}", input);
                assert!(input.starts_with(&parsed), "{} / {}", input, parsed);
            }
            other => panic!("{}: unexpected {:?}", input, other),
        }
    }

    let parser = recording_parser(FATTY_ACID);
    assert!(matches!(
        parser.parse(":1"),
        Err(ParseError::NoDerivation { .. })
    ));
}

#[test]
fn test_eof_rule() {
    let parser = recording_parser("grammar Line; line : word EOF ; word : 'a' | 'a' word ;");
    let events = parser.parse("aa").unwrap();
    assert_eq!(events.first().map(String::as_str), Some("line_pre_event"));
    assert!(!events.iter().any(|e| e.starts_with("EOF")));
    assert_eq!(parser.parse_tree("aa").unwrap().text(), "aa");
}

#[test]
fn test_events_follow_visit_names() {
    let grammar = Grammar::compile(FATTY_ACID).unwrap();
    let fa = grammar.rules().get("fa").unwrap();
    assert_eq!(grammar.event_name(fa, Visit::Pre), Some("fa_pre_event"));
    assert_eq!(grammar.event_name(fa, Visit::Post), Some("fa_post_event"));
}
