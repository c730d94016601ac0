//! Grammar compiler.
//!
//! Turns a textual grammar into the tables the CYK chart works with:
//!
//! - **terminals**: character -> rules producing exactly that character
//! - **compositions**: `(left, right)` rule pair -> rules producing the concatenation
//! - **right pairs**: per left rule, a [`Bitfield`] of rules that can follow it
//! - **substitutions**: for `(base, top)` connected by unary productions,
//!   the intermediate rules to re-insert when the tree is built
//!
//! Productions with more than two symbols are folded from the right into
//! fresh binary rules. Multi-character terminals become a left-leaning chain
//! of single-character rules. Unary productions never reach the chart as
//! separate steps: every table entry is expanded with all rules reachable
//! through chains of unary productions (see [`Production`]).

pub(crate) mod text;

use crate::bitfield::{Bitfield, BitfieldError};
use crate::intern::{
    rule_key, split_rule_key, RuleIndex, RuleIndexExhausted, RuleKey, RuleTable, EOF_RULE,
    EOF_RULE_NAME, EOF_SIGN, START_RULE,
};
use crate::tree::Visit;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use text::{
    de_escape, is_rule_name, is_terminal, split_quoted, split_rules, tokenize, RULE_ASSIGNMENT,
    RULE_SEPARATOR,
};
use thiserror::Error;
use tracing::debug;

const PRE_EVENT_SUFFIX: &str = "_pre_event";
const POST_EVENT_SUFFIX: &str = "_post_event";

/// Errors raised while compiling a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("grammar must start with a 'grammar <Name>' declaration, found '{found}'")]
    MissingHeader { found: String },
    #[error("unterminated block comment opened on line {line}")]
    UnterminatedComment { line: usize },
    #[error("unterminated quote opened on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("malformed rule '{rule}': {reason}")]
    MalformedRule { rule: String, reason: String },
    #[error("invalid rule name '{name}'")]
    InvalidRuleName { name: String },
    #[error("rule name '{name}' is reserved")]
    ReservedRuleName { name: String },
    #[error("rule '{rule}' has an empty alternative")]
    EmptyAlternative { rule: String },
    #[error("rule '{rule}' contains an empty terminal")]
    EmptyTerminal { rule: String },
    #[error("rule '{rule}' is not allowed to refer solely to itself")]
    SelfReferentialRule { rule: String },
    #[error("rule '{rule}' is used by '{used_by}' but never defined")]
    UndefinedRule { rule: String, used_by: String },
    #[error(transparent)]
    RuleIndexExhausted(#[from] RuleIndexExhausted),
    #[error("event '{event}' does not belong to any rule of grammar {grammar}")]
    UnknownEvent { event: String, grammar: String },
    #[error("internal error: {0}")]
    Internal(#[from] BitfieldError),
}

/// Options for grammar compilation.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    /// Character delimiting terminal literals.
    pub quote: char,
    /// Highest rule index the compiler may allocate.
    pub max_rule_index: RuleIndex,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            quote: '\'',
            max_rule_index: RuleIndex::MAX,
        }
    }
}

/// A rule reachable in a chart cell, together with the rule that was
/// actually produced there.
///
/// `base` is the left-hand side of the terminal or binary production that
/// matched; `rule` is `base` itself or an ancestor of it through unary
/// productions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Production {
    pub rule: RuleIndex,
    pub base: RuleIndex,
}

#[derive(Clone, Debug)]
struct EventNames {
    pre: String,
    post: String,
}

/// A compiled grammar. Immutable and shareable across parses and threads.
#[derive(Clone, Debug)]
pub struct Grammar {
    name: String,
    rules: RuleTable,
    terminals: FxHashMap<char, Vec<Production>>,
    compositions: FxHashMap<RuleKey, Vec<Production>>,
    right_pairs: Vec<Option<Bitfield>>,
    substitutions: FxHashMap<RuleKey, Vec<RuleIndex>>,
    events: Vec<Option<EventNames>>,
    uses_eof: bool,
}

impl Grammar {
    /// Compile a grammar with the default configuration.
    pub fn compile(source: &str) -> Result<Self, GrammarError> {
        Self::compile_with(source, &GrammarConfig::default())
    }

    /// Compile a grammar.
    pub fn compile_with(source: &str, config: &GrammarConfig) -> Result<Self, GrammarError> {
        let rules = split_rules(source, config.quote)?;
        let (header, body) = match rules.split_first() {
            Some(split) => split,
            None => {
                return Err(GrammarError::MissingHeader {
                    found: String::new(),
                })
            }
        };
        let name = parse_header(header)?;
        if body.is_empty() {
            return Err(GrammarError::MalformedRule {
                rule: name,
                reason: "grammar defines no rules".to_string(),
            });
        }

        let mut compiler = Compiler::new(config);
        for rule in body {
            compiler.compile_rule(rule)?;
        }
        compiler.finish(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Name of a rule, `None` for synthetic rules.
    pub fn rule_name(&self, rule: RuleIndex) -> Option<&str> {
        self.rules.name(rule)
    }

    /// Names of all rules declared in the grammar source.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.named().map(|(_, name)| name)
    }

    /// Number of allocated rule indices, named and synthetic.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether the grammar refers to `EOF`, so inputs get a sentinel appended.
    pub fn uses_eof(&self) -> bool {
        self.uses_eof
    }

    /// Whether tree nodes for this rule emit visitation events.
    pub fn fires_events(&self, rule: RuleIndex) -> bool {
        matches!(self.events.get(rule as usize), Some(Some(_)))
    }

    /// `<rule>_pre_event` or `<rule>_post_event` for a named rule.
    pub fn event_name(&self, rule: RuleIndex, visit: Visit) -> Option<&str> {
        self.events
            .get(rule as usize)
            .and_then(Option::as_ref)
            .map(|names| match visit {
                Visit::Pre => names.pre.as_str(),
                Visit::Post => names.post.as_str(),
            })
    }

    /// Whether the character is part of the terminal alphabet.
    pub fn knows_char(&self, c: char) -> bool {
        self.terminals.contains_key(&c)
    }

    /// Rules that can produce the single character `c`.
    pub fn terminal_productions(&self, c: char) -> &[Production] {
        self.terminals.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules that can produce a `left` derivation followed by a `right` one.
    pub fn compositions(&self, left: RuleIndex, right: RuleIndex) -> &[Production] {
        self.compositions
            .get(&rule_key(left, right))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Right partners of `left`, if it starts any binary production.
    #[inline]
    pub fn right_partners(&self, left: RuleIndex) -> Option<&Bitfield> {
        self.right_pairs.get(left as usize).and_then(Option::as_ref)
    }

    /// Intermediate rules between `top` and `base`, outermost first.
    pub fn substitution(&self, base: RuleIndex, top: RuleIndex) -> &[RuleIndex] {
        self.substitutions
            .get(&rule_key(base, top))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check that every event name belongs to a rule of this grammar.
    pub fn check_events<'a, I>(&self, events: I) -> Result<(), GrammarError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for event in events {
            let rule = event
                .strip_suffix(PRE_EVENT_SUFFIX)
                .or_else(|| event.strip_suffix(POST_EVENT_SUFFIX))
                .and_then(|name| self.rules.get(name))
                .filter(|&index| self.rules.is_named(index));
            if rule.is_none() {
                return Err(GrammarError::UnknownEvent {
                    event: event.to_string(),
                    grammar: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn parse_header(header: &str) -> Result<String, GrammarError> {
    match tokenize(header, '\0')[..] {
        ["grammar", name] if is_rule_name(name) => Ok(name.to_string()),
        _ => Err(GrammarError::MissingHeader {
            found: header.to_string(),
        }),
    }
}

/// Mutable state while the rules of one grammar are read.
struct Compiler<'c> {
    config: &'c GrammarConfig,
    rules: RuleTable,
    /// character -> rules with that character as their whole right-hand side
    direct_terminals: FxHashMap<char, Vec<RuleIndex>>,
    /// rule pair -> rules with exactly that pair as right-hand side
    direct_pairs: FxHashMap<RuleKey, Vec<RuleIndex>>,
    /// child -> rules with that child as their whole right-hand side
    chain_parents: FxHashMap<RuleIndex, Vec<RuleIndex>>,
    /// terminal literal (or prefix of one) -> synthetic rule producing it
    terminal_rules: FxHashMap<String, RuleIndex>,
    /// folded tail pair -> synthetic rule producing it
    folded: FxHashMap<RuleKey, RuleIndex>,
    defined: FxHashSet<RuleIndex>,
    used_by: FxHashMap<RuleIndex, RuleIndex>,
    uses_eof: bool,
}

impl<'c> Compiler<'c> {
    fn new(config: &'c GrammarConfig) -> Self {
        Compiler {
            config,
            rules: RuleTable::new(),
            direct_terminals: FxHashMap::default(),
            direct_pairs: FxHashMap::default(),
            chain_parents: FxHashMap::default(),
            terminal_rules: FxHashMap::default(),
            folded: FxHashMap::default(),
            defined: FxHashSet::default(),
            used_by: FxHashMap::default(),
            uses_eof: false,
        }
    }

    fn quote(&self) -> char {
        self.config.quote
    }

    fn compile_rule(&mut self, text: &str) -> Result<(), GrammarError> {
        let parts = split_quoted(text, RULE_ASSIGNMENT, self.quote());
        let (lhs, rhs) = match parts[..] {
            [lhs, rhs] => (lhs.trim(), rhs),
            _ => {
                return Err(GrammarError::MalformedRule {
                    rule: text.to_string(),
                    reason: format!("expected exactly one '{}'", RULE_ASSIGNMENT),
                })
            }
        };

        if tokenize(lhs, self.quote()).len() != 1 {
            return Err(GrammarError::MalformedRule {
                rule: text.to_string(),
                reason: "expected a single rule name on the left hand side".to_string(),
            });
        }
        if lhs == EOF_RULE_NAME {
            return Err(GrammarError::ReservedRuleName {
                name: lhs.to_string(),
            });
        }
        if !is_rule_name(lhs) {
            return Err(GrammarError::InvalidRuleName {
                name: lhs.to_string(),
            });
        }

        let rule = self.rules.intern(lhs, self.config.max_rule_index)?;
        self.defined.insert(rule);

        for alternative in split_quoted(rhs, RULE_SEPARATOR, self.quote()) {
            let symbols = tokenize(alternative, self.quote());
            if symbols.is_empty() {
                return Err(GrammarError::EmptyAlternative {
                    rule: lhs.to_string(),
                });
            }
            self.compile_alternative(rule, lhs, &symbols)?;
        }
        Ok(())
    }

    fn compile_alternative(
        &mut self,
        rule: RuleIndex,
        name: &str,
        symbols: &[&str],
    ) -> Result<(), GrammarError> {
        // a lone single-character terminal is a unit production
        if let [symbol] = symbols {
            if is_terminal(symbol, self.quote()) {
                let literal = de_escape(symbol, self.quote(), name)?;
                let mut chars = literal.chars();
                if let (Some(c), None) = (chars.next(), chars.next()) {
                    self.direct_terminals.entry(c).or_default().push(rule);
                    return Ok(());
                }
            }
        }

        let mut indices = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let index = if is_terminal(symbol, self.quote()) {
                let literal = de_escape(symbol, self.quote(), name)?;
                self.terminal_rule(&literal, name)?
            } else if *symbol == EOF_RULE_NAME {
                self.uses_eof = true;
                EOF_RULE
            } else {
                if !is_rule_name(symbol) {
                    return Err(GrammarError::InvalidRuleName {
                        name: symbol.to_string(),
                    });
                }
                let index = self.rules.intern(symbol, self.config.max_rule_index)?;
                self.used_by.entry(index).or_insert(rule);
                index
            };
            indices.push(index);
        }

        while indices.len() > 2 {
            let right = indices[indices.len() - 1];
            let left = indices[indices.len() - 2];
            indices.truncate(indices.len() - 2);
            let folded = self.fold(left, right)?;
            indices.push(folded);
        }

        match indices[..] {
            [left, right] => {
                self.direct_pairs
                    .entry(rule_key(left, right))
                    .or_default()
                    .push(rule);
            }
            [child] => {
                if child == rule {
                    return Err(GrammarError::SelfReferentialRule {
                        rule: name.to_string(),
                    });
                }
                self.chain_parents.entry(child).or_default().push(rule);
            }
            _ => {}
        }
        Ok(())
    }

    /// Synthetic rule for `left right`, shared by every alternative ending in it.
    fn fold(&mut self, left: RuleIndex, right: RuleIndex) -> Result<RuleIndex, GrammarError> {
        let key = rule_key(left, right);
        if let Some(&index) = self.folded.get(&key) {
            return Ok(index);
        }
        let index = self.rules.fresh(self.config.max_rule_index)?;
        self.direct_pairs.entry(key).or_default().push(index);
        self.folded.insert(key, index);
        Ok(index)
    }

    /// Synthetic rule producing a terminal literal inside a longer alternative.
    fn terminal_rule(&mut self, literal: &str, name: &str) -> Result<RuleIndex, GrammarError> {
        if let Some(&index) = self.terminal_rules.get(literal) {
            return Ok(index);
        }

        let mut chars = literal.chars();
        let first = chars.next().ok_or_else(|| GrammarError::EmptyTerminal {
            rule: name.to_string(),
        })?;
        let mut current = self.char_rule(first)?;
        let mut prefix = String::from(first);

        for c in chars {
            prefix.push(c);
            current = match self.terminal_rules.get(&prefix) {
                Some(&index) => index,
                None => {
                    let next = self.char_rule(c)?;
                    let joined = self.rules.fresh(self.config.max_rule_index)?;
                    self.direct_pairs
                        .entry(rule_key(current, next))
                        .or_default()
                        .push(joined);
                    self.terminal_rules.insert(prefix.clone(), joined);
                    joined
                }
            };
        }
        Ok(current)
    }

    fn char_rule(&mut self, c: char) -> Result<RuleIndex, GrammarError> {
        let key = c.to_string();
        if let Some(&index) = self.terminal_rules.get(&key) {
            return Ok(index);
        }
        let index = self.rules.fresh(self.config.max_rule_index)?;
        self.direct_terminals.entry(c).or_default().push(index);
        self.terminal_rules.insert(key, index);
        Ok(index)
    }

    fn check_defined(&self) -> Result<(), GrammarError> {
        let mut undefined: Vec<_> = self
            .used_by
            .iter()
            .filter(|(rule, _)| !self.defined.contains(*rule))
            .map(|(&rule, &used_by)| (rule, used_by))
            .collect();
        undefined.sort_unstable();

        match undefined.first() {
            Some(&(rule, used_by)) => Err(GrammarError::UndefinedRule {
                rule: self.rules.name(rule).unwrap_or_default().to_string(),
                used_by: self.rules.name(used_by).unwrap_or_default().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn finish(mut self, name: String) -> Result<Grammar, GrammarError> {
        self.check_defined()?;
        if self.uses_eof {
            self.direct_terminals.entry(EOF_SIGN).or_default().push(EOF_RULE);
        }
        for parents in self.chain_parents.values_mut() {
            parents.sort_unstable();
            parents.dedup();
        }

        let mut closure = ChainClosure::new(&self.chain_parents);
        let terminals: FxHashMap<char, Vec<Production>> = self
            .direct_terminals
            .iter()
            .map(|(&c, bases)| (c, closure.expand(bases)))
            .collect();
        let compositions: FxHashMap<RuleKey, Vec<Production>> = self
            .direct_pairs
            .iter()
            .map(|(&key, bases)| (key, closure.expand(bases)))
            .collect();

        let rule_count = self.rules.len();
        let mut right_pairs: Vec<Option<Bitfield>> = vec![None; rule_count];
        for &key in compositions.keys() {
            let (left, right) = split_rule_key(key);
            right_pairs[left as usize]
                .get_or_insert_with(|| Bitfield::new(rule_count))
                .insert(right as usize)?;
        }

        let mut events = vec![None; rule_count];
        for (index, rule_name) in self.rules.named() {
            events[index as usize] = Some(EventNames {
                pre: format!("{}{}", rule_name, PRE_EVENT_SUFFIX),
                post: format!("{}{}", rule_name, POST_EVENT_SUFFIX),
            });
        }

        let grammar = Grammar {
            name,
            rules: self.rules,
            terminals,
            compositions,
            right_pairs,
            substitutions: closure.substitutions,
            events,
            uses_eof: self.uses_eof,
        };

        debug!(
            grammar = %grammar.name,
            rules = grammar.rules.len(),
            alphabet = grammar.terminals.len(),
            compositions = grammar.compositions.len(),
            chains = grammar.substitutions.len(),
            start = ?grammar.rule_name(START_RULE),
            "grammar compiled"
        );
        Ok(grammar)
    }
}

/// Transitive closure over unary productions.
struct ChainClosure<'a> {
    parents: &'a FxHashMap<RuleIndex, Vec<RuleIndex>>,
    /// base -> ancestors in breadth-first order with their intermediate paths
    ancestry: FxHashMap<RuleIndex, Vec<(RuleIndex, Vec<RuleIndex>)>>,
    substitutions: FxHashMap<RuleKey, Vec<RuleIndex>>,
}

impl<'a> ChainClosure<'a> {
    fn new(parents: &'a FxHashMap<RuleIndex, Vec<RuleIndex>>) -> Self {
        ChainClosure {
            parents,
            ancestry: FxHashMap::default(),
            substitutions: FxHashMap::default(),
        }
    }

    /// Expand directly produced rules with everything reachable through chains.
    ///
    /// Direct rules come first (lowest index first), then each base's
    /// ancestors, nearest first. A rule appears once, with the first base
    /// that reaches it.
    fn expand(&mut self, bases: &[RuleIndex]) -> Vec<Production> {
        let mut bases = bases.to_vec();
        bases.sort_unstable();
        bases.dedup();

        let mut seen = FxHashSet::default();
        let mut productions: Vec<Production> = bases
            .iter()
            .filter(|&&base| seen.insert(base))
            .map(|&base| Production { rule: base, base })
            .collect();

        for &base in &bases {
            self.ancestors(base);
            for (top, path) in &self.ancestry[&base] {
                self.substitutions
                    .entry(rule_key(base, *top))
                    .or_insert_with(|| path.clone());
                if seen.insert(*top) {
                    productions.push(Production { rule: *top, base });
                }
            }
        }
        productions
    }

    /// Breadth-first walk up the unary productions from `base`.
    fn ancestors(&mut self, base: RuleIndex) {
        if self.ancestry.contains_key(&base) {
            return;
        }

        let mut via: FxHashMap<RuleIndex, RuleIndex> = FxHashMap::default();
        let mut visited = FxHashSet::default();
        visited.insert(base);
        let mut queue = VecDeque::from([base]);
        let mut found = Vec::new();

        while let Some(child) = queue.pop_front() {
            let Some(parents) = self.parents.get(&child) else {
                continue;
            };
            for &parent in parents {
                if visited.insert(parent) {
                    via.insert(parent, child);
                    found.push(parent);
                    queue.push_back(parent);
                }
            }
        }

        let ancestry = found
            .into_iter()
            .map(|top| {
                let mut path = Vec::new();
                let mut step = via[&top];
                while step != base {
                    path.push(step);
                    step = via[&step];
                }
                (top, path)
            })
            .collect();
        self.ancestry.insert(base, ancestry);
    }
}
