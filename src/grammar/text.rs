//! Text-level handling of grammar sources.
//!
//! Grammar files look like
//!
//! ```text
//! grammar Shorthand;
//! // line comment
//! lipid : headgroup ' ' chains ;   /* block comment */
//! cistrans : 'Z' | 'E' ;
//! ```
//!
//! Everything here is quote aware: comment openers, `;`, `:`, `|` and
//! whitespace inside a quoted terminal are literal characters. Inside a
//! terminal a backslash escapes the following character.

use super::GrammarError;
use std::iter::Peekable;
use std::str::Chars;

pub(crate) const RULE_TERMINATOR: char = ';';
pub(crate) const RULE_ASSIGNMENT: char = ':';
pub(crate) const RULE_SEPARATOR: char = '|';
const ESCAPE: char = '\\';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    Code,
    LineComment,
    BlockComment,
    Quote,
}

/// Character scanner that removes comments while keeping quoted text intact.
struct Scanner<'a> {
    input: Peekable<Chars<'a>>,
    quote: char,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str, quote: char) -> Self {
        Scanner {
            input: input.chars().peekable(),
            quote,
            line: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.input.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn next_is(&mut self, expected: char) -> bool {
        self.input.peek() == Some(&expected)
    }

    fn strip(mut self) -> Result<String, GrammarError> {
        let mut out = String::new();
        let mut context = Context::Code;
        let mut opened_at = 1;

        while let Some(c) = self.advance() {
            match context {
                Context::Code => {
                    if c == '/' && self.next_is('/') {
                        self.advance();
                        context = Context::LineComment;
                    } else if c == '/' && self.next_is('*') {
                        self.advance();
                        context = Context::BlockComment;
                        opened_at = self.line;
                        out.push(' ');
                    } else {
                        if c == self.quote {
                            context = Context::Quote;
                            opened_at = self.line;
                        }
                        out.push(c);
                    }
                }
                Context::LineComment => {
                    if c == '\n' {
                        context = Context::Code;
                        out.push('\n');
                    }
                }
                Context::BlockComment => {
                    if c == '*' && self.next_is('/') {
                        self.advance();
                        context = Context::Code;
                    } else if c == '\n' {
                        out.push('\n');
                    }
                }
                Context::Quote => {
                    out.push(c);
                    if c == ESCAPE {
                        match self.advance() {
                            Some(escaped) => out.push(escaped),
                            None => break,
                        }
                    } else if c == self.quote {
                        context = Context::Code;
                    }
                }
            }
        }

        match context {
            Context::Code | Context::LineComment => Ok(out),
            Context::BlockComment => Err(GrammarError::UnterminatedComment { line: opened_at }),
            Context::Quote => Err(GrammarError::UnterminatedQuote { line: opened_at }),
        }
    }
}

/// Remove `//` and `/* */` comments outside of quoted terminals.
pub(crate) fn strip_comments(source: &str, quote: char) -> Result<String, GrammarError> {
    Scanner::new(source, quote).strip()
}

/// Split at every `separator` that is not inside a quoted terminal.
pub(crate) fn split_quoted(text: &str, separator: char, quote: char) -> Vec<&str> {
    split_outside_quotes(text, quote, |c| c == separator)
}

/// Split at runs of whitespace outside quoted terminals, dropping empty pieces.
pub(crate) fn tokenize(text: &str, quote: char) -> Vec<&str> {
    split_outside_quotes(text, quote, char::is_whitespace)
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect()
}

fn split_outside_quotes<F>(text: &str, quote: char, is_separator: F) -> Vec<&str>
where
    F: Fn(char) -> bool,
{
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == ESCAPE {
                escaped = true;
            } else if c == quote {
                in_quote = false;
            }
        } else if c == quote {
            in_quote = true;
        } else if is_separator(c) {
            pieces.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Whether a token is a quoted terminal literal.
pub(crate) fn is_terminal(token: &str, quote: char) -> bool {
    token.starts_with(quote)
}

/// Remove the surrounding quotes and resolve backslash escapes.
pub(crate) fn de_escape(token: &str, quote: char, rule: &str) -> Result<String, GrammarError> {
    let malformed = || GrammarError::MalformedRule {
        rule: rule.to_string(),
        reason: format!("terminal {} is not properly quoted", token),
    };

    let inner = token
        .strip_prefix(quote)
        .and_then(|t| t.strip_suffix(quote))
        .ok_or_else(malformed)?;

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(escaped) => result.push(escaped),
                None => return Err(malformed()),
            }
        } else if c == quote {
            // an unescaped quote in the middle, e.g. 'a'b'
            return Err(malformed());
        } else {
            result.push(c);
        }
    }

    if result.is_empty() {
        return Err(GrammarError::EmptyTerminal {
            rule: rule.to_string(),
        });
    }
    Ok(result)
}

/// Rule names are identifiers: a letter or `_`, then letters, digits or `_`.
pub(crate) fn is_rule_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a whole grammar source into its trimmed, non-empty rule texts.
pub(crate) fn split_rules(source: &str, quote: char) -> Result<Vec<String>, GrammarError> {
    let stripped = strip_comments(source, quote)?;
    Ok(split_quoted(&stripped, RULE_TERMINATOR, quote)
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect())
}
