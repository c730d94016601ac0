//! CYK chart over a compiled [`Grammar`].
//!
//! Cells are addressed by `(start, length)` and map every rule derivable
//! over that span to the single derivation recorded for it. A per-start
//! [`Bitfield`] of populated lengths keeps the split-point search to cells
//! that actually hold something.
//!
//! Ambiguity is resolved by discovery order, and discovery order is fixed:
//! split points ascending, then left rule ascending, then right rule
//! ascending. Within one composition the productions come in the order the
//! grammar lists them. The first derivation recorded for a rule wins.
//!
//! A parse succeeds on the longest span at offset 0 that holds the start
//! rule, unless [`Coverage::WholeInput`] asks for the full input.

use crate::bitfield::{Bitfield, BitfieldError};
use crate::grammar::Grammar;
use crate::intern::{RuleIndex, START_RULE};
use crate::tree::TreeNode;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error(transparent)]
    Bitfield(#[from] BitfieldError),
    #[error("no derivation for rule {rule} at ({start}, {length})")]
    MissingDerivation {
        start: usize,
        length: usize,
        rule: RuleIndex,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Leaf(char),
    Split {
        left_length: usize,
        left: RuleIndex,
        right: RuleIndex,
    },
}

/// How a rule came to be in a cell: the production that matched (`base`)
/// and what it matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Derivation {
    base: RuleIndex,
    step: Step,
}

type Cell = BTreeMap<RuleIndex, Derivation>;

/// Which spans of the start rule count as a successful parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Coverage {
    /// The longest span at offset 0 that holds the start rule. Trailing
    /// input the grammar cannot attach is left out of the tree.
    #[default]
    LongestPrefix,
    /// Only the start rule over the whole input.
    WholeInput,
}

/// Result of extracting a tree from a filled chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseTree {
    pub root: TreeNode,
    /// Whether the root is the start rule. Under [`Coverage::LongestPrefix`]
    /// a complete tree may still cover only part of the input.
    pub complete: bool,
}

impl ParseTree {
    pub fn text(&self) -> String {
        self.root.text()
    }
}

/// A filled CYK chart.
#[derive(Debug)]
pub struct Chart<'g> {
    grammar: &'g Grammar,
    n: usize,
    cells: Vec<Cell>,
    /// lengths[start] = span lengths with a non-empty cell at `start`
    lengths: Vec<Bitfield>,
}

impl<'g> Chart<'g> {
    /// Fill the chart for `input`.
    ///
    /// Every character must be part of the grammar's alphabet; callers check
    /// that before paying for the fill.
    pub fn fill(grammar: &'g Grammar, input: &[char]) -> Result<Self, ChartError> {
        let n = input.len();
        let mut chart = Chart {
            grammar,
            n,
            cells: vec![Cell::new(); n * n],
            lengths: vec![Bitfield::new(n + 1); n],
        };

        for (start, &c) in input.iter().enumerate() {
            let cell = &mut chart.cells[start * n];
            for production in grammar.terminal_productions(c) {
                cell.entry(production.rule).or_insert(Derivation {
                    base: production.base,
                    step: Step::Leaf(c),
                });
            }
            if !cell.is_empty() {
                chart.lengths[start].insert(1)?;
            }
        }

        for length in 2..=n {
            for start in 0..=n - length {
                let found = chart.combine(start, length);
                if !found.is_empty() {
                    chart.cells[start * n + length - 1] = found;
                    chart.lengths[start].insert(length)?;
                }
            }
        }

        trace!(
            grammar = grammar.name(),
            length = n,
            cells = chart.cells.iter().filter(|c| !c.is_empty()).count(),
            entries = chart.cells.iter().map(Cell::len).sum::<usize>(),
            "chart filled"
        );
        Ok(chart)
    }

    fn cell(&self, start: usize, length: usize) -> &Cell {
        &self.cells[start * self.n + length - 1]
    }

    /// All derivations over `(start, length)` built from two smaller cells.
    fn combine(&self, start: usize, length: usize) -> Cell {
        let mut found = Cell::new();
        for left_length in &self.lengths[start] {
            if left_length >= length {
                break;
            }
            let right_start = start + left_length;
            let right_length = length - left_length;
            if !self.lengths[right_start].contains(right_length) {
                continue;
            }

            let right_cell = self.cell(right_start, right_length);
            for &left in self.cell(start, left_length).keys() {
                let Some(partners) = self.grammar.right_partners(left) else {
                    continue;
                };
                for &right in right_cell.keys() {
                    if !partners.contains(right as usize) {
                        continue;
                    }
                    for production in self.grammar.compositions(left, right) {
                        found.entry(production.rule).or_insert(Derivation {
                            base: production.base,
                            step: Step::Split {
                                left_length,
                                left,
                                right,
                            },
                        });
                    }
                }
            }
        }
        found
    }

    /// Length of the span at offset 0 that `coverage` accepts for the
    /// start rule, if any.
    pub fn start_span(&self, coverage: Coverage) -> Option<usize> {
        let lengths = self.lengths.first()?;
        let holds_start = |length: usize| self.cell(0, length).contains_key(&START_RULE);
        match coverage {
            Coverage::WholeInput => {
                Some(self.n).filter(|&n| lengths.contains(n) && holds_start(n))
            }
            // ascending, so the last hit is the longest
            Coverage::LongestPrefix => lengths.iter().filter(|&length| holds_start(length)).last(),
        }
    }

    /// Longest span at offset 0 with any derivation, and its lowest rule.
    pub fn longest_prefix(&self) -> Option<(usize, RuleIndex)> {
        let lengths = self.lengths.first()?;
        let length = lengths.iter().last()?;
        let rule = *self.cell(0, length).keys().next()?;
        Some((length, rule))
    }

    /// The start rule tree over the span `coverage` accepts. Failing that,
    /// the longest partial parse from offset 0.
    pub fn tree(&self, coverage: Coverage) -> Result<Option<ParseTree>, ChartError> {
        if let Some(length) = self.start_span(coverage) {
            return Ok(Some(ParseTree {
                root: self.build(0, length, START_RULE)?,
                complete: true,
            }));
        }
        match self.longest_prefix() {
            Some((length, rule)) => Ok(Some(ParseTree {
                root: self.build(0, length, rule)?,
                complete: false,
            })),
            None => Ok(None),
        }
    }

    /// Build the tree for `rule` over `(start, length)`, re-inserting the
    /// unary productions the chart skipped.
    fn build(&self, start: usize, length: usize, rule: RuleIndex) -> Result<TreeNode, ChartError> {
        let derivation = *self
            .cell(start, length)
            .get(&rule)
            .ok_or(ChartError::MissingDerivation {
                start,
                length,
                rule,
            })?;

        let base = derivation.base;
        let mut node = match derivation.step {
            Step::Leaf(c) => TreeNode::terminal(base, self.fires(base), c),
            Step::Split {
                left_length,
                left,
                right,
            } => TreeNode::branch(
                base,
                self.fires(base),
                self.build(start, left_length, left)?,
                self.build(start + left_length, length - left_length, right)?,
            ),
        };

        if rule != base {
            for &between in self.grammar.substitution(base, rule).iter().rev() {
                node = TreeNode::chain(between, self.fires(between), node);
            }
            node = TreeNode::chain(rule, self.fires(rule), node);
        }
        Ok(node)
    }

    fn fires(&self, rule: RuleIndex) -> bool {
        self.grammar.fires_events(rule)
    }
}
