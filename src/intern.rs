//! Rule interning for compiled grammars.
//!
//! Every grammar rule, named or synthetic, is identified by a [`RuleIndex`].
//! Named rules map back to their source name so that tree nodes can be
//! turned into `<rule>_pre_event` / `<rule>_post_event` names.
//!
//! Index layout:
//! - `0` is never allocated
//! - [`EOF_RULE`] is the end-of-input sentinel rule
//! - [`START_RULE`] is the first rule declared in the grammar
//! - everything from `3` upward is allocated in declaration order

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Grammar rule identifier. Fits one half of a [`RuleKey`].
pub type RuleIndex = u32;

/// Two rule indices packed as `(left << 32) | right`.
pub type RuleKey = u64;

pub const EOF_RULE: RuleIndex = 1;
pub const START_RULE: RuleIndex = 2;
const FIRST_FREE_RULE: RuleIndex = 3;

/// Name a grammar uses to refer to the end-of-input rule.
pub const EOF_RULE_NAME: &str = "EOF";

/// Character appended to the input when a grammar refers to `EOF`.
pub const EOF_SIGN: char = '\u{1}';

/// Pack two rule indices into one composition key.
///
/// The left half is never zero, so every key lies above `u32::MAX` and
/// cannot be mistaken for a plain rule index.
#[inline(always)]
pub fn rule_key(left: RuleIndex, right: RuleIndex) -> RuleKey {
    debug_assert!(left != 0, "rule index 0 is never allocated");
    ((left as RuleKey) << 32) | right as RuleKey
}

/// Split a composition key back into its `(left, right)` rule indices.
#[inline(always)]
pub fn split_rule_key(key: RuleKey) -> (RuleIndex, RuleIndex) {
    ((key >> 32) as RuleIndex, key as RuleIndex)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule index space exhausted: grammar needs more than {max} rules")]
pub struct RuleIndexExhausted {
    pub max: RuleIndex,
}

/// Bidirectional table between rule names and rule indices.
#[derive(Debug, Clone)]
pub struct RuleTable {
    name_to_index: FxHashMap<Box<str>, RuleIndex>,
    index_to_name: Vec<Option<Box<str>>>,
    start_assigned: bool,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleTable {
    pub fn new() -> Self {
        let mut index_to_name = vec![None; FIRST_FREE_RULE as usize];
        index_to_name[EOF_RULE as usize] = Some(EOF_RULE_NAME.into());
        RuleTable {
            name_to_index: FxHashMap::default(),
            index_to_name,
            start_assigned: false,
        }
    }

    /// Intern a rule name, allocating an index the first time it is seen.
    ///
    /// The first name ever interned becomes [`START_RULE`].
    pub fn intern(&mut self, name: &str, max: RuleIndex) -> Result<RuleIndex, RuleIndexExhausted> {
        if let Some(&index) = self.name_to_index.get(name) {
            return Ok(index);
        }

        let index = if self.start_assigned {
            self.allocate(max)?
        } else {
            if START_RULE > max {
                return Err(RuleIndexExhausted { max });
            }
            self.start_assigned = true;
            START_RULE
        };
        let boxed: Box<str> = name.into();
        self.name_to_index.insert(boxed.clone(), index);
        self.index_to_name[index as usize] = Some(boxed);
        Ok(index)
    }

    /// Allocate an unnamed rule, used for desugared productions and terminals.
    pub fn fresh(&mut self, max: RuleIndex) -> Result<RuleIndex, RuleIndexExhausted> {
        self.allocate(max)
    }

    fn allocate(&mut self, max: RuleIndex) -> Result<RuleIndex, RuleIndexExhausted> {
        let next = self.index_to_name.len();
        if next > max as usize {
            return Err(RuleIndexExhausted { max });
        }
        self.index_to_name.push(None);
        Ok(next as RuleIndex)
    }

    /// Look up the index of a named rule.
    pub fn get(&self, name: &str) -> Option<RuleIndex> {
        self.name_to_index.get(name).copied()
    }

    /// Name of a rule, `None` for synthetic rules.
    pub fn name(&self, index: RuleIndex) -> Option<&str> {
        self.index_to_name
            .get(index as usize)
            .and_then(|n| n.as_deref())
    }

    /// Whether the rule was declared in the grammar source.
    pub fn is_named(&self, index: RuleIndex) -> bool {
        index != EOF_RULE && self.name(index).is_some()
    }

    /// One past the highest allocated index.
    pub fn len(&self) -> usize {
        self.index_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_index.is_empty()
    }

    /// Declared rule names with their indices, in index order.
    pub fn named(&self) -> impl Iterator<Item = (RuleIndex, &str)> {
        self.index_to_name
            .iter()
            .enumerate()
            .skip(START_RULE as usize)
            .filter_map(|(i, n)| n.as_deref().map(|n| (i as RuleIndex, n)))
    }
}
