//! Lipid-Grammar: a CYK grammar engine for lipid nomenclature.
//!
//! This crate provides:
//! - A compiler for textual grammars (`grammar Name; rule : alt | alt ;`)
//! - A CYK chart parser with chain-rule reinsertion and partial-parse diagnostics
//! - Event dispatch over parse trees (`<rule>_pre_event` / `<rule>_post_event`)
//! - Parser composition with ordered fallback
//! - A reference lipid dialect (shorthand and LIPID MAPS names)
//! - Python bindings via PyO3 (feature `python`)

pub mod bitfield;
pub mod chart;
pub mod grammar;
pub mod handler;
pub mod intern;
pub mod lipid;
pub mod parser;
pub mod tree;

#[cfg(feature = "python")]
mod python;

// Re-exports for convenience
pub use bitfield::{Bitfield, BitfieldError};
pub use chart::{Chart, ChartError, Coverage, ParseTree};
pub use grammar::{Grammar, GrammarConfig, GrammarError, Production};
pub use handler::{Callback, DebugMode, EventHandler, Fidelity, HandlerError, ParseState};
pub use intern::{RuleIndex, RuleKey, RuleTable, EOF_RULE, EOF_SIGN, START_RULE};
pub use lipid::{Lipid, LipidLevel, LipidParser};
pub use parser::{ParseError, Parser, ParserBuilder, ParserChain, ParserConfig, TextParser};
pub use tree::{NodeKind, TreeNode, Visit};
