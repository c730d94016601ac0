//! Reference lipid dialect.
//!
//! Two grammars for the same molecules, lipid shorthand (`PC 16:0/18:1(9Z)`)
//! and LIPID MAPS (`PC(16:0/18:1(9Z))`). Both use the same rule names, so
//! one set of callbacks ([`lipid_handler`]) serves both.

mod handler;
mod model;

pub use handler::{lipid_handler, LipidState};
pub use model::{
    DoubleBond, FattyAcid, Geometry, Lipid, LipidClass, LipidLevel, RenderError,
};

use crate::grammar::GrammarError;
use crate::parser::{ParseError, Parser, ParserChain};

pub const SHORTHAND_GRAMMAR: &str = include_str!("grammars/shorthand.g4");
pub const LIPID_MAPS_GRAMMAR: &str = include_str!("grammars/lipid_maps.g4");

pub fn shorthand_parser() -> Result<Parser<LipidState>, GrammarError> {
    Parser::new(SHORTHAND_GRAMMAR, lipid_handler())
}

pub fn lipid_maps_parser() -> Result<Parser<LipidState>, GrammarError> {
    Parser::new(LIPID_MAPS_GRAMMAR, lipid_handler())
}

/// Parses lipid names in any supported dialect.
#[derive(Debug)]
pub struct LipidParser {
    chain: ParserChain<Lipid>,
}

impl LipidParser {
    /// Shorthand first, then LIPID MAPS.
    pub fn new() -> Result<Self, GrammarError> {
        let chain = ParserChain::new()
            .with(shorthand_parser()?)
            .with(lipid_maps_parser()?);
        Ok(LipidParser { chain })
    }

    pub fn parse(&self, name: &str) -> Result<Lipid, ParseError> {
        self.chain.parse(name)
    }

    pub fn dialects(&self) -> Vec<&str> {
        self.chain.names()
    }
}
