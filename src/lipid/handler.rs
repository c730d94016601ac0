//! Event callbacks assembling a [`Lipid`] from a shorthand or LIPID MAPS tree.

use super::model::{DoubleBond, FattyAcid, Geometry, Lipid, LipidClass, LipidLevel};
use crate::handler::{node_number, EventHandler, Fidelity, HandlerError, ParseState};
use crate::tree::TreeNode;

/// Scratch state for one lipid parse.
#[derive(Debug)]
pub struct LipidState {
    class: Option<LipidClass>,
    fidelity: Fidelity<LipidLevel>,
    chains: Vec<FattyAcid>,
    current: Option<FattyAcid>,
    result: Option<Lipid>,
}

impl Default for LipidState {
    fn default() -> Self {
        LipidState {
            class: None,
            fidelity: Fidelity::new(LipidLevel::FullStructure),
            chains: Vec::new(),
            current: None,
            result: None,
        }
    }
}

impl ParseState for LipidState {
    type Output = Lipid;

    fn finish(self) -> Option<Lipid> {
        self.result
    }
}

impl LipidState {
    pub fn level(&self) -> LipidLevel {
        self.fidelity.level()
    }

    fn current(&mut self) -> Result<&mut FattyAcid, HandlerError> {
        self.current
            .as_mut()
            .ok_or_else(|| HandlerError::invalid("no fatty acid in progress"))
    }

    fn last_position(&mut self) -> Result<&mut DoubleBond, HandlerError> {
        self.current()?
            .positions
            .last_mut()
            .ok_or_else(|| HandlerError::invalid("no double bond position in progress"))
    }

    fn headgroup(&mut self, node: &TreeNode) -> Result<(), HandlerError> {
        self.class = Some(node.text().parse()?);
        Ok(())
    }

    fn open_fatty_acid(&mut self, _: &TreeNode) -> Result<(), HandlerError> {
        self.current = Some(FattyAcid::default());
        Ok(())
    }

    fn close_fatty_acid(&mut self, _: &TreeNode) -> Result<(), HandlerError> {
        let fa = self
            .current
            .take()
            .ok_or_else(|| HandlerError::invalid("no fatty acid in progress"))?;
        self.chains.push(fa);
        Ok(())
    }

    fn carbon(&mut self, node: &TreeNode) -> Result<(), HandlerError> {
        self.current()?.carbon = node_number(node)?;
        Ok(())
    }

    fn double_bonds(&mut self, node: &TreeNode) -> Result<(), HandlerError> {
        self.current()?.double_bonds = node_number(node)?;
        Ok(())
    }

    fn open_position(&mut self, _: &TreeNode) -> Result<(), HandlerError> {
        self.current()?.positions.push(DoubleBond {
            position: 0,
            geometry: None,
        });
        Ok(())
    }

    fn position(&mut self, node: &TreeNode) -> Result<(), HandlerError> {
        self.last_position()?.position = node_number(node)?;
        Ok(())
    }

    fn geometry(&mut self, node: &TreeNode) -> Result<(), HandlerError> {
        let geometry = match node.text().as_str() {
            "Z" => Geometry::Z,
            "E" => Geometry::E,
            other => return Err(HandlerError::invalid(format!("unknown geometry '{}'", other))),
        };
        self.last_position()?.geometry = Some(geometry);
        Ok(())
    }

    fn molecular_separator(&mut self, _: &TreeNode) -> Result<(), HandlerError> {
        self.fidelity.narrow(LipidLevel::MolecularSpecies);
        Ok(())
    }

    /// Check the collected chains against the class and settle the level.
    fn finalize(&mut self, _: &TreeNode) -> Result<(), HandlerError> {
        let class = self
            .class
            .ok_or_else(|| HandlerError::invalid("lipid without headgroup"))?;

        for fa in &self.chains {
            if fa.carbon == 0 {
                return Err(HandlerError::invalid("fatty acid without carbon atoms"));
            }
            if fa.double_bonds == 0 && fa.positions.is_empty() {
                continue;
            }
            if fa.positions.is_empty() {
                self.fidelity.narrow(LipidLevel::SnPosition);
            } else if fa.positions.len() != fa.double_bonds as usize {
                return Err(HandlerError::invalid(
                    "double bond count does not match position count",
                ));
            } else if fa.positions.iter().any(|db| db.geometry.is_none()) {
                self.fidelity.narrow(LipidLevel::StructureDefined);
            }
        }

        let expected = class.chain_count();
        if self.chains.len() == 1 && expected > 1 {
            self.fidelity.narrow(LipidLevel::Species);
        } else if self.chains.len() != expected {
            return Err(HandlerError::invalid(format!(
                "{} has {} fatty acyl chains, found {}",
                class,
                expected,
                self.chains.len()
            )));
        }

        let level = self.fidelity.level();
        let mut chains = std::mem::take(&mut self.chains);
        if level < LipidLevel::StructureDefined {
            for fa in &mut chains {
                fa.positions.clear();
            }
        }
        self.result = Some(Lipid {
            class,
            level,
            chains,
        });
        Ok(())
    }
}

/// Callbacks shared by every lipid grammar; the rule names are the same in all of them.
pub fn lipid_handler() -> EventHandler<LipidState> {
    EventHandler::new()
        .on_pre("headgroup", LipidState::headgroup)
        .on_pre("fa", LipidState::open_fatty_acid)
        .on_post("fa", LipidState::close_fatty_acid)
        .on_pre("carbon", LipidState::carbon)
        .on_pre("db", LipidState::double_bonds)
        .on_pre("db_position", LipidState::open_position)
        .on_pre("db_number", LipidState::position)
        .on_pre("cistrans", LipidState::geometry)
        .on_pre("molecular_separator", LipidState::molecular_separator)
        .on_post("lipid", LipidState::finalize)
}
