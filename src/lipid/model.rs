//! Lipid data model and shorthand rendering.

use crate::handler::HandlerError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How much structure a name pins down, least detailed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LipidLevel {
    /// Class and summed composition, `PC 34:1`.
    Species,
    /// Individual chains in unknown order, `PC 16:0_18:1`.
    MolecularSpecies,
    /// Chains at known sn positions, `PC 16:0/18:1`.
    SnPosition,
    /// Double bond positions known, `PC 16:0/18:1(9)`.
    StructureDefined,
    /// Double bond geometry known, `PC 16:0/18:1(9Z)`.
    FullStructure,
}

impl LipidLevel {
    pub const ALL: [LipidLevel; 5] = [
        LipidLevel::Species,
        LipidLevel::MolecularSpecies,
        LipidLevel::SnPosition,
        LipidLevel::StructureDefined,
        LipidLevel::FullStructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LipidLevel::Species => "SPECIES",
            LipidLevel::MolecularSpecies => "MOLECULAR_SPECIES",
            LipidLevel::SnPosition => "SN_POSITION",
            LipidLevel::StructureDefined => "STRUCTURE_DEFINED",
            LipidLevel::FullStructure => "FULL_STRUCTURE",
        }
    }
}

impl fmt::Display for LipidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LipidLevel {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LipidLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RenderError::UnknownLevel(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("cannot render at {requested}, lipid is only known at {available}")]
    LevelUnavailable {
        requested: LipidLevel,
        available: LipidLevel,
    },
    #[error("unknown lipid level '{0}'")]
    UnknownLevel(String),
}

/// Lipid classes with a fixed number of acyl chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LipidClass {
    FA,
    LPC,
    LPE,
    PA,
    PC,
    PE,
    PG,
    PI,
    PS,
    DG,
    TG,
}

impl LipidClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LipidClass::FA => "FA",
            LipidClass::LPC => "LPC",
            LipidClass::LPE => "LPE",
            LipidClass::PA => "PA",
            LipidClass::PC => "PC",
            LipidClass::PE => "PE",
            LipidClass::PG => "PG",
            LipidClass::PI => "PI",
            LipidClass::PS => "PS",
            LipidClass::DG => "DG",
            LipidClass::TG => "TG",
        }
    }

    pub fn chain_count(&self) -> usize {
        match self {
            LipidClass::FA | LipidClass::LPC | LipidClass::LPE => 1,
            LipidClass::TG => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for LipidClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LipidClass {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let class = match s {
            "FA" => LipidClass::FA,
            "LPC" => LipidClass::LPC,
            "LPE" => LipidClass::LPE,
            "PA" => LipidClass::PA,
            "PC" => LipidClass::PC,
            "PE" => LipidClass::PE,
            "PG" => LipidClass::PG,
            "PI" => LipidClass::PI,
            "PS" => LipidClass::PS,
            "DG" => LipidClass::DG,
            "TG" => LipidClass::TG,
            _ => return Err(HandlerError::invalid(format!("unknown lipid class '{}'", s))),
        };
        Ok(class)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Geometry {
    Z,
    E,
}

impl Geometry {
    pub fn as_char(&self) -> char {
        match self {
            Geometry::Z => 'Z',
            Geometry::E => 'E',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DoubleBond {
    pub position: u32,
    pub geometry: Option<Geometry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FattyAcid {
    pub carbon: u32,
    pub double_bonds: u32,
    pub positions: Vec<DoubleBond>,
}

impl FattyAcid {
    pub fn new(carbon: u32, double_bonds: u32) -> Self {
        FattyAcid {
            carbon,
            double_bonds,
            positions: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: u32, geometry: Option<Geometry>) -> Self {
        self.positions.push(DoubleBond { position, geometry });
        self
    }

    fn render(&self, level: LipidLevel, out: &mut String) {
        out.push_str(&format!("{}:{}", self.carbon, self.double_bonds));
        if level < LipidLevel::StructureDefined || self.positions.is_empty() {
            return;
        }
        let positions: Vec<String> = self
            .positions
            .iter()
            .map(|db| match db.geometry {
                Some(geometry) if level == LipidLevel::FullStructure => {
                    format!("{}{}", db.position, geometry.as_char())
                }
                _ => db.position.to_string(),
            })
            .collect();
        out.push('(');
        out.push_str(&positions.join(","));
        out.push(')');
    }
}

/// A parsed lipid.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Lipid {
    pub class: LipidClass,
    pub level: LipidLevel,
    pub chains: Vec<FattyAcid>,
}

impl Lipid {
    /// Summed carbon and double bond counts over all chains.
    pub fn composition(&self) -> (u32, u32) {
        self.chains.iter().fold((0, 0), |(c, db), fa| {
            (c + fa.carbon, db + fa.double_bonds)
        })
    }

    /// Shorthand name at `level`, which must not exceed the lipid's own level.
    pub fn name(&self, level: LipidLevel) -> Result<String, RenderError> {
        if level > self.level {
            return Err(RenderError::LevelUnavailable {
                requested: level,
                available: self.level,
            });
        }
        Ok(self.render(level))
    }

    fn render(&self, level: LipidLevel) -> String {
        let mut out = format!("{} ", self.class);
        if level == LipidLevel::Species {
            let (carbon, double_bonds) = self.composition();
            out.push_str(&format!("{}:{}", carbon, double_bonds));
            return out;
        }

        let separator = if level == LipidLevel::MolecularSpecies {
            '_'
        } else {
            '/'
        };
        for (i, fa) in self.chains.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            fa.render(level, &mut out);
        }
        out
    }
}

impl fmt::Display for Lipid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(self.level))
    }
}
