//! Property-based tests for the lipid dialect
//!
//! Names rendered from a lipid must parse back to the same lipid, at every
//! level the lipid is known at, and fidelity levels must only ever narrow.

use lipid_grammar::lipid::{DoubleBond, FattyAcid, Geometry, Lipid, LipidClass, LipidLevel};
use lipid_grammar::{Fidelity, LipidParser};
use proptest::prelude::*;
use std::sync::OnceLock;

fn parser() -> &'static LipidParser {
    static PARSER: OnceLock<LipidParser> = OnceLock::new();
    PARSER.get_or_init(|| LipidParser::new().unwrap())
}

const CLASSES: [LipidClass; 11] = [
    LipidClass::FA,
    LipidClass::LPC,
    LipidClass::LPE,
    LipidClass::PA,
    LipidClass::PC,
    LipidClass::PE,
    LipidClass::PG,
    LipidClass::PI,
    LipidClass::PS,
    LipidClass::DG,
    LipidClass::TG,
];

fn geometry_strategy() -> impl Strategy<Value = Geometry> {
    prop_oneof![Just(Geometry::Z), Just(Geometry::E)]
}

/// A fatty acid with every double bond position and geometry known
fn fatty_acid_strategy() -> impl Strategy<Value = FattyAcid> {
    (8u32..=26, 0usize..=4)
        .prop_flat_map(|(carbon, double_bonds)| {
            (
                Just(carbon),
                proptest::sample::subsequence((1..carbon).collect::<Vec<u32>>(), double_bonds),
                proptest::collection::vec(geometry_strategy(), double_bonds),
            )
        })
        .prop_map(|(carbon, positions, geometries)| FattyAcid {
            carbon,
            double_bonds: positions.len() as u32,
            positions: positions
                .into_iter()
                .zip(geometries)
                .map(|(position, geometry)| DoubleBond {
                    position,
                    geometry: Some(geometry),
                })
                .collect(),
        })
}

fn lipid_strategy() -> impl Strategy<Value = Lipid> {
    proptest::sample::select(CLASSES.to_vec()).prop_flat_map(|class| {
        proptest::collection::vec(fatty_acid_strategy(), class.chain_count()).prop_map(
            move |chains| Lipid {
                class,
                level: LipidLevel::FullStructure,
                chains,
            },
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_full_structure_round_trip(lipid in lipid_strategy()) {
        let name = lipid.to_string();
        let parsed = parser().parse(&name).unwrap();
        prop_assert_eq!(&parsed, &lipid);

        let reparsed = parser().parse(&parsed.to_string()).unwrap();
        prop_assert_eq!(reparsed, parsed);
    }

    #[test]
    fn test_every_level_round_trips(lipid in lipid_strategy()) {
        for level in LipidLevel::ALL {
            let name = lipid.name(level).unwrap();
            let parsed = parser().parse(&name).unwrap();
            prop_assert!(parsed.level >= level, "{} parsed at {}", name, parsed.level);
            prop_assert_eq!(parsed.name(level).unwrap(), name);
        }
    }

    #[test]
    fn test_lipid_maps_matches_shorthand(lipid in lipid_strategy()) {
        let name = lipid.to_string();
        let (_, chains) = name.split_once(' ').unwrap();
        let lipid_maps = format!("{}({})", lipid.class, chains);
        prop_assert_eq!(parser().parse(&lipid_maps).unwrap(), lipid);
    }

    #[test]
    fn test_fidelity_never_widens(levels in proptest::collection::vec(0usize..5, 1..20)) {
        let mut fidelity = Fidelity::new(LipidLevel::FullStructure);
        let mut lowest = LipidLevel::FullStructure;
        for index in levels {
            let before = fidelity.level();
            let requested = LipidLevel::ALL[index];
            fidelity.narrow(requested);
            lowest = lowest.min(requested);
            prop_assert!(fidelity.level() <= before);
            prop_assert_eq!(fidelity.level(), lowest);
        }
    }
}

#[test]
fn test_parsed_levels_match_notation() {
    let cases = [
        ("PC 36:2", LipidLevel::Species),
        ("PC(36:2)", LipidLevel::Species),
        ("PC 18:1_18:1", LipidLevel::MolecularSpecies),
        ("PC 18:1(9Z)_18:1(9Z)", LipidLevel::MolecularSpecies),
        ("PC 18:1/18:1", LipidLevel::SnPosition),
        ("PC 18:1(9)/18:1(9Z)", LipidLevel::StructureDefined),
        ("PC(18:1(9Z)/18:1(9Z))", LipidLevel::FullStructure),
    ];
    for (name, level) in cases {
        assert_eq!(parser().parse(name).unwrap().level, level, "{}", name);
    }
}

#[test]
fn test_rejected_names() {
    for name in ["PC 16:0/18:1/18:2", "FA 18:2(9Z)", "XY 16:0", "PC /16:0", "FA 0:0"] {
        assert!(parser().parse(name).is_err(), "{}", name);
    }
}
