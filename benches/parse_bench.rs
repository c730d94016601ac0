//! Benchmarks for grammar compilation and parsing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lipid_grammar::lipid::{shorthand_parser, SHORTHAND_GRAMMAR};
use lipid_grammar::{Grammar, LipidParser};

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_shorthand", |b| {
        b.iter(|| Grammar::compile(black_box(SHORTHAND_GRAMMAR)).unwrap())
    });
}

fn bench_parse_shorthand(c: &mut Criterion) {
    let parser = shorthand_parser().unwrap();

    c.bench_function("parse_species", |b| {
        b.iter(|| parser.parse(black_box("PC 34:1")).unwrap())
    });

    c.bench_function("parse_full_structure", |b| {
        b.iter(|| {
            parser
                .parse(black_box("TG 16:0/18:1(9Z)/20:4(5Z,8Z,11Z,14Z)"))
                .unwrap()
        })
    });
}

fn bench_fast_fail(c: &mut Criterion) {
    let parser = shorthand_parser().unwrap();

    c.bench_function("reject_unknown_character", |b| {
        b.iter(|| parser.parse_with(black_box("PC 16:0/18:1(9Q)"), false))
    });
}

fn bench_fallback(c: &mut Criterion) {
    let parser = LipidParser::new().unwrap();

    c.bench_function("fallback_lipid_maps", |b| {
        b.iter(|| parser.parse(black_box("PC(16:0/18:1(9Z))")).unwrap())
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_parse_shorthand,
    bench_fast_fail,
    bench_fallback,
);
criterion_main!(benches);
