use std::hint::black_box;
use std::path::PathBuf;

use criterion::{criterion_group, criterion_main, Criterion};

use ancsub::annotation::annotate_report;
use ancsub::io::{read_names, read_report, write_nexus, write_substitution_table, Delimiter};
use ancsub::report::{parse_report, Dialect};

const REPORTS: [(&str, Option<Dialect>); 3] = [
    ("data/baseml.rst", None),
    ("data/codeml.rst", None),
    ("data/codeml.rst", Some(Dialect::SequenceListing)),
];

fn bench_name(path: &str, dialect: Option<Dialect>) -> String {
    match dialect {
        Some(dialect) => format!("{} ({})", path, dialect),
        None => path.to_string(),
    }
}

fn parse_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_report");
    for (path, dialect) in REPORTS {
        let text = read_report(&PathBuf::from(path)).expect("report should be readable");
        group.bench_function(bench_name(path, dialect), |b| {
            b.iter(|| parse_report(black_box(&text), dialect).expect("report should parse"))
        });
    }
    group.finish();
}

fn annotate_and_write(c: &mut Criterion) {
    let names = read_names(&PathBuf::from("data/alignment.names")).expect("names should be readable");
    let mut group = c.benchmark_group("annotate_and_write");
    for (path, dialect) in REPORTS {
        let text = read_report(&PathBuf::from(path)).expect("report should be readable");
        group.bench_function(bench_name(path, dialect), |b| {
            b.iter(|| {
                let annotated = annotate_report(black_box(&text), names.clone(), dialect, true)
                    .expect("report should annotate");
                let mut tree = Vec::new();
                write_nexus(&annotated, &mut tree).expect("tree should be written");
                let mut table = Vec::new();
                write_substitution_table(&annotated.substitution_records(), Delimiter::Tab, &mut table)
                    .expect("table should be written");
                black_box((tree, table))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, parse_reports, annotate_and_write);
criterion_main!(benches);
