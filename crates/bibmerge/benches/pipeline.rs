//! Parse + normalize throughput on a synthetic CryptoBib-shaped bibliography.
//!
//! The real `crypto.bib` is ~40k entries; this uses 5k with the same mix of
//! macro references, accents and braced capitals.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use bibmerge::bibtex::{BibtexParser, EntryParser};
use bibmerge::models::{AuthorStyle, FieldSelection, FieldSpec, RawSource, SourceRole};
use bibmerge::normalize::normalize;
use bibmerge::{merge, transform};

const ABBREV: &str = r#"
@string{crypto = "Advances in Cryptology -- CRYPTO"}
@string{eurocrypt = "Advances in Cryptology -- EUROCRYPT"}
@string{lncs = "Lecture Notes in Computer Science"}
"#;

fn synthetic_main(entries: usize) -> String {
    let mut text = String::new();
    for i in 0..entries {
        let venue = if i % 2 == 0 { "crypto" } else { "eurocrypt" };
        text.push_str(&format!(
            "@InProceedings{{Key{i},\n  author = \"J{{\\\"o}}rg Schwenk and Fran{{\\c c}}ois M{{\\'e}}rot\",\n  title = \"On the {{RSA}} Assumption, Part {i}\",\n  booktitle = {venue} # \" {year}\",\n  series = lncs,\n  pages = \"{p}--{q}\",\n  year = {year},\n}}\n\n",
            year = 1990 + i % 30,
            p = i % 500,
            q = i % 500 + 20,
        ));
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let parser = BibtexParser::new();

    for size in [500usize, 5_000] {
        let merged = merge(ABBREV, &synthetic_main(size));
        group.throughput(Throughput::Bytes(merged.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &merged, |b, merged| {
            b.iter(|| black_box(parser.parse(merged.as_str()).unwrap()));
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let entries = BibtexParser::new().parse(merge(ABBREV, &synthetic_main(5_000)).as_str()).unwrap();
    let spec = FieldSpec::new(["title", "author", "booktitle", "doi"]).unwrap();

    c.bench_function("normalize/5000", |b| {
        b.iter(|| black_box(normalize(entries.clone(), &spec)));
    });
}

fn bench_transform(c: &mut Criterion) {
    let abbrev = RawSource::new(SourceRole::Abbreviations, ABBREV);
    let main = RawSource::new(SourceRole::Main, synthetic_main(5_000));
    let parser = BibtexParser::new();

    c.bench_function("transform/5000", |b| {
        b.iter(|| {
            black_box(
                transform(&abbrev, &main, &parser, &FieldSelection::All, AuthorStyle::Semicolon)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_parse, bench_normalize, bench_transform);
criterion_main!(benches);
