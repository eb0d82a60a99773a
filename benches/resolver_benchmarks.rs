// ABOUTME: Criterion benchmarks for resolver lookup and reconfiguration
// ABOUTME: Lookups are hot-path (per request); reconfiguration is rare but must stay cheap

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use gatekit::config::resolution::{ResolutionFile, ResolutionTable};
use gatekit::resolver::Resolver;
use std::io::Write;
use tempfile::TempDir;

fn build_table(methods: usize) -> ResolutionTable {
    let rows: String = (0..methods)
        .map(|i| {
            format!(
                r#""module{}.method{}": {{"alias": "org.rdk.Plugin{}.call{}"}}"#,
                i % 16,
                i,
                i % 16,
                i
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    let file: ResolutionFile =
        serde_json::from_str(&format!(r#"{{"resolutions":{{{}}}}}"#, rows)).unwrap();
    let mut table = ResolutionTable::new();
    table.merge_file(file);
    table
}

fn bench_lookup(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.json");
    let rows: String = (0..512)
        .map(|i| format!(r#""module{}.method{}": {{"alias": "org.rdk.P.m{}"}}"#, i % 16, i, i))
        .collect::<Vec<_>>()
        .join(",");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{"resolutions":{{{}}}}}"#, rows).unwrap();

    let resolver = Resolver::new();
    resolver
        .configure(&[path.to_string_lossy().to_string()])
        .unwrap();

    c.bench_function("resolver_lookup_hit", |b| {
        b.iter(|| resolver.resolve_alias(black_box("MODULE3.method131")))
    });

    c.bench_function("resolver_lookup_miss", |b| {
        b.iter(|| resolver.resolve_alias(black_box("no.such.method")))
    });
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("table_merge_512_rows", |b| {
        b.iter(|| black_box(build_table(512)))
    });
}

criterion_group!(benches, bench_lookup, bench_merge);
criterion_main!(benches);
