//! Harvest Benchmarks
//!
//! Per-file costs of the pipeline: evaluation of a test source, whitespace
//! normalization and fixture document rendering.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gql_fixture_harvest::emit::render_fixtures;
use gql_fixture_harvest::{CliArgs, HarvestConfig, Harvester, normalize_whitespace};

fn synthetic_source(cases: usize) -> String {
    let mut source = String::from(
        "import { describe, it } from 'mocha';\n\
         import { expectValidationErrors } from './harness';\n\
         import { BenchRule } from '../rules/BenchRule';\n\n\
         describe('Validate: bench', () => {\n",
    );
    for n in 0..cases {
        source.push_str(&format!(
            "  it('case {n}', () => {{\n\
             \x20   expectValidationErrors(BenchRule, `\n\
             \x20     {{\n\
             \x20       dog{n} {{ name }}\n\n\
             \x20     }}\n\
             \x20   `).toDeepEqual([{{ message: 'error {n}', locations: [{{ line: 2, column: 7 }}] }}]);\n\
             \x20 }});\n"
        ));
    }
    source.push_str("});\n");
    source
}

fn harvester() -> Harvester {
    let config = HarvestConfig::from_args(CliArgs::default()).expect("default config");
    Harvester::new(config).expect("harvester")
}

fn bench_evaluate_source(c: &mut Criterion) {
    let harvester = harvester();
    let mut group = c.benchmark_group("evaluate_source");
    for cases in [10usize, 100, 500] {
        let source = synthetic_source(cases);
        group.bench_with_input(BenchmarkId::from_parameter(cases), &source, |b, source| {
            b.iter(|| {
                let records = harvester
                    .harvest_source("BenchRule-test.ts", black_box(source))
                    .expect("harvest");
                black_box(records)
            });
        });
    }
    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let query = "\n      query Q($a: Int) {\n        dog(a: $a) {\n\n          name\n   \n        }\n      }\n    "
        .repeat(20);
    c.bench_function("normalize_whitespace", |b| {
        b.iter(|| black_box(normalize_whitespace(black_box(&query))));
    });
}

fn bench_render_fixtures(c: &mut Criterion) {
    let harvester = harvester();
    let records = harvester
        .harvest_source("BenchRule-test.ts", &synthetic_source(200))
        .expect("harvest");
    c.bench_function("render_fixtures_200", |b| {
        b.iter(|| black_box(render_fixtures("BenchRule-test.ts", black_box(&records))));
    });
}

criterion_group!(
    benches,
    bench_evaluate_source,
    bench_normalize,
    bench_render_fixtures,
);

criterion_main!(benches);
