//! Benchmarks for script discovery and the per-script hot paths.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use migrata_core::{
    CatalogKind, CsvReader, ScriptCatalog, Tokens, Version, checksum, replace_tokens,
};
use std::hint::black_box;

const SCRIPT: &str = r#"
CREATE TABLE {{schema}}.customer (
    id        BIGINT PRIMARY KEY,
    email     VARCHAR(255) NOT NULL,
    region_id INT REFERENCES {{schema}}.region (id),
    created   TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX ix_customer_email ON {{schema}}.customer (email);
GRANT SELECT ON {{schema}}.customer TO {{reader}};
"#;

fn tokens() -> Tokens {
    let mut tokens = Tokens::new();
    tokens.insert("schema".into(), "sales".into());
    tokens.insert("reader".into(), "report_reader".into());
    tokens
}

fn csv(rows: usize) -> String {
    let mut content = String::from("id,name,note\n");
    for i in 0..rows {
        content.push_str(&format!("{i},\"customer {i}\",plain text\n"));
    }
    content
}

fn bench_version_parse(c: &mut Criterion) {
    let names = ["v0.00", "v1.27", "v12.003", "v2.10.4", "V3.5"];
    c.bench_function("version_parse", |b| {
        b.iter(|| {
            for name in names {
                black_box(Version::parse(black_box(name)).ok());
            }
        })
    });
}

fn bench_tokens(c: &mut Criterion) {
    let tokens = tokens();
    let mut group = c.benchmark_group("tokens");
    group.throughput(Throughput::Bytes(SCRIPT.len() as u64));
    group.bench_function("replace", |b| {
        b.iter(|| black_box(replace_tokens(black_box(SCRIPT), &tokens)))
    });
    group.bench_function("replace_none", |b| {
        let plain = SCRIPT.replace("{{", "").replace("}}", "");
        b.iter(|| black_box(replace_tokens(black_box(&plain), &tokens)))
    });
    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let crlf = SCRIPT.replace('\n', "\r\n");
    let mut group = c.benchmark_group("checksum");
    group.bench_function("lf", |b| b.iter(|| black_box(checksum(black_box(SCRIPT)))));
    group.bench_function("crlf", |b| b.iter(|| black_box(checksum(black_box(&crlf)))));
    group.finish();
}

fn bench_csv(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_reader");
    for rows in [100, 1_000, 10_000] {
        let content = csv(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &content, |b, content| {
            b.iter(|| CsvReader::new(black_box(content), ',').count())
        });
    }
    group.finish();
}

fn bench_catalog(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        let name = match i % 10 {
            0 => format!("{i:03}_prepare.pre.sql"),
            9 => format!("{i:03}_cleanup.post.sql"),
            5 => format!("{i:03}_seed.env-dev.sql"),
            _ => format!("{i:03}_change.sql"),
        };
        std::fs::write(dir.path().join(name), SCRIPT).unwrap();
    }
    std::fs::write(dir.path().join("region.csv"), csv(100)).unwrap();

    c.bench_function("catalog_build_50", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                ScriptCatalog::build(dir.path(), CatalogKind::Version, Some("dev"))
                    .await
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_version_parse,
    bench_tokens,
    bench_checksum,
    bench_csv,
    bench_catalog,
);
criterion_main!(benches);
