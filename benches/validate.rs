use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use visrule::{tokenize, validate_expression};

/// Build a flat `1 AND 2 AND ...` expression over `n` ids with a group every
/// eighth operand, roughly the shape a hand-written rule grows into.
fn build_expression(n: usize) -> (String, Vec<String>) {
    let ids: Vec<String> = (1..=n).map(|i| i.to_string()).collect();
    let mut parts = Vec::new();
    for chunk in ids.chunks(8) {
        parts.push(format!("({})", chunk.join(" OR ")));
    }
    (parts.join(" AND "), ids)
}

fn bench_tokenize(c: &mut Criterion) {
    let (expression, _) = build_expression(64);
    c.bench_function("tokenize_64_ids", |b| {
        b.iter(|| tokenize(black_box(&expression)));
    });
}

fn bench_validate(c: &mut Criterion) {
    let (expression, ids) = build_expression(64);
    let tokens = tokenize(&expression);
    let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();
    c.bench_function("validate_64_ids", |b| {
        b.iter(|| validate_expression(black_box(&tokens), &id_set).unwrap());
    });
}

criterion_group!(benches, bench_tokenize, bench_validate);
criterion_main!(benches);
