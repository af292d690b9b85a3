// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for argument normalization.
//!
//! These benchmarks measure:
//! - String coercion across scalar shapes
//! - Recursive normalization of nested argument maps

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use serde_json::{json, Map, Value};
use toolflow::mcp::{normalize_arguments, normalize_map};

fn argument_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Benchmark coercion of individual scalar strings.
fn bench_scalar_coercion(c: &mut Criterion) {
    c.bench_function("normalize_bool_string", |b| {
        b.iter(|| normalize_arguments(black_box(json!("true"))));
    });

    c.bench_function("normalize_int_string", |b| {
        b.iter(|| normalize_arguments(black_box(json!("1234567"))));
    });

    c.bench_function("normalize_float_string", |b| {
        b.iter(|| normalize_arguments(black_box(json!("3.14159"))));
    });

    c.bench_function("normalize_plain_string", |b| {
        b.iter(|| normalize_arguments(black_box(json!("AAPL quarterly report"))));
    });
}

/// Benchmark a flat argument map of mixed scalars.
fn bench_flat_map(c: &mut Criterion) {
    let args = argument_map(json!({
        "ticker": "AAPL",
        "days": "30",
        "threshold": "0.75",
        "include_news": "true",
        "include_filings": "false",
        "note": "not a number",
    }));

    c.bench_function("normalize_flat_map", |b| {
        b.iter(|| normalize_map(black_box(args.clone())));
    });
}

/// Benchmark a nested map with arrays, the worst case for recursion.
fn bench_nested_map(c: &mut Criterion) {
    let args = argument_map(json!({
        "query": {
            "tickers": ["AAPL", "MSFT", "GOOG"],
            "window": {"days": "90", "weighted": "true"},
        },
        "limits": ["10", "20", "30.5", "plain"],
        "verbose": "FALSE",
    }));

    c.bench_function("normalize_nested_map", |b| {
        b.iter(|| normalize_map(black_box(args.clone())));
    });
}

criterion_group!(benches, bench_scalar_coercion, bench_flat_map, bench_nested_map);

criterion_main!(benches);
