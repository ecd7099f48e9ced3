// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use arazzo_core::context::ExecutionContext;
use arazzo_core::expression::Expression;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

fn bench_ctx() -> ExecutionContext {
    let mut ctx = ExecutionContext::new(
        json!({"customer": {"firstName": "John", "address": {"city": "Springfield"}}}),
        json!({}),
        json!({}),
    );
    ctx.set_current_response(
        "https://api.example.com/pets".into(),
        "GET".into(),
        200,
        json!({"totalAmount": 150.0, "items": [{"id": 1}, {"id": 2}, {"id": 3}]}),
        json!({}),
    );
    ctx
}

fn dot_path(c: &mut Criterion) {
    let eval = Expression::default();
    let ctx = bench_ctx();
    c.bench_function("dot_path_nested_resolve", |b| {
        b.iter(|| eval.evaluate(black_box("$inputs.customer.address.city"), black_box(&ctx)))
    });
}

fn json_pointer(c: &mut Criterion) {
    let eval = Expression::default();
    let ctx = bench_ctx();
    c.bench_function("json_pointer_resolve", |b| {
        b.iter(|| eval.evaluate(black_box("$response.body#/items/1/id"), black_box(&ctx)))
    });
}

fn embedded_template(c: &mut Criterion) {
    let eval = Expression::default();
    let ctx = bench_ctx();
    c.bench_function("embedded_template_substitution", |b| {
        b.iter(|| {
            eval.evaluate(
                black_box("Hello {$inputs.customer.firstName} from {$inputs.customer.address.city}, total {$response.body.totalAmount}"),
                black_box(&ctx),
            )
        })
    });
}

criterion_group!(benches, dot_path, json_pointer, embedded_template);
criterion_main!(benches);
