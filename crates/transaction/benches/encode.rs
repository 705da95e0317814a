use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xian_transaction::{canonicalize, encode_for_signing, validate_payload, Value};

fn create_payload(kwargs: usize) -> Value {
    Value::map([
        ("stamps_supplied", Value::from(500)),
        ("sender", Value::from("a".repeat(64))),
        ("nonce", Value::from(42)),
        (
            "kwargs",
            Value::map((0..kwargs).rev().map(|i| {
                (
                    format!("arg_{i}"),
                    Value::List(vec![Value::from(i as i64), Value::from("caf\u{e9}"), 0.25.into()]),
                )
            })),
        ),
        ("function", Value::from("transfer")),
        ("contract", Value::from("currency")),
        ("chain_id", Value::from("xian-network-1")),
    ])
}

fn bench_canonicalize(c: &mut Criterion) {
    let payload = create_payload(100);

    c.bench_function("canonicalize_100_kwargs", |b| {
        b.iter(|| canonicalize(black_box(&payload)));
    });
}

fn bench_validate(c: &mut Criterion) {
    let payload = create_payload(100);

    c.bench_function("validate_100_kwargs", |b| {
        b.iter(|| validate_payload(black_box(&payload)));
    });
}

fn bench_encode(c: &mut Criterion) {
    let payload = canonicalize(&create_payload(100)).expect("payload should canonicalize");

    c.bench_function("encode_100_kwargs", |b| {
        b.iter(|| encode_for_signing(black_box(&payload)));
    });
}

criterion_group!(benches, bench_canonicalize, bench_validate, bench_encode);
criterion_main!(benches);
