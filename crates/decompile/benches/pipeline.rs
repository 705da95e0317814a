use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xian_decompiler::{decompile, parse_source};

fn create_contract(functions: usize) -> String {
    let mut source = String::from(
        "__balances = Hash(default_value=0, contract='con_bench', name='balances')\n\n\n",
    );

    for i in 0..functions {
        source.push_str(&format!(
            "@__export('con_bench')\ndef transfer_{i}(amount: float, to: str):\n    \
             assert amount > decimal('0.0000000000'), 'negative'\n    \
             __balances[ctx.caller] -= amount\n    \
             __balances[to] += amount * decimal('0.{i:010}')\n    \
             return f'{{to}} received {{amount!r:>10}}'\n\n\n"
        ));
    }

    source
}

fn bench_parser(c: &mut Criterion) {
    let source = create_contract(100);

    c.bench_function("parse_100_functions", |b| {
        b.iter(|| parse_source(black_box(&source)));
    });
}

fn bench_decompile(c: &mut Criterion) {
    let source = create_contract(100);

    c.bench_function("decompile_100_functions", |b| {
        b.iter(|| decompile(black_box(&source)));
    });
}

fn bench_fallback(c: &mut Criterion) {
    let mut source = create_contract(100);
    source.push_str("def broken(:\n");

    c.bench_function("decompile_fallback_100_functions", |b| {
        b.iter(|| decompile(black_box(&source)));
    });
}

criterion_group!(benches, bench_parser, bench_decompile, bench_fallback);
criterion_main!(benches);
