//! Lowering benchmarks
//!
//! Measures how fast synthetic programs are compiled to bytecode.
//!
//! # Benchmark Categories
//!
//! 1. **Straight-line code**: long runs of assignments and calls
//! 2. **Control flow**: nested loops, switches and try statements
//! 3. **Rollback**: loops whose bodies degrade to the interpreter

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use spacey_compiler::SourceUnit;
use spacey_compiler::ast::build::*;
use spacey_compiler::ast::{BinaryOperator, ForInit, Program, StatementRef, UpdateOperator};

// =============================================================================
// Program Builders
// =============================================================================

/// `x0 = 0; f(x0); x1 = 1; f(x1); ...`
fn straight_line(n: usize) -> Program {
    let mut body = Vec::with_capacity(n * 2);
    for i in 0..n {
        let name = format!("x{i}");
        body.push(expr_stmt(assign(ident(&name), int(i as i32))));
        body.push(expr_stmt(call(ident("f"), vec![ident(&name)])));
    }
    program(body)
}

/// A counting loop around a switch inside a try.
fn loop_body(depth: usize) -> StatementRef {
    let inner = if depth == 0 {
        block(vec![switch(
            ident("i"),
            vec![
                case(Some(int(0)), vec![continue_(None)]),
                case(Some(int(1)), vec![expr_stmt(ident("a")), break_(None)]),
                case(None, vec![expr_stmt(call(member(ident("o"), "m"), vec![]))]),
            ],
        )])
    } else {
        loop_body(depth - 1)
    };

    for_(
        Some(ForInit::Expression(assign(ident("i"), int(0)))),
        Some(binary(BinaryOperator::LessThan, ident("i"), int(10))),
        Some(update(UpdateOperator::Increment, false, ident("i"))),
        try_(inner, Some(("e", throw(ident("e")))), Some(expr_stmt(ident("done")))),
    )
}

fn control_flow(n: usize, depth: usize) -> Program {
    program((0..n).map(|_| loop_body(depth)).collect())
}

/// Loops whose innermost body contains a `return`.
fn rollback(n: usize) -> Program {
    program(
        (0..n)
            .map(|_| while_(ident("c"), block(vec![expr_stmt(ident("a")), return_(None)])))
            .collect(),
    )
}

fn compile(program: &Program) -> u32 {
    let mut unit = SourceUnit::new(program.clone());
    unit.compile_script().unwrap_or_default()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_straight_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("straight_line");

    for n in [16, 256, 4096] {
        let program = straight_line(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &program, |b, program| {
            b.iter(|| black_box(compile(program)))
        });
    }

    group.finish();
}

fn bench_control_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_flow");

    for depth in [0, 2, 4] {
        let program = control_flow(64, depth);
        group.bench_with_input(BenchmarkId::new("nested", depth), &program, |b, program| {
            b.iter(|| black_box(compile(program)))
        });
    }

    group.finish();
}

fn bench_rollback(c: &mut Criterion) {
    let mut group = c.benchmark_group("rollback");

    let program = rollback(256);
    group.bench_function("return_in_loop", |b| b.iter(|| black_box(compile(&program))));

    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    lowering_benches,
    bench_straight_line,
    bench_control_flow,
    bench_rollback,
);

criterion_main!(lowering_benches);
