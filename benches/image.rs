//! Image and fixpoint benchmarks over a parametric counter ring.
//!
//! Run with:
//! ```bash
//! cargo bench --bench image
//! ```

use std::rc::Rc;

use bdd_fsm::bdd::Bdd;
use bdd_fsm::enc::BddEnc;
use bdd_fsm::expr::{BinOp, Expr};
use bdd_fsm::fsm::{BddFsm, FsmBuilder, FsmConfig};
use bdd_fsm::trans::{PartitionMethod, TransConfig};
use bdd_fsm::symbols::VarType;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// ============================================================================
// Helper: ring of counters
// ============================================================================

/// `n` counters over `0..=7`; counter `i` steps when input `sel = i`, and
/// counter `i + 1` may only step while counter `i` is non-zero.
fn ring(n: usize, method: PartitionMethod) -> BddFsm {
    let bdd = Rc::new(Bdd::default());
    let mut enc = BddEnc::new(&bdd);
    enc.declare_input_variable("sel", VarType::Range(0, n as i64 - 1)).unwrap();
    for i in 0..n {
        enc.declare_state_variable(&format!("c{}", i), VarType::Range(0, 7)).unwrap();
    }

    let mut builder = FsmBuilder::new(&mut enc);
    for i in 0..n {
        let c = Expr::atom(&format!("c{}", i));
        let prev = Expr::atom(&format!("c{}", (i + n - 1) % n));
        let mut enabled = Expr::eq(Expr::atom("sel"), Expr::number(i as i64));
        if i > 0 {
            enabled = Expr::and(enabled, Expr::binary(BinOp::NotEq, prev, Expr::number(0)));
        }
        let step = Expr::binary(
            BinOp::Mod,
            Expr::binary(BinOp::Plus, c.clone(), Expr::number(1)),
            Expr::number(8),
        );
        builder = builder
            .init(Expr::eq(c.clone(), Expr::number(0)))
            .assign(Expr::assign(Expr::next(c.clone()), Expr::ite(enabled, step, c.clone())))
            .justice(Expr::eq(c, Expr::number(0)));
    }
    builder
        .build(TransConfig::default().with_partition(method), FsmConfig::default())
        .unwrap()
}

fn methods() -> [(&'static str, PartitionMethod); 3] {
    [
        ("monolithic", PartitionMethod::Monolithic),
        ("threshold", PartitionMethod::Threshold(500)),
        ("iwls95", PartitionMethod::Iwls95),
    ]
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_reachability(c: &mut Criterion) {
    let mut group = c.benchmark_group("reachability");
    group.sample_size(10);
    for n in [3, 5] {
        for (name, method) in methods() {
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, &n| {
                b.iter_with_setup(|| ring(n, method), |fsm| fsm.reachable_states());
            });
        }
    }
    group.finish();
}

fn bench_images(c: &mut Criterion) {
    let mut group = c.benchmark_group("image");
    for (name, method) in methods() {
        let fsm = ring(4, method);
        let reach = fsm.reachable_states();
        group.bench_function(BenchmarkId::new("forward", name), |b| {
            b.iter(|| fsm.forward_image(reach));
        });
        group.bench_function(BenchmarkId::new("backward", name), |b| {
            b.iter(|| fsm.backward_image(reach));
        });
    }
    group.finish();
}

fn bench_fairness(c: &mut Criterion) {
    let mut group = c.benchmark_group("fairness");
    group.sample_size(10);
    for n in [2, 3] {
        group.bench_with_input(BenchmarkId::new("iwls95", n), &n, |b, &n| {
            b.iter_with_setup(|| ring(n, PartitionMethod::Iwls95), |fsm| fsm.fair_states());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reachability, bench_images, bench_fairness);
criterion_main!(benches);
