//! Structural properties checked over a family of small machines.

use std::rc::Rc;

use bdd_fsm::bdd::{Bdd, BddConfig, Root};
use bdd_fsm::enc::BddEnc;
use bdd_fsm::expr::{BinOp, Expr};
use bdd_fsm::fsm::{BddFsm, FsmBuilder, FsmConfig};
use bdd_fsm::reference::Ref;
use bdd_fsm::reorder::ReorderMethod;
use bdd_fsm::symbols::VarType;
use bdd_fsm::trans::{PartitionMethod, TransConfig};
use num_bigint::BigUint;
use test_log::test;

/// Two counters `a : 0..m` and `b : 0..n`. `a` steps by one modulo `m + 1`
/// when input `go` holds, `b` follows `a` one step behind. Justice: `a = 0`.
fn machine(m: i64, n: i64, method: PartitionMethod) -> (BddEnc, BddFsm) {
    let bdd = Rc::new(Bdd::default());
    let mut enc = BddEnc::new(&bdd);
    enc.declare_state_variable("a", VarType::Range(0, m)).unwrap();
    enc.declare_input_variable("go", VarType::Boolean).unwrap();
    enc.declare_state_variable("b", VarType::Range(0, n)).unwrap();

    let a = Expr::atom("a");
    let b = Expr::atom("b");
    let step = Expr::binary(
        BinOp::Mod,
        Expr::binary(BinOp::Plus, a.clone(), Expr::number(1)),
        Expr::number(m + 1),
    );
    let fsm = FsmBuilder::new(&mut enc)
        .init(Expr::and(
            Expr::eq(a.clone(), Expr::number(0)),
            Expr::eq(b.clone(), Expr::number(0)),
        ))
        .assign(Expr::assign(
            Expr::next(a.clone()),
            Expr::ite(Expr::atom("go"), step, a.clone()),
        ))
        .assign(Expr::assign(
            Expr::next(b.clone()),
            Expr::ite(
                Expr::binary(BinOp::Le, a.clone(), Expr::number(n)),
                a.clone(),
                Expr::number(n),
            ),
        ))
        .justice(Expr::eq(a, Expr::number(0)))
        .build(
            TransConfig::default().with_partition(method),
            FsmConfig::default(),
        )
        .unwrap();
    (enc, fsm)
}

fn states(enc: &mut BddEnc, f: Ref) -> Vec<Ref> {
    let bdd = Rc::clone(enc.bdd());
    enc.pick_all_states(f)
        .iter()
        .map(|m| bdd.minterm_cube(m))
        .collect()
}

#[test]
fn current_next_tables_are_inverse() {
    let (enc, _) = machine(4, 2, PartitionMethod::Iwls95);
    for name in ["a", "b"] {
        let var = enc.var(name).unwrap();
        assert_eq!(var.bits.len(), var.next_bits.len());
        for (&cur, &next) in var.bits.iter().zip(&var.next_bits) {
            assert_eq!(enc.next_of_current(cur), next);
            assert_eq!(enc.current_of_next(next), cur);
            assert_eq!(enc.next_of_current(enc.current_of_next(next)), next);
        }
    }
    let go = enc.var("go").unwrap();
    assert!(go.next_bits.is_empty());
    for &bit in &go.bits {
        assert_eq!(enc.next_of_current(bit), bit);
        assert_eq!(enc.current_of_next(bit), bit);
    }
}

#[test]
fn masks_count_domain_sizes() {
    for hi in 1..9 {
        let bdd = Rc::new(Bdd::default());
        let mut enc = BddEnc::new(&bdd);
        enc.declare_state_variable("x", VarType::Range(0, hi)).unwrap();
        let expected = BigUint::from(hi as u32 + 1);
        assert_eq!(enc.count_states(bdd.one()), expected, "domain 0..{}", hi);
        let mask = enc.mask_for("x").unwrap();
        assert_eq!(enc.count_states(mask), expected);
    }
}

#[test]
fn images_are_dual() {
    let (mut enc, fsm) = machine(3, 1, PartitionMethod::Iwls95);
    let bdd = Rc::clone(fsm.bdd());
    let all = states(&mut enc, fsm.state_invar());
    assert_eq!(all.len(), 8);
    for &s in &all {
        let fwd = fsm.forward_image(s);
        for &t in &all {
            let forward = !bdd.is_zero(bdd.apply_and(fwd, t));
            let backward = !bdd.is_zero(bdd.apply_and(fsm.backward_image(t), s));
            assert_eq!(forward, backward);
        }
    }
}

#[test]
fn partitions_agree() {
    let methods = [
        PartitionMethod::Monolithic,
        PartitionMethod::Threshold(1),
        PartitionMethod::Threshold(50),
        PartitionMethod::Iwls95,
    ];
    let mut reports = Vec::new();
    for method in methods {
        let (mut enc, fsm) = machine(5, 3, method);
        let reach = fsm.reachable_states();
        reports.push((
            enc.count_states(reach),
            fsm.diameter(),
            enc.count_states(fsm.fair_states()),
            fsm.count_states_inputs(fsm.legal_state_input()),
        ));
    }
    assert!(reports.windows(2).all(|w| w[0] == w[1]), "{:?}", reports);
}

#[test]
fn layers_grow_by_forward_image() {
    let (_enc, fsm) = machine(5, 2, PartitionMethod::Iwls95);
    let bdd = fsm.bdd();
    let layers = fsm.reachable_layers();
    assert_eq!(layers[0], bdd.apply_and(fsm.init(), fsm.state_invar()));
    for w in layers.windows(2) {
        assert!(bdd.is_implies(w[0], w[1]));
        assert_ne!(w[0], w[1]);
        assert_eq!(w[1], bdd.apply_or(w[0], fsm.forward_image(w[0])));
    }
    let last = fsm.reachable_states();
    assert_eq!(bdd.apply_or(last, fsm.forward_image(last)), last);
}

#[test]
fn strong_and_weak_images_are_disjoint_on_complements() {
    let (mut enc, fsm) = machine(3, 2, PartitionMethod::Iwls95);
    let bdd = Rc::clone(fsm.bdd());
    for s in states(&mut enc, fsm.state_invar()) {
        let strong = fsm.strong_backward_image(s);
        let weak_out = fsm.weak_backward_image(-s);
        assert!(bdd.is_zero(bdd.apply_and(strong, weak_out)));
        assert!(bdd.is_implies(strong, fsm.legal_state_input()));
    }
}

#[test]
fn fair_states_are_within_legal_pairs() {
    let (_enc, fsm) = machine(4, 4, PartitionMethod::Iwls95);
    let bdd = fsm.bdd();
    let fair = fsm.fair_states_inputs();
    assert!(bdd.is_implies(fair, fsm.legal_state_input()));
    // `go` can always be chosen, so every state returns to a = 0.
    assert_eq!(fsm.fair_states(), fsm.state_invar());
    assert_eq!(fsm.fair_states_inputs_in_subspace(bdd.one()), fair);
}

#[test]
fn masks_are_idempotent() {
    let (mut enc, _) = machine(5, 2, PartitionMethod::Iwls95);
    let bdd = Rc::clone(enc.bdd());
    for name in ["a", "b", "go"] {
        let mask = enc.mask_for(name).unwrap();
        assert_eq!(bdd.apply_and(mask, mask), mask);
        assert_eq!(enc.mask_for(name), Ok(mask));
    }
    let both = enc.mask_for_vars(&["a", "b"]).unwrap();
    assert_eq!(both, enc.state_vars_mask());
}

#[test]
fn deadlocks_are_reachable_dead_ends() {
    for (m, n) in [(2, 2), (3, 1), (5, 3)] {
        let (_enc, fsm) = machine(m, n, PartitionMethod::Iwls95);
        let bdd = fsm.bdd();
        let bound = bdd.apply_and(fsm.reachable_states(), fsm.not_successor_states());
        assert!(bdd.is_implies(fsm.deadlock_states(), bound));
        assert_eq!(fsm.is_total(), bdd.is_zero(fsm.not_successor_states()));
        assert_eq!(fsm.is_deadlock_free(), bdd.is_zero(fsm.deadlock_states()));
    }
}

#[test]
fn fair_states_project_fair_pairs() {
    let (_enc, fsm) = machine(3, 3, PartitionMethod::Threshold(1));
    let bdd = fsm.bdd();
    let projected = bdd.exists(fsm.fair_states_inputs(), fsm.vars().input_cube());
    assert_eq!(fsm.fair_states(), projected);
}

/// `n` counters over `0..=4`, one of them (chosen by input `sel`) stepping
/// at a time. Justice: each counter returns to 0.
fn ring(bdd: &Rc<Bdd>, n: usize) -> (BddEnc, BddFsm) {
    let mut enc = BddEnc::new(bdd);
    enc.declare_input_variable("sel", VarType::Range(0, n as i64 - 1)).unwrap();
    for i in 0..n {
        enc.declare_state_variable(&format!("c{}", i), VarType::Range(0, 4)).unwrap();
    }
    let mut builder = FsmBuilder::new(&mut enc);
    for i in 0..n {
        let c = Expr::atom(&format!("c{}", i));
        let step = Expr::binary(
            BinOp::Mod,
            Expr::binary(BinOp::Plus, c.clone(), Expr::number(1)),
            Expr::number(5),
        );
        let chosen = Expr::eq(Expr::atom("sel"), Expr::number(i as i64));
        builder = builder
            .init(Expr::eq(c.clone(), Expr::number(0)))
            .assign(Expr::assign(Expr::next(c.clone()), Expr::ite(chosen, step, c.clone())))
            .justice(Expr::eq(c, Expr::number(0)));
    }
    let fsm = builder
        .build(TransConfig::default(), FsmConfig::default())
        .unwrap();
    (enc, fsm)
}

#[test]
fn automatic_reordering_preserves_results() {
    let summary = |enc: &mut BddEnc, fsm: &BddFsm| {
        (
            enc.count_states(fsm.reachable_states()),
            fsm.diameter(),
            enc.count_states(fsm.fair_states()),
            fsm.is_deadlock_free(),
        )
    };

    let plain = Rc::new(Bdd::default());
    let (mut enc, fsm) = ring(&plain, 4);
    let expected = summary(&mut enc, &fsm);
    assert_eq!(expected.0, BigUint::from(625u32));
    assert_eq!(plain.reorderings(), 0);

    let config = BddConfig::default()
        .with_auto_reorder(ReorderMethod::GroupSift)
        .with_reorder_threshold(50);
    let bdd = Rc::new(Bdd::new(config));
    let (mut enc, fsm) = ring(&bdd, 4);
    let corner = Expr::and(
        Expr::eq(Expr::atom("c0"), Expr::number(4)),
        Expr::eq(Expr::atom("c3"), Expr::number(4)),
    );
    let held = Root::new(&bdd, enc.evaluate_bdd(&corner, "").unwrap());

    assert_eq!(summary(&mut enc, &fsm), expected);
    assert!(bdd.reorderings() > 0);

    // Held diagrams keep their meaning across reorderings.
    assert_eq!(enc.count_states(held.get()), BigUint::from(25u32));
    let mask = enc.state_vars_mask();
    assert!(bdd.is_implies(bdd.apply_and(held.get(), mask), fsm.reachable_states()));

    // Each current bit stays next to its next-state copy.
    for i in 0..4 {
        let var = enc.var(&format!("c{}", i)).unwrap();
        for (&cur, &next) in var.bits.iter().zip(&var.next_bits) {
            let (a, b) = (bdd.level_of(cur).index(), bdd.level_of(next).index());
            assert_eq!(a.abs_diff(b), 1, "c{} bits {:?} and {:?}", i, cur, next);
        }
    }
}
