//! Building a [`BddFsm`] from expressions.
//!
//! ```ignore
//! let fsm = FsmBuilder::new(&mut enc)
//!     .init(Expr::eq(Expr::atom("x"), Expr::number(0)))
//!     .assign(Expr::assign(Expr::next(Expr::atom("x")), Expr::not(Expr::atom("x"))))
//!     .justice(Expr::atom("x"))
//!     .build(TransConfig::default(), FsmConfig::default())?;
//! ```

use std::rc::Rc;

use log::{debug, info};

use super::{BddFsm, CompassionList, FsmConfig, FsmVars, JusticeList};
use crate::enc::BddEnc;
use crate::error::EncResult;
use crate::expr::{ExprKind, ExprRef};
use crate::reference::Ref;
use crate::trans::{BddTrans, Cluster, TransConfig};

pub struct FsmBuilder<'a> {
    enc: &'a mut BddEnc,
    context: String,
    init: Vec<ExprRef>,
    invar: Vec<ExprRef>,
    input_invar: Vec<ExprRef>,
    trans: Vec<ExprRef>,
    justice: Vec<ExprRef>,
    compassion: Vec<(ExprRef, ExprRef)>,
}

impl<'a> FsmBuilder<'a> {
    pub fn new(enc: &'a mut BddEnc) -> Self {
        Self {
            enc,
            context: String::new(),
            init: Vec::new(),
            invar: Vec::new(),
            input_invar: Vec::new(),
            trans: Vec::new(),
            justice: Vec::new(),
            compassion: Vec::new(),
        }
    }

    /// Evaluate every expression in `context` instead of the root one.
    pub fn in_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub fn init(mut self, e: ExprRef) -> Self {
        self.init.push(e);
        self
    }

    pub fn invar(mut self, e: ExprRef) -> Self {
        self.invar.push(e);
        self
    }

    pub fn input_invar(mut self, e: ExprRef) -> Self {
        self.input_invar.push(e);
        self
    }

    /// Add a transition constraint; each one becomes its own cluster.
    pub fn trans(mut self, e: ExprRef) -> Self {
        self.trans.push(e);
        self
    }

    /// Add an assignment `lhs := rhs`. Assignments to `next(v)` constrain
    /// the transition relation, all others are state invariants.
    pub fn assign(self, e: ExprRef) -> Self {
        match &e.kind {
            ExprKind::Assign(lhs, _) if matches!(lhs.kind, ExprKind::Next(_)) => self.trans(e),
            _ => self.invar(e),
        }
    }

    /// Add an assignment constraining the initial states.
    pub fn init_assign(self, e: ExprRef) -> Self {
        self.init(e)
    }

    pub fn justice(mut self, e: ExprRef) -> Self {
        self.justice.push(e);
        self
    }

    /// Add the compassion pair "if `p` infinitely often, then `q`
    /// infinitely often".
    pub fn compassion(mut self, p: ExprRef, q: ExprRef) -> Self {
        self.compassion.push((p, q));
        self
    }

    fn conjoin(enc: &mut BddEnc, exprs: &[ExprRef], context: &str) -> EncResult<Ref> {
        let bdd = Rc::clone(enc.bdd());
        let mut acc = bdd.one();
        for e in exprs {
            let f = enc.evaluate_bdd(e, context)?;
            acc = bdd.apply_and(acc, f);
        }
        Ok(acc)
    }

    /// Evaluate everything and assemble the machine.
    ///
    /// The frozen-variable constraint joins the relation as an extra
    /// cluster. Without any transition constraint the relation is `true`.
    pub fn build(self, trans_config: TransConfig, config: FsmConfig) -> EncResult<BddFsm> {
        let FsmBuilder {
            enc,
            context,
            init,
            invar,
            input_invar,
            trans,
            justice,
            compassion,
        } = self;
        let bdd = Rc::clone(enc.bdd());

        let init = Self::conjoin(enc, &init, &context)?;
        let invar = Self::conjoin(enc, &invar, &context)?;
        let input_invar = Self::conjoin(enc, &input_invar, &context)?;

        let mut clusters = Vec::with_capacity(trans.len() + 1);
        for e in &trans {
            let f = enc.evaluate_bdd(e, &context)?;
            debug!("Transition cluster of {} nodes", bdd.size(f));
            clusters.push(Cluster::new(&bdd, f));
        }
        let frozen = enc.frozen_constraint();
        if !bdd.is_one(frozen) {
            clusters.push(Cluster::new(&bdd, frozen));
        }
        if clusters.is_empty() {
            clusters.push(Cluster::new(&bdd, bdd.one()));
        }

        let mut justice_list = JusticeList::new();
        for e in &justice {
            let f = enc.evaluate_bdd(e, &context)?;
            justice_list.push(&bdd, f);
        }
        let mut compassion_list = CompassionList::new();
        for (p, q) in &compassion {
            let p = enc.evaluate_bdd(p, &context)?;
            let q = enc.evaluate_bdd(q, &context)?;
            compassion_list.push(&bdd, p, q);
        }

        let vars = FsmVars::from_encoder(enc);
        let trans = BddTrans::build(&bdd, clusters, enc.var_cubes(), enc.shift().clone(), trans_config);
        info!(
            "Built FSM: {} justice, {} compassion constraints",
            justice_list.len(),
            compassion_list.len()
        );
        Ok(BddFsm::new(
            &bdd,
            vars,
            init,
            invar,
            input_invar,
            trans,
            justice_list,
            compassion_list,
            config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;
    use crate::error::EncError;
    use crate::expr::{BinOp, Expr};
    use crate::symbols::VarType;

    fn enc() -> BddEnc {
        let bdd = Rc::new(Bdd::default());
        let mut enc = BddEnc::new(&bdd);
        enc.declare_state_variable("x", VarType::Range(0, 3)).unwrap();
        enc.declare_state_variable("y", VarType::Boolean).unwrap();
        enc
    }

    #[test]
    fn test_assign_routes_by_target() {
        let mut enc = enc();
        let x = Expr::atom("x");
        let y = Expr::atom("y");
        let fsm = FsmBuilder::new(&mut enc)
            .init_assign(Expr::assign(x.clone(), Expr::number(0)))
            .assign(Expr::assign(Expr::next(x.clone()), Expr::number(1)))
            .assign(Expr::assign(y.clone(), Expr::binary(BinOp::Lt, x.clone(), Expr::number(2))))
            .build(TransConfig::default(), FsmConfig::default())
            .unwrap();

        let bdd = fsm.bdd().clone();
        let y_def = enc
            .evaluate_bdd(&Expr::eq(y.clone(), Expr::binary(BinOp::Lt, x.clone(), Expr::number(2))), "")
            .unwrap();
        assert!(bdd.is_implies(fsm.state_invar(), y_def));
        assert_eq!(fsm.trans().clusters().len(), 1);
        // x goes 0 -> 1 and stays there.
        assert_eq!(fsm.diameter(), 1);
        assert_eq!(fsm.count_states(fsm.reachable_states()), num_bigint::BigUint::from(2u32));
    }

    #[test]
    fn test_empty_relation_is_true() {
        let mut enc = enc();
        let fsm = FsmBuilder::new(&mut enc)
            .build(TransConfig::default(), FsmConfig::default())
            .unwrap();
        assert!(fsm.bdd().is_one(fsm.trans().monolithic()));
        assert!(fsm.is_total());
    }

    #[test]
    fn test_frozen_constraint_becomes_a_cluster() {
        let mut enc = enc();
        enc.declare_frozen_variable("k", VarType::Boolean).unwrap();
        let fsm = FsmBuilder::new(&mut enc)
            .trans(Expr::eq(Expr::next(Expr::atom("y")), Expr::not(Expr::atom("y"))))
            .build(TransConfig::default().with_partition(crate::trans::PartitionMethod::Threshold(1)), FsmConfig::default())
            .unwrap();
        let k = enc.evaluate_bdd(&Expr::atom("k"), "").unwrap();
        assert_eq!(fsm.trans().clusters().len(), 2);
        assert_eq!(fsm.forward_image(k), fsm.bdd().apply_and(k, fsm.state_invar()));
    }

    #[test]
    fn test_context_and_errors() {
        let mut enc = enc();
        enc.declare_param("m", "v", Expr::atom("x"), "").unwrap();
        enc.declare_define("m", "small", Expr::binary(BinOp::Lt, Expr::atom("v"), Expr::number(2)))
            .unwrap();
        let fsm = FsmBuilder::new(&mut enc)
            .in_context("m")
            .invar(Expr::atom("small"))
            .build(TransConfig::default(), FsmConfig::default())
            .unwrap();
        assert_eq!(fsm.count_states(fsm.state_invar()), num_bigint::BigUint::from(4u32));

        let err = FsmBuilder::new(&mut enc)
            .justice(Expr::atom("nope").at(9))
            .build(TransConfig::default(), FsmConfig::default())
            .err();
        assert_eq!(
            err,
            Some(EncError::Undefined {
                name: "nope".to_string(),
                line: 9
            })
        );
    }
}
