//! # bdd-fsm: Symbolic finite-state machines over BDDs
//!
//! **`bdd-fsm`** is a symbolic model-checking core: a reduced ordered BDD
//! manager with complemented edges and dynamic variable reordering, an
//! encoder that turns finite-domain variables and expressions into
//! diagrams, a partitioned transition relation with early quantification,
//! and a finite-state machine answering image, reachability, deadlock and
//! fairness queries.
//!
//! ## Layers
//!
//! - **[`bdd`]**: The [`Bdd`][crate::bdd::Bdd] manager. All diagrams are
//!   built through it and referred to by lightweight [`Ref`][crate::reference::Ref]
//!   handles. Long-lived handles are kept alive by [`Root`][crate::bdd::Root] guards.
//! - **[`add`]**: Diagrams with arbitrary leaf values, stored as a partition
//!   of the boolean space into guarded leaves.
//! - **[`enc`]**: The [`BddEnc`][crate::enc::BddEnc] encoder: variable
//!   declarations, binary encodings, current/next pairing, domain masks and
//!   expression evaluation.
//! - **[`trans`]**: The clustered transition relation
//!   [`BddTrans`][crate::trans::BddTrans] with forward and backward image
//!   schedules.
//! - **[`fsm`]**: The machine itself, [`BddFsm`][crate::fsm::BddFsm], built
//!   with [`FsmBuilder`][crate::fsm::FsmBuilder].
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use bdd_fsm::bdd::Bdd;
//! use bdd_fsm::enc::BddEnc;
//! use bdd_fsm::expr::{BinOp, Expr};
//! use bdd_fsm::fsm::{FsmBuilder, FsmConfig};
//! use bdd_fsm::symbols::VarType;
//! use bdd_fsm::trans::TransConfig;
//!
//! let bdd = Rc::new(Bdd::default());
//! let mut enc = BddEnc::new(&bdd);
//! enc.declare_state_variable("c", VarType::Range(0, 3)).unwrap();
//!
//! // c starts at 0 and counts modulo 4.
//! let c = Expr::atom("c");
//! let fsm = FsmBuilder::new(&mut enc)
//!     .init(Expr::eq(c.clone(), Expr::number(0)))
//!     .assign(Expr::assign(
//!         Expr::next(c.clone()),
//!         Expr::binary(BinOp::Mod, Expr::binary(BinOp::Plus, c.clone(), Expr::number(1)), Expr::number(4)),
//!     ))
//!     .build(TransConfig::default(), FsmConfig::default())
//!     .unwrap();
//!
//! assert_eq!(fsm.diameter(), 3);
//! assert!(fsm.is_deadlock_free());
//! ```

pub mod add;
pub mod bdd;
pub mod cache;
pub mod enc;
pub mod error;
pub mod expr;
pub mod fsm;
pub mod node;
pub mod reference;
pub mod reorder;
pub mod sat;
pub mod subtable;
pub mod symbols;
pub mod trans;
pub mod types;
