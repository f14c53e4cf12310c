//! Evaluation memo of the encoder.
//!
//! Everything stored here is pinned in the manager through [`Root`]s, so a
//! cached diagram survives garbage collection for as long as the cache
//! (or a snapshot holding it) is alive, and is released when it is dropped.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::add::Add;
use crate::bdd::{Bdd, Root};
use crate::expr::{Expr, ExprRef};

/// An [`Add`] whose guards are protected from garbage collection.
#[derive(Debug, Clone)]
pub struct PinnedAdd {
    add: Add,
    _roots: Vec<Root>,
}

impl PinnedAdd {
    pub fn new(bdd: &Rc<Bdd>, add: Add) -> Self {
        let roots = add.guards().map(|g| Root::new(bdd, g)).collect();
        Self { add, _roots: roots }
    }

    pub fn get(&self) -> &Add {
        &self.add
    }
}

/// Hashes an expression by node identity. Holding the `Rc` keeps the
/// address from being reused while the entry exists.
#[derive(Debug, Clone)]
pub(crate) struct ExprKey(pub ExprRef);

impl PartialEq for ExprKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ExprKey {}

impl Hash for ExprKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const Expr as usize).hash(state);
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum EvalStatus {
    Evaluating,
    Done,
}

/// `(expression, context, under next)`.
pub(crate) type MemoKey = (ExprKey, Rc<str>, bool);

#[derive(Debug, Default)]
pub(crate) struct EncCache {
    /// Constants and define lookups, by qualified name (`next(..)`-wrapped
    /// when evaluated under `next`).
    names: HashMap<Rc<str>, PinnedAdd>,
    exprs: HashMap<MemoKey, PinnedAdd>,
    status: HashMap<Rc<str>, EvalStatus>,
}

impl EncCache {
    pub fn name(&self, name: &str) -> Option<Add> {
        self.names.get(name).map(|p| p.get().clone())
    }

    pub fn insert_name(&mut self, bdd: &Rc<Bdd>, name: Rc<str>, add: &Add) {
        self.names.insert(name, PinnedAdd::new(bdd, add.clone()));
    }

    pub fn expr(&self, key: &MemoKey) -> Option<Add> {
        self.exprs.get(key).map(|p| p.get().clone())
    }

    pub fn insert_expr(&mut self, bdd: &Rc<Bdd>, key: MemoKey, add: &Add) {
        self.exprs.insert(key, PinnedAdd::new(bdd, add.clone()));
    }

    pub fn status(&self, name: &str) -> Option<EvalStatus> {
        self.status.get(name).copied()
    }

    pub fn set_status(&mut self, name: Rc<str>, status: EvalStatus) {
        self.status.insert(name, status);
    }

    pub fn clear_status(&mut self, name: &str) {
        self.status.remove(name);
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
