//! Conversion between generic (quantified) and monomorphic types at
//! let-binding boundaries.
//!
//! `instantiate` copies a generic type, replacing each generic variable
//! with a fresh one at the target level; the source graph is never
//! mutated. `generalize` flips unbound variables above the current level
//! to generic placeholders in place. Both walks memoize recursive groups
//! so each group is processed exactly once.

use crate::types::{RecId, Type, VarState};
use crate::unify::UnifyState;

impl UnifyState {
    /// Whether a type contains generic variables (or an unresolved
    /// class-method reference, which always requires instantiation).
    pub fn is_generic(&self, ty: &Type) -> bool {
        match self.peek(ty) {
            Type::Var(id) => matches!(self.var_state(id), VarState::Generic { .. }),
            Type::Method(_) => true,
            Type::RecursiveLink { rec, .. } => self.rec(rec).generic,
            Type::App {
                cons,
                params,
                underlying,
            } => {
                self.is_generic(&cons)
                    || params.iter().any(|p| self.is_generic(p))
                    || underlying.as_deref().is_some_and(|u| self.is_generic(u))
            }
            Type::Arrow { params, ret, .. } => {
                params.iter().any(|p| self.is_generic(p)) || self.is_generic(&ret)
            }
            Type::Record(row) | Type::Variant(row) => self.is_generic(&row),
            Type::RowExtend { labels, rest } => {
                labels
                    .iter()
                    .any(|(_, ts)| ts.iter().any(|t| self.is_generic(t)))
                    || self.is_generic(&rest)
            }
            Type::Unit | Type::Const(_) | Type::Size(_) | Type::RowEmpty => false,
        }
    }

    /// Duplicate a generic type, replacing generic variables with fresh
    /// unbound variables at `level`. Weak/size flags and instance
    /// constraints carry over. Non-generic types are returned unchanged.
    pub fn instantiate(&mut self, level: u32, ty: &Type) -> Type {
        if !self.is_generic(ty) {
            return ty.clone();
        }
        self.inst_lookup.clear();
        self.rec_inst_lookup.clear();
        self.visit_instantiate(level, ty)
    }

    fn visit_instantiate(&mut self, level: u32, ty: &Type) -> Type {
        if !self.is_generic(ty) {
            return ty.clone();
        }
        match self.peek(ty) {
            Type::Var(id) => {
                if let Some(&fresh) = self.inst_lookup.get(&id) {
                    return Type::Var(fresh);
                }
                let (weak, size, constraints) = match self.var_state(id) {
                    VarState::Generic {
                        weak,
                        size,
                        constraints,
                    } => (*weak, *size, constraints.clone()),
                    _ => (false, false, Vec::new()),
                };
                let fresh = self.fresh_var(level);
                self.set_state(
                    fresh,
                    VarState::Unbound {
                        level,
                        weak,
                        size,
                        constraints,
                    },
                );
                self.inst_lookup.insert(id, fresh);
                Type::Var(fresh)
            }
            Type::RecursiveLink { rec, index } => {
                if let Some(&next) = self.rec_inst_lookup.get(&rec) {
                    return Type::RecursiveLink { rec: next, index };
                }
                let next = self.clone_rec_instantiated(rec);
                // Memoize before walking members so inner links to the
                // same group resolve to the copy.
                self.rec_inst_lookup.insert(rec, next);
                for i in 0..self.rec(next).types.len() {
                    let member = self.rec(next).types[i].clone();
                    let inst = self.visit_instantiate(level, &member);
                    self.rec_mut(next).types[i] = inst;
                }
                self.rec_mut(next).generic = false;
                Type::RecursiveLink { rec: next, index }
            }
            Type::App {
                cons,
                params,
                underlying,
            } => Type::App {
                cons: Box::new(self.visit_instantiate(level, &cons)),
                params: params
                    .iter()
                    .map(|p| self.visit_instantiate(level, p))
                    .collect(),
                underlying: underlying.map(|u| Box::new(self.visit_instantiate(level, &u))),
            },
            Type::Arrow {
                params,
                ret,
                method,
            } => Type::Arrow {
                params: params
                    .iter()
                    .map(|p| self.visit_instantiate(level, p))
                    .collect(),
                ret: Box::new(self.visit_instantiate(level, &ret)),
                method,
            },
            Type::Method(m) => match self.class(m.class).methods.get(&m.name).cloned() {
                Some(arrow) => {
                    let mut inst = self.visit_instantiate(level, &arrow);
                    if let Type::Arrow { method, .. } = &mut inst {
                        *method = Some(m);
                    }
                    inst
                }
                None => Type::Method(m),
            },
            Type::Record(row) => Type::Record(Box::new(self.visit_instantiate(level, &row))),
            Type::Variant(row) => Type::Variant(Box::new(self.visit_instantiate(level, &row))),
            Type::RowExtend { labels, rest } => Type::RowExtend {
                labels: labels
                    .iter()
                    .map(|(l, ts)| {
                        (
                            l,
                            ts.iter()
                                .map(|t| self.visit_instantiate(level, t))
                                .collect(),
                        )
                    })
                    .collect(),
                rest: Box::new(self.visit_instantiate(level, &rest)),
            },
            other => other,
        }
    }

    /// Mark every unbound, non-weak, non-size variable whose level
    /// strictly exceeds `level` as generic. Weak and size-restricted
    /// variables stay unbound (monomorphic in enclosing scopes).
    pub fn generalize(&mut self, level: u32, ty: &Type) {
        let mut visited = Vec::new();
        self.visit_generalize(level, ty, &mut visited);
    }

    fn visit_generalize(&mut self, level: u32, ty: &Type, visited: &mut Vec<RecId>) {
        match self.peek(ty) {
            Type::Var(id) => {
                if let VarState::Unbound {
                    level: var_level,
                    weak,
                    size,
                    constraints,
                } = self.var_state(id).clone()
                {
                    if var_level > level && !weak && !size {
                        self.set_state(
                            id,
                            VarState::Generic {
                                weak,
                                size,
                                constraints,
                            },
                        );
                    }
                }
            }
            Type::App {
                cons,
                params,
                underlying,
            } => {
                self.visit_generalize(level, &cons, visited);
                for p in &params {
                    self.visit_generalize(level, p, visited);
                }
                if let Some(u) = underlying {
                    self.visit_generalize(level, &u, visited);
                }
            }
            Type::Arrow { params, ret, .. } => {
                for p in &params {
                    self.visit_generalize(level, p, visited);
                }
                self.visit_generalize(level, &ret, visited);
            }
            Type::Record(row) | Type::Variant(row) => self.visit_generalize(level, &row, visited),
            Type::RowExtend { labels, rest } => {
                for (_, ts) in labels.iter() {
                    for t in ts {
                        self.visit_generalize(level, t, visited);
                    }
                }
                self.visit_generalize(level, &rest, visited);
            }
            Type::RecursiveLink { rec, .. } => {
                if visited.contains(&rec) {
                    return;
                }
                visited.push(rec);
                let members = self.rec(rec).types.clone();
                for m in &members {
                    self.visit_generalize(level, m, visited);
                }
                if members.iter().any(|m| self.is_generic(m)) {
                    self.rec_mut(rec).generic = true;
                }
            }
            Type::Unit
            | Type::Const(_)
            | Type::Size(_)
            | Type::RowEmpty
            | Type::Method(_) => {}
        }
    }
}
