use std::collections::HashMap;
use std::mem;

use log::trace;

use crate::error::{ErrorKind, TypeError};
use crate::interner::{self, Symbol};
use crate::types::{
    ClassId, InstanceConstraint, MethodRef, RecGroup, RecId, Type, TypeClassDef, TypeVarId,
    VarState,
};

/// Union-find based unification engine.
///
/// Owns the state of every unification variable, the recursive-group
/// arena, the type-class registry, and the queue of deferred instance
/// constraints. Types (`Type` values) are plain trees; all sharing and
/// mutation is routed through this table, so a single `UnifyState` (and
/// the context wrapping it) is the unit of thread confinement.
pub struct UnifyState {
    vars: Vec<VarState>,
    recs: Vec<RecGroup>,
    classes: Vec<TypeClassDef>,
    /// Constraints recorded when a constrained variable was linked to a
    /// concrete type; discharged at the end of a top-level inference.
    deferred: Vec<(InstanceConstraint, Type)>,
    /// Rollback journal, active while speculatively unifying the applied
    /// form of a type alias.
    trail: Option<Vec<(TypeVarId, VarState)>>,
    /// Recursive-link pairs currently being unified, to terminate on
    /// equi-recursive graphs.
    rec_pairs: Vec<((RecId, usize), (RecId, usize))>,
    /// Instantiation memo tables, reset per `instantiate` call.
    pub(crate) inst_lookup: HashMap<TypeVarId, TypeVarId>,
    pub(crate) rec_inst_lookup: HashMap<RecId, RecId>,
}

impl Default for UnifyState {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifyState {
    pub fn new() -> Self {
        UnifyState {
            vars: Vec::new(),
            recs: Vec::new(),
            classes: Vec::new(),
            deferred: Vec::new(),
            trail: None,
            rec_pairs: Vec::new(),
            inst_lookup: HashMap::new(),
            rec_inst_lookup: HashMap::new(),
        }
    }

    // ----- variable allocation -----------------------------------------

    /// Create a fresh unbound variable at a binding level.
    pub fn fresh_var(&mut self, level: u32) -> TypeVarId {
        let id = TypeVarId(self.vars.len() as u32);
        self.vars.push(VarState::Unbound {
            level,
            weak: false,
            size: false,
            constraints: Vec::new(),
        });
        id
    }

    pub fn new_var(&mut self, level: u32) -> Type {
        Type::Var(self.fresh_var(level))
    }

    /// Bulk allocation for arrow signatures and match cases.
    pub fn new_vars(&mut self, level: u32, count: usize) -> Vec<Type> {
        (0..count).map(|_| self.new_var(level)).collect()
    }

    /// Fresh variable that resists generalization (mutable-reference
    /// contents).
    pub fn new_weak_var(&mut self, level: u32) -> Type {
        let id = self.fresh_var(level);
        self.vars[id.0 as usize] = VarState::Unbound {
            level,
            weak: true,
            size: false,
            constraints: Vec::new(),
        };
        Type::Var(id)
    }

    /// Fresh variable restricted to size constants.
    pub fn new_size_var(&mut self, level: u32) -> Type {
        let id = self.fresh_var(level);
        self.vars[id.0 as usize] = VarState::Unbound {
            level,
            weak: false,
            size: true,
            constraints: Vec::new(),
        };
        Type::Var(id)
    }

    /// Quantified placeholder for declaring polymorphic environment
    /// entries; replaced by a fresh variable at every instantiation.
    pub fn generic_var(&mut self) -> Type {
        self.push_generic(false, false, Vec::new())
    }

    /// Generic variable whose instantiations are weak. Used for schemes
    /// describing mutable-reference contents (e.g. `new_ref : forall a
    /// (weak). a -> ref[a]`), so fresh contents never generalize.
    pub fn generic_weak_var(&mut self) -> Type {
        self.push_generic(true, false, Vec::new())
    }

    pub fn generic_size_var(&mut self) -> Type {
        self.push_generic(false, true, Vec::new())
    }

    /// Generic variable carrying a type-class constraint, for schemes of
    /// the shape `forall a where C a. ...`.
    pub fn generic_constrained_var(&mut self, class: ClassId) -> Type {
        self.push_generic(false, false, vec![InstanceConstraint { class }])
    }

    fn push_generic(&mut self, weak: bool, size: bool, constraints: Vec<InstanceConstraint>) -> Type {
        let id = TypeVarId(self.vars.len() as u32);
        self.vars.push(VarState::Generic {
            weak,
            size,
            constraints,
        });
        Type::Var(id)
    }

    pub(crate) fn var_state(&self, id: TypeVarId) -> &VarState {
        &self.vars[id.0 as usize]
    }

    /// A copy of a variable's current state, for inspection and tests.
    pub fn var_state_snapshot(&self, id: TypeVarId) -> VarState {
        self.vars[id.0 as usize].clone()
    }

    pub(crate) fn var_level(&self, id: TypeVarId) -> Option<u32> {
        match self.var_state(id) {
            VarState::Unbound { level, .. } => Some(*level),
            _ => None,
        }
    }

    fn is_unbound(&self, id: TypeVarId) -> bool {
        matches!(self.var_state(id), VarState::Unbound { .. })
    }

    /// All state mutation funnels through here so the speculation trail
    /// sees every change it may need to undo.
    pub(crate) fn set_state(&mut self, id: TypeVarId, state: VarState) {
        if let Some(trail) = self.trail.as_mut() {
            trail.push((id, self.vars[id.0 as usize].clone()));
        }
        self.vars[id.0 as usize] = state;
    }

    pub(crate) fn link(&mut self, id: TypeVarId, ty: Type) {
        self.set_state(id, VarState::Link(ty));
    }

    // ----- link following ----------------------------------------------

    /// Follow links to the representative type, compressing the path.
    pub fn repr(&mut self, ty: Type) -> Type {
        match ty {
            Type::Var(id) => match self.var_state(id) {
                VarState::Link(inner) => {
                    let inner = inner.clone();
                    let root = self.repr(inner);
                    self.compress(id, root.clone());
                    root
                }
                _ => Type::Var(id),
            },
            other => other,
        }
    }

    fn compress(&mut self, id: TypeVarId, root: Type) {
        // Compression is meaning-preserving, but while speculating it
        // must be journaled like any other write so rollback restores
        // the original chain.
        if self.trail.is_some() {
            self.set_state(id, VarState::Link(root));
        } else {
            self.vars[id.0 as usize] = VarState::Link(root);
        }
    }

    /// Follow links without mutating (for rendering from `&self`).
    pub(crate) fn peek(&self, ty: &Type) -> Type {
        let mut cur = ty.clone();
        while let Type::Var(id) = cur {
            match self.var_state(id) {
                VarState::Link(inner) => cur = inner.clone(),
                _ => return Type::Var(id),
            }
        }
        cur
    }

    /// Deep-resolve a type, replacing every solved variable with its
    /// binding. Recursive groups are left as links.
    pub fn resolve(&mut self, ty: &Type) -> Type {
        let ty = self.repr(ty.clone());
        match ty {
            Type::App {
                cons,
                params,
                underlying,
            } => Type::App {
                cons: Box::new(self.resolve(&cons)),
                params: params.iter().map(|p| self.resolve(p)).collect(),
                underlying: underlying.map(|u| Box::new(self.resolve(&u))),
            },
            Type::Arrow {
                params,
                ret,
                method,
            } => Type::Arrow {
                params: params.iter().map(|p| self.resolve(p)).collect(),
                ret: Box::new(self.resolve(&ret)),
                method,
            },
            Type::Record(row) => Type::Record(Box::new(self.resolve(&row))),
            Type::Variant(row) => Type::Variant(Box::new(self.resolve(&row))),
            Type::RowExtend { labels, rest } => Type::RowExtend {
                labels: labels
                    .iter()
                    .map(|(l, ts)| (l, ts.iter().map(|t| self.resolve(t)).collect()))
                    .collect(),
                rest: Box::new(self.resolve(&rest)),
            },
            other => other,
        }
    }

    // ----- occurs check, level lowering, weak propagation --------------

    /// Walk `ty` before linking `id` to it: reject occurrences of `id`
    /// (outside recursive links), lower levels above `level`, and spread
    /// weakness when `weak`.
    fn occurs_adjust(
        &mut self,
        id: TypeVarId,
        level: u32,
        weak: bool,
        ty: &Type,
    ) -> Result<(), TypeError> {
        let ty = self.repr(ty.clone());
        match ty {
            Type::Var(other) => {
                if other == id {
                    return Err(TypeError::new(
                        ErrorKind::OccursCheck,
                        format!(
                            "variable ?{} occurs in {}",
                            id.0,
                            self.describe(&Type::Var(other))
                        ),
                    ));
                }
                if let VarState::Unbound {
                    level: l2,
                    weak: w2,
                    size,
                    constraints,
                } = self.var_state(other).clone()
                {
                    let lowered = l2.min(level);
                    let weakened = w2 || weak;
                    if lowered != l2 || weakened != w2 {
                        self.set_state(
                            other,
                            VarState::Unbound {
                                level: lowered,
                                weak: weakened,
                                size,
                                constraints,
                            },
                        );
                    }
                }
                Ok(())
            }
            Type::App {
                cons,
                params,
                underlying,
            } => {
                self.occurs_adjust(id, level, weak, &cons)?;
                for p in &params {
                    self.occurs_adjust(id, level, weak, p)?;
                }
                if let Some(u) = underlying {
                    self.occurs_adjust(id, level, weak, &u)?;
                }
                Ok(())
            }
            Type::Arrow { params, ret, .. } => {
                for p in &params {
                    self.occurs_adjust(id, level, weak, p)?;
                }
                self.occurs_adjust(id, level, weak, &ret)
            }
            Type::Record(row) | Type::Variant(row) => self.occurs_adjust(id, level, weak, &row),
            Type::RowExtend { labels, rest } => {
                for (_, ts) in labels.iter() {
                    for t in ts {
                        self.occurs_adjust(id, level, weak, t)?;
                    }
                }
                self.occurs_adjust(id, level, weak, &rest)
            }
            // Recursive links legally close cycles; everything below them
            // was adjusted when the group was built or instantiated.
            Type::RecursiveLink { .. }
            | Type::Unit
            | Type::Const(_)
            | Type::Size(_)
            | Type::RowEmpty
            | Type::Method(_) => Ok(()),
        }
    }

    /// A size-restricted variable accepts size constants, other size
    /// variables (restricting them transitively), and aliases whose
    /// underlying resolves to one of those.
    fn check_size(&mut self, ty: &Type) -> Result<(), TypeError> {
        let ty = self.repr(ty.clone());
        match ty {
            Type::Size(_) => Ok(()),
            Type::Var(id) => match self.var_state(id).clone() {
                VarState::Unbound {
                    level,
                    weak,
                    size,
                    constraints,
                } => {
                    if !size {
                        self.set_state(
                            id,
                            VarState::Unbound {
                                level,
                                weak,
                                size: true,
                                constraints,
                            },
                        );
                    }
                    Ok(())
                }
                _ => Err(TypeError::new(
                    ErrorKind::SizeRestriction,
                    "size-restricted variable unified with a non-size variable",
                )),
            },
            Type::App {
                underlying: Some(u),
                ..
            } => self.check_size(&u),
            other => Err(TypeError::new(
                ErrorKind::SizeRestriction,
                format!(
                    "size-restricted variable unified with {}",
                    self.describe(&other)
                ),
            )),
        }
    }

    // ----- unification -------------------------------------------------

    fn bind(&mut self, id: TypeVarId, ty: Type) -> Result<(), TypeError> {
        let (level, weak, size, constraints) = match self.var_state(id).clone() {
            VarState::Unbound {
                level,
                weak,
                size,
                constraints,
            } => (level, weak, size, constraints),
            _ => {
                return Err(TypeError::new(
                    ErrorKind::InternalMalformed,
                    "attempted to bind a solved type variable",
                ))
            }
        };
        self.occurs_adjust(id, level, weak, &ty)?;
        if size {
            self.check_size(&ty)?;
        }
        if !constraints.is_empty() {
            let target = self.repr(ty.clone());
            if let Type::Var(other) = target {
                if let VarState::Unbound {
                    level,
                    weak,
                    size,
                    constraints: mut existing,
                } = self.var_state(other).clone()
                {
                    existing.extend(constraints.iter().copied());
                    self.set_state(
                        other,
                        VarState::Unbound {
                            level,
                            weak,
                            size,
                            constraints: existing,
                        },
                    );
                }
            } else {
                for c in &constraints {
                    self.deferred.push((*c, target.clone()));
                }
            }
        }
        if log::log_enabled!(log::Level::Trace) {
            trace!("bind ?{} := {}", id.0, self.describe(&ty));
        }
        self.link(id, ty);
        Ok(())
    }

    /// Unify two types, mutating variable state on success. On failure
    /// some variables may already have been linked; inference treats the
    /// first failure as fatal, so no rollback is attempted (except inside
    /// the speculative alias path).
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), TypeError> {
        let a = self.repr(a.clone());
        let b = self.repr(b.clone());
        self.unify_repr(a, b)
    }

    fn unify_repr(&mut self, a: Type, b: Type) -> Result<(), TypeError> {
        if let (Type::Var(x), Type::Var(y)) = (&a, &b) {
            if x == y {
                return Ok(());
            }
        }
        match (&a, &b) {
            (Type::Var(id), _) if self.is_unbound(*id) => return self.bind(*id, b),
            (_, Type::Var(id)) if self.is_unbound(*id) => return self.bind(*id, a),
            (Type::Var(_), _) | (_, Type::Var(_)) => {
                return Err(TypeError::new(
                    ErrorKind::InternalMalformed,
                    "generic type variable unified directly; instantiate the scheme first",
                ))
            }
            _ => {}
        }
        match (a, b) {
            (Type::Unit, Type::Unit) => Ok(()),
            (Type::Const(x), Type::Const(y)) if x == y => Ok(()),
            (Type::Size(x), Type::Size(y)) if x == y => Ok(()),
            (a @ Type::App { .. }, b @ Type::App { .. }) => self.unify_apps(a, b),
            (
                Type::App {
                    underlying: Some(u),
                    ..
                },
                other,
            ) => self.unify(&u, &other),
            (
                other,
                Type::App {
                    underlying: Some(u),
                    ..
                },
            ) => self.unify(&other, &u),
            (
                Type::Arrow {
                    params: p1,
                    ret: r1,
                    ..
                },
                Type::Arrow {
                    params: p2,
                    ret: r2,
                    ..
                },
            ) => {
                if p1.len() != p2.len() {
                    return Err(TypeError::new(
                        ErrorKind::ArityMismatch,
                        format!(
                            "function takes {} arguments, but {} were expected",
                            p1.len(),
                            p2.len()
                        ),
                    ));
                }
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(&r1, &r2)
            }
            (Type::Record(r1), Type::Record(r2)) => self.unify(&r1, &r2),
            (Type::Variant(r1), Type::Variant(r2)) => self.unify(&r1, &r2),
            (Type::RowEmpty, Type::RowEmpty) => Ok(()),
            (a @ Type::RowExtend { .. }, b @ Type::RowExtend { .. }) => self.unify_rows(a, b),
            (Type::RowEmpty, Type::RowExtend { labels, .. })
            | (Type::RowExtend { labels, .. }, Type::RowEmpty) => Err(TypeError::new(
                ErrorKind::RowLabelMismatch,
                format!(
                    "row is missing label(s) {}",
                    labels
                        .labels()
                        .map(|l| format!("`{}`", interner::resolve_or_default(l)))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
            (
                Type::RecursiveLink { rec: r1, index: i1 },
                Type::RecursiveLink { rec: r2, index: i2 },
            ) => self.unify_rec_links(r1, i1, r2, i2),
            (Type::RecursiveLink { rec, index }, other) => {
                let unrolled = self.unroll(rec, index)?;
                self.unify(&unrolled, &other)
            }
            (other, Type::RecursiveLink { rec, index }) => {
                let unrolled = self.unroll(rec, index)?;
                self.unify(&other, &unrolled)
            }
            (Type::Method(m1), Type::Method(m2)) if m1 == m2 => Ok(()),
            (a, b) => Err(TypeError::mismatch(format!(
                "could not match {} with {}",
                self.describe(&a),
                self.describe(&b)
            ))),
        }
    }

    /// Unify two applications. Aliases are transparent but the applied
    /// form is preferred: try it speculatively for better errors, then
    /// fall back to the underlying types.
    fn unify_apps(&mut self, a: Type, b: Type) -> Result<(), TypeError> {
        let (
            Type::App {
                cons: c1,
                params: p1,
                underlying: u1,
            },
            Type::App {
                cons: c2,
                params: p2,
                underlying: u2,
            },
        ) = (a.clone(), b.clone())
        else {
            return Err(TypeError::new(
                ErrorKind::InternalMalformed,
                "unify_apps on non-application types",
            ));
        };
        let has_alias = u1.is_some() || u2.is_some();
        let applied = self.speculate(has_alias, |state| {
            state.unify(&c1, &c2)?;
            if p1.len() != p2.len() {
                return Err(TypeError::mismatch(format!(
                    "could not match {} with {}: wrong number of type parameters",
                    state.describe(&a),
                    state.describe(&b)
                )));
            }
            for (x, y) in p1.iter().zip(p2.iter()) {
                state.unify(x, y)?;
            }
            Ok(())
        });
        match applied {
            Ok(()) => Ok(()),
            Err(err) => match (u1, u2) {
                (None, None) => Err(err),
                (Some(x), Some(y)) => self.unify(&x, &y),
                (Some(x), None) => self.unify(&x, &b),
                (None, Some(y)) => self.unify(&a, &y),
            },
        }
    }

    /// Run `f`, journaling variable writes; roll them back on failure.
    /// With `active` false this is a plain call (no journal overhead).
    fn speculate(
        &mut self,
        active: bool,
        f: impl FnOnce(&mut Self) -> Result<(), TypeError>,
    ) -> Result<(), TypeError> {
        if !active {
            return f(self);
        }
        let saved = self.trail.replace(Vec::new());
        let result = f(self);
        let trail = self.trail.take().unwrap_or_default();
        self.trail = saved;
        match result {
            Ok(()) => {
                if let Some(outer) = self.trail.as_mut() {
                    outer.extend(trail);
                }
                Ok(())
            }
            Err(err) => {
                for (id, old) in trail.into_iter().rev() {
                    self.vars[id.0 as usize] = old;
                }
                Err(err)
            }
        }
    }

    /// Row unification: expose each left label on the right via
    /// `rewrite_row`, unify the scoped lists element-wise, then absorb
    /// the right's residual into the left tail.
    fn unify_rows(&mut self, a: Type, b: Type) -> Result<(), TypeError> {
        let (amap, atail) = self.flatten_row(&a)?;
        // If both rows share a tail variable, rewriting the right side
        // links the left tail too; that would grow the row forever.
        let atail_guard = match atail {
            Type::Var(id) if self.is_unbound(id) => Some(id),
            _ => None,
        };
        let mut brow = b;
        for (label, xs) in amap.iter() {
            match self.rewrite_row(&brow, label, xs.len()) {
                Ok((ys, rest)) => {
                    for (x, y) in xs.iter().zip(ys.iter()) {
                        self.unify(x, y)?;
                    }
                    brow = rest;
                }
                Err(err) if err.kind == ErrorKind::RowLabelMissing => {
                    return Err(TypeError::new(
                        ErrorKind::RowLabelMismatch,
                        format!(
                            "label `{}` is missing from {}",
                            interner::resolve_or_default(label),
                            self.describe(&brow)
                        ),
                    ))
                }
                Err(err) => return Err(err),
            }
        }
        if let Some(id) = atail_guard {
            if !self.is_unbound(id) {
                return Err(TypeError::new(
                    ErrorKind::RecursiveRow,
                    "rows share a tail variable but differ in labels",
                ));
            }
        }
        self.unify(&atail, &brow)
    }

    fn unify_rec_links(
        &mut self,
        r1: RecId,
        i1: usize,
        r2: RecId,
        i2: usize,
    ) -> Result<(), TypeError> {
        if r1 == r2 && i1 == i2 {
            return Ok(());
        }
        let pair = ((r1, i1), (r2, i2));
        if self.rec_pairs.contains(&pair) {
            return Ok(());
        }
        self.rec_pairs.push(pair);
        let ta = self.unroll(r1, i1);
        let tb = self.unroll(r2, i2);
        let result = match (ta, tb) {
            (Ok(ta), Ok(tb)) => self.unify(&ta, &tb),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        self.rec_pairs.pop();
        result
    }

    fn unroll(&self, rec: RecId, index: usize) -> Result<Type, TypeError> {
        self.recs
            .get(rec.0 as usize)
            .and_then(|group| group.types.get(index))
            .cloned()
            .ok_or_else(|| {
                TypeError::new(
                    ErrorKind::InternalMalformed,
                    "recursive link points outside its group",
                )
            })
    }

    // ----- recursive groups --------------------------------------------

    /// Allocate an empty recursive group; members are filled in with
    /// `set_rec_types` once the links into the group exist.
    pub fn new_rec_group(&mut self, names: &[Symbol]) -> RecId {
        let id = RecId(self.recs.len() as u32);
        let indexes = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        self.recs.push(RecGroup {
            names: names.to_vec(),
            indexes,
            types: Vec::new(),
            generic: false,
            instantiated: false,
        });
        id
    }

    pub fn set_rec_types(&mut self, rec: RecId, types: Vec<Type>) {
        self.recs[rec.0 as usize].types = types;
        let members = self.recs[rec.0 as usize].types.clone();
        let generic = members.iter().any(|t| self.is_generic(t));
        self.recs[rec.0 as usize].generic = generic;
    }

    /// Link to a group member by name.
    pub fn rec_link(&self, rec: RecId, name: Symbol) -> Option<Type> {
        let index = *self.recs.get(rec.0 as usize)?.indexes.get(&name)?;
        Some(Type::RecursiveLink { rec, index })
    }

    pub(crate) fn rec(&self, rec: RecId) -> &RecGroup {
        &self.recs[rec.0 as usize]
    }

    pub(crate) fn clone_rec_instantiated(&mut self, rec: RecId) -> RecId {
        let mut group = self.recs[rec.0 as usize].clone();
        group.instantiated = true;
        let id = RecId(self.recs.len() as u32);
        self.recs.push(group);
        id
    }

    pub(crate) fn rec_mut(&mut self, rec: RecId) -> &mut RecGroup {
        &mut self.recs[rec.0 as usize]
    }

    // ----- type classes ------------------------------------------------

    pub fn declare_class(&mut self, name: Symbol, methods: Vec<(Symbol, Type)>) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(TypeClassDef {
            name,
            methods: methods.into_iter().collect(),
            instances: Vec::new(),
        });
        id
    }

    /// Add a method signature to a class. Signatures typically quantify
    /// over a variable constrained by the class itself, so methods are
    /// added after `declare_class` returns the id.
    pub fn add_method(&mut self, class: ClassId, name: Symbol, signature: Type) {
        self.classes[class.0 as usize].methods.insert(name, signature);
    }

    /// Register an instance head for a class. Matching is nominal: a
    /// deferred constraint is satisfied when the constrained type's head
    /// constructor equals an instance head's constructor.
    pub fn add_instance(&mut self, class: ClassId, head: Type) {
        self.classes[class.0 as usize].instances.push(head);
    }

    /// An unresolved reference to `class`'s method `name`.
    pub fn method(&self, class: ClassId, name: Symbol) -> Type {
        Type::Method(MethodRef { class, name })
    }

    pub(crate) fn class(&self, id: ClassId) -> &TypeClassDef {
        &self.classes[id.0 as usize]
    }

    /// Discharge constraints queued during unification. Constraints whose
    /// type is still an unsolved variable are re-attached to it (they may
    /// resolve in a later inference against the same environment).
    pub fn discharge_constraints(&mut self) -> Result<(), TypeError> {
        let deferred = mem::take(&mut self.deferred);
        for (constraint, ty) in deferred {
            let ty = self.repr(ty);
            if let Type::Var(id) = ty {
                if let VarState::Unbound {
                    level,
                    weak,
                    size,
                    mut constraints,
                } = self.var_state(id).clone()
                {
                    constraints.push(constraint);
                    self.set_state(
                        id,
                        VarState::Unbound {
                            level,
                            weak,
                            size,
                            constraints,
                        },
                    );
                    continue;
                }
            }
            if !self.instance_matches(constraint.class, &ty) {
                return Err(TypeError::new(
                    ErrorKind::UnresolvedConstraint,
                    format!(
                        "no instance of `{}` for {}",
                        interner::resolve_or_default(self.class(constraint.class).name),
                        self.describe(&ty)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn instance_matches(&mut self, class: ClassId, ty: &Type) -> bool {
        let heads = self.class(class).instances.clone();
        heads.iter().any(|head| self.same_head(head, ty))
    }

    fn same_head(&mut self, head: &Type, ty: &Type) -> bool {
        let head = self.repr(head.clone());
        let ty = self.repr(ty.clone());
        match (head, ty) {
            (Type::Const(a), Type::Const(b)) => a == b,
            (Type::App { cons: c1, .. }, Type::App { cons: c2, .. }) => self.same_head(&c1, &c2),
            (Type::Arrow { .. }, Type::Arrow { .. }) => true,
            (Type::Record(_), Type::Record(_)) => true,
            (Type::Variant(_), Type::Variant(_)) => true,
            (Type::Unit, Type::Unit) => true,
            (Type::Size(a), Type::Size(b)) => a == b,
            _ => false,
        }
    }

    // ----- rendering ---------------------------------------------------

    /// Render a type for error messages and debugging, following links
    /// read-only. Unsolved variables print as `?n`, generic ones as `'n`.
    pub fn describe(&self, ty: &Type) -> String {
        let mut out = String::new();
        self.fmt_type(ty, &mut out);
        out
    }

    fn fmt_type(&self, ty: &Type, out: &mut String) {
        use std::fmt::Write;
        match self.peek(ty) {
            Type::Unit => out.push_str("()"),
            Type::Const(name) => out.push_str(&interner::resolve_or_default(name)),
            Type::Size(n) => {
                let _ = write!(out, "{n}");
            }
            Type::Var(id) => {
                let sigil = match self.var_state(id) {
                    VarState::Generic { .. } => '\'',
                    _ => '?',
                };
                let _ = write!(out, "{sigil}{}", id.0);
            }
            Type::App { cons, params, .. } => {
                self.fmt_type(&cons, out);
                if !params.is_empty() {
                    out.push('[');
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.fmt_type(p, out);
                    }
                    out.push(']');
                }
            }
            Type::Arrow { params, ret, .. } => {
                if params.len() == 1 {
                    self.fmt_type(&params[0], out);
                } else {
                    out.push('(');
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.fmt_type(p, out);
                    }
                    out.push(')');
                }
                out.push_str(" -> ");
                self.fmt_type(&ret, out);
            }
            Type::Method(m) => {
                let class = self
                    .classes
                    .get(m.class.0 as usize)
                    .map(|c| interner::resolve_or_default(c.name))
                    .unwrap_or_default();
                let _ = write!(out, "{class}.{}", interner::resolve_or_default(m.name));
            }
            Type::Record(row) => self.fmt_row(&row, '{', '}', out),
            Type::Variant(row) => self.fmt_row(&row, '[', ']', out),
            row @ (Type::RowEmpty | Type::RowExtend { .. }) => self.fmt_row(&row, '<', '>', out),
            Type::RecursiveLink { rec, index } => {
                let name = self
                    .recs
                    .get(rec.0 as usize)
                    .and_then(|g| g.names.get(index))
                    .map(|n| interner::resolve_or_default(*n))
                    .unwrap_or_default();
                out.push_str(&name);
            }
        }
    }

    fn fmt_row(&self, row: &Type, open: char, close: char, out: &mut String) {
        use std::fmt::Write;
        out.push(open);
        let mut cur = self.peek(row);
        let mut first = true;
        loop {
            match cur {
                Type::RowEmpty => break,
                Type::Var(id) => {
                    let _ = write!(out, " | ?{}", id.0);
                    break;
                }
                Type::RowExtend { labels, rest } => {
                    for (label, ts) in labels.iter() {
                        for t in ts {
                            if !first {
                                out.push_str(", ");
                            }
                            first = false;
                            out.push_str(&interner::resolve_or_default(label));
                            out.push_str(" : ");
                            self.fmt_type(t, out);
                        }
                    }
                    cur = self.peek(&rest);
                }
                other => {
                    self.fmt_type(&other, out);
                    break;
                }
            }
        }
        out.push(close);
    }
}
