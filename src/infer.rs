use log::debug;

use crate::ast::{
    ControlFlowGraph, Expr, ExprId, ExprKind, LetBinding, MatchCase, RETURN_BLOCK,
};
use crate::env::{EnvStash, TypeEnv};
use crate::error::{ErrorKind, TypeError};
use crate::interner::{self, Symbol};
use crate::row::{make_row, LabelMap};
use crate::scc::{analyze, Analysis};
use crate::types::{ClassId, RecId, Type, VarState};
use crate::unify::UnifyState;

/// The inference driver.
///
/// Owns the unification state, the environment stash, and the SCC
/// analysis for the expression currently being inferred. Not safe for
/// concurrent use; independent contexts may run in parallel as long as
/// they share no environment.
pub struct InferenceContext {
    state: UnifyState,
    stash: EnvStash,
    analysis: Analysis,
    let_group_cursor: usize,
    control_flow_cursor: usize,
    annotate: bool,
    invalid: Option<ExprId>,
}

impl Default for InferenceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceContext {
    pub fn new() -> Self {
        InferenceContext {
            state: UnifyState::new(),
            stash: EnvStash::default(),
            analysis: Analysis::default(),
            let_group_cursor: 0,
            control_flow_cursor: 0,
            annotate: false,
            invalid: None,
        }
    }

    /// Enable or disable writing inferred types into the AST's
    /// annotation slots.
    pub fn annotate(&mut self, on: bool) {
        self.annotate = on;
    }

    /// Direct access to the unification state, e.g. for building
    /// environment types that need fresh or generic variables.
    pub fn state(&mut self) -> &mut UnifyState {
        &mut self.state
    }

    /// The expression where the most recent inference first failed.
    pub fn invalid_expr(&self) -> Option<ExprId> {
        self.invalid
    }

    // ----- type construction conveniences ------------------------------

    pub fn new_var(&mut self, level: u32) -> Type {
        self.state.new_var(level)
    }

    pub fn generic_var(&mut self) -> Type {
        self.state.generic_var()
    }

    pub fn generic_weak_var(&mut self) -> Type {
        self.state.generic_weak_var()
    }

    pub fn generic_size_var(&mut self) -> Type {
        self.state.generic_size_var()
    }

    pub fn generic_constrained_var(&mut self, class: ClassId) -> Type {
        self.state.generic_constrained_var(class)
    }

    pub fn declare_class(&mut self, name: &str, methods: Vec<(&str, Type)>) -> ClassId {
        let methods = methods
            .into_iter()
            .map(|(n, t)| (interner::intern(n), t))
            .collect();
        self.state.declare_class(interner::intern(name), methods)
    }

    pub fn add_method(&mut self, class: ClassId, name: &str, signature: Type) {
        self.state
            .add_method(class, interner::intern(name), signature);
    }

    pub fn add_instance(&mut self, class: ClassId, head: Type) {
        self.state.add_instance(class, head);
    }

    pub fn method(&self, class: ClassId, name: &str) -> Type {
        self.state.method(class, interner::intern(name))
    }

    /// Declare a group of mutually-recursive named types. The callback
    /// receives the group id so members can link back into the group.
    pub fn recursive(
        &mut self,
        names: &[&str],
        build: impl FnOnce(&mut UnifyState, RecId) -> Vec<Type>,
    ) -> RecId {
        let names: Vec<Symbol> = names.iter().map(|n| interner::intern(n)).collect();
        let rec = self.state.new_rec_group(&names);
        let types = build(&mut self.state, rec);
        self.state.set_rec_types(rec, types);
        rec
    }

    pub fn rec_link(&self, rec: RecId, name: &str) -> Option<Type> {
        self.state.rec_link(rec, interner::intern(name))
    }

    pub fn resolve(&mut self, ty: &Type) -> Type {
        self.state.resolve(ty)
    }

    pub fn describe(&self, ty: &Type) -> String {
        self.state.describe(ty)
    }

    // ----- drive API ---------------------------------------------------

    /// Infer the principal type of `expr` under `env`.
    ///
    /// Runs the SCC pre-analysis (assigning node ids), walks the tree,
    /// and discharges deferred instance constraints. In annotation mode
    /// each node's inferred type is written into its slot.
    pub fn infer(&mut self, env: &mut TypeEnv, expr: &mut Expr) -> Result<Type, TypeError> {
        self.invalid = None;
        self.let_group_cursor = 0;
        self.control_flow_cursor = 0;
        self.analysis = analyze(expr).map_err(|e| {
            self.invalid = e.at;
            e
        })?;
        debug!("inference start (annotate={})", self.annotate);
        let ty = self.infer_expr(env, 0, expr)?;
        self.state
            .discharge_constraints()
            .map_err(|e| self.fail(expr.id, e))?;
        debug!("inference done: {}", self.state.describe(&ty));
        Ok(ty)
    }

    fn fail(&mut self, id: ExprId, err: TypeError) -> TypeError {
        let err = err.at(id);
        if self.invalid.is_none() {
            self.invalid = err.at;
        }
        err
    }

    fn infer_expr(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        expr: &mut Expr,
    ) -> Result<Type, TypeError> {
        let id = expr.id;
        let ty = self.infer_kind(env, level, id, &mut expr.kind)?;
        if self.annotate {
            expr.ty = Some(ty.clone());
        }
        Ok(ty)
    }

    fn infer_kind(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        kind: &mut ExprKind,
    ) -> Result<Type, TypeError> {
        match kind {
            ExprKind::Literal(lit) => {
                let construct = lit.construct.clone();
                let mut using = Vec::with_capacity(lit.using.len());
                for name in &lit.using {
                    match env.lookup(*name) {
                        Some(t) => using.push(t.clone()),
                        None => {
                            let name = interner::resolve_or_default(*name);
                            return Err(self.fail(id, TypeError::unbound(&name)));
                        }
                    }
                }
                let ty = construct(&mut self.state, env, level, &using)
                    .map_err(|e| self.fail(id, e))?;
                Ok(self.state.instantiate(level, &ty))
            }

            ExprKind::Var(name) => match env.lookup(*name).cloned() {
                Some(ty) => Ok(self.state.instantiate(level, &ty)),
                None => {
                    let name = interner::resolve_or_default(*name);
                    Err(self.fail(id, TypeError::unbound(&name)))
                }
            },

            ExprKind::Deref { reference } => {
                let ref_ty = self.infer_expr(env, level, reference)?;
                let cell = self.state.new_weak_var(level);
                self.state
                    .unify(&Type::reference(cell.clone()), &ref_ty)
                    .map_err(|e| self.fail(id, e))?;
                Ok(self.state.repr(cell))
            }

            ExprKind::DerefAssign { reference, value } => {
                let ref_ty = self.infer_expr(env, level, reference)?;
                let cell = self.state.new_weak_var(level);
                self.state
                    .unify(&Type::reference(cell.clone()), &ref_ty)
                    .map_err(|e| self.fail(id, e))?;
                let val_ty = self.infer_expr(env, level, value)?;
                self.state
                    .unify(&cell, &val_ty)
                    .map_err(|e| self.fail(id, e))?;
                Ok(self.state.repr(ref_ty))
            }

            ExprKind::Call { func, args, fn_ty } => {
                let func_ty = self.infer_expr(env, level, func)?;
                let arrow = self
                    .match_func_type(args.len(), &func_ty)
                    .map_err(|e| self.fail(id, e))?;
                let Type::Arrow { params, ret, .. } = arrow else {
                    return Err(self.fail(
                        id,
                        TypeError::new(ErrorKind::InternalMalformed, "expected an arrow type"),
                    ));
                };
                for (param, arg) in params.iter().zip(args.iter_mut()) {
                    let arg_ty = self.infer_expr(env, level, arg)?;
                    self.state
                        .unify(param, &arg_ty)
                        .map_err(|e| self.fail(id, e))?;
                }
                if self.annotate {
                    *fn_ty = Some(self.state.resolve(&func_ty));
                }
                Ok(*ret)
            }

            ExprKind::Func { params, body } => {
                let names = params.clone();
                let vars = self.state.new_vars(level, names.len());
                let mut stashed = 0;
                for (name, var) in names.iter().zip(vars.iter()) {
                    stashed += self.stash.stash(env, *name);
                    env.assign(*name, var.clone());
                }
                let result = self.infer_expr(env, level, body);
                for name in &names {
                    env.remove(*name);
                }
                self.stash.unstash(env, stashed);
                Ok(Type::arrow(vars, result?))
            }

            ExprKind::Let { name, value, body } => {
                let name = *name;
                self.infer_let(env, level, id, name, value, body)
            }

            ExprKind::LetGroup { binds, body, sccs } => {
                self.infer_let_group(env, level, id, binds, body, sccs)
            }

            ExprKind::Pipe {
                as_name,
                source,
                steps,
            } => {
                let as_name = *as_name;
                let mut ty = self.infer_expr(env, level + 1, source)?;
                if steps.is_empty() {
                    return Ok(ty);
                }
                let stashed = self.stash.stash(env, as_name);
                for step in steps.iter_mut() {
                    // Each step sees the previous step's result as a
                    // generalized placeholder.
                    self.state.generalize(level, &ty);
                    env.assign(as_name, ty.clone());
                    ty = self.infer_expr(env, level, step)?;
                }
                env.remove(as_name);
                self.stash.unstash(env, stashed);
                Ok(ty)
            }

            ExprKind::ControlFlow(graph) => self.infer_control_flow(env, level, id, graph),

            ExprKind::RecordEmpty => Ok(Type::record(Type::RowEmpty)),

            ExprKind::RecordSelect { record, label } => {
                let label = *label;
                let (label_ty, _rest) = self.split_record(env, level, id, record, label)?;
                Ok(label_ty)
            }

            ExprKind::RecordRestrict { record, label } => {
                let label = *label;
                let (_label_ty, rest) = self.split_record(env, level, id, record, label)?;
                Ok(rest)
            }

            ExprKind::RecordExtend { record, labels } => {
                let mut extension = LabelMap::new();
                for lv in labels.iter_mut() {
                    let ty = self.infer_expr(env, level, &mut lv.value)?;
                    extension.push(lv.label, ty);
                }
                let row = self.state.new_var(level);
                let record_ty = self.infer_expr(env, level, record)?;
                self.state
                    .unify(&Type::record(row.clone()), &record_ty)
                    .map_err(|e| self.fail(id, e))?;
                let ext = Type::row_extend(extension, row);
                let (flat, rest) = self.state.flatten_row(&ext).map_err(|e| self.fail(id, e))?;
                Ok(Type::record(make_row(flat, rest)))
            }

            ExprKind::Variant { label, value } => {
                let label = *label;
                let row = self.state.new_var(level);
                let variant_var = self.state.new_var(level);
                let value_ty = self.infer_expr(env, level, value)?;
                self.state
                    .unify(&variant_var, &value_ty)
                    .map_err(|e| self.fail(id, e))?;
                Ok(Type::variant(Type::row_extend(
                    LabelMap::singleton(label, variant_var),
                    row,
                )))
            }

            ExprKind::Match {
                value,
                cases,
                default,
            } => {
                let (ret_ty, row_ty) = match default {
                    None => (self.state.new_var(level), Type::RowEmpty),
                    Some(d) => {
                        let row = self.state.new_var(level);
                        let stashed = self.stash.stash(env, d.var);
                        env.assign(d.var, Type::variant(row.clone()));
                        let result = self.infer_expr(env, level, &mut d.body);
                        env.remove(d.var);
                        self.stash.unstash(env, stashed);
                        (result?, row)
                    }
                };
                let match_ty = self.infer_expr(env, level, value)?;
                let cases_row = self.infer_cases(env, level, id, &ret_ty, row_ty, cases)?;
                self.state
                    .unify(&match_ty, &Type::variant(cases_row))
                    .map_err(|e| self.fail(id, e))?;
                Ok(ret_ty)
            }
        }
    }

    /// `label, rest := fresh, fresh; unify({label : label | rest}, record)`
    fn split_record(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        record: &mut Expr,
        label: Symbol,
    ) -> Result<(Type, Type), TypeError> {
        let row = self.state.new_var(level);
        let label_ty = self.state.new_var(level);
        let expected = Type::record(Type::row_extend(
            LabelMap::singleton(label, label_ty.clone()),
            row.clone(),
        ));
        let record_ty = self.infer_expr(env, level, record)?;
        self.state
            .unify(&expected, &record_ty)
            .map_err(|e| self.fail(id, e))?;
        Ok((label_ty, Type::record(row)))
    }

    /// If the applied type is an unsolved variable, link it to a fresh
    /// arrow of the right arity; otherwise check the arity.
    fn match_func_type(&mut self, argc: usize, ty: &Type) -> Result<Type, TypeError> {
        let ty = self.state.repr(ty.clone());
        match ty {
            Type::Arrow { ref params, .. } => {
                if params.len() != argc {
                    return Err(TypeError::new(
                        ErrorKind::ArityMismatch,
                        format!(
                            "function expects {} argument(s), {} given",
                            params.len(),
                            argc
                        ),
                    ));
                }
                Ok(ty)
            }
            Type::Var(id) => match self.state.var_state(id) {
                VarState::Unbound { level, .. } => {
                    let level = *level;
                    let params = self.state.new_vars(level, argc);
                    let ret = self.state.new_var(level);
                    let arrow = Type::arrow(params, ret);
                    self.state.unify(&Type::Var(id), &arrow)?;
                    Ok(arrow)
                }
                _ => Err(TypeError::new(
                    ErrorKind::InternalMalformed,
                    "type variable for applied function has not been instantiated",
                )),
            },
            other => Err(TypeError::new(
                ErrorKind::UnexpectedFunctionType,
                format!("cannot call a value of type {}", self.state.describe(&other)),
            )),
        }
    }

    fn infer_let(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        name: Symbol,
        value: &mut Expr,
        body: &mut Expr,
    ) -> Result<Type, TypeError> {
        // `let x = y in e` for a bare variable: bind the looked-up type
        // without instantiating or generalizing, preserving aliasing.
        if let ExprKind::Var(alias) = value.kind {
            let Some(ty) = env.lookup(alias).cloned() else {
                let alias = interner::resolve_or_default(alias);
                return Err(self.fail(value.id, TypeError::unbound(&alias)));
            };
            let stashed = self.stash.stash(env, name);
            env.assign(name, ty);
            let result = self.infer_expr(env, level, body);
            env.remove(name);
            self.stash.unstash(env, stashed);
            return result;
        }

        // Self-reference is only allowed within function values.
        if !matches!(value.kind, ExprKind::Func { .. }) {
            let value_ty = self.infer_expr(env, level + 1, value)?;
            self.state.generalize(level, &value_ty);
            let stashed = self.stash.stash(env, name);
            env.assign(name, value_ty);
            let result = self.infer_expr(env, level, body);
            env.remove(name);
            self.stash.unstash(env, stashed);
            return result;
        }

        let tv = self.state.new_var(level + 1);
        let stashed = self.stash.stash(env, name);
        env.assign(name, tv.clone());
        let value_ty = self.infer_expr(env, level + 1, value)?;
        self.state
            .unify(&tv, &value_ty)
            .map_err(|e| self.fail(id, e))?;
        self.state.generalize(level, &value_ty);
        env.assign(name, value_ty);
        let result = self.infer_expr(env, level, body);
        env.remove(name);
        self.stash.unstash(env, stashed);
        result
    }

    /// Grouped bindings are processed one strongly-connected component at
    /// a time, dependencies first, so generalization within one component
    /// never observes variables of a later one.
    fn infer_let_group(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        binds: &mut [LetBinding],
        body: &mut Expr,
        sccs_slot: &mut Option<Vec<Vec<usize>>>,
    ) -> Result<Type, TypeError> {
        let sccs = self
            .analysis
            .let_groups
            .get(self.let_group_cursor)
            .cloned()
            .ok_or_else(|| {
                TypeError::new(
                    ErrorKind::InternalMalformed,
                    "missing SCC analysis for let group",
                )
            })?;
        self.let_group_cursor += 1;

        let mut stashed = 0;
        for scc in &sccs {
            // Fresh variables for every binding of the component, bound
            // up-front so mutual recursion can see them.
            let vars = self.state.new_vars(level + 1, scc.len());
            for (&i, var) in scc.iter().zip(vars.iter()) {
                let name = binds[i].name;
                stashed += self.stash.stash(env, name);
                env.assign(name, var.clone());
            }
            for (&i, var) in scc.iter().zip(vars.iter()) {
                let name = binds[i].name;
                let is_func = matches!(binds[i].value.kind, ExprKind::Func { .. });
                if !is_func {
                    // Non-function values may not refer to themselves;
                    // restore the outer shadowed binding (if any) while
                    // the value is inferred.
                    match self.stash.find_recent(stashed, name).cloned() {
                        Some(outer) => env.assign(name, outer),
                        None => env.remove(name),
                    }
                }
                let value_ty = self.infer_expr(env, level + 1, &mut binds[i].value)?;
                self.state
                    .unify(var, &value_ty)
                    .map_err(|e| self.fail(id, e))?;
                if !is_func {
                    env.assign(name, var.clone());
                }
            }
            for (&i, var) in scc.iter().zip(vars.iter()) {
                self.state.generalize(level, var);
                env.assign(binds[i].name, var.clone());
            }
        }

        let result = self.infer_expr(env, level, body);
        for bind in binds.iter() {
            env.remove(bind.name);
        }
        self.stash.unstash(env, stashed);
        let ty = result?;
        if self.annotate {
            *sccs_slot = Some(sccs);
        }
        Ok(ty)
    }

    /// Locals are bound to weak mutable references; loop components are
    /// inferred against a second set of references which must then agree
    /// with the originals, enforcing consistency across iterations.
    fn infer_control_flow(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        graph: &mut ControlFlowGraph,
    ) -> Result<Type, TypeError> {
        let sccs = self
            .analysis
            .control_flows
            .get(self.control_flow_cursor)
            .cloned()
            .ok_or_else(|| {
                TypeError::new(
                    ErrorKind::InternalMalformed,
                    "missing SCC analysis for control-flow graph",
                )
            })?;
        self.control_flow_cursor += 1;

        let locals = graph.locals.clone();
        let mut stashed = 0;
        let mut refs = Vec::with_capacity(locals.len());
        for name in &locals {
            stashed += self.stash.stash(env, *name);
            let cell = self.state.new_weak_var(level);
            let reference = Type::reference(cell);
            env.assign(*name, reference.clone());
            refs.push(reference);
        }

        let mut ret: Option<Type> = None;
        for scc in &sccs {
            let is_cycle = scc.len() > 1 || graph.has_jump(scc[0], scc[0]);
            if !is_cycle {
                let block = scc[0];
                let count = graph.blocks[block].exprs.len();
                for i in 0..count {
                    let ty = self.infer_expr(env, level, &mut graph.blocks[block].exprs[i])?;
                    // The return block's final expression is the value of
                    // the whole graph.
                    if block == RETURN_BLOCK && i == count - 1 {
                        ret = Some(ty);
                    }
                }
                continue;
            }
            let mut loop_refs = Vec::with_capacity(locals.len());
            for name in &locals {
                let cell = self.state.new_weak_var(level);
                let reference = Type::reference(cell);
                env.assign(*name, reference.clone());
                loop_refs.push(reference);
            }
            for &block in scc {
                for i in 0..graph.blocks[block].exprs.len() {
                    self.infer_expr(env, level, &mut graph.blocks[block].exprs[i])?;
                }
            }
            for (original, looped) in refs.iter().zip(loop_refs.iter()) {
                self.state
                    .unify(original, looped)
                    .map_err(|e| self.fail(id, e))?;
            }
            for (name, original) in locals.iter().zip(refs.iter()) {
                env.assign(*name, original.clone());
            }
        }

        for name in &locals {
            env.remove(*name);
        }
        self.stash.unstash(env, stashed);

        let Some(ret) = ret else {
            return Err(self.fail(
                id,
                TypeError::new(
                    ErrorKind::ControlFlowInvalid,
                    "control flow must reach the return block and yield a value",
                ),
            ));
        };
        if self.annotate {
            graph.sccs = Some(sccs);
        }
        Ok(ret)
    }

    /// Cases are processed right to left, each extending the accumulated
    /// variant row, so the match value unifies against the full row at
    /// the end.
    fn infer_cases(
        &mut self,
        env: &mut TypeEnv,
        level: u32,
        id: ExprId,
        ret_ty: &Type,
        mut row_ty: Type,
        cases: &mut [MatchCase],
    ) -> Result<Type, TypeError> {
        let vars = self.state.new_vars(level, cases.len());
        for (i, case) in cases.iter_mut().enumerate().rev() {
            let variant_var = vars[i].clone();
            let stashed = self.stash.stash(env, case.var);
            env.assign(case.var, variant_var.clone());
            if self.annotate {
                case.variant_ty = Some(variant_var.clone());
            }
            let result = self.infer_expr(env, level, &mut case.body);
            env.remove(case.var);
            self.stash.unstash(env, stashed);
            let body_ty = result?;
            self.state
                .unify(ret_ty, &body_ty)
                .map_err(|e| self.fail(id, e))?;
            row_ty = Type::row_extend(LabelMap::singleton(case.label, variant_var), row_ty);
        }
        Ok(row_ty)
    }
}
