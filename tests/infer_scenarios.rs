//! End-to-end inference scenarios.
//!
//! Each test builds an expression with the `ast::build` helpers, infers
//! it against a hand-declared environment, and checks the resolved type
//! (or the error kind) structurally.

use polyrow::ast::{build, ControlFlowGraph, Expr, ExprKind, ENTRY_BLOCK, RETURN_BLOCK};
use polyrow::interner::intern;
use polyrow::row::LabelMap;
use polyrow::{ErrorKind, InferenceContext, Type, TypeEnv};

fn setup() -> (InferenceContext, TypeEnv) {
    let _ = env_logger::builder().is_test(true).try_init();
    (InferenceContext::new(), TypeEnv::new())
}

fn int_lit() -> Expr {
    build::literal("1", &[], |_, _, _, _| Ok(Type::int()))
}

fn bool_lit() -> Expr {
    build::literal("true", &[], |_, _, _, _| Ok(Type::boolean()))
}

/// `if_ : forall a. (bool, a, a) -> a`
fn declare_if(ctx: &mut InferenceContext, env: &mut TypeEnv) {
    let a = ctx.generic_var();
    env.assign(
        intern("if_"),
        Type::arrow(vec![Type::boolean(), a.clone(), a.clone()], a),
    );
}

// ===== Core scenarios =====

#[test]
fn s1_identity_is_fully_polymorphic() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::func(&["x"], build::var("x"));
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Arrow { params, ret, .. } = ctx.resolve(&ty) else {
        panic!("expected an arrow");
    };
    assert_eq!(params.len(), 1);
    assert_eq!(params[0], *ret, "fn (x) -> x must map a to a");
    assert!(matches!(params[0], Type::Var(_)));
}

#[test]
fn s2_self_application_of_let_bound_identity() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::let_(
        "id",
        build::func(&["x"], build::var("x")),
        build::call(build::var("id"), vec![build::var("id")]),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Arrow { params, ret, .. } = ctx.resolve(&ty) else {
        panic!("expected an arrow");
    };
    assert_eq!(params[0], *ret, "id(id) keeps the identity shape");
}

#[test]
fn s3_record_select_has_open_row() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::func(&["r"], build::record_select(build::var("r"), "x"));
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Arrow { params, ret, .. } = ctx.resolve(&ty) else {
        panic!("expected an arrow");
    };
    let Type::Record(row) = &params[0] else {
        panic!("parameter must be a record, got {}", ctx.describe(&params[0]));
    };
    let Type::RowExtend { labels, rest } = row.as_ref() else {
        panic!("record row must expose label x");
    };
    let x_types = labels.get(intern("x")).expect("label x present");
    assert_eq!(x_types[0], *ret, "selected label type is the return type");
    assert!(
        matches!(rest.as_ref(), Type::Var(_)),
        "the row tail must stay open"
    );
}

#[test]
fn s4_match_on_closed_variant_returns_case_type() {
    let (mut ctx, mut env) = setup();
    let mut row = LabelMap::new();
    row.push(intern("A"), Type::int());
    row.push(intern("B"), Type::int());
    env.assign(
        intern("v"),
        Type::variant(Type::row_extend(row, Type::RowEmpty)),
    );
    let mut expr = build::match_(
        build::var("v"),
        vec![
            build::match_case("A", "a", build::var("a")),
            build::match_case("B", "b", build::var("b")),
        ],
        None,
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::int());
}

#[test]
fn s5_infinite_recursion_types_fully_polymorphic() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::let_(
        "f",
        build::func(&["x"], build::call(build::var("f"), vec![build::var("x")])),
        build::var("f"),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Arrow { params, ret, .. } = ctx.resolve(&ty) else {
        panic!("expected an arrow");
    };
    assert!(matches!(params[0], Type::Var(_)));
    assert!(matches!(*ret, Type::Var(_)));
    assert_ne!(params[0], *ret, "argument and result stay independent");
}

#[test]
fn s6_storing_bool_into_int_ref_is_a_mismatch() {
    let (mut ctx, mut env) = setup();
    let a = ctx.generic_var();
    env.assign(
        intern("new_ref"),
        Type::arrow(vec![a.clone()], Type::reference(a)),
    );
    let mut expr = build::deref_assign(
        build::call(build::var("new_ref"), vec![int_lit()]),
        bool_lit(),
    );
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Mismatch);
}

#[test]
fn s7_scoped_labels_keep_ordered_lists() {
    let (mut ctx, mut env) = setup();
    // {x = 1, x = true}
    let mut expr = build::record_extend(None, vec![("x", int_lit()), ("x", bool_lit())]);
    let ty = ctx.infer(&mut env, &mut expr).unwrap();

    // Unifies against {x : int, x : bool | r} with the order preserved.
    let mut expected_labels = LabelMap::new();
    expected_labels.push(intern("x"), Type::int());
    expected_labels.push(intern("x"), Type::boolean());
    let tail = ctx.new_var(0);
    let expected = Type::record(Type::row_extend(expected_labels, tail));
    ctx.state().unify(&ty, &expected).unwrap();

    let Type::Record(row) = ctx.resolve(&ty) else {
        panic!("expected a record");
    };
    let (labels, _) = ctx.state().flatten_row(&row).unwrap();
    assert_eq!(
        labels.get(intern("x")).unwrap(),
        &[Type::int(), Type::boolean()],
        "scoped list order is int then bool"
    );

    // Swapped order must fail.
    let (mut ctx2, mut env2) = setup();
    let mut expr2 = build::record_extend(None, vec![("x", int_lit()), ("x", bool_lit())]);
    let ty2 = ctx2.infer(&mut env2, &mut expr2).unwrap();
    let mut swapped = LabelMap::new();
    swapped.push(intern("x"), Type::boolean());
    swapped.push(intern("x"), Type::int());
    let closed = Type::record(Type::row_extend(swapped, Type::RowEmpty));
    assert!(ctx2.state().unify(&ty2, &closed).is_err());
}

// ===== Let polymorphism =====

#[test]
fn let_bound_identity_is_reusable_at_two_types() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::let_(
        "id",
        build::func(&["x"], build::var("x")),
        build::record_extend(
            None,
            vec![
                ("a", build::call(build::var("id"), vec![int_lit()])),
                ("b", build::call(build::var("id"), vec![bool_lit()])),
            ],
        ),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Record(row) = ctx.resolve(&ty) else {
        panic!("expected a record");
    };
    let (labels, _) = ctx.state().flatten_row(&row).unwrap();
    assert_eq!(labels.get(intern("a")).unwrap(), &[Type::int()]);
    assert_eq!(labels.get(intern("b")).unwrap(), &[Type::boolean()]);
}

#[test]
fn lambda_bound_function_stays_monomorphic() {
    let (mut ctx, mut env) = setup();
    // (fn (id) -> let a = id(1) in id(true))(fn (x) -> x)
    let body = build::let_(
        "a",
        build::call(build::var("id"), vec![int_lit()]),
        build::call(build::var("id"), vec![bool_lit()]),
    );
    let mut expr = build::call(
        build::func(&["id"], body),
        vec![build::func(&["x"], build::var("x"))],
    );
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Mismatch);
}

#[test]
fn let_of_bare_variable_preserves_the_scheme() {
    let (mut ctx, mut env) = setup();
    let a = ctx.generic_var();
    env.assign(intern("id0"), Type::arrow(vec![a.clone()], a));
    // let id = id0 in {a = id(1), b = id(true)} — the alias must stay generic.
    let mut expr = build::let_(
        "id",
        build::var("id0"),
        build::record_extend(
            None,
            vec![
                ("a", build::call(build::var("id"), vec![int_lit()])),
                ("b", build::call(build::var("id"), vec![bool_lit()])),
            ],
        ),
    );
    assert!(ctx.infer(&mut env, &mut expr).is_ok());
}

#[test]
fn non_function_value_cannot_reference_itself() {
    let (mut ctx, mut env) = setup();
    let a = ctx.generic_var();
    env.assign(intern("id"), Type::arrow(vec![a.clone()], a));
    let mut expr = build::let_group(
        vec![("x", build::call(build::var("id"), vec![build::var("x")]))],
        build::var("x"),
    );
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnboundIdentifier);
}

// ===== Let groups =====

#[test]
fn mutually_recursive_group_infers_both_signatures() {
    let (mut ctx, mut env) = setup();
    declare_if(&mut ctx, &mut env);
    env.assign(intern("is_zero"), Type::arrow(vec![Type::int()], Type::boolean()));
    env.assign(intern("pred"), Type::arrow(vec![Type::int()], Type::int()));

    let even = build::func(
        &["n"],
        build::call(
            build::var("if_"),
            vec![
                build::call(build::var("is_zero"), vec![build::var("n")]),
                bool_lit(),
                build::call(
                    build::var("odd"),
                    vec![build::call(build::var("pred"), vec![build::var("n")])],
                ),
            ],
        ),
    );
    let odd = build::func(
        &["n"],
        build::call(
            build::var("if_"),
            vec![
                build::call(build::var("is_zero"), vec![build::var("n")]),
                bool_lit(),
                build::call(
                    build::var("even"),
                    vec![build::call(build::var("pred"), vec![build::var("n")])],
                ),
            ],
        ),
    );
    let mut expr = build::let_group(
        vec![("even", even), ("odd", odd)],
        build::call(build::var("even"), vec![int_lit()]),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::boolean());
}

#[test]
fn let_group_annotation_records_sccs() {
    let (mut ctx, mut env) = setup();
    ctx.annotate(true);
    let a = ctx.generic_var();
    env.assign(intern("id"), Type::arrow(vec![a.clone()], a));
    let mut expr = build::let_group(
        vec![
            ("f", build::func(&["x"], build::call(build::var("g"), vec![build::var("x")]))),
            ("g", build::func(&["x"], build::call(build::var("f"), vec![build::var("x")]))),
            ("h", build::call(build::var("id"), vec![int_lit()])),
        ],
        build::var("h"),
    );
    ctx.infer(&mut env, &mut expr).unwrap();
    let ExprKind::LetGroup { sccs: Some(sccs), .. } = &expr.kind else {
        panic!("SCC grouping must be annotated");
    };
    assert_eq!(sccs.len(), 2);
    let mut cycle: Vec<usize> = sccs
        .iter()
        .find(|scc| scc.len() == 2)
        .expect("f and g form a cycle")
        .clone();
    cycle.sort_unstable();
    assert_eq!(cycle, vec![0, 1]);
}

// ===== Pipes =====

#[test]
fn pipe_threads_the_placeholder_through_steps() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("succ"), Type::arrow(vec![Type::int()], Type::int()));
    env.assign(intern("is_zero"), Type::arrow(vec![Type::int()], Type::boolean()));
    let mut expr = build::pipe(
        "$",
        int_lit(),
        vec![
            build::call(build::var("succ"), vec![build::var("$")]),
            build::call(build::var("is_zero"), vec![build::var("$")]),
        ],
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::boolean());
}

#[test]
fn pipe_restores_the_outer_binding() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("$"), Type::string());
    env.assign(intern("succ"), Type::arrow(vec![Type::int()], Type::int()));
    let mut expr = build::let_(
        "r",
        build::pipe(
            "$",
            int_lit(),
            vec![build::call(build::var("succ"), vec![build::var("$")])],
        ),
        build::var("$"),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::string());
}

// ===== References =====

#[test]
fn deref_returns_the_cell_type() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("r"), Type::reference(Type::int()));
    let mut expr = build::deref(build::var("r"));
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::int());
}

#[test]
fn deref_assign_returns_the_reference() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("r"), Type::reference(Type::int()));
    let mut expr = build::deref_assign(build::var("r"), int_lit());
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::reference(Type::int()));
}

#[test]
fn ref_contents_stay_monomorphic_across_let() {
    let (mut ctx, mut env) = setup();
    // The content variable is weak-generic: its instantiations must not
    // generalize at let boundaries.
    let a = ctx.generic_weak_var();
    env.assign(
        intern("new_ref"),
        Type::arrow(vec![a.clone()], Type::reference(a)),
    );
    // let r = new_ref(fn (x) -> x) in *r = fn (y) -> 1; then store a
    // bool-returning function: weak contents must reject the second store
    // after the first fixed them.
    let mut expr = build::let_(
        "r",
        build::call(
            build::var("new_ref"),
            vec![build::func(&["x"], build::var("x"))],
        ),
        build::let_(
            "a",
            build::deref_assign(build::var("r"), build::func(&["y"], int_lit())),
            build::deref_assign(build::var("r"), build::func(&["y"], bool_lit())),
        ),
    );
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Mismatch);
}

// ===== Records and variants =====

#[test]
fn record_extend_select_restrict() {
    let (mut ctx, mut env) = setup();
    let record = build::record_extend(None, vec![("x", int_lit()), ("y", bool_lit())]);
    let mut select = build::record_select(record, "y");
    let ty = ctx.infer(&mut env, &mut select).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::boolean());

    let record = build::record_extend(None, vec![("x", int_lit()), ("y", bool_lit())]);
    let mut restricted = build::record_select(build::record_restrict(record, "x"), "y");
    let ty = ctx.infer(&mut env, &mut restricted).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::boolean());
}

#[test]
fn selecting_a_missing_label_fails() {
    let (mut ctx, mut env) = setup();
    let record = build::record_extend(None, vec![("x", int_lit())]);
    let mut expr = build::record_select(record, "y");
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RowLabelMismatch);
}

#[test]
fn match_with_default_accepts_open_variants() {
    let (mut ctx, mut env) = setup();
    let mut row = LabelMap::new();
    row.push(intern("A"), Type::int());
    row.push(intern("C"), Type::boolean());
    env.assign(
        intern("v"),
        Type::variant(Type::row_extend(row, Type::RowEmpty)),
    );
    let mut expr = build::match_(
        build::var("v"),
        vec![build::match_case("A", "a", build::var("a"))],
        Some(build::match_default("rest", int_lit())),
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::int());
}

#[test]
fn match_cases_must_agree_on_the_result() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::match_(
        build::variant("A", int_lit()),
        vec![
            build::match_case("A", "a", int_lit()),
            build::match_case("B", "b", bool_lit()),
        ],
        None,
    );
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Mismatch);
}

#[test]
fn match_annotates_case_variant_types() {
    let (mut ctx, mut env) = setup();
    ctx.annotate(true);
    let mut row = LabelMap::new();
    row.push(intern("A"), Type::int());
    env.assign(
        intern("v"),
        Type::variant(Type::row_extend(row, Type::RowEmpty)),
    );
    let mut expr = build::match_(
        build::var("v"),
        vec![build::match_case("A", "a", build::var("a"))],
        None,
    );
    ctx.infer(&mut env, &mut expr).unwrap();
    let ExprKind::Match { cases, .. } = &expr.kind else {
        unreachable!()
    };
    let var_ty = cases[0].variant_ty.as_ref().expect("variant type annotated");
    assert_eq!(ctx.resolve(var_ty), Type::int());
}

#[test]
fn variant_constructor_builds_an_open_row() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::variant("Some", int_lit());
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::Variant(row) = ctx.resolve(&ty) else {
        panic!("expected a variant");
    };
    let (labels, tail) = ctx.state().flatten_row(&row).unwrap();
    assert_eq!(labels.get(intern("Some")).unwrap(), &[Type::int()]);
    assert!(matches!(tail, Type::Var(_)));
}

// ===== Control flow =====

/// entry -> loop -> loop / return, counting with a local.
fn counting_graph(step_value: Expr) -> ControlFlowGraph {
    let mut graph = ControlFlowGraph::new("count", &["i"]);
    graph.set_entry(vec![build::deref_assign(build::var("i"), int_lit())]);
    let body = graph.add_block(vec![build::deref_assign(build::var("i"), step_value)]);
    graph.set_return(vec![build::deref(build::var("i"))]);
    graph.jump(ENTRY_BLOCK, body);
    graph.jump(body, body);
    graph.jump(body, RETURN_BLOCK);
    graph
}

#[test]
fn control_flow_loop_returns_the_local() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("succ"), Type::arrow(vec![Type::int()], Type::int()));
    let step = build::call(build::var("succ"), vec![build::deref(build::var("i"))]);
    let mut expr = build::control_flow(counting_graph(step));
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::int());
}

#[test]
fn control_flow_rejects_inconsistent_loop_locals() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::control_flow(counting_graph(bool_lit()));
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Mismatch);
}

#[test]
fn control_flow_requires_a_reachable_return() {
    let (mut ctx, mut env) = setup();
    let mut graph = ControlFlowGraph::new("broken", &[]);
    graph.set_entry(vec![int_lit()]);
    graph.set_return(vec![int_lit()]);
    // No jumps at all: the return block is unreachable.
    let mut expr = build::control_flow(graph);
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ControlFlowInvalid);
}

#[test]
fn control_flow_requires_a_return_value() {
    let (mut ctx, mut env) = setup();
    let mut graph = ControlFlowGraph::new("empty_return", &[]);
    graph.set_entry(vec![int_lit()]);
    graph.jump(ENTRY_BLOCK, RETURN_BLOCK);
    let mut expr = build::control_flow(graph);
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ControlFlowInvalid);
}

// ===== Recursive types =====

#[test]
fn recursive_list_type_flows_through_calls() {
    let (mut ctx, mut env) = setup();
    let rec = ctx.recursive(&["int_list"], |state, rec| {
        let link = state.rec_link(rec, intern("int_list")).unwrap();
        vec![Type::app(Type::con("list"), vec![Type::int(), link])]
    });
    let link = ctx.rec_link(rec, "int_list").unwrap();
    env.assign(intern("nil"), link.clone());
    env.assign(
        intern("cons"),
        Type::arrow(vec![Type::int(), link.clone()], link.clone()),
    );
    let mut expr = build::call(
        build::var("cons"),
        vec![int_lit(), build::call(build::var("cons"), vec![int_lit(), build::var("nil")])],
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert!(matches!(ctx.resolve(&ty), Type::RecursiveLink { .. }));
    ctx.state().unify(&ty, &link).unwrap();
}

// ===== Type classes =====

fn declare_show(ctx: &mut InferenceContext, env: &mut TypeEnv) -> polyrow::ClassId {
    let class = ctx.declare_class("Show", vec![]);
    let a = ctx.generic_constrained_var(class);
    ctx.add_method(class, "show", Type::arrow(vec![a], Type::string()));
    ctx.add_instance(class, Type::int());
    env.assign(intern("show"), ctx.method(class, "show"));
    class
}

#[test]
fn class_method_resolves_against_an_instance() {
    let (mut ctx, mut env) = setup();
    declare_show(&mut ctx, &mut env);
    let mut expr = build::call(build::var("show"), vec![int_lit()]);
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(ctx.resolve(&ty), Type::string());
}

#[test]
fn missing_instance_surfaces_as_unresolved_constraint() {
    let (mut ctx, mut env) = setup();
    declare_show(&mut ctx, &mut env);
    let mut expr = build::call(build::var("show"), vec![bool_lit()]);
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnresolvedConstraint);
}

#[test]
fn method_instantiation_stamps_the_call_arrow() {
    let (mut ctx, mut env) = setup();
    ctx.annotate(true);
    declare_show(&mut ctx, &mut env);
    let mut expr = build::call(build::var("show"), vec![int_lit()]);
    ctx.infer(&mut env, &mut expr).unwrap();
    let ExprKind::Call { fn_ty, .. } = &expr.kind else {
        unreachable!()
    };
    let Some(Type::Arrow { method: Some(m), .. }) = fn_ty else {
        panic!("resolved arrow must carry its method reference");
    };
    assert_eq!(m.name, intern("show"));
}

// ===== Aliases =====

#[test]
fn alias_is_transparent_in_both_directions() {
    let (mut ctx, mut env) = setup();
    let name_alias = Type::alias(Type::app(Type::con("name"), vec![]), Type::string());
    env.assign(intern("n"), name_alias.clone());
    env.assign(
        intern("greet"),
        Type::arrow(vec![Type::string()], Type::string()),
    );
    env.assign(intern("render"), Type::arrow(vec![name_alias], Type::string()));
    // alias argument to string parameter
    let mut expr = build::call(build::var("greet"), vec![build::var("n")]);
    assert!(ctx.infer(&mut env, &mut expr).is_ok());
    // string argument to alias parameter
    let mut expr = build::call(
        build::var("render"),
        vec![build::literal("\"s\"", &[], |_, _, _, _| Ok(Type::string()))],
    );
    assert!(ctx.infer(&mut env, &mut expr).is_ok());
}

// ===== Size-restricted variables =====

#[test]
fn size_polymorphic_array_constructor() {
    let (mut ctx, mut env) = setup();
    let n = ctx.generic_size_var();
    env.assign(
        intern("zeros"),
        Type::arrow(
            vec![n.clone()],
            Type::app(Type::con("array"), vec![Type::int(), n]),
        ),
    );
    let mut expr = build::call(
        build::var("zeros"),
        vec![build::literal("8", &[], |_, _, _, _| Ok(Type::Size(8)))],
    );
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    let Type::App { params, .. } = ctx.resolve(&ty) else {
        panic!("expected an array application");
    };
    assert_eq!(params[1], Type::Size(8));

    let mut bad = build::call(build::var("zeros"), vec![int_lit()]);
    let err = ctx.infer(&mut env, &mut bad).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SizeRestriction);
}

// ===== Literals =====

#[test]
fn literal_construct_sees_using_types() {
    let (mut ctx, mut env) = setup();
    env.assign(intern("seed"), Type::int());
    // A literal whose type is `list[typeof(seed)]`.
    let mut expr = build::literal("[seed]", &["seed"], |_, _, _, using| {
        Ok(Type::app(Type::con("list"), vec![using[0].clone()]))
    });
    let ty = ctx.infer(&mut env, &mut expr).unwrap();
    assert_eq!(
        ctx.resolve(&ty),
        Type::app(Type::con("list"), vec![Type::int()])
    );
}

#[test]
fn literal_with_missing_using_variable_fails() {
    let (mut ctx, mut env) = setup();
    let mut expr = build::literal("[seed]", &["seed"], |_, _, _, _| Ok(Type::Unit));
    let err = ctx.infer(&mut env, &mut expr).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnboundIdentifier);
}
