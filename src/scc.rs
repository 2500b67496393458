//! Pre-inference analysis: node numbering, strongly-connected components
//! of let-group bindings, and control-flow graph validation.
//!
//! The analysis runs once over the root expression. Results are recorded
//! in the order the inference walk will encounter `LetGroup` and
//! `ControlFlow` nodes, so the driver consumes them with O(1) cursors.
//! For that to hold, `Walker::walk` must visit children in exactly the
//! order the driver infers them.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::ast::{Expr, ExprKind, ControlFlowGraph, ENTRY_BLOCK, RETURN_BLOCK};
use crate::error::{ErrorKind, TypeError};
use crate::interner::Symbol;

/// Results of the pre-inference pass, indexed by encounter order.
#[derive(Debug, Default)]
pub struct Analysis {
    /// Per let-group: binding-index SCCs in reverse topological order
    /// (dependencies first).
    pub let_groups: Vec<Vec<Vec<usize>>>,
    /// Per control-flow graph: block-index SCCs in dependency order
    /// (entry first).
    pub control_flows: Vec<Vec<Vec<usize>>>,
}

/// Number every node and collect SCC analyses for the whole tree.
pub fn analyze(root: &mut Expr) -> Result<Analysis, TypeError> {
    let mut next = 1;
    assign_ids(root, &mut next);
    let mut walker = Walker {
        analysis: Analysis::default(),
    };
    walker.walk(root)?;
    debug!(
        "analysis: {} nodes, {} let groups, {} control-flow graphs",
        next - 1,
        walker.analysis.let_groups.len(),
        walker.analysis.control_flows.len()
    );
    Ok(walker.analysis)
}

fn assign_ids(expr: &mut Expr, next: &mut u32) {
    expr.id = crate::ast::ExprId(*next);
    *next += 1;
    match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::Var(_) | ExprKind::RecordEmpty => {}
        ExprKind::Deref { reference } => assign_ids(reference, next),
        ExprKind::DerefAssign { reference, value } => {
            assign_ids(reference, next);
            assign_ids(value, next);
        }
        ExprKind::Call { func, args, .. } => {
            assign_ids(func, next);
            for a in args {
                assign_ids(a, next);
            }
        }
        ExprKind::Func { body, .. } => assign_ids(body, next),
        ExprKind::Let { value, body, .. } => {
            assign_ids(value, next);
            assign_ids(body, next);
        }
        ExprKind::LetGroup { binds, body, .. } => {
            for b in binds {
                assign_ids(&mut b.value, next);
            }
            assign_ids(body, next);
        }
        ExprKind::Pipe { source, steps, .. } => {
            assign_ids(source, next);
            for s in steps {
                assign_ids(s, next);
            }
        }
        ExprKind::ControlFlow(graph) => {
            for block in &mut graph.blocks {
                for e in &mut block.exprs {
                    assign_ids(e, next);
                }
            }
        }
        ExprKind::RecordSelect { record, .. } | ExprKind::RecordRestrict { record, .. } => {
            assign_ids(record, next)
        }
        ExprKind::RecordExtend { record, labels } => {
            for l in labels {
                assign_ids(&mut l.value, next);
            }
            assign_ids(record, next);
        }
        ExprKind::Variant { value, .. } => assign_ids(value, next),
        ExprKind::Match {
            value,
            cases,
            default,
        } => {
            assign_ids(value, next);
            for c in cases {
                assign_ids(&mut c.body, next);
            }
            if let Some(d) = default {
                assign_ids(&mut d.body, next);
            }
        }
    }
}

struct Walker {
    analysis: Analysis,
}

impl Walker {
    /// Children are visited in the driver's inference order; see the
    /// module comment.
    fn walk(&mut self, expr: &mut Expr) -> Result<(), TypeError> {
        let expr_id = expr.id;
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Var(_) | ExprKind::RecordEmpty => Ok(()),
            ExprKind::Deref { reference } => self.walk(reference),
            ExprKind::DerefAssign { reference, value } => {
                self.walk(reference)?;
                self.walk(value)
            }
            ExprKind::Call { func, args, .. } => {
                self.walk(func)?;
                for a in args {
                    self.walk(a)?;
                }
                Ok(())
            }
            ExprKind::Func { body, .. } => self.walk(body),
            ExprKind::Let { value, body, .. } => {
                self.walk(value)?;
                self.walk(body)
            }
            ExprKind::LetGroup { binds, body, .. } => {
                let sccs = binding_sccs(binds);
                self.analysis.let_groups.push(sccs.clone());
                for scc in &sccs {
                    for &i in scc {
                        self.walk(&mut binds[i].value)?;
                    }
                }
                self.walk(body)
            }
            ExprKind::Pipe { source, steps, .. } => {
                self.walk(source)?;
                for s in steps {
                    self.walk(s)?;
                }
                Ok(())
            }
            ExprKind::ControlFlow(graph) => {
                let sccs = validate_control_flow(graph).map_err(|e| e.at(expr_id))?;
                self.analysis.control_flows.push(sccs.clone());
                for scc in &sccs {
                    for &b in scc {
                        for e in &mut graph.blocks[b].exprs {
                            self.walk(e)?;
                        }
                    }
                }
                Ok(())
            }
            ExprKind::RecordSelect { record, .. } | ExprKind::RecordRestrict { record, .. } => {
                self.walk(record)
            }
            ExprKind::RecordExtend { record, labels } => {
                for l in labels {
                    self.walk(&mut l.value)?;
                }
                self.walk(record)
            }
            ExprKind::Variant { value, .. } => self.walk(value),
            ExprKind::Match {
                value,
                cases,
                default,
            } => {
                if let Some(d) = default {
                    self.walk(&mut d.body)?;
                }
                self.walk(value)?;
                for c in cases.iter_mut().rev() {
                    self.walk(&mut c.body)?;
                }
                Ok(())
            }
        }
    }
}

/// Dependency SCCs of a binding group: an edge `i -> j` exists when
/// binding `i`'s value refers to binding `j`'s name.
fn binding_sccs(binds: &[crate::ast::LetBinding]) -> Vec<Vec<usize>> {
    let targets: HashMap<Symbol, usize> =
        binds.iter().enumerate().map(|(i, b)| (b.name, i)).collect();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); binds.len()];
    for (i, bind) in binds.iter().enumerate() {
        let mut refs = HashSet::new();
        let mut bound = Vec::new();
        collect_refs(&bind.value, &targets, &mut bound, &mut refs);
        let mut deps: Vec<usize> = refs.into_iter().collect();
        deps.sort_unstable();
        edges[i] = deps;
    }
    tarjan_scc(binds.len(), &edges)
}

/// Collect references to `targets` made by `expr`, honoring shadowing.
fn collect_refs(
    expr: &Expr,
    targets: &HashMap<Symbol, usize>,
    bound: &mut Vec<Symbol>,
    out: &mut HashSet<usize>,
) {
    let note_ref = |name: Symbol, bound: &[Symbol], out: &mut HashSet<usize>| {
        if !bound.contains(&name) {
            if let Some(&i) = targets.get(&name) {
                out.insert(i);
            }
        }
    };
    match &expr.kind {
        ExprKind::Var(name) => note_ref(*name, bound, out),
        ExprKind::Literal(lit) => {
            for name in &lit.using {
                note_ref(*name, bound, out);
            }
        }
        ExprKind::RecordEmpty => {}
        ExprKind::Deref { reference } => collect_refs(reference, targets, bound, out),
        ExprKind::DerefAssign { reference, value } => {
            collect_refs(reference, targets, bound, out);
            collect_refs(value, targets, bound, out);
        }
        ExprKind::Call { func, args, .. } => {
            collect_refs(func, targets, bound, out);
            for a in args {
                collect_refs(a, targets, bound, out);
            }
        }
        ExprKind::Func { params, body } => {
            let depth = bound.len();
            bound.extend(params.iter().copied());
            collect_refs(body, targets, bound, out);
            bound.truncate(depth);
        }
        ExprKind::Let { name, value, body } => {
            let depth = bound.len();
            // A function value may refer to itself; the name then refers
            // to this binding, not to a group member.
            if matches!(value.kind, ExprKind::Func { .. }) {
                bound.push(*name);
                collect_refs(value, targets, bound, out);
            } else {
                collect_refs(value, targets, bound, out);
                bound.push(*name);
            }
            collect_refs(body, targets, bound, out);
            bound.truncate(depth);
        }
        ExprKind::LetGroup { binds, body, .. } => {
            let depth = bound.len();
            bound.extend(binds.iter().map(|b| b.name));
            for b in binds {
                collect_refs(&b.value, targets, bound, out);
            }
            collect_refs(body, targets, bound, out);
            bound.truncate(depth);
        }
        ExprKind::Pipe {
            as_name,
            source,
            steps,
        } => {
            collect_refs(source, targets, bound, out);
            let depth = bound.len();
            bound.push(*as_name);
            for s in steps {
                collect_refs(s, targets, bound, out);
            }
            bound.truncate(depth);
        }
        ExprKind::ControlFlow(graph) => {
            let depth = bound.len();
            bound.extend(graph.locals.iter().copied());
            for block in &graph.blocks {
                for e in &block.exprs {
                    collect_refs(e, targets, bound, out);
                }
            }
            bound.truncate(depth);
        }
        ExprKind::RecordSelect { record, .. } | ExprKind::RecordRestrict { record, .. } => {
            collect_refs(record, targets, bound, out)
        }
        ExprKind::RecordExtend { record, labels } => {
            for l in labels {
                collect_refs(&l.value, targets, bound, out);
            }
            collect_refs(record, targets, bound, out);
        }
        ExprKind::Variant { value, .. } => collect_refs(value, targets, bound, out),
        ExprKind::Match {
            value,
            cases,
            default,
        } => {
            collect_refs(value, targets, bound, out);
            for c in cases {
                let depth = bound.len();
                bound.push(c.var);
                collect_refs(&c.body, targets, bound, out);
                bound.truncate(depth);
            }
            if let Some(d) = default {
                let depth = bound.len();
                bound.push(d.var);
                collect_refs(&d.body, targets, bound, out);
                bound.truncate(depth);
            }
        }
    }
}

/// Check that every block is reachable from the entry block and reaches
/// the return block, then return the block SCCs in dependency order.
fn validate_control_flow(graph: &ControlFlowGraph) -> Result<Vec<Vec<usize>>, TypeError> {
    let n = graph.blocks.len();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(from, to) in graph.jumps() {
        if from >= n || to >= n {
            return Err(TypeError::new(
                ErrorKind::ControlFlowInvalid,
                "jump refers to a block that does not exist",
            ));
        }
        edges[from].push(to);
        reverse[to].push(from);
    }

    let from_entry = reach(n, &edges, ENTRY_BLOCK);
    if let Some(block) = (0..n).find(|b| !from_entry[*b]) {
        return Err(TypeError::new(
            ErrorKind::ControlFlowInvalid,
            format!("block {block} is unreachable from the entry block"),
        ));
    }
    let to_return = reach(n, &reverse, RETURN_BLOCK);
    if let Some(block) = (0..n).find(|b| !to_return[*b]) {
        return Err(TypeError::new(
            ErrorKind::ControlFlowInvalid,
            format!("block {block} never reaches the return block"),
        ));
    }

    // Tarjan emits leaves first; reversing yields dependency order with
    // the entry block's component first.
    let mut sccs = tarjan_scc(n, &edges);
    sccs.reverse();
    Ok(sccs)
}

fn reach(n: usize, edges: &[Vec<usize>], start: usize) -> Vec<bool> {
    let mut seen = vec![false; n];
    let mut stack = vec![start];
    while let Some(b) = stack.pop() {
        if b >= n || seen[b] {
            continue;
        }
        seen[b] = true;
        for &next in &edges[b] {
            stack.push(next);
        }
    }
    seen
}

/// Compute strongly connected components using Tarjan's algorithm.
/// Returns SCCs in reverse topological order (leaves first).
fn tarjan_scc(n: usize, edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut index_counter = 0usize;
    let mut stack: Vec<usize> = Vec::new();
    let mut on_stack = vec![false; n];
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    #[allow(clippy::too_many_arguments)]
    fn strongconnect(
        v: usize,
        edges: &[Vec<usize>],
        index_counter: &mut usize,
        stack: &mut Vec<usize>,
        on_stack: &mut Vec<bool>,
        index: &mut Vec<usize>,
        lowlink: &mut Vec<usize>,
        sccs: &mut Vec<Vec<usize>>,
    ) {
        index[v] = *index_counter;
        lowlink[v] = *index_counter;
        *index_counter += 1;
        stack.push(v);
        on_stack[v] = true;

        for &w in &edges[v] {
            if index[w] == usize::MAX {
                strongconnect(w, edges, index_counter, stack, on_stack, index, lowlink, sccs);
                lowlink[v] = lowlink[v].min(lowlink[w]);
            } else if on_stack[w] {
                lowlink[v] = lowlink[v].min(index[w]);
            }
        }

        if lowlink[v] == index[v] {
            let mut scc = Vec::new();
            while let Some(w) = stack.pop() {
                on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            sccs.push(scc);
        }
    }

    for v in 0..n {
        if index[v] == usize::MAX {
            strongconnect(
                v,
                edges,
                &mut index_counter,
                &mut stack,
                &mut on_stack,
                &mut index,
                &mut lowlink,
                &mut sccs,
            );
        }
    }

    sccs
}
