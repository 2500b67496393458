use std::fmt;
use std::rc::Rc;

use crate::env::TypeEnv;
use crate::error::TypeError;
use crate::interner::{self, Symbol};
use crate::types::Type;
use crate::unify::UnifyState;

/// Identity of an expression node, assigned by the analysis pre-pass.
/// Errors refer to the offending node through its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// An expression with its annotation slot.
///
/// `ty` is written by the driver in annotation mode; a few variants carry
/// extra slots (the resolved arrow of a call, a let-group's SCC grouping,
/// each match case's variant type).
#[derive(Debug)]
pub struct Expr {
    pub id: ExprId,
    pub ty: Option<Type>,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: ExprId(0),
            ty: None,
            kind,
        }
    }

    /// Locate a node by id (e.g. the `at` of an error).
    pub fn find(&self, id: ExprId) -> Option<&Expr> {
        if self.id == id {
            return Some(self);
        }
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Var(_) | ExprKind::RecordEmpty => None,
            ExprKind::Deref { reference } => reference.find(id),
            ExprKind::DerefAssign { reference, value } => {
                reference.find(id).or_else(|| value.find(id))
            }
            ExprKind::Call { func, args, .. } => func
                .find(id)
                .or_else(|| args.iter().find_map(|a| a.find(id))),
            ExprKind::Func { body, .. } => body.find(id),
            ExprKind::Let { value, body, .. } => value.find(id).or_else(|| body.find(id)),
            ExprKind::LetGroup { binds, body, .. } => binds
                .iter()
                .find_map(|b| b.value.find(id))
                .or_else(|| body.find(id)),
            ExprKind::Pipe { source, steps, .. } => source
                .find(id)
                .or_else(|| steps.iter().find_map(|s| s.find(id))),
            ExprKind::ControlFlow(graph) => graph
                .blocks
                .iter()
                .find_map(|b| b.exprs.iter().find_map(|e| e.find(id))),
            ExprKind::RecordSelect { record, .. } | ExprKind::RecordRestrict { record, .. } => {
                record.find(id)
            }
            ExprKind::RecordExtend { record, labels } => labels
                .iter()
                .find_map(|l| l.value.find(id))
                .or_else(|| record.find(id)),
            ExprKind::Variant { value, .. } => value.find(id),
            ExprKind::Match {
                value,
                cases,
                default,
            } => value
                .find(id)
                .or_else(|| cases.iter().find_map(|c| c.body.find(id)))
                .or_else(|| default.as_ref().and_then(|d| d.body.find(id))),
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    /// Host-defined literal; its type comes from the `construct` callback.
    Literal(Literal),
    /// Identifier reference.
    Var(Symbol),
    /// Dereference a mutable reference: `*r`
    Deref { reference: Box<Expr> },
    /// Store through a mutable reference: `*r = v`
    DerefAssign {
        reference: Box<Expr>,
        value: Box<Expr>,
    },
    /// Application: `f(a, b)`
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        /// Resolved arrow type, written in annotation mode.
        fn_ty: Option<Type>,
    },
    /// Abstraction: `fn (x, y) -> e`
    Func { params: Vec<Symbol>, body: Box<Expr> },
    /// Single let-binding: `let x = v in e`
    Let {
        name: Symbol,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// Grouped (potentially mutually recursive) bindings:
    /// `let a = ... and b = ... in e`
    LetGroup {
        binds: Vec<LetBinding>,
        body: Box<Expr>,
        /// Strongly-connected binding groups (indexes into `binds`) in
        /// dependency order, written in annotation mode.
        sccs: Option<Vec<Vec<usize>>>,
    },
    /// Pipeline: `pipe $ = src |> step1 |> step2`
    Pipe {
        as_name: Symbol,
        source: Box<Expr>,
        steps: Vec<Expr>,
    },
    /// Control-flow graph with mutable locals and loops.
    ControlFlow(ControlFlowGraph),
    /// `{}`
    RecordEmpty,
    /// `r.label`
    RecordSelect { record: Box<Expr>, label: Symbol },
    /// `{r - label}`
    RecordRestrict { record: Box<Expr>, label: Symbol },
    /// `{a = 1, b = 2 | r}`
    RecordExtend {
        record: Box<Expr>,
        labels: Vec<LabelValue>,
    },
    /// `:Label v`
    Variant { label: Symbol, value: Box<Expr> },
    /// `match v { :A a -> e1 | :B b -> e2 | z -> e3 }`
    Match {
        value: Box<Expr>,
        cases: Vec<MatchCase>,
        default: Option<Box<MatchDefault>>,
    },
}

#[derive(Debug)]
pub struct LetBinding {
    pub name: Symbol,
    pub value: Expr,
}

#[derive(Debug)]
pub struct LabelValue {
    pub label: Symbol,
    pub value: Expr,
}

#[derive(Debug)]
pub struct MatchCase {
    pub label: Symbol,
    pub var: Symbol,
    pub body: Expr,
    /// The case variable's variant type, written in annotation mode.
    pub variant_ty: Option<Type>,
}

#[derive(Debug)]
pub struct MatchDefault {
    pub var: Symbol,
    pub body: Expr,
}

/// Callback producing a literal's type.
///
/// Receives the unification state (for allocating fresh variables), the
/// environment, the current level, and the types of the literal's `using`
/// variables. This is the sole extension point for embedding host types.
pub type ConstructFn =
    Rc<dyn Fn(&mut UnifyState, &TypeEnv, u32, &[Type]) -> Result<Type, TypeError>>;

pub struct Literal {
    pub syntax: String,
    /// Names whose environment types are passed to `construct`.
    pub using: Vec<Symbol>,
    pub construct: ConstructFn,
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Literal")
            .field("syntax", &self.syntax)
            .field("using", &self.using)
            .finish_non_exhaustive()
    }
}

/// Index of the entry block of every control-flow graph.
pub const ENTRY_BLOCK: usize = 0;
/// Index of the designated return block.
pub const RETURN_BLOCK: usize = 1;

/// A control-flow graph: named locals (bound to mutable references during
/// inference), a list of blocks, and jump edges between them. Blocks 0
/// and 1 are the entry and return blocks.
#[derive(Debug)]
pub struct ControlFlowGraph {
    pub name: Symbol,
    pub locals: Vec<Symbol>,
    pub blocks: Vec<Block>,
    jumps: Vec<(usize, usize)>,
    /// Block SCCs in dependency order, written in annotation mode.
    pub sccs: Option<Vec<Vec<usize>>>,
}

#[derive(Debug)]
pub struct Block {
    pub exprs: Vec<Expr>,
}

impl ControlFlowGraph {
    pub fn new(name: &str, locals: &[&str]) -> Self {
        ControlFlowGraph {
            name: interner::intern(name),
            locals: locals.iter().map(|l| interner::intern(l)).collect(),
            blocks: vec![Block { exprs: Vec::new() }, Block { exprs: Vec::new() }],
            jumps: Vec::new(),
            sccs: None,
        }
    }

    pub fn set_entry(&mut self, exprs: Vec<Expr>) {
        self.blocks[ENTRY_BLOCK].exprs = exprs;
    }

    pub fn set_return(&mut self, exprs: Vec<Expr>) {
        self.blocks[RETURN_BLOCK].exprs = exprs;
    }

    /// Append an intermediate block, returning its index.
    pub fn add_block(&mut self, exprs: Vec<Expr>) -> usize {
        self.blocks.push(Block { exprs });
        self.blocks.len() - 1
    }

    pub fn jump(&mut self, from: usize, to: usize) {
        if !self.has_jump(from, to) {
            self.jumps.push((from, to));
        }
    }

    pub fn has_jump(&self, from: usize, to: usize) -> bool {
        self.jumps.contains(&(from, to))
    }

    pub fn jumps(&self) -> &[(usize, usize)] {
        &self.jumps
    }
}

/// Expression constructors, mirroring the surface syntax. Node ids are
/// assigned later by the analysis pre-pass.
pub mod build {
    use super::*;

    pub fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Var(interner::intern(name)))
    }

    pub fn literal(
        syntax: &str,
        using: &[&str],
        construct: impl Fn(&mut UnifyState, &TypeEnv, u32, &[Type]) -> Result<Type, TypeError>
            + 'static,
    ) -> Expr {
        Expr::new(ExprKind::Literal(Literal {
            syntax: syntax.to_string(),
            using: using.iter().map(|u| interner::intern(u)).collect(),
            construct: Rc::new(construct),
        }))
    }

    pub fn deref(reference: Expr) -> Expr {
        Expr::new(ExprKind::Deref {
            reference: Box::new(reference),
        })
    }

    pub fn deref_assign(reference: Expr, value: Expr) -> Expr {
        Expr::new(ExprKind::DerefAssign {
            reference: Box::new(reference),
            value: Box::new(value),
        })
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Call {
            func: Box::new(func),
            args,
            fn_ty: None,
        })
    }

    pub fn func(params: &[&str], body: Expr) -> Expr {
        Expr::new(ExprKind::Func {
            params: params.iter().map(|p| interner::intern(p)).collect(),
            body: Box::new(body),
        })
    }

    pub fn let_(name: &str, value: Expr, body: Expr) -> Expr {
        Expr::new(ExprKind::Let {
            name: interner::intern(name),
            value: Box::new(value),
            body: Box::new(body),
        })
    }

    pub fn let_group(binds: Vec<(&str, Expr)>, body: Expr) -> Expr {
        Expr::new(ExprKind::LetGroup {
            binds: binds
                .into_iter()
                .map(|(name, value)| LetBinding {
                    name: interner::intern(name),
                    value,
                })
                .collect(),
            body: Box::new(body),
            sccs: None,
        })
    }

    pub fn pipe(as_name: &str, source: Expr, steps: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Pipe {
            as_name: interner::intern(as_name),
            source: Box::new(source),
            steps,
        })
    }

    pub fn control_flow(graph: ControlFlowGraph) -> Expr {
        Expr::new(ExprKind::ControlFlow(graph))
    }

    pub fn record_empty() -> Expr {
        Expr::new(ExprKind::RecordEmpty)
    }

    pub fn record_select(record: Expr, label: &str) -> Expr {
        Expr::new(ExprKind::RecordSelect {
            record: Box::new(record),
            label: interner::intern(label),
        })
    }

    pub fn record_restrict(record: Expr, label: &str) -> Expr {
        Expr::new(ExprKind::RecordRestrict {
            record: Box::new(record),
            label: interner::intern(label),
        })
    }

    /// `record_extend(None, ...)` extends the empty record.
    pub fn record_extend(record: Option<Expr>, labels: Vec<(&str, Expr)>) -> Expr {
        Expr::new(ExprKind::RecordExtend {
            record: Box::new(record.unwrap_or_else(record_empty)),
            labels: labels
                .into_iter()
                .map(|(label, value)| LabelValue {
                    label: interner::intern(label),
                    value,
                })
                .collect(),
        })
    }

    pub fn variant(label: &str, value: Expr) -> Expr {
        Expr::new(ExprKind::Variant {
            label: interner::intern(label),
            value: Box::new(value),
        })
    }

    pub fn match_(value: Expr, cases: Vec<MatchCase>, default: Option<MatchDefault>) -> Expr {
        Expr::new(ExprKind::Match {
            value: Box::new(value),
            cases,
            default: default.map(Box::new),
        })
    }

    pub fn match_case(label: &str, var: &str, body: Expr) -> MatchCase {
        MatchCase {
            label: interner::intern(label),
            var: interner::intern(var),
            body,
            variant_ty: None,
        }
    }

    pub fn match_default(var: &str, body: Expr) -> MatchDefault {
        MatchDefault {
            var: interner::intern(var),
            body,
        }
    }
}
