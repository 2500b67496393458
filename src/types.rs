use std::collections::HashMap;

use crate::interner::{self, Symbol};
use crate::row::LabelMap;

/// Unique identifier for a unification variable.
/// The actual binding is stored in the `UnifyState` table, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVarId(pub u32);

/// Identifier of a mutually-recursive type group in the `UnifyState` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecId(pub u32);

/// Identifier of a declared type class in the `UnifyState` registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// Reference to a named method of a type class.
///
/// Appears as `Type::Method` before instantiation and as the `method`
/// back-reference stamped onto the arrow an instantiation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef {
    pub class: ClassId,
    pub name: Symbol,
}

/// A pending requirement that a type be an instance of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConstraint {
    pub class: ClassId,
}

/// Internal type representation.
///
/// Types form value trees; sharing and mutation happen only through
/// `Var` nodes (whose state lives in the `UnifyState` table) and through
/// `RecursiveLink` back-references into the recursive-group arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The empty product: `()`
    Unit,
    /// Named opaque type: `int`, `bool`
    Const(Symbol),
    /// Size constant for array-size polymorphism: `array[int, 8]`
    Size(u64),
    /// Unification variable (resolved through the `UnifyState` table)
    Var(TypeVarId),
    /// Type application: `list[int]`. `underlying` marks a transparent alias.
    App {
        cons: Box<Type>,
        params: Vec<Type>,
        underlying: Option<Box<Type>>,
    },
    /// Function type: `(int, int) -> int`, optionally produced by a
    /// type-class method instantiation.
    Arrow {
        params: Vec<Type>,
        ret: Box<Type>,
        method: Option<MethodRef>,
    },
    /// Unresolved type-class method; resolves to its arrow on instantiation.
    Method(MethodRef),
    /// Record type wrapping a row: `{a : int | r}`
    Record(Box<Type>),
    /// Tagged variant type wrapping a row: `[A : int | r]`
    Variant(Box<Type>),
    /// Empty row: `<>`
    RowEmpty,
    /// Row extension: `<a : _, b : _ | rest>`. Labels carry ordered type
    /// lists so the same label may occur more than once (scoped labels).
    RowExtend { labels: LabelMap, rest: Box<Type> },
    /// Back-reference to member `index` of a recursive group.
    RecursiveLink { rec: RecId, index: usize },
}

impl Type {
    pub fn con(name: &str) -> Type {
        Type::Const(interner::intern(name))
    }

    pub fn int() -> Type {
        Type::con("int")
    }

    pub fn boolean() -> Type {
        Type::con("bool")
    }

    pub fn string() -> Type {
        Type::con("string")
    }

    pub fn app(cons: Type, params: Vec<Type>) -> Type {
        Type::App {
            cons: Box::new(cons),
            params,
            underlying: None,
        }
    }

    /// A transparent alias: the applied form is preferred for display and
    /// unification, `underlying` preserves soundness as a fallback.
    pub fn alias(app: Type, underlying: Type) -> Type {
        match app {
            Type::App { cons, params, .. } => Type::App {
                cons,
                params,
                underlying: Some(Box::new(underlying)),
            },
            other => other,
        }
    }

    /// Mutable reference type: `ref[t]`
    pub fn reference(deref: Type) -> Type {
        Type::app(Type::con("ref"), vec![deref])
    }

    pub fn arrow(params: Vec<Type>, ret: Type) -> Type {
        Type::Arrow {
            params,
            ret: Box::new(ret),
            method: None,
        }
    }

    pub fn record(row: Type) -> Type {
        Type::Record(Box::new(row))
    }

    /// Record with fixed labels and an empty tail.
    pub fn record_flat(fields: Vec<(&str, Type)>) -> Type {
        let mut labels = LabelMap::new();
        for (label, ty) in fields {
            labels.push(interner::intern(label), ty);
        }
        Type::record(Type::row_extend(labels, Type::RowEmpty))
    }

    pub fn variant(row: Type) -> Type {
        Type::Variant(Box::new(row))
    }

    pub fn row_extend(labels: LabelMap, rest: Type) -> Type {
        Type::RowExtend {
            labels,
            rest: Box::new(rest),
        }
    }
}

/// State of a unification variable, stored in the `UnifyState` table.
#[derive(Debug, Clone, PartialEq)]
pub enum VarState {
    /// Unsolved variable at a binding level.
    ///
    /// `weak` variables resist generalization (mutable-reference
    /// contents); `size` variables unify only with size constants and
    /// other size variables.
    Unbound {
        level: u32,
        weak: bool,
        size: bool,
        constraints: Vec<InstanceConstraint>,
    },
    /// Quantified placeholder inside a generalized scheme. Never unified
    /// directly; replaced by a fresh variable on instantiation.
    Generic {
        weak: bool,
        size: bool,
        constraints: Vec<InstanceConstraint>,
    },
    /// Union-find child: this variable resolves to another type.
    Link(Type),
}

/// A group of mutually-recursive named type applications.
///
/// Cycles are cut by `Type::RecursiveLink` carrying the group's arena id,
/// so the type tree itself stays acyclic.
#[derive(Debug, Clone)]
pub struct RecGroup {
    pub names: Vec<Symbol>,
    pub indexes: HashMap<Symbol, usize>,
    pub types: Vec<Type>,
    /// Whether any member contains generic variables.
    pub generic: bool,
    /// Whether this group is an instantiated copy of a generalized group.
    pub instantiated: bool,
}

/// A declared type class: named methods plus registered instance heads.
#[derive(Debug, Clone)]
pub struct TypeClassDef {
    pub name: Symbol,
    pub methods: HashMap<Symbol, Type>,
    pub instances: Vec<Type>,
}
