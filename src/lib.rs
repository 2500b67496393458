//! Polymorphic type inference with extensible rows.
//!
//! A level-based Hindley-Milner core for a small expression language
//! with first-class records (extensible rows with scoped labels), tagged
//! variants, mutable references, recursive type groups,
//! let-polymorphism over SCC-sorted binding groups, type-class method
//! references, and control-flow graphs containing loops.
//!
//! The pipeline has three parts:
//! 1. a union-find unification engine over mutable type variables with
//!    occurs check, level tracking, and weak/size restrictions
//!    ([`unify::UnifyState`]);
//! 2. level-based instantiation and generalization at let boundaries;
//! 3. a syntax-directed driver ([`infer::InferenceContext`]) extending
//!    Algorithm W with rows, references, recursive let via SCC analysis,
//!    and control-flow-graph inference.
//!
//! ```
//! use polyrow::ast::build;
//! use polyrow::{InferenceContext, Type, TypeEnv};
//!
//! let mut ctx = InferenceContext::new();
//! let mut env = TypeEnv::new();
//! // let id = fn (x) -> x in id(one)
//! env.assign(polyrow::interner::intern("one"), Type::int());
//! let mut expr = build::let_(
//!     "id",
//!     build::func(&["x"], build::var("x")),
//!     build::call(build::var("id"), vec![build::var("one")]),
//! );
//! let ty = ctx.infer(&mut env, &mut expr).unwrap();
//! assert_eq!(ctx.resolve(&ty), Type::int());
//! ```

pub mod ast;
pub mod env;
pub mod error;
pub mod infer;
pub mod instantiate;
pub mod interner;
pub mod row;
pub mod scc;
pub mod types;
pub mod unify;

pub use ast::{Expr, ExprId, ExprKind};
pub use env::TypeEnv;
pub use error::{ErrorKind, TypeError};
pub use infer::InferenceContext;
pub use row::LabelMap;
pub use types::{ClassId, RecId, Type, TypeVarId};
pub use unify::UnifyState;
