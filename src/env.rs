use std::collections::HashMap;

use crate::interner::Symbol;
use crate::types::Type;

/// Typing environment: maps identifier names to (possibly generic)
/// types.
///
/// Scoping is handled with a stash discipline instead of cloning: before
/// shadowing a name the driver stashes any existing binding, and restores
/// it when the scope ends. See [`EnvStash`].
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    bindings: HashMap<Symbol, Type>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv::default()
    }

    pub fn lookup(&self, name: Symbol) -> Option<&Type> {
        self.bindings.get(&name)
    }

    pub fn assign(&mut self, name: Symbol, ty: Type) {
        self.bindings.insert(name, ty);
    }

    pub fn remove(&mut self, name: Symbol) {
        self.bindings.remove(&name);
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.bindings.contains_key(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Type)> {
        self.bindings.iter().map(|(n, t)| (*n, t))
    }
}

/// Saved shadowed bindings, restored in LIFO order.
///
/// `stash` returns how many entries were pushed (0 or 1) so callers can
/// accumulate a count and hand it back to `unstash` — scope handling
/// stays strictly balanced without cloning the environment.
#[derive(Debug, Default)]
pub(crate) struct EnvStash {
    entries: Vec<(Symbol, Type)>,
}

impl EnvStash {
    /// Save `name`'s current binding, if any.
    pub fn stash(&mut self, env: &TypeEnv, name: Symbol) -> usize {
        match env.lookup(name) {
            Some(ty) => {
                self.entries.push((name, ty.clone()));
                1
            }
            None => 0,
        }
    }

    /// Pop `count` saved bindings back into the environment.
    pub fn unstash(&mut self, env: &mut TypeEnv, count: usize) {
        for _ in 0..count {
            if let Some((name, ty)) = self.entries.pop() {
                env.assign(name, ty);
            }
        }
    }

    /// Search the most recent `within` stashed entries for `name`.
    /// Used by let-group inference to restore an outer shadowed binding
    /// while a non-function value is being inferred.
    pub fn find_recent(&self, within: usize, name: Symbol) -> Option<&Type> {
        self.entries
            .iter()
            .rev()
            .take(within)
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
