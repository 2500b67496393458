use crate::error::{ErrorKind, TypeError};
use crate::interner::{self, Symbol};
use crate::types::{Type, TypeVarId, VarState};
use crate::unify::UnifyState;

/// Labels of a row extension.
///
/// Entries keep first-occurrence order, and each label maps to an
/// *ordered* list of types so that the same label may appear several
/// times in one row (scoped labels): `{x = 1, x = true}` holds
/// `x -> [int, bool]` and unifies element-wise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelMap {
    entries: Vec<(Symbol, Vec<Type>)>,
}

impl LabelMap {
    pub fn new() -> Self {
        LabelMap::default()
    }

    pub fn singleton(label: Symbol, ty: Type) -> Self {
        LabelMap {
            entries: vec![(label, vec![ty])],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, label: Symbol) -> Option<&[Type]> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, ts)| ts.as_slice())
    }

    /// Append one type to `label`'s list, creating the entry if absent.
    pub fn push(&mut self, label: Symbol, ty: Type) {
        self.push_list(label, vec![ty]);
    }

    /// Append a list of types to `label`'s list in source order.
    pub fn push_list(&mut self, label: Symbol, types: Vec<Type>) {
        if let Some((_, ts)) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            ts.extend(types);
        } else {
            self.entries.push((label, types));
        }
    }

    /// Re-insert an entry ahead of all existing ones. Used when a prefix
    /// of a scoped list has been popped and the remainder stays in the
    /// residual row.
    pub fn insert_front(&mut self, label: Symbol, types: Vec<Type>) {
        self.entries.insert(0, (label, types));
    }

    /// Remove and return the whole list for `label`.
    pub fn remove(&mut self, label: Symbol) -> Option<Vec<Type>> {
        let pos = self.entries.iter().position(|(l, _)| *l == label)?;
        Some(self.entries.remove(pos).1)
    }

    /// Merge another map after this one, concatenating scoped lists.
    /// Outer extensions come first, so flattening preserves source order.
    pub fn merge(&mut self, other: LabelMap) {
        for (label, types) in other.entries {
            self.push_list(label, types);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &[Type])> {
        self.entries.iter().map(|(l, ts)| (*l, ts.as_slice()))
    }

    pub fn labels(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|(l, _)| *l)
    }
}

impl FromIterator<(Symbol, Vec<Type>)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (Symbol, Vec<Type>)>>(iter: I) -> Self {
        let mut map = LabelMap::new();
        for (label, types) in iter {
            map.push_list(label, types);
        }
        map
    }
}

/// Build a row from residual labels and a tail, avoiding an empty
/// extension node.
pub(crate) fn make_row(labels: LabelMap, tail: Type) -> Type {
    if labels.is_empty() {
        tail
    } else {
        Type::row_extend(labels, tail)
    }
}

impl UnifyState {
    /// Flatten a chain of row extensions into a single label map and its
    /// tail. The tail is `RowEmpty` or an unsolved variable; anything
    /// else is a malformed row. A variable revisited while following
    /// links is a recursive row.
    pub fn flatten_row(&mut self, row: &Type) -> Result<(LabelMap, Type), TypeError> {
        let mut labels = LabelMap::new();
        let mut seen: Vec<TypeVarId> = Vec::new();
        let mut cur = self.follow_row(row.clone(), &mut seen)?;
        loop {
            match cur {
                Type::RowEmpty => return Ok((labels, Type::RowEmpty)),
                Type::Var(id) => return Ok((labels, Type::Var(id))),
                Type::RowExtend { labels: ls, rest } => {
                    labels.merge(ls);
                    cur = self.follow_row(*rest, &mut seen)?;
                }
                Type::RecursiveLink { .. } => {
                    return Err(TypeError::new(
                        ErrorKind::RecursiveRow,
                        "recursive link in row tail position",
                    ))
                }
                other => {
                    return Err(TypeError::mismatch(format!(
                        "expected a row, found {}",
                        self.describe(&other)
                    )))
                }
            }
        }
    }

    fn follow_row(&mut self, row: Type, seen: &mut Vec<TypeVarId>) -> Result<Type, TypeError> {
        if let Type::Var(id) = row {
            if seen.contains(&id) {
                return Err(TypeError::new(
                    ErrorKind::RecursiveRow,
                    "row refers to itself through its own tail",
                ));
            }
            seen.push(id);
        }
        Ok(self.repr(row))
    }

    /// Rewrite a row to expose `want` types under `label`, returning the
    /// exposed types together with the residual row:
    /// `row == RowExtend({label: exposed}, residual)`.
    ///
    /// A present scoped list is popped from the front (length and order
    /// respected); an unsolved tail is linked to a fresh extension that
    /// supplies the missing entries. `RowEmpty` and constant tails fail
    /// with `RowLabelMissing`.
    pub fn rewrite_row(
        &mut self,
        row: &Type,
        label: Symbol,
        want: usize,
    ) -> Result<(Vec<Type>, Type), TypeError> {
        let (mut labels, tail) = self.flatten_row(row)?;
        let mut exposed = labels.remove(label).unwrap_or_default();
        if exposed.len() >= want {
            let leftover = exposed.split_off(want);
            if !leftover.is_empty() {
                labels.insert_front(label, leftover);
            }
            return Ok((exposed, make_row(labels, tail)));
        }
        // The flattened row is short on this label; only an open tail can
        // supply the rest.
        let missing = want - exposed.len();
        match tail {
            Type::Var(id) => {
                let level = match self.var_state(id) {
                    VarState::Unbound { level, .. } => *level,
                    _ => {
                        return Err(TypeError::new(
                            ErrorKind::RowLabelMissing,
                            format!(
                                "row has no label `{}`",
                                interner::resolve_or_default(label)
                            ),
                        ))
                    }
                };
                let fresh: Vec<Type> = (0..missing).map(|_| self.new_var(level)).collect();
                let new_tail = self.new_var(level);
                let extension = Type::row_extend(
                    LabelMap::from_iter([(label, fresh.clone())]),
                    new_tail.clone(),
                );
                self.link(id, extension);
                exposed.extend(fresh);
                Ok((exposed, make_row(labels, new_tail)))
            }
            _ => Err(TypeError::new(
                ErrorKind::RowLabelMissing,
                format!(
                    "row has no label `{}`",
                    interner::resolve_or_default(label)
                ),
            )),
        }
    }
}
