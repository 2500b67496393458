use std::sync::{Mutex, OnceLock};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

/// Interned identifier, row label, type-constant or type-class name.
pub type Symbol = DefaultSymbol;

type Interner = StringInterner<DefaultBackend>;

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn with_interner<R>(f: impl FnOnce(&mut Interner) -> R) -> R {
    let mutex = INTERNER.get_or_init(|| Mutex::new(StringInterner::new()));
    let mut guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

/// Intern a string and return its symbol.
pub fn intern(s: &str) -> Symbol {
    with_interner(|interner| interner.get_or_intern(s))
}

/// Resolve a symbol back to its string.
pub fn resolve(sym: Symbol) -> Option<String> {
    with_interner(|interner| interner.resolve(sym).map(|s| s.to_string()))
}

/// Resolve a symbol, falling back to an empty string.
///
/// Convenient for error messages and type rendering, where a missing
/// symbol is a bug but not worth panicking over.
pub fn resolve_or_default(sym: Symbol) -> String {
    resolve(sym).unwrap_or_default()
}
