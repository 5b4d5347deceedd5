//! Identifier sanitization.
//!
//! Model names are free text ("CubeSat Activity A"); everything emitted must be a valid
//! C++ identifier. The [`Sanitizer`] renders names deterministically and keeps a
//! run-local collision table per declaring scope so that distinct names never map onto
//! the same identifier.

use crate::error::ModelError;
use ahash::{AHashMap, AHashSet};

/// The kind of entity an identifier names. Each kind has its own collision namespace
/// inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentifierKind {
    Component,
    State,
    Activity,
    Record,
    Field,
    Command,
    Parameter,
    Variable,
}

impl IdentifierKind {
    pub fn label(&self) -> &'static str {
        match self {
            IdentifierKind::Component => "component",
            IdentifierKind::State => "state",
            IdentifierKind::Activity => "activity",
            IdentifierKind::Record => "record type",
            IdentifierKind::Field => "field",
            IdentifierKind::Command => "command",
            IdentifierKind::Parameter => "parameter",
            IdentifierKind::Variable => "variable",
        }
    }

    /// Kinds that are also rendered upper-cased (`STATE_ON`, command mnemonics) must not
    /// collide case-insensitively.
    fn folds_case(&self) -> bool {
        matches!(self, IdentifierKind::State | IdentifierKind::Command)
    }
}

const RESERVED_WORDS: [&str; 48] = [
    "alignas", "alignof", "asm", "auto", "bool", "break", "case", "catch", "char", "class",
    "const", "constexpr", "continue", "default", "delete", "do", "double", "else", "enum",
    "explicit", "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int",
    "long", "namespace", "new", "nullptr", "operator", "private", "protected", "public",
    "return", "short", "signed", "sizeof", "static", "struct", "switch", "this", "true",
    "void", "while",
];

/// Renders a raw model name into a C++ identifier without any collision handling.
///
/// Runs of characters outside `[A-Za-z0-9_]` (notably whitespace) become a single `_`.
/// Returns `None` when the name holds no ASCII alphanumeric character at all.
pub fn render_identifier(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    let joined = words.join("_");
    if !joined.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let mut ident = if joined.starts_with(|c: char| c.is_ascii_digit()) {
        format!("id_{}", joined)
    } else {
        joined
    };
    if RESERVED_WORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    Some(ident)
}

/// The first `::` segment of a namespace that is not already a valid, non-reserved C++
/// identifier. Namespaces come from configuration and are emitted as given.
pub fn invalid_namespace_segment(namespace: &str) -> Option<&str> {
    namespace
        .split("::")
        .filter(|s| !s.is_empty())
        .find(|segment| render_identifier(segment).as_deref() != Some(*segment))
}

#[derive(Debug, Default)]
struct ScopeTable {
    assigned: AHashMap<String, String>,
    taken: AHashSet<String>,
}

/// Run-local identifier table.
///
/// `sanitize` is a pure function of `(raw name, kind, scope, prior calls)`: the same raw
/// name always yields the same identifier, and a collision is resolved by appending a
/// numeric suffix in call order, so callers must sanitize in declaration order.
#[derive(Debug, Default)]
pub struct Sanitizer {
    scopes: AHashMap<(IdentifierKind, String), ScopeTable>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an identifier as taken in a scope without binding it to a raw name.
    pub fn reserve(&mut self, scope: &str, kind: IdentifierKind, ident: &str) {
        let key = collision_key(kind, ident);
        self.table(scope, kind).taken.insert(key);
    }

    /// Sanitizes `raw` for the given scope and kind.
    pub fn sanitize(
        &mut self,
        scope: &str,
        raw: &str,
        kind: IdentifierKind,
    ) -> Result<String, ModelError> {
        if let Some(ident) = self.lookup(scope, raw, kind) {
            return Ok(ident.to_string());
        }

        let base = render_identifier(raw).ok_or_else(|| ModelError::InvalidIdentifier {
            path: entity_path(scope, raw),
            raw: raw.to_string(),
        })?;

        let table = self.table(scope, kind);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while table.taken.contains(&collision_key(kind, &candidate)) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        table.taken.insert(collision_key(kind, &candidate));
        table.assigned.insert(raw.to_string(), candidate.clone());
        Ok(candidate)
    }

    /// Allocates a new identifier for `raw` even if the same raw name was seen before.
    ///
    /// Used for entities that are distinct by declaration rather than by name, such as
    /// the local variables of two nodes that share a display name.
    pub fn fresh(
        &mut self,
        scope: &str,
        raw: &str,
        kind: IdentifierKind,
    ) -> Result<String, ModelError> {
        if let Some(table) = self.scopes.get_mut(&(kind, scope.to_string())) {
            table.assigned.remove(raw);
        }
        self.sanitize(scope, raw, kind)
    }

    /// Returns the identifier previously assigned to `raw`, if any.
    pub fn lookup(&self, scope: &str, raw: &str, kind: IdentifierKind) -> Option<&str> {
        self.scopes
            .get(&(kind, scope.to_string()))
            .and_then(|t| t.assigned.get(raw))
            .map(String::as_str)
    }

    fn table(&mut self, scope: &str, kind: IdentifierKind) -> &mut ScopeTable {
        self.scopes.entry((kind, scope.to_string())).or_default()
    }
}

fn collision_key(kind: IdentifierKind, ident: &str) -> String {
    if kind.folds_case() {
        ident.to_ascii_uppercase()
    } else {
        ident.to_string()
    }
}

fn entity_path(scope: &str, raw: &str) -> String {
    if scope.is_empty() {
        format!("'{}'", raw)
    } else {
        format!("{}::'{}'", scope, raw)
    }
}
