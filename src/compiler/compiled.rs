use crate::ast::{ScalarType, Value};
use std::collections::BTreeSet;
use std::fmt;

/// The static type of a lowered value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    /// A data record, by record type identifier.
    Record(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(s) => write!(f, "{}", s),
            ValueType::Record(r) => write!(f, "record {}", r),
        }
    }
}

/// A parameter of a compiled activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub raw: String,
    pub ident: String,
    pub ty: ValueType,
}

/// A local of an opaque action block: the pin name, its type, and the outer variable
/// it is initialised from (`None` for output-only pins, which start at zero).
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueLocal {
    pub name: String,
    pub scalar: ScalarType,
    pub source: Option<String>,
}

/// One straight-line step of a lowered activity. `node` is the originating node id.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An input parameter. `copy` is set when the body writes into the received record,
    /// which then needs a mutable local copy.
    Receive {
        node: String,
        parameter: String,
        variable: String,
        ty: ValueType,
        copy: bool,
    },
    CreateObject {
        node: String,
        variable: String,
        record: String,
        fields: Vec<(String, ScalarType)>,
    },
    Literal {
        node: String,
        variable: String,
        value: Value,
    },
    ReadFeature {
        node: String,
        variable: String,
        object: String,
        attribute: String,
        scalar: ScalarType,
    },
    WriteFeature {
        node: String,
        object: String,
        attribute: String,
        value: String,
    },
    /// A raw body, kept verbatim line by line, run in its own block scope.
    Opaque {
        node: String,
        locals: Vec<OpaqueLocal>,
        body: Vec<String>,
        /// `(outer variable, pin local, type)` triples copied out after the body.
        exports: Vec<(String, String, ScalarType)>,
    },
    Call {
        node: String,
        variable: Option<(String, ValueType)>,
        /// Qualified name of the called activity.
        target: String,
        method: String,
        arguments: Vec<String>,
    },
    Fork {
        node: String,
        branches: Vec<String>,
    },
    Join {
        node: String,
        inputs: Vec<String>,
    },
    Return {
        node: String,
        slot: usize,
        variable: String,
    },
}

impl Statement {
    pub fn node(&self) -> &str {
        match self {
            Statement::Receive { node, .. }
            | Statement::CreateObject { node, .. }
            | Statement::Literal { node, .. }
            | Statement::ReadFeature { node, .. }
            | Statement::WriteFeature { node, .. }
            | Statement::Opaque { node, .. }
            | Statement::Call { node, .. }
            | Statement::Fork { node, .. }
            | Statement::Join { node, .. }
            | Statement::Return { node, .. } => node,
        }
    }
}

/// The lowered form of one activity. Immutable once produced; cached per qualified name
/// for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledActivity {
    pub component: String,
    pub raw: String,
    pub ident: String,
    /// `Component::Activity`, using identifiers.
    pub qualified: String,
    pub inputs: Vec<Slot>,
    pub outputs: Vec<Slot>,
    pub statements: Vec<Statement>,
    /// Qualified names of every activity this one calls.
    pub calls: BTreeSet<String>,
}

impl CompiledActivity {
    /// Node ids in their derived execution order.
    pub fn order(&self) -> Vec<&str> {
        self.statements.iter().map(Statement::node).collect()
    }

    pub fn position_of(&self, node: &str) -> Option<usize> {
        self.statements.iter().position(|s| s.node() == node)
    }
}
