//! The parsed data model handed to code generators.
//!
//! All tables are appended to monotonically during a parse pass and never
//! mutated afterwards; a parser reset clears them.

use crate::types::{NameHash, TypeId};

/// Element-count bound of a sequence type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceBound {
    /// `sequence<T>` with no maximum element count
    Unbounded,
    /// `sequence<T, n>`
    Bounded(u64),
}

/// A named type alias, or a synthetic carrier for a resolved type
#[derive(Debug, Clone, Default)]
pub struct Typedef {
    /// Hash of `name`
    pub hash: NameHash,
    /// Declared classification
    pub kind: TypeId,
    /// The alias name
    pub name: String,
    /// Name of the aliased type; empty for synthetic built-in carriers,
    /// the struct's own name for struct types
    pub base_name: String,
    /// Namespace the alias was declared in
    pub namespace: String,
    /// `Some` when the alias is a sequence type
    pub sequence: Option<SequenceBound>,
}

/// A struct field, or a free-standing variable declaration
#[derive(Debug, Clone, Default)]
pub struct Variable {
    /// Hash of `name`
    pub hash: NameHash,
    /// Fully resolved type of the variable
    pub resolved: Typedef,
    /// Marked with `@key`
    pub is_key: bool,
    /// Field or variable name
    pub name: String,
    /// Name of the owning struct; empty for free-standing variables
    pub struct_name: String,
    /// Namespace written explicitly on the type, e.g. `::ns::type`
    pub origin_namespace: String,
}

impl Variable {
    /// Render the variable back to one line of IDL.
    #[must_use]
    pub fn render_idl(&self) -> String {
        if self.origin_namespace.is_empty() {
            format!("{} {};\n", self.resolved.name, self.name)
        } else {
            format!(
                "::{}::{} {};\n",
                self.origin_namespace, self.resolved.name, self.name
            )
        }
    }
}

/// A parsed struct declaration
#[derive(Debug, Clone, Default)]
pub struct StructDef {
    /// Hash of `name`
    pub hash: NameHash,
    /// Classification of the declaring keyword
    pub kind: TypeId,
    /// Struct name
    pub name: String,
    /// Namespace the struct was declared in
    pub namespace: String,
    /// Fields in declaration order
    pub fields: Vec<Variable>,
}

/// Everything one parse pass produced
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Parsed structs, in source order
    pub structs: Vec<StructDef>,
    /// Parsed typedefs, in source order
    pub typedefs: Vec<Typedef>,
    /// Every variable seen, struct fields included, in source order
    pub variables: Vec<Variable>,
    /// Verbatim macro-style statements kept for the generator
    pub user_lines: Vec<String>,
}

impl Model {
    /// True when nothing was parsed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
            && self.typedefs.is_empty()
            && self.variables.is_empty()
            && self.user_lines.is_empty()
    }
}
