//! Identifier hashing and the classification space shared by the resolver.

use std::hash::Hasher;
use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHasher};

/// 64-bit identifier hash
pub type NameHash = u64;

/// Hash an identifier name.
///
/// Hash collisions are neither detected nor resolved anywhere in the crate;
/// with a 64-bit hash over short identifiers this is an accepted risk.
#[must_use]
pub fn hash_name(name: &str) -> NameHash {
    let mut hasher = FxHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// Built-in primitive types, recognized without any declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `void`
    Void,
    /// `octet`
    Octet,
    /// `int8_t`
    Int8,
    /// `int16_t`
    Int16,
    /// `short`
    Short,
    /// `int32_t`
    Int32,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `int64_t`
    Int64,
    /// `long long`
    LongLong,
    /// `uint8_t`
    UInt8,
    /// `uint16_t`
    UInt16,
    /// `uint32_t`
    UInt32,
    /// `uint64_t`
    UInt64,
    /// `bool`
    Bool,
    /// `boolean`
    Boolean,
    /// `char`
    Char,
    /// `float`
    Float,
    /// `string`
    String,
    /// `double`
    Double,
    /// `sequence`
    Sequence,
    /// `const`
    Const,
}

impl Primitive {
    /// Source spelling of the primitive
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Octet => "octet",
            Primitive::Int8 => "int8_t",
            Primitive::Int16 => "int16_t",
            Primitive::Short => "short",
            Primitive::Int32 => "int32_t",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Int64 => "int64_t",
            Primitive::LongLong => "long long",
            Primitive::UInt8 => "uint8_t",
            Primitive::UInt16 => "uint16_t",
            Primitive::UInt32 => "uint32_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::Bool => "bool",
            Primitive::Boolean => "boolean",
            Primitive::Char => "char",
            Primitive::Float => "float",
            Primitive::String => "string",
            Primitive::Double => "double",
            Primitive::Sequence => "sequence",
            Primitive::Const => "const",
        }
    }
}

/// Built-in declaration keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `struct`
    Struct,
    /// `module`
    Module,
    /// `typedef`
    Typedef,
}

impl Keyword {
    /// Source spelling of the keyword
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Keyword::Struct => "struct",
            Keyword::Module => "module",
            Keyword::Typedef => "typedef",
        }
    }
}

/// Classification of an identifier hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeId {
    /// A built-in primitive type
    Primitive(Primitive),
    /// A built-in declaration keyword
    Keyword(Keyword),
    /// A user typedef; the index points into the typedef table
    Typedef(usize),
    /// A user struct; the index points into the struct table
    Struct(usize),
    /// Nothing known under this hash
    #[default]
    Unknown,
}

impl TypeId {
    /// True for built-in primitive types
    #[must_use]
    pub fn is_builtin_type(self) -> bool {
        matches!(self, TypeId::Primitive(_))
    }

    /// True for built-in declaration keywords
    #[must_use]
    pub fn is_keyword(self) -> bool {
        matches!(self, TypeId::Keyword(_))
    }

    /// True for user typedefs and user structs
    #[must_use]
    pub fn is_user_type(self) -> bool {
        matches!(self, TypeId::Typedef(_) | TypeId::Struct(_))
    }
}

/// Every name the parser recognizes without a declaration. `long long` can
/// never come out of the tokenizer in one piece but stays in the table so
/// the list matches the documented keyword set.
const BUILTINS: &[(&str, TypeId)] = &[
    ("void", TypeId::Primitive(Primitive::Void)),
    ("octet", TypeId::Primitive(Primitive::Octet)),
    ("int8_t", TypeId::Primitive(Primitive::Int8)),
    ("int16_t", TypeId::Primitive(Primitive::Int16)),
    ("short", TypeId::Primitive(Primitive::Short)),
    ("int32_t", TypeId::Primitive(Primitive::Int32)),
    ("int", TypeId::Primitive(Primitive::Int)),
    ("long", TypeId::Primitive(Primitive::Long)),
    ("int64_t", TypeId::Primitive(Primitive::Int64)),
    ("long long", TypeId::Primitive(Primitive::LongLong)),
    ("uint8_t", TypeId::Primitive(Primitive::UInt8)),
    ("uint16_t", TypeId::Primitive(Primitive::UInt16)),
    ("uint32_t", TypeId::Primitive(Primitive::UInt32)),
    ("uint64_t", TypeId::Primitive(Primitive::UInt64)),
    ("bool", TypeId::Primitive(Primitive::Bool)),
    ("boolean", TypeId::Primitive(Primitive::Boolean)),
    ("char", TypeId::Primitive(Primitive::Char)),
    ("float", TypeId::Primitive(Primitive::Float)),
    ("string", TypeId::Primitive(Primitive::String)),
    ("double", TypeId::Primitive(Primitive::Double)),
    ("sequence", TypeId::Primitive(Primitive::Sequence)),
    ("const", TypeId::Primitive(Primitive::Const)),
    ("struct", TypeId::Keyword(Keyword::Struct)),
    ("module", TypeId::Keyword(Keyword::Module)),
    ("typedef", TypeId::Keyword(Keyword::Typedef)),
];

fn builtin_index() -> &'static FxHashMap<NameHash, TypeId> {
    static INDEX: OnceLock<FxHashMap<NameHash, TypeId>> = OnceLock::new();
    INDEX.get_or_init(|| {
        BUILTINS
            .iter()
            .map(|&(name, id)| (hash_name(name), id))
            .collect()
    })
}

/// Classify a hash against the built-in tables only.
pub(crate) fn builtin_classify(hash: NameHash) -> Option<TypeId> {
    builtin_index().get(&hash).copied()
}

/// Spelling of a built-in classification, if it is one.
pub(crate) fn builtin_name(id: TypeId) -> Option<&'static str> {
    match id {
        TypeId::Primitive(p) => Some(p.name()),
        TypeId::Keyword(k) => Some(k.name()),
        _ => None,
    }
}

/// Split a possibly `::`-qualified name into `(namespace, local name)`.
///
/// The namespace is everything before the last `::`, without its own
/// leading `::`; a name without `::` has an empty namespace.
#[must_use]
pub fn split_scoped_name(name: &str) -> (String, String) {
    match name.rfind("::") {
        Some(idx) => {
            let namespace = name[..idx].trim_start_matches(':');
            (namespace.to_string(), name[idx + 2..].to_string())
        }
        None => (String::new(), name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_classify_by_hash() {
        assert_eq!(
            builtin_classify(hash_name("int32_t")),
            Some(TypeId::Primitive(Primitive::Int32))
        );
        assert_eq!(
            builtin_classify(hash_name("module")),
            Some(TypeId::Keyword(Keyword::Module))
        );
        assert_eq!(builtin_classify(hash_name("no_such_type")), None);
    }

    #[test]
    fn scoped_names_split_at_last_separator() {
        assert_eq!(
            split_scoped_name("::Mod1::foo_t"),
            ("Mod1".to_string(), "foo_t".to_string())
        );
        assert_eq!(
            split_scoped_name("A::B::C"),
            ("A::B".to_string(), "C".to_string())
        );
        assert_eq!(
            split_scoped_name("plain"),
            (String::new(), "plain".to_string())
        );
    }
}
