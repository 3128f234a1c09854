//! Recursive-descent declaration parser and the hash-keyed symbol
//! resolution behind it.
//!
//! One `parse` call walks preprocessed text, recognizing `module { ... }`,
//! `struct NAME { ... };`, `typedef ... ;` and plain variable declarations,
//! and appends everything it recognizes to the model tables. Structural
//! scanner failures abort the file; semantic problems become diagnostics
//! and the offending construct is skipped.

use rustc_hash::FxHashSet;

use crate::config::DiagnosticHandler;
use crate::error::{Diagnostic, DiagnosticSink, ParseError};
use crate::model::{Model, SequenceBound, StructDef, Typedef, Variable};
use crate::scanner::{self, BLOCK_CAP, NAME_CAP, TOKEN_CAP};
use crate::types::{self, Keyword, NameHash, TypeId, hash_name, split_scoped_name};

/// The declaration parser
///
/// Owns the typedef, struct and variable tables; they are created empty,
/// appended to during parsing and cleared only by [`Parser::clear`].
pub struct Parser {
    typedefs: Vec<Typedef>,
    structs: Vec<StructDef>,
    variables: Vec<Variable>,
    user_lines: Vec<String>,
    namespace_stack: Vec<String>,
    macro_names: FxHashSet<String>,
    diagnostics: DiagnosticSink,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create an empty parser
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostic_handler(None)
    }

    /// Create an empty parser with a diagnostic handler
    #[must_use]
    pub fn with_diagnostic_handler(handler: Option<DiagnosticHandler>) -> Self {
        Parser {
            typedefs: Vec::new(),
            structs: Vec::new(),
            variables: Vec::new(),
            user_lines: Vec::new(),
            namespace_stack: Vec::new(),
            macro_names: FxHashSet::default(),
            diagnostics: DiagnosticSink::new(handler),
        }
    }

    /// Hand over the macro names the preprocessor ended up with, so
    /// macro-style statements can be recognized and kept verbatim.
    pub fn set_macro_names<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.macro_names = names.into_iter().collect();
    }

    /// Parse one preprocessed source buffer into the tables.
    ///
    /// # Errors
    /// Fails on structural problems: unbalanced delimiters, a missing name
    /// where the grammar requires one, or end of input inside an open scope.
    pub fn parse(&mut self, source: &str) -> Result<(), ParseError> {
        self.parse_scope(source, false).map(|_| ())
    }

    /// Parse declarations until end of input, or until the `}` closing this
    /// scope when `nested`. Returns the number of bytes consumed.
    fn parse_scope(&mut self, src: &str, nested: bool) -> Result<usize, ParseError> {
        let bytes = src.as_bytes();
        let mut pos = 0usize;

        loop {
            pos += scanner::skip_spaces(&src[pos..]);
            let Some(&b) = bytes.get(pos) else {
                if nested {
                    return Err(ParseError::UnexpectedEndOfInput {
                        expected: "}".to_string(),
                    });
                }
                break;
            };

            match b {
                b';' => {
                    pos += 1;
                    continue;
                }
                b'{' => {
                    pos += 1;
                    pos += self.parse_scope(&src[pos..], true)?;
                    continue;
                }
                b'}' => {
                    pos += 1;
                    return Ok(pos);
                }
                _ => {}
            }

            if !(b.is_ascii_alphabetic() || b == b'_' || b == b':') {
                self.diagnostics
                    .warn(None, format!("unknown symbol '{}'", b as char));
                pos += src[pos..].chars().next().map_or(1, char::len_utf8);
                continue;
            }

            let (token, n) = scanner::read_token(&src[pos..], TOKEN_CAP, None)?;
            if token.is_empty() {
                break;
            }
            pos += n;

            match self.classify(hash_name(&token)) {
                TypeId::Keyword(Keyword::Typedef) => {
                    pos += scanner::skip_spaces(&src[pos..]);
                    let block = scanner::read_block(&src[pos..], BLOCK_CAP, None, ';')?;
                    pos += block.consumed;
                    self.parse_typedef(&block.text);
                }
                TypeId::Keyword(Keyword::Struct) => {
                    let (name, n) = scanner::read_name(&src[pos..], NAME_CAP)?;
                    pos += n;
                    pos += scanner::expect_symbol(&src[pos..], '{')?;
                    let body = scanner::read_block(&src[pos..], src.len() + 2, None, '}')?;
                    if !body.closed {
                        return Err(ParseError::UnexpectedEndOfInput {
                            expected: "}".to_string(),
                        });
                    }
                    pos += body.consumed;
                    self.parse_struct(&name, &body.text)?;
                    if bytes.get(pos) == Some(&b';') {
                        pos += 1;
                    }
                }
                TypeId::Keyword(Keyword::Module) => {
                    let (name, n) = scanner::read_name(&src[pos..], NAME_CAP)?;
                    pos += n;
                    pos += scanner::expect_symbol(&src[pos..], '{')?;
                    self.namespace_stack.push(name);
                    let nested_scope = self.parse_scope(&src[pos..], true);
                    self.namespace_stack.pop();
                    pos += nested_scope?;
                }
                TypeId::Primitive(_) | TypeId::Typedef(_) | TypeId::Struct(_) => {
                    // plain variable declaration, the rest of the statement
                    // is the name
                    let block = scanner::read_block(&src[pos..], BLOCK_CAP, None, ';')?;
                    pos += block.consumed;
                    self.parse_variable(hash_name(&token), "", block.text.trim(), "", false);
                }
                TypeId::Unknown if self.macro_names.contains(&token) => {
                    let block = scanner::read_block(&src[pos..], BLOCK_CAP, None, ')')?;
                    pos += block.consumed;
                    self.user_lines.push(format!("{}{});", token, block.text));
                }
                TypeId::Unknown => {
                    self.diagnostics
                        .warn(None, format!("unknown token \"{token}\""));
                }
            }
        }

        Ok(pos)
    }

    /// Parse a struct body: a run of `;`-delimited field statements.
    fn parse_struct(&mut self, name: &str, body: &str) -> Result<(), ParseError> {
        let mut def = StructDef {
            hash: hash_name(name),
            kind: TypeId::Keyword(Keyword::Struct),
            name: name.to_string(),
            namespace: self.current_namespace(),
            fields: Vec::new(),
        };

        let mut pos = scanner::skip_spaces(body);
        while pos < body.len() {
            let block = scanner::read_block(&body[pos..], BLOCK_CAP, None, ';')?;
            if block.consumed == 0 {
                break;
            }
            pos += block.consumed;
            pos += scanner::skip_spaces(&body[pos..]);
            if let Some(field) = self.parse_field(&def.name, &block.text) {
                def.fields.push(field);
            }
        }

        self.structs.push(def);
        Ok(())
    }

    /// Parse one field statement. `type name` and `@key type name` are the
    /// two accepted shapes; the type may carry a `::ns::` qualifier.
    fn parse_field(&mut self, struct_name: &str, statement: &str) -> Option<Variable> {
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let (type_token, var_name, is_key) = match tokens.as_slice() {
            ["@key", type_token, var_name, ..] => (*type_token, *var_name, true),
            [type_token, var_name] => (*type_token, *var_name, false),
            [] | [_] => return None,
            _ => {
                self.diagnostics.error(
                    None,
                    format!(
                        "unknown field statement '{}' in struct '{struct_name}'",
                        statement.trim()
                    ),
                );
                return None;
            }
        };

        let (origin_namespace, local_type) = split_scoped_name(type_token);
        Some(self.parse_variable(
            hash_name(&local_type),
            struct_name,
            var_name,
            &origin_namespace,
            is_key,
        ))
    }

    /// Resolve and store one variable; also returned so struct parsing can
    /// keep it in field order.
    fn parse_variable(
        &mut self,
        type_hash: NameHash,
        struct_name: &str,
        name: &str,
        origin_namespace: &str,
        is_key: bool,
    ) -> Variable {
        let variable = Variable {
            hash: hash_name(name),
            resolved: self.resolve_real(type_hash),
            is_key,
            name: name.to_string(),
            struct_name: struct_name.to_string(),
            origin_namespace: origin_namespace.to_string(),
        };
        self.variables.push(variable.clone());
        variable
    }

    /// Parse a typedef body (everything between `typedef` and `;`).
    fn parse_typedef(&mut self, body: &str) {
        // seq<name, size> must split as one token
        let normalized = body.replace(", ", ",");
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.len() < 2 {
            self.diagnostics
                .error(None, format!("unknown typedef '{}'", body.trim()));
            return;
        }

        let base_id = self.classify(hash_name(tokens[0]));
        if base_id.is_builtin_type() || base_id.is_user_type() {
            let new_name = tokens[1];
            self.typedefs.push(Typedef {
                hash: hash_name(new_name),
                kind: base_id,
                name: new_name.to_string(),
                base_name: self.type_name(base_id).to_string(),
                namespace: self.current_namespace(),
                sequence: None,
            });
        } else if tokens[0].contains("sequence") {
            self.parse_sequence_typedef(tokens[0], tokens[1]);
        } else {
            self.diagnostics
                .error(None, format!("unknown type '{}' in typedef", tokens[0]));
        }
    }

    /// Parse `sequence<elem>` / `sequence<elem,bound>` typedefs.
    fn parse_sequence_typedef(&mut self, decl: &str, name: &str) {
        let args = match (decl.find('<'), decl.rfind('>')) {
            (Some(open), Some(close)) if close > open => &decl[open + 1..close],
            _ => {
                self.diagnostics
                    .error(None, format!("unknown typedef form '{decl}'"));
                return;
            }
        };

        let (element, bound_text) = match args.split_once(',') {
            Some((element, bound)) => (element.trim(), Some(bound.trim())),
            None => (args.trim(), None),
        };

        let bound = match bound_text {
            None => SequenceBound::Unbounded,
            Some(text) => match scanner::read_digit(text, TOKEN_CAP)
                .ok()
                .and_then(|(digits, _)| digits.parse::<u64>().ok())
            {
                Some(0) | None => SequenceBound::Unbounded,
                Some(n) => SequenceBound::Bounded(n),
            },
        };

        // the element may itself be an alias; store its canonical base name
        let resolved_element = self.resolve_real(hash_name(element));
        let base_name = if resolved_element.name.is_empty() {
            element.to_string()
        } else {
            resolved_element.name
        };

        self.typedefs.push(Typedef {
            hash: hash_name(name),
            kind: TypeId::Primitive(types::Primitive::Sequence),
            name: name.to_string(),
            base_name,
            namespace: self.current_namespace(),
            sequence: Some(bound),
        });
    }

    /// Classify a hash: built-in types and keywords first, then user
    /// typedefs, then user structs.
    #[must_use]
    pub fn classify(&self, hash: NameHash) -> TypeId {
        if let Some(id) = types::builtin_classify(hash) {
            return id;
        }
        if let Some(index) = self.typedefs.iter().position(|t| t.hash == hash) {
            return TypeId::Typedef(index);
        }
        if let Some(index) = self.structs.iter().position(|s| s.hash == hash) {
            return TypeId::Struct(index);
        }
        TypeId::Unknown
    }

    /// Resolve a hash to its canonical type.
    ///
    /// Typedef chains are walked down to the underlying built-in or struct;
    /// the entry typedef's declared kind and sequence bound are re-applied
    /// to the result, so an alias of a sequence stays a sequence. Unknown
    /// hashes produce a default typedef and a diagnostic, never an abort.
    pub fn resolve_real(&mut self, hash: NameHash) -> Typedef {
        if let Some(id) = types::builtin_classify(hash)
            && id.is_builtin_type()
        {
            return Typedef {
                hash,
                kind: id,
                name: types::builtin_name(id).unwrap_or_default().to_string(),
                ..Typedef::default()
            };
        }

        if let Some(entry) = self.typedefs.iter().find(|t| t.hash == hash).cloned() {
            if entry.base_name.is_empty() || entry.base_name == entry.name {
                return entry;
            }
            let mut resolved = self.resolve_real(hash_name(&entry.base_name));
            resolved.kind = entry.kind;
            resolved.sequence = entry.sequence;
            return resolved;
        }

        if let Some(index) = self.structs.iter().position(|s| s.hash == hash) {
            let def = &self.structs[index];
            return Typedef {
                hash,
                kind: TypeId::Struct(index),
                name: def.name.clone(),
                // self-reference marks a struct type
                base_name: def.name.clone(),
                namespace: def.namespace.clone(),
                sequence: None,
            };
        }

        self.diagnostics
            .error(None, format!("unknown type: {hash:#x}"));
        Typedef::default()
    }

    /// Name behind a classification, empty for [`TypeId::Unknown`].
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> &str {
        match id {
            TypeId::Primitive(p) => p.name(),
            TypeId::Keyword(k) => k.name(),
            TypeId::Typedef(index) => self.typedefs.get(index).map_or("", |t| t.name.as_str()),
            TypeId::Struct(index) => self.structs.get(index).map_or("", |s| s.name.as_str()),
            TypeId::Unknown => "",
        }
    }

    /// The namespace the parser is currently inside, segments joined
    /// with `::`.
    #[must_use]
    pub fn current_namespace(&self) -> String {
        self.namespace_stack.join("::")
    }

    /// Parsed typedefs, in source order
    #[must_use]
    pub fn typedefs(&self) -> &[Typedef] {
        &self.typedefs
    }

    /// Parsed structs, in source order
    #[must_use]
    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    /// Every stored variable, struct fields included
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Verbatim macro-style statements
    #[must_use]
    pub fn user_lines(&self) -> &[String] {
        &self.user_lines
    }

    /// Diagnostics reported so far
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.entries()
    }

    /// Snapshot of the current tables
    #[must_use]
    pub fn model(&self) -> Model {
        Model {
            structs: self.structs.clone(),
            typedefs: self.typedefs.clone(),
            variables: self.variables.clone(),
            user_lines: self.user_lines.clone(),
        }
    }

    /// Move the tables out, leaving the parser empty
    pub fn take_model(&mut self) -> Model {
        Model {
            structs: std::mem::take(&mut self.structs),
            typedefs: std::mem::take(&mut self.typedefs),
            variables: std::mem::take(&mut self.variables),
            user_lines: std::mem::take(&mut self.user_lines),
        }
    }

    /// Clear all tables for another parse
    pub fn clear(&mut self) {
        self.typedefs.clear();
        self.structs.clear();
        self.variables.clear();
        self.user_lines.clear();
        self.namespace_stack.clear();
    }
}
