#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # OMG IDL subset parser
//!
//! This library parses a practical subset of OMG IDL — modules, structs,
//! typedefs (including bounded and unbounded sequences) and `@key` field
//! annotations — behind a small macro preprocessor (`#include`,
//! `#define`/`#undef`, `#ifdef`/`#ifndef`/`#else`/`#endif`, text
//! substitution), into an in-memory model for downstream code generators.
//!
//! ## Features
//!
//! - Recursive `#include` expansion with cycle and depth guards
//! - Conditional compilation and word-exact macro substitution
//! - Hash-keyed type resolution with typedef-chain walking
//! - Best-effort recovery: semantic problems become diagnostics, only
//!   structural damage aborts a file
//!
//! ## Example
//!
//! ```rust
//! use idlium::{ParserConfig, parse_idl_source};
//!
//! let source = r#"
//! module robot {
//!     typedef sequence<int32_t, 16> JointAngles;
//!     struct Pose {
//!         @key int32_t id;
//!         JointAngles joints;
//!     };
//! };
//! "#;
//!
//! let model = parse_idl_source("pose.idl", source, &ParserConfig::default()).unwrap();
//! assert_eq!(model.structs[0].name, "Pose");
//! assert_eq!(model.structs[0].namespace, "robot");
//! ```

mod config;
mod error;
mod generator;
mod model;
mod parser;
mod preprocessor;
mod scanner;
mod types;

pub use config::{
    DEFAULT_INCLUDE_DEPTH, DiagnosticHandler, IncludeContext, IncludeResolver, ParserConfig,
};
pub use error::{Diagnostic, ParseError, ParseFailure, Severity};
pub use generator::CodeGenerator;
pub use model::{Model, SequenceBound, StructDef, Typedef, Variable};
pub use parser::Parser;
pub use preprocessor::Preprocessor;
pub use types::{Keyword, NameHash, Primitive, TypeId, hash_name, split_scoped_name};

/// Preprocesses and parses IDL source files into a [`Model`].
///
/// One instance owns one preprocessor and one set of model tables; parse
/// calls append to the tables until [`IdlParser::clear`] resets them. The
/// tables are not meant for shared mutation — use one instance per thread.
pub struct IdlParser {
    preprocessor: Preprocessor,
    parser: Parser,
}

impl Default for IdlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IdlParser {
    /// Create a parser with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ParserConfig::default())
    }

    /// Create a parser from a configuration
    #[must_use]
    pub fn with_config(config: &ParserConfig) -> Self {
        IdlParser {
            preprocessor: Preprocessor::with_config(config),
            parser: Parser::with_diagnostic_handler(config.diagnostic_handler.clone()),
        }
    }

    /// Define a macro ahead of preprocessing
    pub fn define(&mut self, name: &str, value: &str) {
        self.preprocessor.define(name, value);
    }

    /// Remove a macro definition
    pub fn undef(&mut self, name: &str) {
        self.preprocessor.undef(name);
    }

    /// Check whether a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.preprocessor.is_defined(name)
    }

    /// Preprocess and parse one file from disk.
    ///
    /// # Errors
    /// Returns the fatal condition that stopped processing; everything
    /// parsed before it stays available through [`IdlParser::model`].
    pub fn parse_file(&mut self, path: &str) -> Result<(), ParseError> {
        let text = self.preprocessor.preprocess_file(path)?;
        self.finish(&text)
    }

    /// Preprocess and parse in-memory source. `file_name` feeds `__FILE__`
    /// and anchors relative includes.
    ///
    /// # Errors
    /// Returns the fatal condition that stopped processing; everything
    /// parsed before it stays available through [`IdlParser::model`].
    pub fn parse_source(&mut self, file_name: &str, source: &str) -> Result<(), ParseError> {
        let dir = std::path::Path::new(file_name)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = self.preprocessor.preprocess_source(&dir, file_name, source)?;
        self.finish(&text)
    }

    fn finish(&mut self, preprocessed: &str) -> Result<(), ParseError> {
        self.parser
            .set_macro_names(self.preprocessor.defines().keys().cloned());
        self.parser.parse(preprocessed)
    }

    /// Snapshot of everything parsed so far (partial after a fatal error)
    #[must_use]
    pub fn model(&self) -> Model {
        self.parser.model()
    }

    /// Move the parsed model out, leaving the tables empty
    pub fn take_model(&mut self) -> Model {
        self.parser.take_model()
    }

    /// Diagnostics reported so far, preprocessor first
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.preprocessor
            .diagnostics()
            .iter()
            .chain(self.parser.diagnostics().iter())
    }

    /// Reset the model tables for another parse
    pub fn clear(&mut self) {
        self.parser.clear();
    }

    /// Run a code-generation hook over the current model.
    pub fn generate(&mut self, generator: &mut dyn CodeGenerator, source_file: &str) -> String {
        generator.generate(&self.model(), source_file)
    }
}

/// Parse in-memory IDL source into a model.
///
/// # Errors
/// On a fatal condition the returned [`ParseFailure`] carries both the
/// error and whatever partial model had been built.
pub fn parse_idl_source(
    file_name: &str,
    source: &str,
    config: &ParserConfig,
) -> Result<Model, Box<ParseFailure>> {
    let mut engine = IdlParser::with_config(config);
    match engine.parse_source(file_name, source) {
        Ok(()) => Ok(engine.take_model()),
        Err(error) => Err(Box::new(ParseFailure {
            error,
            partial: engine.take_model(),
        })),
    }
}

/// Parse an IDL file from disk into a model.
///
/// # Errors
/// On a fatal condition the returned [`ParseFailure`] carries both the
/// error and whatever partial model had been built.
pub fn parse_idl_file(path: &str, config: &ParserConfig) -> Result<Model, Box<ParseFailure>> {
    let mut engine = IdlParser::with_config(config);
    match engine.parse_file(path) {
        Ok(()) => Ok(engine.take_model()),
        Err(error) => Err(Box::new(ParseFailure {
            error,
            partial: engine.take_model(),
        })),
    }
}
