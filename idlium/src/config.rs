use std::path::PathBuf;
use std::rc::Rc;

use crate::error::Diagnostic;

/// Default limit on `#include` nesting depth
pub const DEFAULT_INCLUDE_DEPTH: usize = 64;

/// Context handed to a custom include resolver
#[derive(Clone, Debug, Default)]
pub struct IncludeContext {
    /// Files currently being expanded, outermost first
    pub include_stack: Vec<String>,
    /// Directories searched after the including file's own directory
    pub include_dirs: Vec<PathBuf>,
}

/// Type alias for include resolver functions
///
/// A resolver maps an `#include` target to its source text. Targets the
/// resolver declines fall back to the filesystem.
pub type IncludeResolver = Rc<dyn Fn(&str, &IncludeContext) -> Option<String>>;

/// Type alias for diagnostic handler functions
pub type DiagnosticHandler = Rc<dyn Fn(&Diagnostic)>;

/// Configuration for an [`IdlParser`](crate::IdlParser)
pub struct ParserConfig {
    /// Macros defined before preprocessing starts, as (name, value) pairs
    pub defines: Vec<(String, String)>,
    /// Directories searched for `#include` targets
    pub include_dirs: Vec<PathBuf>,
    /// Custom include resolver tried before the filesystem
    pub include_resolver: Option<IncludeResolver>,
    /// Callback invoked for each recoverable diagnostic as it is reported
    pub diagnostic_handler: Option<DiagnosticHandler>,
    /// Maximum `#include` nesting depth
    pub max_include_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            defines: Vec::new(),
            include_dirs: Vec::new(),
            include_resolver: None,
            diagnostic_handler: None,
            max_include_depth: DEFAULT_INCLUDE_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Predefine a macro
    #[must_use]
    pub fn with_define<S: Into<String>>(mut self, name: S, value: S) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// Add a directory to the include search path
    #[must_use]
    pub fn with_include_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Set a custom include resolver
    #[must_use]
    pub fn with_include_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &IncludeContext) -> Option<String> + 'static,
    {
        self.include_resolver = Some(Rc::new(f));
        self
    }

    /// Set a handler for recoverable diagnostics
    #[must_use]
    pub fn with_diagnostic_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Diagnostic) + 'static,
    {
        self.diagnostic_handler = Some(Rc::new(f));
        self
    }
}
