use std::fmt;

use crate::config::DiagnosticHandler;
use crate::model::Model;

/// Errors that abort processing of the current file
#[derive(Debug)]
pub enum ParseError {
    /// A name was required but the next character cannot start one
    InvalidName(String),
    /// A scanning primitive exhausted its destination capacity
    BufferOverflow(&'static str),
    /// Closing delimiters outnumbered opening ones
    UnbalancedDelimiters {
        /// Opening delimiter of the unbalanced pair
        open: char,
        /// Closing delimiter of the unbalanced pair
        close: char,
    },
    /// A different character where a specific symbol was required
    UnexpectedSymbol {
        /// The character found in the input
        found: char,
        /// The symbol or symbol set that was required
        expected: String,
    },
    /// Input ended where more was required
    UnexpectedEndOfInput {
        /// What the grammar still required
        expected: String,
    },
    /// `#else` or `#endif` without a matching `#ifdef`/`#ifndef`
    UnbalancedConditional(String),
    /// A conditional block was still open at end of input
    UnterminatedConditional(String),
    /// `#include` target could not be resolved
    IncludeNotFound(String),
    /// A file included itself, directly or indirectly
    IncludeCycle(String),
    /// Include nesting exceeded the configured limit
    IncludeDepthExceeded(usize),
    /// I/O error reading a source file
    Io(std::io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidName(s) => write!(f, "bad name at '{s}'"),
            ParseError::BufferOverflow(what) => write!(f, "{what}: buffer overflow"),
            ParseError::UnbalancedDelimiters { open, close } => {
                write!(f, "unbalanced counts of '{open}' and '{close}' symbols")
            }
            ParseError::UnexpectedSymbol { found, expected } => {
                write!(f, "bad '{found}' symbol, expecting '{expected}'")
            }
            ParseError::UnexpectedEndOfInput { expected } => {
                write!(f, "unexpected end of input, expecting '{expected}'")
            }
            ParseError::UnbalancedConditional(s) => write!(f, "{s}"),
            ParseError::UnterminatedConditional(file) => {
                write!(f, "unterminated conditional block in \"{file}\"")
            }
            ParseError::IncludeNotFound(name) => write!(f, "can't find include file \"{name}\""),
            ParseError::IncludeCycle(name) => write!(f, "include cycle through \"{name}\""),
            ParseError::IncludeDepthExceeded(limit) => {
                write!(f, "includes nested deeper than {limit} levels")
            }
            ParseError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        ParseError::Io(err)
    }
}

/// A fatal error together with whatever partial model had been built
#[derive(Debug)]
pub struct ParseFailure {
    /// The fatal condition that stopped the parse
    pub error: ParseError,
    /// Entities stored before the failure
    pub partial: Model,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for ParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// How serious a recoverable diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Suspicious but harmless input
    Warning,
    /// A construct that had to be skipped or stored incomplete
    Error,
}

/// A recoverable problem reported during preprocessing or parsing
///
/// Diagnostics never abort a parse; the affected construct is skipped or
/// stored with default fields and scanning continues.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity of the problem
    pub severity: Severity,
    /// Zero-based source line, when the reporting phase still knows it
    pub line: Option<usize>,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.line {
            Some(line) => write!(f, "{tag}: line {line}: {}", self.message),
            None => write!(f, "{tag}: {}", self.message),
        }
    }
}

/// Collects diagnostics and forwards each one to an optional handler.
pub(crate) struct DiagnosticSink {
    entries: Vec<Diagnostic>,
    handler: Option<DiagnosticHandler>,
}

impl DiagnosticSink {
    pub(crate) fn new(handler: Option<DiagnosticHandler>) -> Self {
        DiagnosticSink {
            entries: Vec::new(),
            handler,
        }
    }

    pub(crate) fn warn(&mut self, line: Option<usize>, message: String) {
        self.report(Severity::Warning, line, message);
    }

    pub(crate) fn error(&mut self, line: Option<usize>, message: String) {
        self.report(Severity::Error, line, message);
    }

    fn report(&mut self, severity: Severity, line: Option<usize>, message: String) {
        let diagnostic = Diagnostic {
            severity,
            line,
            message,
        };
        if let Some(handler) = &self.handler {
            handler(&diagnostic);
        }
        self.entries.push(diagnostic);
    }

    pub(crate) fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}
