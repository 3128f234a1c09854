//! Text-level macro preprocessor.
//!
//! Each file goes through two phases: minification (comments stripped,
//! carriage returns dropped, tabs and runs of whitespace folded) and a
//! single left-to-right directive scan that maintains a stack of
//! conditional-compilation states, expands `#include` targets recursively,
//! and splices macro values over bare words in the text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::{IncludeContext, IncludeResolver, ParserConfig};
use crate::error::{Diagnostic, DiagnosticSink, ParseError};
use crate::scanner::{self, NAME_CAP, TOKEN_CAP, VALUE_CAP};

/// Characters that end a bare word; writing one triggers macro replacement
/// of the word before it.
const WORD_DELIMITERS: &[u8] = b" \n,.=:;()[]{}<>+-*/%!&|^\"'";

/// The macro preprocessor
///
/// The define table survives across files and invocations, so the parser
/// can still test macro names after preprocessing has finished.
pub struct Preprocessor {
    defines: BTreeMap<String, String>,
    include_resolver: Option<IncludeResolver>,
    include_dirs: Vec<PathBuf>,
    include_stack: Vec<String>,
    max_include_depth: usize,
    diagnostics: DiagnosticSink,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Create a preprocessor with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ParserConfig::default())
    }

    /// Create a preprocessor from a configuration
    #[must_use]
    pub fn with_config(config: &ParserConfig) -> Self {
        let mut preprocessor = Preprocessor {
            defines: BTreeMap::new(),
            include_resolver: config.include_resolver.clone(),
            include_dirs: config.include_dirs.clone(),
            include_stack: Vec::new(),
            max_include_depth: config.max_include_depth,
            diagnostics: DiagnosticSink::new(config.diagnostic_handler.clone()),
        };
        for (name, value) in &config.defines {
            preprocessor.define(name, value);
        }
        preprocessor
    }

    /// Add a custom include resolver, tried before the filesystem
    #[must_use]
    pub fn with_include_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &IncludeContext) -> Option<String> + 'static,
    {
        self.include_resolver = Some(Rc::new(f));
        self
    }

    /// Define a macro
    pub fn define(&mut self, name: &str, value: &str) {
        self.defines.insert(name.to_string(), value.to_string());
    }

    /// Remove a macro definition
    pub fn undef(&mut self, name: &str) {
        self.defines.remove(name);
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// The current macro definitions
    #[must_use]
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    /// Diagnostics reported so far
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.entries()
    }

    /// Load and preprocess a file from disk (or the include resolver).
    ///
    /// # Errors
    /// Fails on unreadable files, malformed directives, unresolved or
    /// cyclic includes, and unterminated conditional blocks.
    pub fn preprocess_file(&mut self, path: &str) -> Result<String, ParseError> {
        let source = match self.resolve_with_resolver(path) {
            Some(content) => content,
            None => std::fs::read_to_string(path)?,
        };
        let dir = parent_dir(path);
        self.preprocess_source(&dir, path, &source)
    }

    /// Preprocess in-memory source. `file` names the buffer for `__FILE__`,
    /// cycle detection and diagnostics; `dir` anchors relative includes.
    ///
    /// # Errors
    /// Fails on malformed directives, unresolved or cyclic includes, and
    /// unterminated conditional blocks.
    pub fn preprocess_source(
        &mut self,
        dir: &str,
        file: &str,
        source: &str,
    ) -> Result<String, ParseError> {
        if self.include_stack.len() >= self.max_include_depth {
            return Err(ParseError::IncludeDepthExceeded(self.max_include_depth));
        }
        if self.include_stack.iter().any(|entry| entry == file) {
            return Err(ParseError::IncludeCycle(file.to_string()));
        }
        self.include_stack.push(file.to_string());
        let minified = Self::minify(source);
        let result = self.run(dir, file, &minified);
        self.include_stack.pop();
        result
    }

    /// Strip comments, drop carriage returns, fold tabs and whitespace runs.
    ///
    /// String literals pass through untouched. Run-folding keys off the
    /// output, so minifying already-minified text changes nothing.
    pub(crate) fn minify(source: &str) -> String {
        let bytes = source.as_bytes();
        let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            } else if b == b'"' {
                out.push(b);
                i += 1;
                while i < bytes.len() && !(bytes[i] == b'"' && bytes[i - 1] != b'\\') {
                    out.push(bytes[i]);
                    i += 1;
                }
                if i < bytes.len() {
                    out.push(bytes[i]);
                    i += 1;
                }
            } else if b == b'\r' {
                i += 1;
            } else if b == b' ' || b == b'\t' {
                if out.last() != Some(&b' ') {
                    out.push(b' ');
                }
                i += 1;
            } else if b == b'\n' {
                if out.last() != Some(&b'\n') {
                    out.push(b'\n');
                }
                i += 1;
            } else {
                out.push(b);
                i += 1;
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// The directive scan over minified text.
    fn run(&mut self, dir: &str, file: &str, source: &str) -> Result<String, ParseError> {
        let bytes = source.as_bytes();
        let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut conditionals: Vec<bool> = Vec::new();
        let mut active = true;
        let mut line = 0usize;
        let mut synced_line = usize::MAX;
        let mut i = 0usize;

        while i < bytes.len() {
            if bytes[i] == b'\n' {
                line += 1;
            }

            if bytes[i] == b'#' {
                i += 1;
                let (directive, n) = scanner::read_token(&source[i..], TOKEN_CAP, None)?;
                i += n;
                match directive.as_str() {
                    "ifdef" => {
                        let (name, n) = scanner::read_name(&source[i..], NAME_CAP)?;
                        i += n;
                        conditionals.push(self.is_defined(&name));
                        active = conditionals.iter().all(|&c| c);
                    }
                    "ifndef" => {
                        let (name, n) = scanner::read_name(&source[i..], NAME_CAP)?;
                        i += n;
                        conditionals.push(!self.is_defined(&name));
                        active = conditionals.iter().all(|&c| c);
                    }
                    "else" => {
                        match conditionals.last_mut() {
                            Some(top) => *top = !*top,
                            None => {
                                return Err(ParseError::UnbalancedConditional(
                                    "#else is before #ifdef or #ifndef".to_string(),
                                ));
                            }
                        }
                        active = conditionals.iter().all(|&c| c);
                    }
                    "endif" => {
                        if conditionals.pop().is_none() {
                            return Err(ParseError::UnbalancedConditional(
                                "#endif is before #ifdef or #ifndef".to_string(),
                            ));
                        }
                        active = conditionals.iter().all(|&c| c);
                    }
                    "if" | "elif" => {
                        self.diagnostics.warn(
                            Some(line),
                            format!("directive '#{directive}' is not supported, skipping"),
                        );
                        while i < bytes.len() && bytes[i] != b'\n' {
                            i += 1;
                        }
                    }
                    "define" => i = self.handle_define(source, i, active)?,
                    "undef" => {
                        let (name, n) = scanner::read_name(&source[i..], NAME_CAP)?;
                        i += n;
                        if active {
                            self.defines.remove(&name);
                        }
                    }
                    "pragma" => {
                        // recognized and discarded, the keylist pragma included
                        let (_name, n) = scanner::read_name(&source[i..], NAME_CAP)?;
                        i += n;
                        let block = scanner::read_block(&source[i..], VALUE_CAP, None, '\n')?;
                        i += block.consumed;
                    }
                    "include" => i = self.handle_include(source, i, dir, active, &mut out)?,
                    _ => {
                        self.diagnostics.warn(
                            Some(line),
                            format!("unknown preprocessor directive \"#{directive}\""),
                        );
                        while i < bytes.len() && bytes[i] != b'\n' {
                            i += 1;
                        }
                    }
                }
                continue;
            }

            // keep the synthetic location macros current
            if synced_line != line {
                synced_line = line;
                self.defines
                    .insert("__FILE__".to_string(), format!("\"{file}:{line}\""));
                self.defines.insert("__LINE__".to_string(), line.to_string());
            }

            if !active {
                i += 1;
                continue;
            }

            let b = bytes[i];

            // character literals pass through without substitution
            if b == b'\'' && bytes.get(i + 1) == Some(&b'\\') && bytes.get(i + 3) == Some(&b'\'') {
                out.extend_from_slice(&bytes[i..i + 4]);
                i += 4;
                continue;
            }
            if b == b'\'' && bytes.get(i + 2) == Some(&b'\'') {
                out.extend_from_slice(&bytes[i..i + 3]);
                i += 3;
                continue;
            }

            let entering_string = b == b'"';
            out.push(b);
            i += 1;
            if WORD_DELIMITERS.contains(&b) {
                self.replace_word(&mut out);
            }
            if entering_string {
                // string literal payload is copied verbatim
                while i < bytes.len() && !(bytes[i] == b'"' && bytes[i - 1] != b'\\') {
                    out.push(bytes[i]);
                    i += 1;
                }
                if i < bytes.len() {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
        }

        if !conditionals.is_empty() {
            return Err(ParseError::UnterminatedConditional(file.to_string()));
        }

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn handle_define(
        &mut self,
        source: &str,
        mut i: usize,
        active: bool,
    ) -> Result<usize, ParseError> {
        let (name, n) = scanner::read_name(&source[i..], NAME_CAP)?;
        i += n;
        let value = if source.as_bytes().get(i) == Some(&b'\n') {
            i += 1;
            String::new()
        } else {
            let block = scanner::read_block(&source[i..], VALUE_CAP, None, '\n')?;
            i += block.consumed;
            block.text
        };
        if active {
            self.defines.insert(name, value);
        }
        Ok(i)
    }

    fn handle_include(
        &mut self,
        source: &str,
        mut i: usize,
        dir: &str,
        active: bool,
        out: &mut Vec<u8>,
    ) -> Result<usize, ParseError> {
        let symbol = scanner::get_symbol(&source[i..], Some("\"<"))?;
        let block = match symbol {
            Some('"') => scanner::read_block(&source[i..], NAME_CAP, Some('"'), '"')?,
            _ => scanner::read_block(&source[i..], NAME_CAP, Some('<'), '>')?,
        };
        i += block.consumed;
        let name = block.text;

        if active {
            let Some((path, content)) = self.resolve_include(dir, &name) else {
                return Err(ParseError::IncludeNotFound(name));
            };
            let nested_dir = parent_dir(&path);
            let expanded = self.preprocess_source(&nested_dir, &path, &content)?;
            out.extend_from_slice(expanded.as_bytes());
        }
        Ok(i)
    }

    /// Resolve an include target: resolver, then the name as given, then
    /// relative to the including file, then the configured include dirs.
    fn resolve_include(&self, dir: &str, name: &str) -> Option<(String, String)> {
        if let Some(content) = self.resolve_with_resolver(name) {
            return Some((name.to_string(), content));
        }
        if let Ok(content) = std::fs::read_to_string(name) {
            return Some((name.to_string(), content));
        }
        if !dir.is_empty() {
            let local = Path::new(dir).join(name);
            if let Ok(content) = std::fs::read_to_string(&local) {
                return Some((local.to_string_lossy().into_owned(), content));
            }
        }
        for include_dir in &self.include_dirs {
            let candidate = include_dir.join(name);
            if let Ok(content) = std::fs::read_to_string(&candidate) {
                return Some((candidate.to_string_lossy().into_owned(), content));
            }
        }
        None
    }

    fn resolve_with_resolver(&self, name: &str) -> Option<String> {
        let resolver = self.include_resolver.as_ref()?;
        let context = IncludeContext {
            include_stack: self.include_stack.clone(),
            include_dirs: self.include_dirs.clone(),
        };
        resolver(name, &context)
    }

    /// Splice a macro value over the word just before the delimiter that
    /// was written last. Values that are empty or `"0"` delete the word
    /// instead, which is what flag-style defines rely on.
    fn replace_word(&self, out: &mut Vec<u8>) {
        let end = out.len() - 1;
        if end == 0 {
            return;
        }
        let mut start = end;
        while start > 0 && !WORD_DELIMITERS.contains(&out[start - 1]) {
            start -= 1;
        }
        if start == end {
            return;
        }
        let value = {
            let word = &out[start..end];
            self.defines
                .iter()
                .find(|(name, _)| name.as_bytes() == word)
                .map(|(_, value)| value.as_str())
        };
        let Some(value) = value else {
            return;
        };
        if value.is_empty() || value == "0" {
            out.drain(start..end);
        } else {
            out.splice(start..end, value.bytes());
        }
    }
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocess(src: &str) -> String {
        let mut pp = Preprocessor::new();
        pp.preprocess_source(".", "test.idl", src).unwrap()
    }

    #[test]
    fn minify_strips_comments() {
        let out = Preprocessor::minify("int a; // trailing\n/* block\ncomment */int b;\n");
        assert!(!out.contains("trailing"));
        assert!(!out.contains("comment"));
        assert!(out.contains("int a;"));
        assert!(out.contains("int b;"));
    }

    #[test]
    fn minify_keeps_strings_untouched() {
        let out = Preprocessor::minify("string s = \"a  //  b\";");
        assert!(out.contains("\"a  //  b\""));
    }

    #[test]
    fn minify_folds_whitespace() {
        let out = Preprocessor::minify("a\t\tb   c\r\n\n\nd");
        assert_eq!(out, "a b c\nd");
    }

    #[test]
    fn minify_is_idempotent() {
        let src = "struct  A {\n\n\tint32_t   a;\r\n};\n";
        let once = Preprocessor::minify(src);
        assert_eq!(Preprocessor::minify(&once), once);
    }

    #[test]
    fn preprocessing_without_directives_is_idempotent() {
        let src = "module  m {\n\n  struct A { int32_t a; };\n};\n";
        let once = preprocess(src);
        let twice = {
            let mut pp = Preprocessor::new();
            pp.preprocess_source(".", "test.idl", &once).unwrap()
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn define_splices_value_over_word() {
        let out = preprocess("#define MAX_LEN 128\nstring name = MAX_LEN;\n");
        assert!(out.contains("string name = 128;"));
        assert!(!out.contains("MAX_LEN"));
    }

    #[test]
    fn empty_define_deletes_word() {
        let out = preprocess("#define OPTIONAL\nOPTIONAL int32_t a;\n");
        assert!(!out.contains("OPTIONAL"));
        assert!(out.contains("int32_t a;"));
    }

    #[test]
    fn zero_define_deletes_word() {
        let out = preprocess("#define GONE 0\nGONE int32_t a;\n");
        assert!(!out.contains("GONE"));
        assert!(out.contains("int32_t a;"));
    }

    #[test]
    fn no_substitution_inside_strings() {
        let out = preprocess("#define NAME bob\nstring s = \"NAME\";\n");
        assert!(out.contains("\"NAME\""));
    }

    #[test]
    fn no_substitution_inside_char_literals() {
        let out = preprocess("#define x 9\nchar c = 'x';\nchar d = '\\x';\n");
        assert!(out.contains("'x'"));
        assert!(out.contains("'\\x'"));
    }

    #[test]
    fn word_match_is_length_exact() {
        let out = preprocess("#define AB 1\nint ABC = 2;\n");
        assert!(out.contains("ABC"));
    }

    #[test]
    fn ifdef_gates_text() {
        let out = preprocess("#ifdef FOO\nhidden\n#endif\nvisible\n");
        assert!(!out.contains("hidden"));
        assert!(out.contains("visible"));
    }

    #[test]
    fn ifdef_with_defined_macro_emits_text() {
        let out = preprocess("#define FOO\n#ifdef FOO\nshown\n#endif\n");
        assert!(out.contains("shown"));
    }

    #[test]
    fn else_flips_the_branch() {
        let out = preprocess("#ifdef FOO\na\n#else\nb\n#endif\n");
        assert!(!out.contains('a'));
        assert!(out.contains('b'));
    }

    #[test]
    fn nested_conditionals_and_all_levels() {
        let out = preprocess("#define A\n#ifdef A\n#ifdef B\nhidden\n#endif\nkept\n#endif\n");
        assert!(!out.contains("hidden"));
        assert!(out.contains("kept"));
    }

    #[test]
    fn ifndef_inverts() {
        let out = preprocess("#ifndef FOO\nshown\n#endif\n");
        assert!(out.contains("shown"));
    }

    #[test]
    fn defines_inside_inactive_blocks_are_ignored() {
        let mut pp = Preprocessor::new();
        pp.preprocess_source(".", "t.idl", "#ifdef FOO\n#define BAR 1\n#endif\n")
            .unwrap();
        assert!(!pp.is_defined("BAR"));
    }

    #[test]
    fn undef_removes_a_macro() {
        let mut pp = Preprocessor::new();
        pp.preprocess_source(".", "t.idl", "#define FOO 1\n#undef FOO\n")
            .unwrap();
        assert!(!pp.is_defined("FOO"));
    }

    #[test]
    fn unterminated_conditional_is_fatal() {
        let mut pp = Preprocessor::new();
        let result = pp.preprocess_source(".", "t.idl", "#ifdef FOO\nx\n");
        assert!(matches!(result, Err(ParseError::UnterminatedConditional(_))));
    }

    #[test]
    fn stray_endif_is_fatal() {
        let mut pp = Preprocessor::new();
        let result = pp.preprocess_source(".", "t.idl", "#endif\n");
        assert!(matches!(result, Err(ParseError::UnbalancedConditional(_))));
    }

    #[test]
    fn hash_if_warns_and_continues() {
        let mut pp = Preprocessor::new();
        let out = pp
            .preprocess_source(".", "t.idl", "#if FOO > 1\nkept\n")
            .unwrap();
        // always-true, no stack effect, one warning
        assert!(out.contains("kept"));
        assert_eq!(pp.diagnostics().len(), 1);
    }

    #[test]
    fn pragma_is_discarded() {
        let out = preprocess("#pragma keylist MyType id\nint32_t a;\n");
        assert!(!out.contains("keylist"));
        assert!(out.contains("int32_t a;"));
    }

    #[test]
    fn include_through_resolver() {
        let mut pp = Preprocessor::new().with_include_resolver(|path, _context| {
            (path == "common.idl").then(|| "#define WIDTH 640\n".to_string())
        });
        let out = pp
            .preprocess_source(".", "t.idl", "#include \"common.idl\"\nlong w = WIDTH;\n")
            .unwrap();
        assert!(out.contains("long w = 640;"));
    }

    #[test]
    fn missing_include_is_fatal() {
        let mut pp = Preprocessor::new();
        let result = pp.preprocess_source(".", "t.idl", "#include \"nowhere.idl\"\n");
        assert!(matches!(result, Err(ParseError::IncludeNotFound(_))));
    }

    #[test]
    fn include_cycle_is_fatal() {
        let mut pp = Preprocessor::new().with_include_resolver(|path, _context| {
            (path == "loop.idl").then(|| "#include \"loop.idl\"\n".to_string())
        });
        let result = pp.preprocess_source(".", "loop.idl", "#include \"loop.idl\"\n");
        assert!(matches!(result, Err(ParseError::IncludeCycle(_))));
    }

    #[test]
    fn file_macro_reflects_current_file() {
        let mut pp = Preprocessor::new();
        let out = pp
            .preprocess_source(".", "pose.idl", "\nstring f = __FILE__;\n")
            .unwrap();
        assert!(out.contains("pose.idl"));
    }

    #[test]
    fn inactive_includes_are_skipped() {
        let mut pp = Preprocessor::new();
        let out = pp
            .preprocess_source(
                ".",
                "t.idl",
                "#ifdef NEVER\n#include \"nowhere.idl\"\n#endif\nok;\n",
            )
            .unwrap();
        assert!(out.contains("ok;"));
    }
}
