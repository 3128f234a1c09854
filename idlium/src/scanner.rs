//! Low-level scanning primitives over raw source text.
//!
//! Every function takes the remaining input as a `&str` and reports how many
//! bytes it consumed, so callers keep an explicit cursor and advance with
//! `pos += n`. The grammar these primitives feed is plain ASCII; multi-byte
//! characters only appear in copied-through payload such as string literals.

use crate::error::ParseError;

/// Destination capacity for identifiers
pub(crate) const NAME_CAP: usize = 1024;
/// Destination capacity for bare tokens
pub(crate) const TOKEN_CAP: usize = 256;
/// Destination capacity for directive values
pub(crate) const VALUE_CAP: usize = 1024;
/// Destination capacity for statement blocks
pub(crate) const BLOCK_CAP: usize = 4096;

/// A delimiter-balanced span read by [`read_block`].
pub(crate) struct Block {
    /// The span's content, delimiters excluded
    pub(crate) text: String,
    /// Bytes consumed, including the closing delimiter when found
    pub(crate) consumed: usize,
    /// Whether the closing delimiter was actually seen
    pub(crate) closed: bool,
}

/// Identifier characters cover `:` as well, so scoped names scan as one token.
fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':'
}

fn is_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':'
}

fn preview(src: &str) -> String {
    src.chars().take(24).collect()
}

/// Number of leading space and newline bytes.
///
/// Tabs and carriage returns never reach the scanner; minification folds
/// them away first.
pub(crate) fn skip_spaces(src: &str) -> usize {
    src.bytes().take_while(|&b| b == b' ' || b == b'\n').count()
}

/// Read an identifier. The first non-space character must be able to start
/// one.
pub(crate) fn read_name(src: &str, cap: usize) -> Result<(String, usize), ParseError> {
    let bytes = src.as_bytes();
    let mut pos = skip_spaces(src);
    match bytes.get(pos) {
        None => {
            return Err(ParseError::UnexpectedEndOfInput {
                expected: "a name".to_string(),
            });
        }
        Some(&b) if !is_name_start(b) => {
            return Err(ParseError::InvalidName(preview(&src[pos..])));
        }
        Some(_) => {}
    }

    let mut out = String::new();
    while let Some(&b) = bytes.get(pos) {
        if !is_name_continue(b) {
            break;
        }
        if out.len() + 1 >= cap {
            return Err(ParseError::BufferOverflow("read_name"));
        }
        out.push(b as char);
        pos += 1;
    }
    Ok((out, pos))
}

/// Read a numeric literal: a `0x`/`0X` hex literal, or a decimal with
/// optional fraction, exponent and `f`/`F` suffix. Each extension is only
/// accepted directly after a digit (the exponent sign after `e`/`E`), so
/// malformed tails are left unconsumed.
pub(crate) fn read_digit(src: &str, cap: usize) -> Result<(String, usize), ParseError> {
    let bytes = src.as_bytes();
    let mut pos = skip_spaces(src);
    let mut out = String::new();

    if bytes.get(pos) == Some(&b'0') && matches!(bytes.get(pos + 1), Some(b'x' | b'X')) {
        out.push('0');
        out.push(bytes[pos + 1] as char);
        pos += 2;
        while let Some(&b) = bytes.get(pos) {
            if !b.is_ascii_hexdigit() {
                break;
            }
            if out.len() + 1 >= cap {
                return Err(ParseError::BufferOverflow("read_digit"));
            }
            out.push(b as char);
            pos += 1;
        }
        return Ok((out, pos));
    }

    while let Some(&b) = bytes.get(pos) {
        let prev = if pos > 0 { bytes[pos - 1] } else { 0 };
        let accept = b.is_ascii_digit()
            || (b == b'.' && prev.is_ascii_digit())
            || ((b == b'e' || b == b'E') && prev.is_ascii_digit())
            || ((b == b'+' || b == b'-') && (prev == b'e' || prev == b'E'))
            || ((b == b'f' || b == b'F') && prev.is_ascii_digit());
        if !accept {
            break;
        }
        if out.len() + 1 >= cap {
            return Err(ParseError::BufferOverflow("read_digit"));
        }
        out.push(b as char);
        pos += 1;
    }
    Ok((out, pos))
}

/// Read a raw token: identifier-class characters, or, when `symbols` is
/// given, only characters from that set. An empty token at end of input is
/// not an error.
pub(crate) fn read_token(
    src: &str,
    cap: usize,
    symbols: Option<&str>,
) -> Result<(String, usize), ParseError> {
    let bytes = src.as_bytes();
    let mut pos = skip_spaces(src);
    let mut out = String::new();

    if pos >= bytes.len() {
        return Ok((out, 0));
    }

    while let Some(&b) = bytes.get(pos) {
        let accept = match symbols {
            Some(set) => set.as_bytes().contains(&b),
            None => is_name_continue(b),
        };
        if !accept {
            break;
        }
        if out.len() + 1 >= cap {
            return Err(ParseError::BufferOverflow("read_token"));
        }
        out.push(b as char);
        pos += 1;
    }
    Ok((out, pos))
}

/// Read a delimiter-balanced span ending at `to`.
///
/// When the first non-space character equals `from` it is consumed as the
/// opening delimiter. Nested `from`/`to` pairs and parentheses are tracked
/// independently; double-quoted strings are copied verbatim (escaped quotes
/// included) without affecting either count; a backslash-newline pair is
/// elided. The closing delimiter is consumed but not copied.
pub(crate) fn read_block(
    src: &str,
    cap: usize,
    from: Option<char>,
    to: char,
) -> Result<Block, ParseError> {
    let bytes = src.as_bytes();
    let mut pos = 0;
    while bytes.get(pos) == Some(&b' ') {
        pos += 1;
    }

    if pos >= bytes.len() {
        return Ok(Block {
            text: String::new(),
            consumed: 0,
            closed: false,
        });
    }

    let from_b = from.map(|c| c as u8);
    let to_b = to as u8;
    let mut in_string = false;
    let mut parens = 0i32;
    let mut depth = 0i32;
    let mut out: Vec<u8> = Vec::new();
    let mut closed = false;

    if let Some(f) = from_b
        && bytes[pos] == f
    {
        if f == b'"' {
            in_string = true;
        }
        if f == b'(' {
            parens += 1;
        }
        depth += 1;
        pos += 1;
    }

    while let Some(&b) = bytes.get(pos) {
        if out.len() + 1 >= cap {
            return Err(ParseError::BufferOverflow("read_block"));
        }
        if in_string {
            if b == b'"' && (pos == 0 || bytes[pos - 1] != b'\\') {
                in_string = false;
                if b == to_b {
                    pos += 1;
                    closed = true;
                    break;
                }
            }
            out.push(b);
            pos += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else {
            if b == b'(' {
                parens += 1;
            } else if b == b')' {
                parens -= 1;
                if parens < 0 {
                    return Err(ParseError::UnbalancedDelimiters {
                        open: '(',
                        close: ')',
                    });
                }
            }
            if b == b'\\' && bytes.get(pos + 1) == Some(&b'\n') {
                pos += 2;
                continue;
            }
            if let Some(f) = from_b {
                if b == f {
                    depth += 1;
                } else if b == to_b {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ParseError::UnbalancedDelimiters {
                            open: from.unwrap_or(to),
                            close: to,
                        });
                    }
                }
            }
        }
        if b == to_b && depth == 0 && parens == 0 {
            pos += 1;
            closed = true;
            break;
        }
        out.push(b);
        pos += 1;
    }

    Ok(Block {
        text: String::from_utf8_lossy(&out).into_owned(),
        consumed: pos,
        closed,
    })
}

/// Skip space and assert that the next character is `symbol`, consuming it.
pub(crate) fn expect_symbol(src: &str, symbol: char) -> Result<usize, ParseError> {
    let pos = skip_spaces(src);
    match src.as_bytes().get(pos) {
        None => Err(ParseError::UnexpectedEndOfInput {
            expected: symbol.to_string(),
        }),
        Some(&b) if b == symbol as u8 => Ok(pos + 1),
        Some(&b) => Err(ParseError::UnexpectedSymbol {
            found: b as char,
            expected: symbol.to_string(),
        }),
    }
}

/// Peek the next non-space character without consuming it. With a symbol
/// set, a character outside the set (or end of input) is an error.
pub(crate) fn get_symbol(src: &str, symbols: Option<&str>) -> Result<Option<char>, ParseError> {
    let pos = skip_spaces(src);
    let next = src.as_bytes().get(pos).map(|&b| b as char);
    if let Some(set) = symbols {
        match next {
            None => {
                return Err(ParseError::UnexpectedEndOfInput {
                    expected: set.to_string(),
                });
            }
            Some(c) if !set.contains(c) => {
                return Err(ParseError::UnexpectedSymbol {
                    found: c,
                    expected: set.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_spaces_and_newlines_only() {
        assert_eq!(skip_spaces("  \n x"), 4);
        assert_eq!(skip_spaces("x"), 0);
        assert_eq!(skip_spaces(""), 0);
    }

    #[test]
    fn reads_plain_name() {
        let (name, n) = read_name("  foo_bar2 rest", NAME_CAP).unwrap();
        assert_eq!(name, "foo_bar2");
        assert_eq!(n, 10);
    }

    #[test]
    fn reads_scoped_name_as_one_token() {
        let (name, _) = read_name("::Mod1::foo_t a;", NAME_CAP).unwrap();
        assert_eq!(name, "::Mod1::foo_t");
    }

    #[test]
    fn rejects_bad_name_start() {
        assert!(matches!(
            read_name("123abc", NAME_CAP),
            Err(ParseError::InvalidName(_))
        ));
    }

    #[test]
    fn name_overflows_its_capacity() {
        assert!(matches!(
            read_name("abcdef", 4),
            Err(ParseError::BufferOverflow(_))
        ));
    }

    #[test]
    fn reads_decimal_and_float_literals() {
        assert_eq!(read_digit("42;", TOKEN_CAP).unwrap().0, "42");
        assert_eq!(read_digit("3.14f x", TOKEN_CAP).unwrap().0, "3.14f");
        assert_eq!(read_digit("1e-5;", TOKEN_CAP).unwrap().0, "1e-5");
    }

    #[test]
    fn reads_hex_literal() {
        let (digits, n) = read_digit(" 0x1Fq", TOKEN_CAP).unwrap();
        assert_eq!(digits, "0x1F");
        assert_eq!(n, 5);
    }

    #[test]
    fn digit_extension_needs_a_digit_before_it() {
        // the dot is not preceded by a digit, so nothing past "" is taken
        assert_eq!(read_digit(".5", TOKEN_CAP).unwrap().0, "");
        // exponent sign only after e/E
        assert_eq!(read_digit("1-2", TOKEN_CAP).unwrap().0, "1");
    }

    #[test]
    fn token_is_empty_at_end_of_input() {
        let (token, n) = read_token("   ", TOKEN_CAP, None).unwrap();
        assert!(token.is_empty());
        assert_eq!(n, 0);
    }

    #[test]
    fn token_with_symbol_set() {
        let (token, _) = read_token("<<= x", TOKEN_CAP, Some("<=")).unwrap();
        assert_eq!(token, "<<=");
    }

    #[test]
    fn block_round_trip() {
        let src = "prefix(a(b)c)suffix";
        let start = src.find('(').unwrap();
        let block = read_block(&src[start..], BLOCK_CAP, Some('('), ')').unwrap();
        assert_eq!(block.text, "a(b)c");
        assert!(block.closed);
        // consumed points exactly past the matching ')'
        assert_eq!(&src[start + block.consumed..], "suffix");
    }

    #[test]
    fn block_ignores_delimiters_inside_strings() {
        let block = read_block("a \"x;y\" b; tail", BLOCK_CAP, None, ';').unwrap();
        assert_eq!(block.text, "a \"x;y\" b");
        assert!(block.closed);
    }

    #[test]
    fn block_reads_quoted_include_target() {
        let block = read_block(" \"file.idl\" rest", NAME_CAP, Some('"'), '"').unwrap();
        assert_eq!(block.text, "file.idl");
        assert!(block.closed);
    }

    #[test]
    fn block_reports_missing_terminator() {
        let block = read_block("int32_t a", BLOCK_CAP, None, ';').unwrap();
        assert_eq!(block.text, "int32_t a");
        assert!(!block.closed);
    }

    #[test]
    fn block_rejects_extra_closers() {
        assert!(matches!(
            read_block("a)b;", BLOCK_CAP, None, ';'),
            Err(ParseError::UnbalancedDelimiters { .. })
        ));
    }

    #[test]
    fn expects_symbol_after_space() {
        assert_eq!(expect_symbol("  {x", '{').unwrap(), 3);
        assert!(matches!(
            expect_symbol("x", '{'),
            Err(ParseError::UnexpectedSymbol { .. })
        ));
        assert!(matches!(
            expect_symbol("", '{'),
            Err(ParseError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn peeks_symbol_from_set() {
        assert_eq!(get_symbol(" \"x", Some("\"<")).unwrap(), Some('"'));
        assert!(matches!(
            get_symbol("x", Some("\"<")),
            Err(ParseError::UnexpectedSymbol { .. })
        ));
        assert_eq!(get_symbol("  ", None).unwrap(), None);
    }
}
