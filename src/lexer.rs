//! Two-pass tokenizer and table-model coalescer.
//!
//! Pass 1 ([`scan`]) turns the character stream into raw lexical tokens with
//! no knowledge of parameter names, math functions, or spectral models — that
//! knowledge belongs to [`crate::classifier`]. Pass 2 ([`coalesce_table_models`])
//! fuses `atable{...}`, `mtable{...}`, `etable{...}` references into a single
//! word token, per §4.2 of the expression pipeline design.

use crate::error::{MdefError, Span};

/// Kind of a raw lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum RawKind {
    /// An alphanumeric/underscore/dot/colon sequence: a function, model, or
    /// parameter name before classification, or a fragment of a table-model
    /// filename.
    Word(String),
    /// A numeric literal, already parsed.
    Number(f64),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `^`
    Caret,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `{` (only valid immediately after `atable`/`mtable`/`etable`)
    LBrace,
    /// `}`
    RBrace,
}

/// A raw token together with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToken {
    /// Token payload.
    pub kind: RawKind,
    /// Byte offset of the first character of this token in the source text.
    pub offset: usize,
    /// Byte offset one past the last character of this token.
    pub end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == ':'
}

/// Pass 1: scan the character stream into raw tokens.
///
/// # Errors
/// Returns [`MdefError::InvalidCharacter`] for any character outside the
/// valid input set (ASCII letters/digits, whitespace, and `_#,.+-/*^(){}:`).
pub fn scan(input: &str) -> Result<Vec<RawToken>, MdefError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let len = input.len();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        match ch {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(RawToken { kind: RawKind::LParen, offset, end: offset + 1 });
                i += 1;
            }
            ')' => {
                tokens.push(RawToken { kind: RawKind::RParen, offset, end: offset + 1 });
                i += 1;
            }
            '{' => {
                tokens.push(RawToken { kind: RawKind::LBrace, offset, end: offset + 1 });
                i += 1;
            }
            '}' => {
                tokens.push(RawToken { kind: RawKind::RBrace, offset, end: offset + 1 });
                i += 1;
            }
            ',' => {
                tokens.push(RawToken { kind: RawKind::Comma, offset, end: offset + 1 });
                i += 1;
            }
            '+' => {
                tokens.push(RawToken { kind: RawKind::Plus, offset, end: offset + 1 });
                i += 1;
            }
            '-' => {
                tokens.push(RawToken { kind: RawKind::Minus, offset, end: offset + 1 });
                i += 1;
            }
            '*' => {
                tokens.push(RawToken { kind: RawKind::Star, offset, end: offset + 1 });
                i += 1;
            }
            '#' => {
                // '#' is reserved for the internal convolution-multiply rewrite
                // and never appears in user-supplied source text, but it is
                // in the valid character set; treat a literal occurrence as
                // an (unused) multiply-like token text rather than rejecting it.
                tokens.push(RawToken { kind: RawKind::Word("#".to_string()), offset, end: offset + 1 });
                i += 1;
            }
            '^' => {
                tokens.push(RawToken { kind: RawKind::Caret, offset, end: offset + 1 });
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && matches!(chars[i].1, '0'..='9' | '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                    let save = i;
                    i += 1;
                    if i < chars.len() && matches!(chars[i].1, '+' | '-') {
                        i += 1;
                    }
                    if i < chars.len() && chars[i].1.is_ascii_digit() {
                        while i < chars.len() && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    } else {
                        i = save;
                    }
                }
                // Legacy allowance: a parameter name may contain ':' regardless
                // of its first character (see DESIGN.md, Open Question 2). If a
                // ':' follows directly, this is a qualified parameter name, not
                // a number: keep consuming word characters.
                if i < chars.len() && chars[i].1 == ':' {
                    while i < chars.len() && is_word_char(chars[i].1) {
                        i += 1;
                    }
                    let end = if i < chars.len() { chars[i].0 } else { len };
                    tokens.push(RawToken { kind: RawKind::Word(input[offset..end].to_string()), offset: start, end });
                } else {
                    let end = if i < chars.len() { chars[i].0 } else { len };
                    let text = &input[offset..end];
                    let value = text.parse::<f64>().map_err(|_| MdefError::InvalidCharacter { ch, span: Some(Span::at(offset)) })?;
                    tokens.push(RawToken { kind: RawKind::Number(value), offset: start, end });
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i].1) {
                    i += 1;
                }
                let end = if i < chars.len() { chars[i].0 } else { len };
                tokens.push(RawToken { kind: RawKind::Word(input[offset..end].to_string()), offset: start, end });
            }
            c => return Err(MdefError::InvalidCharacter { ch: c, span: Some(Span::at(offset)) }),
        }
    }
    Ok(tokens)
}

/// Pass 2: fuse `atable{...}`, `mtable{...}`, `etable{...}` into a single
/// word token whose text is the concatenation (e.g. `atable{path/file.mod}`).
///
/// # Errors
/// Returns [`MdefError::UnbalancedBraces`] if a fused reference's braces do
/// not close, or a stray `{`/`}` is left over elsewhere in the stream.
pub fn coalesce_table_models(input: &str, tokens: Vec<RawToken>) -> Result<Vec<RawToken>, MdefError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let is_table_prefix = matches!(&tokens[i].kind, RawKind::Word(w) if w == "atable" || w == "mtable" || w == "etable");
        if is_table_prefix && tokens.get(i + 1).is_some_and(|t| t.kind == RawKind::LBrace) {
            let start_offset = tokens[i].offset;
            let mut j = i + 2;
            let mut depth = 1_u32;
            loop {
                let Some(tok) = tokens.get(j) else {
                    return Err(MdefError::UnbalancedBraces { span: Some(Span::at(start_offset)) });
                };
                match &tok.kind {
                    RawKind::LBrace => depth += 1,
                    RawKind::RBrace => {
                        depth -= 1;
                        if depth == 0 {
                            j += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            let end_offset = tokens[j - 1].end;
            out.push(RawToken { kind: RawKind::Word(input[start_offset..end_offset].to_string()), offset: start_offset, end: end_offset });
            i = j;
        } else if matches!(tokens[i].kind, RawKind::LBrace | RawKind::RBrace) {
            return Err(MdefError::UnbalancedBraces { span: Some(Span::at(tokens[i].offset)) });
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_arithmetic() {
        let tokens = scan("2*e + p").expect("valid input");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].kind, RawKind::Number(2.0));
        assert_eq!(tokens[1].kind, RawKind::Star);
    }

    #[test]
    fn scans_scientific_notation() {
        let tokens = scan("1e-3").expect("valid input");
        assert_eq!(tokens[0].kind, RawKind::Number(1e-3));
    }

    #[test]
    fn scans_qualified_parameter_name() {
        let tokens = scan("1:p").expect("valid input");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, RawKind::Word("1:p".to_string()));
    }

    #[test]
    fn slash_divides_adjacent_words_instead_of_joining_them() {
        let tokens = scan("e/2").expect("valid input");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, RawKind::Word("e".to_string()));
        assert_eq!(tokens[1].kind, RawKind::Slash);
        assert_eq!(tokens[2].kind, RawKind::Number(2.0));

        let tokens = scan("p1/p2").expect("valid input");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, RawKind::Word("p1".to_string()));
        assert_eq!(tokens[1].kind, RawKind::Slash);
        assert_eq!(tokens[2].kind, RawKind::Word("p2".to_string()));
    }

    #[test]
    fn rejects_invalid_character() {
        assert!(scan("x $ y").is_err());
    }

    #[test]
    fn coalesces_table_model() {
        let input = "atable{path/file.mod}(p1,p2)";
        let tokens = scan(input).expect("valid input");
        let coalesced = coalesce_table_models(input, tokens).expect("balanced braces");
        assert_eq!(coalesced[0].kind, RawKind::Word("atable{path/file.mod}".to_string()));
        assert_eq!(coalesced[1].kind, RawKind::LParen);
    }

    #[test]
    fn unbalanced_braces_error() {
        let input = "atable{path(p1)";
        let tokens = scan(input).expect("valid input");
        assert!(coalesce_table_models(input, tokens).is_err());
    }
}
