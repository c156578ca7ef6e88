//! Tokenizer for struct declaration text.

use crate::error::{Result, WpilogError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Semicolon,
    Colon,
    Comma,
    Equals,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Integer(u64),
    /// Words: the `enum` keyword, type names and member names
    Identifier(String),
}

/// A token plus the byte offset it started at, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Splits declaration text into a flat token list. Whitespace separates tokens
/// and is otherwise ignored.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            ';' => Token::Semicolon,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '=' => Token::Equals,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '{' => Token::LeftBrace,
            '}' => Token::RightBrace,
            c if c.is_ascii_digit() => {
                let mut end = offset;
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let digits = &text[offset..end];
                let value = digits.parse::<u64>().map_err(|_| {
                    WpilogError::DeclarationSyntax(format!(
                        "integer '{}' at offset {} is out of range",
                        digits, offset
                    ))
                })?;
                tokens.push(Spanned {
                    token: Token::Integer(value),
                    offset,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = offset;
                while let Some(&(i, w)) = chars.peek() {
                    if !(w.is_alphanumeric() || w == '_') {
                        break;
                    }
                    end = i + w.len_utf8();
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Identifier(text[offset..end].to_string()),
                    offset,
                });
                continue;
            }
            other => {
                return Err(WpilogError::DeclarationSyntax(format!(
                    "unexpected character '{}' at offset {}",
                    other, offset
                )))
            }
        };

        chars.next();
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}
