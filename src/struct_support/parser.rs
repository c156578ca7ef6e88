//! Parser for WPILib struct schema definitions.
//!
//! The grammar, informally:
//!
//! ```text
//! schema      := declaration (';' declaration?)*
//! declaration := enumSpec? typeName identifier (arraySpec | ':' integer)?
//! enumSpec    := 'enum'? '{' (member (',' member)* ','?)? '}'
//! member      := identifier '=' integer
//! arraySpec   := '[' integer ']'
//! ```

use super::lexer::{tokenize, Spanned, Token};
use super::types::*;
use crate::error::{Result, WpilogError};
use std::collections::HashMap;

/// Parser for struct schema definitions, caching results by input text.
///
/// Schema text is usually repeated verbatim across a log, so each distinct
/// text is only lexed and parsed once per parser instance. Failed parses are
/// not cached.
#[derive(Debug, Default, Clone)]
pub struct SchemaParser {
    cache: HashMap<String, Vec<StructDeclaration>>,
}

impl SchemaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema definition string, reusing a cached result when the
    /// exact text has been seen before.
    /// Example: "double x; double y; double theta"
    pub fn parse(&mut self, schema_text: &str) -> Result<Vec<StructDeclaration>> {
        if let Some(existing) = self.cache.get(schema_text) {
            return Ok(existing.clone());
        }

        let declarations = Self::parse_uncached(schema_text)?;
        self.cache
            .insert(schema_text.to_string(), declarations.clone());
        Ok(declarations)
    }

    /// Number of distinct texts parsed so far.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Parse a schema definition string without touching any cache.
    pub fn parse_uncached(schema_text: &str) -> Result<Vec<StructDeclaration>> {
        let tokens = tokenize(schema_text)?;
        DeclarationParser {
            tokens: &tokens,
            pos: 0,
        }
        .schema()
    }
}

struct DeclarationParser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
}

impl DeclarationParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn syntax_error(&self, expected: &str) -> WpilogError {
        match self.tokens.get(self.pos) {
            Some(spanned) => WpilogError::DeclarationSyntax(format!(
                "expected {} at offset {}, found {:?}",
                expected, spanned.offset, spanned.token
            )),
            None => WpilogError::DeclarationSyntax(format!(
                "expected {}, found end of input",
                expected
            )),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax_error(expected))
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.syntax_error(expected)),
        }
    }

    fn integer(&mut self, expected: &str) -> Result<u64> {
        match self.peek() {
            Some(Token::Integer(value)) => {
                let value = *value;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.syntax_error(expected)),
        }
    }

    fn schema(&mut self) -> Result<Vec<StructDeclaration>> {
        let mut declarations = Vec::new();

        loop {
            while self.peek() == Some(&Token::Semicolon) {
                self.advance();
            }
            if self.peek().is_none() {
                break;
            }

            declarations.push(self.declaration()?);

            match self.peek() {
                None | Some(Token::Semicolon) => {}
                Some(_) => return Err(self.syntax_error("';'")),
            }
        }

        Ok(declarations)
    }

    fn declaration(&mut self) -> Result<StructDeclaration> {
        let enum_spec = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Identifier(kw)), Some(Token::LeftBrace)) if kw == "enum" => {
                self.advance();
                Some(self.enum_spec()?)
            }
            (Some(Token::LeftBrace), _) => Some(self.enum_spec()?),
            _ => None,
        };

        let type_name = self.identifier("type name")?;
        let name = self.identifier("member name")?;
        let value_type = ValueType::from_name(&type_name);

        let mut array_size = None;
        let mut bit_width = None;

        match self.peek() {
            Some(Token::LeftBracket) => {
                self.advance();
                let size = self.integer("array size")?;
                self.expect(Token::RightBracket, "']'")?;
                array_size = Some(usize::try_from(size).map_err(|_| {
                    WpilogError::DeclarationRange(format!("array size {} is too large", size))
                })?);

                if self.peek() == Some(&Token::Colon) {
                    return Err(WpilogError::DeclarationRange(format!(
                        "array member '{}' cannot also be a bit-field",
                        name
                    )));
                }
            }
            Some(Token::Colon) => {
                self.advance();
                let width = self.integer("bit width")?;
                bit_width = Some(validate_bit_width(&value_type, width)?);
            }
            _ => {}
        }

        if enum_spec.is_some() {
            match value_type {
                ValueType::Scalar(scalar) if scalar.is_integer() => {}
                _ => {
                    return Err(WpilogError::DeclarationRange(format!(
                        "enums must be integers, but '{}' is declared as {}",
                        name, type_name
                    )))
                }
            }
        }

        Ok(StructDeclaration {
            name,
            value_type,
            enum_spec,
            array_size,
            bit_width,
        })
    }

    fn enum_spec(&mut self) -> Result<EnumSpec> {
        self.expect(Token::LeftBrace, "'{'")?;
        let mut values = Vec::new();

        while self.peek() != Some(&Token::RightBrace) {
            let name = self.identifier("enum member name")?;
            self.expect(Token::Equals, "'='")?;
            let raw = self.integer("enum value")?;
            let value = i64::try_from(raw).map_err(|_| {
                WpilogError::DeclarationRange(format!(
                    "enum value {} for '{}' is out of range",
                    raw, name
                ))
            })?;
            values.push((name, value));

            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RightBrace) => {}
                _ => return Err(self.syntax_error("',' or '}'")),
            }
        }

        self.expect(Token::RightBrace, "'}'")?;
        Ok(EnumSpec { values })
    }
}

fn validate_bit_width(value_type: &ValueType, width: u64) -> Result<u32> {
    let scalar = match value_type {
        ValueType::Scalar(scalar) => *scalar,
        ValueType::Struct(name) => {
            return Err(WpilogError::DeclarationRange(format!(
                "bit-field members must be integers or booleans, found {}",
                name
            )))
        }
    };

    let max = scalar.max_bits().ok_or_else(|| {
        WpilogError::DeclarationRange(format!(
            "bit-field members must be integers or booleans, found {}",
            scalar.name()
        ))
    })?;

    if scalar == ScalarType::Bool && width != 1 {
        return Err(WpilogError::DeclarationRange(
            "boolean bit-field members must be 1 bit".to_string(),
        ));
    }
    if width == 0 || width > max as u64 {
        return Err(WpilogError::DeclarationRange(format!(
            "bit width {} is invalid for {} (1 to {} bits)",
            width,
            scalar.name(),
            max
        )));
    }

    Ok(width as u32)
}
