//! Binary deserializer for WPILib packed structs.

use super::registry::{bit_field_unsupported, StructRegistry};
use super::types::*;
use crate::cursor::ByteCursor;
use crate::error::{Result, WpilogError};

/// A deserialized struct value. Fields keep declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub struct_name: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl StructValue {
    /// Look up a field by member name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// A field value (primitive, array, or nested struct).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    /// `char` members; arrays of char decode to a single string
    String(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Array(Vec<FieldValue>),
    Struct(Box<StructValue>),
}

/// Deepest struct nesting [`StructRegistry::decode`] follows.
pub const MAX_DECODE_DEPTH: usize = 128;

impl StructRegistry {
    /// Decode one `struct_name` value starting at the cursor.
    ///
    /// Returns `Blocked` with the cursor left where it started if any struct
    /// in the layout is not registered yet. Fails without reading if fewer
    /// bytes remain than the struct's packed size.
    pub fn decode(
        &mut self,
        struct_name: &str,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<DecodeStatus<StructValue>> {
        let len = try_decoded!(self.byte_length(struct_name));
        if cursor.remaining() < len {
            return Err(WpilogError::InvalidFormat(format!(
                "Struct '{}' needs {} bytes but only {} remain",
                struct_name,
                len,
                cursor.remaining()
            )));
        }

        self.decode_nested(struct_name, cursor, 0)
    }

    /// Decode a payload holding a whole number of packed `struct_name` values.
    pub fn decode_array(
        &mut self,
        struct_name: &str,
        data: &[u8],
    ) -> Result<DecodeStatus<Vec<StructValue>>> {
        let struct_size = try_decoded!(self.byte_length(struct_name));

        if struct_size == 0 {
            if !data.is_empty() {
                return Err(WpilogError::ParseError(format!(
                    "Struct '{}' is zero-sized but array payload has {} bytes",
                    struct_name,
                    data.len()
                )));
            }
            return Ok(DecodeStatus::Decoded(Vec::new()));
        }

        if data.len() % struct_size != 0 {
            return Err(WpilogError::ParseError(format!(
                "Struct array payload for '{}' is {} bytes, not a multiple of {}",
                struct_name,
                data.len(),
                struct_size
            )));
        }

        let mut cursor = ByteCursor::new(data);
        let mut values = Vec::with_capacity(data.len() / struct_size);
        while !cursor.is_empty() {
            values.push(try_decoded!(self.decode_nested(struct_name, &mut cursor, 0)));
        }

        Ok(DecodeStatus::Decoded(values))
    }

    fn decode_nested(
        &self,
        struct_name: &str,
        cursor: &mut ByteCursor<'_>,
        depth: usize,
    ) -> Result<DecodeStatus<StructValue>> {
        if depth > MAX_DECODE_DEPTH {
            return Err(WpilogError::DeclarationRange(format!(
                "struct '{}' nests more than {} levels deep",
                struct_name, MAX_DECODE_DEPTH
            )));
        }

        let members = match self.definition(struct_name) {
            Some(members) => members,
            None => return Ok(DecodeStatus::Blocked(struct_name.to_string())),
        };

        let start = cursor.position();
        let mut fields = Vec::with_capacity(members.len());

        for member in members {
            if member.bit_width.is_some() {
                cursor.set_position(start);
                return Err(bit_field_unsupported(struct_name, member));
            }

            match self.decode_member(member, cursor, depth) {
                Ok(DecodeStatus::Decoded(value)) => fields.push((member.name.clone(), value)),
                Ok(DecodeStatus::Blocked(name)) => {
                    cursor.set_position(start);
                    return Ok(DecodeStatus::Blocked(name));
                }
                Err(e) => {
                    cursor.set_position(start);
                    return Err(e);
                }
            }
        }

        Ok(DecodeStatus::Decoded(StructValue {
            struct_name: struct_name.to_string(),
            fields,
        }))
    }

    fn decode_member(
        &self,
        member: &StructDeclaration,
        cursor: &mut ByteCursor<'_>,
        depth: usize,
    ) -> Result<DecodeStatus<FieldValue>> {
        // Every element reads at least one byte; arrays of zero-sized
        // structs are rejected when the layout is sized.
        if let Some(count) = member.array_size {
            if count > cursor.remaining() {
                return Err(WpilogError::InvalidFormat(format!(
                    "Array member '{}' declares {} elements but only {} bytes remain",
                    member.name,
                    count,
                    cursor.remaining()
                )));
            }
        }

        let value = match (&member.value_type, member.array_size) {
            (ValueType::Scalar(ScalarType::Char), count) => {
                let bytes = cursor.read_bytes(count.unwrap_or(1))?;
                FieldValue::String(String::from_utf8_lossy(bytes).into_owned())
            }
            (ValueType::Scalar(scalar), None) => read_scalar(*scalar, cursor)?,
            (ValueType::Scalar(scalar), Some(count)) => FieldValue::Array(
                (0..count)
                    .map(|_| read_scalar(*scalar, cursor))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (ValueType::Struct(nested), None) => FieldValue::Struct(Box::new(try_decoded!(
                self.decode_nested(nested, cursor, depth + 1)
            ))),
            (ValueType::Struct(nested), Some(count)) => {
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    let value = try_decoded!(self.decode_nested(nested, cursor, depth + 1));
                    values.push(FieldValue::Struct(Box::new(value)));
                }
                FieldValue::Array(values)
            }
        };

        Ok(DecodeStatus::Decoded(value))
    }
}

fn read_scalar(scalar: ScalarType, cursor: &mut ByteCursor<'_>) -> Result<FieldValue> {
    Ok(match scalar {
        ScalarType::Bool => FieldValue::Bool(cursor.read_u8()? != 0),
        ScalarType::Char => {
            FieldValue::String(String::from_utf8_lossy(cursor.read_bytes(1)?).into_owned())
        }
        ScalarType::Int8 => FieldValue::Int8(cursor.read_i8()?),
        ScalarType::Int16 => FieldValue::Int16(cursor.read_i16()?),
        ScalarType::Int32 => FieldValue::Int32(cursor.read_i32()?),
        ScalarType::Int64 => FieldValue::Int64(cursor.read_i64()?),
        ScalarType::UInt8 => FieldValue::UInt8(cursor.read_u8()?),
        ScalarType::UInt16 => FieldValue::UInt16(cursor.read_u16()?),
        ScalarType::UInt32 => FieldValue::UInt32(cursor.read_u32()?),
        ScalarType::UInt64 => FieldValue::UInt64(cursor.read_u64()?),
        ScalarType::Float32 => FieldValue::Float32(cursor.read_f32()?),
        ScalarType::Float64 => FieldValue::Float64(cursor.read_f64()?),
    })
}
