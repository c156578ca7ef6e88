//! Core types for WPILib struct support.

/// Scalar member types of the struct declaration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

/// Every built-in type name the declaration language accepts.
pub const KNOWN_TYPE_NAMES: [&str; 14] = [
    "bool", "char", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
    "float32", "float", "float64", "double",
];

impl ScalarType {
    /// Parses a built-in type name; `float` and `double` alias the sized names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(ScalarType::Bool),
            "char" => Some(ScalarType::Char),
            "int8" => Some(ScalarType::Int8),
            "int16" => Some(ScalarType::Int16),
            "int32" => Some(ScalarType::Int32),
            "int64" => Some(ScalarType::Int64),
            "uint8" => Some(ScalarType::UInt8),
            "uint16" => Some(ScalarType::UInt16),
            "uint32" => Some(ScalarType::UInt32),
            "uint64" => Some(ScalarType::UInt64),
            "float" | "float32" => Some(ScalarType::Float32),
            "double" | "float64" => Some(ScalarType::Float64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Char => "char",
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt8 => "uint8",
            ScalarType::UInt16 => "uint16",
            ScalarType::UInt32 => "uint32",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }

    /// Get the size in bytes of this type.
    pub fn size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Char | ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::Int16
                | ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::UInt8
                | ScalarType::UInt16
                | ScalarType::UInt32
                | ScalarType::UInt64
        )
    }

    /// Get the maximum bit-field width for this type, if it may carry one.
    pub fn max_bits(self) -> Option<u32> {
        match self {
            ScalarType::Bool => Some(1),
            t if t.is_integer() => Some(t.size() as u32 * 8),
            _ => None,
        }
    }
}

/// The type of a struct member: a built-in scalar or a reference to another struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    Struct(String),
}

impl ValueType {
    pub fn from_name(name: &str) -> Self {
        match ScalarType::from_name(name) {
            Some(scalar) => ValueType::Scalar(scalar),
            None => ValueType::Struct(name.to_string()),
        }
    }

    /// The name used as a dependency-graph key.
    pub fn name(&self) -> &str {
        match self {
            ValueType::Scalar(scalar) => scalar.name(),
            ValueType::Struct(name) => name,
        }
    }
}

/// Named values for integer members, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumSpec {
    pub values: Vec<(String, i64)>,
}

/// One member of a struct schema. Member order defines the byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDeclaration {
    pub name: String,
    pub value_type: ValueType,
    pub enum_spec: Option<EnumSpec>,
    pub array_size: Option<usize>,
    pub bit_width: Option<u32>,
}

/// Outcome of a decode or layout computation that may be waiting on a struct
/// schema that has not been registered yet.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStatus<T> {
    Decoded(T),
    /// Names the first struct whose schema is still unknown
    Blocked(String),
}

impl<T> DecodeStatus<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DecodeStatus<U> {
        match self {
            DecodeStatus::Decoded(value) => DecodeStatus::Decoded(f(value)),
            DecodeStatus::Blocked(name) => DecodeStatus::Blocked(name),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, DecodeStatus::Blocked(_))
    }

    pub fn decoded(self) -> Option<T> {
        match self {
            DecodeStatus::Decoded(value) => Some(value),
            DecodeStatus::Blocked(_) => None,
        }
    }
}

/// Unwraps a `Result<DecodeStatus<T>>`, returning early on errors and on `Blocked`.
macro_rules! try_decoded {
    ($e:expr) => {
        match $e? {
            $crate::struct_support::DecodeStatus::Decoded(value) => value,
            $crate::struct_support::DecodeStatus::Blocked(name) => {
                return Ok($crate::struct_support::DecodeStatus::Blocked(name))
            }
        }
    };
}
pub(crate) use try_decoded;
