//! Decoded record model and the mapping from WPILog type strings to payload kinds.

use crate::struct_support::StructValue;

/// Data contained in a start control record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRecordData {
    pub entry_id: u32,
    pub name: String,
    pub type_name: String,
    pub metadata: String,
}

/// Data contained in a set metadata control record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecordData {
    pub entry_id: u32,
    pub metadata: String,
}

/// Payload of an entry ID 0 record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPayload {
    Start(StartRecordData),
    Finish { entry_id: u32 },
    SetMetadata(MetadataRecordData),
}

/// A decoded data payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPayload {
    Raw(Vec<u8>),
    Boolean(bool),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    BooleanArray(Vec<bool>),
    Int64Array(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    MsgPack(rmpv::Value),
    Struct {
        struct_name: String,
        value: StructValue,
    },
    StructArray {
        struct_name: String,
        values: Vec<StructValue>,
    },
}

/// A record emitted by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum WpilogRecord {
    /// Entry lifecycle event; always carried on entry ID 0
    Control {
        timestamp: u64,
        payload: ControlPayload,
    },
    Data(DataRecord),
}

impl WpilogRecord {
    pub fn entry_id(&self) -> u32 {
        match self {
            WpilogRecord::Control { .. } => 0,
            WpilogRecord::Data(data) => data.entry_id,
        }
    }

    /// Microseconds since controller boot.
    pub fn timestamp(&self) -> u64 {
        match self {
            WpilogRecord::Control { timestamp, .. } => *timestamp,
            WpilogRecord::Data(data) => data.timestamp,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, WpilogRecord::Control { .. })
    }

    pub fn as_data(&self) -> Option<&DataRecord> {
        match self {
            WpilogRecord::Data(data) => Some(data),
            WpilogRecord::Control { .. } => None,
        }
    }
}

/// A record for a named entry, with its payload decoded by the entry's type.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub entry_id: u32,
    pub timestamp: u64,
    pub name: String,
    pub metadata: String,
    pub payload: DataPayload,
}

/// How an entry's payload bytes are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryType {
    Raw,
    Boolean,
    Int64,
    Float,
    Double,
    String,
    Json,
    MsgPack,
    BooleanArray,
    Int64Array,
    FloatArray,
    DoubleArray,
    StringArray,
    /// The entry carries struct declaration text
    StructSchema,
    Struct(String),
    StructArray(String),
}

impl EntryType {
    /// Maps a WPILog type string to an EntryType.
    ///
    /// Anything not recognised as a built-in type names a struct, with or without
    /// the `struct:` prefix; a trailing `[]` makes it a struct array.
    pub fn from_wpilog_type(type_name: &str) -> Self {
        match type_name {
            "raw" => EntryType::Raw,
            "boolean" => EntryType::Boolean,
            "int64" => EntryType::Int64,
            "float" => EntryType::Float,
            "double" => EntryType::Double,
            "string" => EntryType::String,
            "json" => EntryType::Json,
            "msgpack" => EntryType::MsgPack,
            "boolean[]" => EntryType::BooleanArray,
            "int64[]" => EntryType::Int64Array,
            "float[]" => EntryType::FloatArray,
            "double[]" => EntryType::DoubleArray,
            "string[]" => EntryType::StringArray,
            "structschema" => EntryType::StructSchema,
            // Protobuf payloads need their descriptor set to decode; pass them through
            "protobuf" => EntryType::Raw,
            _ if type_name.starts_with("proto:") => EntryType::Raw,
            _ => {
                let name = type_name.strip_prefix("struct:").unwrap_or(type_name);
                match name.strip_suffix("[]") {
                    Some(element) => EntryType::StructArray(element.to_string()),
                    None => EntryType::Struct(name.to_string()),
                }
            }
        }
    }

    /// Returns true if this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            EntryType::BooleanArray
                | EntryType::Int64Array
                | EntryType::FloatArray
                | EntryType::DoubleArray
                | EntryType::StringArray
                | EntryType::StructArray(_)
        )
    }

    /// Gets the struct name if this is a struct or struct array type.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            EntryType::Struct(name) | EntryType::StructArray(name) => Some(name.as_str()),
            _ => None,
        }
    }
}
