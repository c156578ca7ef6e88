//! Streaming decoder for WPILog binary data logs.
//!
//! This library reads WPILog files (binary datalog files from WPILib robotics)
//! record by record and decodes each payload according to the type its entry
//! was started with, including WPILib packed structs whose schemas are
//! published inside the log itself.
//!
//! # Features
//!
//! - Lazy, forward-only record iteration over any `std::io::Read` source
//! - Memory-mapped file I/O for `from_file()`
//! - Support for all WPILog data types (scalars, arrays, msgpack, structs)
//! - Struct schemas that arrive after their data are resolved automatically
//! - An async reader over `tokio::io::AsyncRead` (feature `tokio-runtime`)
//!
//! # Example
//!
//! ```no_run
//! use wpilog_decoder::{DataPayload, WpilogReader};
//!
//! let mut reader = WpilogReader::from_file("robot.wpilog")?;
//! for record in reader.by_ref() {
//!     let record = record?;
//!     if let Some(data) = record.as_data() {
//!         if let DataPayload::Double(value) = data.payload {
//!             println!("{} = {}", data.name, value);
//!         }
//!     }
//! }
//!
//! // Struct layouts seen in the log stay available after reading
//! if let Some(members) = reader.struct_definition("Pose2d") {
//!     println!("Pose2d has {} members", members.len());
//! }
//! # Ok::<(), wpilog_decoder::WpilogError>(())
//! ```
//!
//! # Data Types
//!
//! | WPILog Type | Payload |
//! |-------------|---------|
//! | `boolean` | `Boolean` |
//! | `int64` | `Int64` |
//! | `float` | `Float` |
//! | `double` | `Double` |
//! | `string`, `json` | `String` |
//! | `raw`, `protobuf`, `proto:*` | `Raw` |
//! | `msgpack` | `MsgPack` |
//! | `boolean[]` | `BooleanArray` |
//! | `int64[]` | `Int64Array` |
//! | `float[]` | `FloatArray` |
//! | `double[]` | `DoubleArray` |
//! | `string[]` | `StringArray` |
//! | `structschema` | `String` (and registers the schema) |
//! | `struct:Name` | `Struct` |
//! | `struct:Name[]` | `StructArray` |
//!
//! # Record Order
//!
//! Records come out in file order, with one exception: a struct record whose
//! schema (or a nested schema) has not been seen yet is held back, then
//! emitted immediately after the record that completes the schema.

#[cfg(feature = "tokio-runtime")]
pub mod async_reader;
pub mod cursor;
pub mod datalog;
pub mod error;
pub mod input;
pub mod payload;
pub mod reader;
pub mod struct_support;
pub mod types;

#[cfg(feature = "tokio-runtime")]
pub use async_reader::{AsyncInputStream, AsyncWpilogReader};
pub use datalog::{Version, WpilogHeader};
pub use error::{Result, WpilogError};
pub use reader::{ReaderState, WpilogReader, WpilogReaderBuilder};
pub use struct_support::{FieldValue, StructDeclaration, StructValue};
pub use types::{
    ControlPayload, DataPayload, DataRecord, EntryType, MetadataRecordData, StartRecordData,
    WpilogRecord,
};
