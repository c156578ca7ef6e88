//! Entry registry and payload decoding.
//!
//! Control records keep the entry table current; data records are decoded
//! according to the type their entry was started with. Struct records whose
//! schema is not complete yet are queued in the [`StructRegistry`] and come
//! back out of [`PayloadParser::take_unblocked`] once it is.

use crate::cursor::ByteCursor;
use crate::datalog::RawRecord;
use crate::error::{Result, WpilogError};
use crate::struct_support::{DecodeStatus, PendingStructRecord, StructRegistry};
use crate::types::{
    ControlPayload, DataPayload, DataRecord, EntryType, MetadataRecordData, StartRecordData,
    WpilogRecord,
};
use std::collections::HashMap;

/// Prefix WPILib puts on the names of schema-publishing entries.
const SCHEMA_ENTRY_PREFIX: &str = "/.schema/";

/// Registration of a started entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub type_name: String,
    pub entry_type: EntryType,
    pub metadata: String,
}

/// Decodes data payloads for the entries started so far.
#[derive(Debug, Default)]
pub struct PayloadParser {
    entries: HashMap<u32, EntryInfo>,
    structs: StructRegistry,
    unblocked: Vec<PendingStructRecord>,
    next_sequence: u64,
}

impl PayloadParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a control record to the entry table.
    pub fn apply_control(&mut self, control: &ControlPayload) -> Result<()> {
        match control {
            ControlPayload::Start(start) => self.register_entry(start),
            ControlPayload::Finish { entry_id } => {
                self.unregister_entry(*entry_id);
                Ok(())
            }
            ControlPayload::SetMetadata(data) => {
                self.set_metadata(data);
                Ok(())
            }
        }
    }

    /// Registers an entry from its Start record. A second Start for the same
    /// ID replaces the first.
    pub fn register_entry(&mut self, start: &StartRecordData) -> Result<()> {
        if start.entry_id == 0 {
            return Err(WpilogError::InvalidFormat(format!(
                "Start record for '{}' uses reserved entry ID 0",
                start.name
            )));
        }

        let info = EntryInfo {
            name: start.name.clone(),
            type_name: start.type_name.clone(),
            entry_type: EntryType::from_wpilog_type(&start.type_name),
            metadata: start.metadata.clone(),
        };

        log::debug!(
            "Start entry {}: {} ({})",
            start.entry_id,
            info.name,
            info.type_name
        );

        if let Some(previous) = self.entries.insert(start.entry_id, info) {
            log::warn!(
                "Entry {} started again; replacing '{}'",
                start.entry_id,
                previous.name
            );
        }
        Ok(())
    }

    pub fn unregister_entry(&mut self, entry_id: u32) {
        match self.entries.remove(&entry_id) {
            Some(info) => log::debug!("Finish entry {}: {}", entry_id, info.name),
            None => log::warn!("Finish record for unknown entry {}", entry_id),
        }
    }

    /// Replaces an entry's metadata for every record that follows.
    pub fn set_metadata(&mut self, data: &MetadataRecordData) {
        match self.entries.get_mut(&data.entry_id) {
            Some(info) => info.metadata = data.metadata.clone(),
            None => log::warn!("Set metadata record for unknown entry {}", data.entry_id),
        }
    }

    pub fn entry(&self, entry_id: u32) -> Option<&EntryInfo> {
        self.entries.get(&entry_id)
    }

    pub fn structs(&self) -> &StructRegistry {
        &self.structs
    }

    /// Decodes a data record.
    ///
    /// `Blocked` means the record was queued behind the named struct and will
    /// be returned by a later [`PayloadParser::take_unblocked`].
    pub fn parse(&mut self, record: RawRecord) -> Result<DecodeStatus<WpilogRecord>> {
        let entry = self
            .entries
            .get(&record.entry_id)
            .ok_or(WpilogError::UnregisteredEntry(record.entry_id))?;

        let payload = match &entry.entry_type {
            EntryType::StructSchema => {
                let text = String::from_utf8_lossy(&record.payload).into_owned();
                let unblocked = &mut self.unblocked;
                self.structs
                    .register(schema_struct_name(&entry.name), &text, |_, records| {
                        unblocked.extend(records)
                    })?;
                DataPayload::String(text)
            }
            EntryType::Struct(struct_name) | EntryType::StructArray(struct_name) => {
                let is_array = entry.entry_type.is_array();
                match decode_struct(&mut self.structs, struct_name, is_array, &record.payload)? {
                    DecodeStatus::Decoded(payload) => payload,
                    DecodeStatus::Blocked(missing) => {
                        let pending = PendingStructRecord {
                            sequence: self.next_sequence,
                            entry_id: record.entry_id,
                            timestamp: record.timestamp,
                            name: entry.name.clone(),
                            metadata: entry.metadata.clone(),
                            struct_name: struct_name.clone(),
                            is_array,
                            payload: record.payload,
                        };
                        self.next_sequence += 1;
                        self.structs.queue_record(struct_name, pending);
                        return Ok(DecodeStatus::Blocked(missing));
                    }
                }
            }
            other => decode_value(other, &entry.type_name, &record.payload)?,
        };

        Ok(DecodeStatus::Decoded(WpilogRecord::Data(DataRecord {
            entry_id: record.entry_id,
            timestamp: record.timestamp,
            name: entry.name.clone(),
            metadata: entry.metadata.clone(),
            payload,
        })))
    }

    /// Decodes every queued record released since the last call, in the
    /// order the records arrived.
    pub fn take_unblocked(&mut self) -> Result<Vec<WpilogRecord>> {
        if self.unblocked.is_empty() {
            return Ok(Vec::new());
        }

        let mut released = std::mem::take(&mut self.unblocked);
        released.sort_by_key(|pending| pending.sequence);

        let mut records = Vec::with_capacity(released.len());
        for pending in released {
            match decode_struct(
                &mut self.structs,
                &pending.struct_name,
                pending.is_array,
                &pending.payload,
            )? {
                DecodeStatus::Decoded(payload) => {
                    records.push(WpilogRecord::Data(DataRecord {
                        entry_id: pending.entry_id,
                        timestamp: pending.timestamp,
                        name: pending.name,
                        metadata: pending.metadata,
                        payload,
                    }))
                }
                DecodeStatus::Blocked(missing) => {
                    log::debug!(
                        "Struct {} still waiting on {}; re-queueing",
                        pending.struct_name,
                        missing
                    );
                    let struct_name = pending.struct_name.clone();
                    self.structs.queue_record(&struct_name, pending);
                }
            }
        }

        Ok(records)
    }

    /// Struct names that still hold queued records, with their counts.
    pub fn pending_struct_names(&self) -> impl Iterator<Item = (&str, usize)> {
        self.structs.pending()
    }
}

/// `/.schema/struct:Pose2d` names the struct `Pose2d`.
fn schema_struct_name(entry_name: &str) -> &str {
    let name = entry_name
        .strip_prefix(SCHEMA_ENTRY_PREFIX)
        .unwrap_or(entry_name);
    name.strip_prefix("struct:").unwrap_or(name)
}

fn decode_struct(
    structs: &mut StructRegistry,
    struct_name: &str,
    is_array: bool,
    payload: &[u8],
) -> Result<DecodeStatus<DataPayload>> {
    if is_array {
        return Ok(structs
            .decode_array(struct_name, payload)?
            .map(|values| DataPayload::StructArray {
                struct_name: struct_name.to_string(),
                values,
            }));
    }

    let mut cursor = ByteCursor::new(payload);
    let status = structs.decode(struct_name, &mut cursor)?;
    if !status.is_blocked() && !cursor.is_empty() {
        return Err(WpilogError::ParseError(format!(
            "Struct payload for '{}' has {} trailing bytes",
            struct_name,
            cursor.remaining()
        )));
    }

    Ok(status.map(|value| DataPayload::Struct {
        struct_name: struct_name.to_string(),
        value,
    }))
}

/// Decodes a payload of one of the built-in (non-struct) entry types.
fn decode_value(entry_type: &EntryType, type_name: &str, payload: &[u8]) -> Result<DataPayload> {
    let mut cursor = ByteCursor::new(payload);

    let value = match entry_type {
        EntryType::Raw => DataPayload::Raw(payload.to_vec()),
        EntryType::Boolean => {
            expect_len(type_name, payload, 1)?;
            DataPayload::Boolean(read_bool(&mut cursor)?)
        }
        EntryType::Int64 => {
            expect_len(type_name, payload, 8)?;
            DataPayload::Int64(cursor.read_i64()?)
        }
        EntryType::Float => {
            expect_len(type_name, payload, 4)?;
            DataPayload::Float(cursor.read_f32()?)
        }
        EntryType::Double => {
            expect_len(type_name, payload, 8)?;
            DataPayload::Double(cursor.read_f64()?)
        }
        // Strings may carry binary data; fall back to lossy conversion
        EntryType::String | EntryType::Json => {
            DataPayload::String(String::from_utf8_lossy(payload).into_owned())
        }
        EntryType::MsgPack => DataPayload::MsgPack(rmpv::decode::read_value(&mut &payload[..])?),
        EntryType::BooleanArray => DataPayload::BooleanArray(
            (0..payload.len())
                .map(|_| read_bool(&mut cursor))
                .collect::<Result<_>>()?,
        ),
        EntryType::Int64Array => {
            let count = expect_multiple(type_name, payload, 8)?;
            DataPayload::Int64Array(
                (0..count)
                    .map(|_| cursor.read_i64())
                    .collect::<Result<_>>()?,
            )
        }
        EntryType::FloatArray => {
            let count = expect_multiple(type_name, payload, 4)?;
            DataPayload::FloatArray(
                (0..count)
                    .map(|_| cursor.read_f32())
                    .collect::<Result<_>>()?,
            )
        }
        EntryType::DoubleArray => {
            let count = expect_multiple(type_name, payload, 8)?;
            DataPayload::DoubleArray(
                (0..count)
                    .map(|_| cursor.read_f64())
                    .collect::<Result<_>>()?,
            )
        }
        EntryType::StringArray => {
            let count = cursor.read_u32()? as usize;
            // Each element needs at least its 4-byte length prefix
            if count > cursor.remaining() / 4 {
                return Err(WpilogError::ParseError(format!(
                    "Invalid string array size: {} elements in {} bytes",
                    count,
                    payload.len()
                )));
            }
            DataPayload::StringArray(
                (0..count)
                    .map(|_| cursor.read_string())
                    .collect::<Result<_>>()?,
            )
        }
        EntryType::StructSchema | EntryType::Struct(_) | EntryType::StructArray(_) => {
            return Err(WpilogError::ParseError(format!(
                "'{}' is not a plain value type",
                type_name
            )))
        }
    };

    Ok(value)
}

fn read_bool(cursor: &mut ByteCursor<'_>) -> Result<bool> {
    match cursor.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WpilogError::InvalidFormat(format!(
            "invalid boolean byte 0x{:02x}",
            other
        ))),
    }
}

fn expect_len(type_name: &str, payload: &[u8], len: usize) -> Result<()> {
    if payload.len() != len {
        return Err(WpilogError::ParseError(format!(
            "Invalid {} size: expected {} bytes, got {}",
            type_name,
            len,
            payload.len()
        )));
    }
    Ok(())
}

fn expect_multiple(type_name: &str, payload: &[u8], element: usize) -> Result<usize> {
    if payload.len() % element != 0 {
        return Err(WpilogError::ParseError(format!(
            "Invalid {} size: {} is not a multiple of {}",
            type_name,
            payload.len(),
            element
        )));
    }
    Ok(payload.len() / element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::struct_support::FieldValue;

    fn start(entry_id: u32, name: &str, type_name: &str) -> StartRecordData {
        StartRecordData {
            entry_id,
            name: name.to_string(),
            type_name: type_name.to_string(),
            metadata: String::new(),
        }
    }

    fn raw(entry_id: u32, timestamp: u64, payload: &[u8]) -> RawRecord {
        RawRecord {
            entry_id,
            timestamp,
            payload: payload.to_vec(),
        }
    }

    fn parse_payload(parser: &mut PayloadParser, entry_id: u32, payload: &[u8]) -> DataPayload {
        match parser.parse(raw(entry_id, 0, payload)).unwrap() {
            DecodeStatus::Decoded(WpilogRecord::Data(data)) => data.payload,
            other => panic!("Expected decoded data record, got {:?}", other),
        }
    }

    fn parser_with(entries: &[(u32, &str, &str)]) -> PayloadParser {
        let mut parser = PayloadParser::new();
        for (id, name, type_name) in entries {
            parser.register_entry(&start(*id, name, type_name)).unwrap();
        }
        parser
    }

    #[test]
    fn test_scalars() {
        let mut parser = parser_with(&[
            (1, "/b", "boolean"),
            (2, "/i", "int64"),
            (3, "/f", "float"),
            (4, "/d", "double"),
            (5, "/s", "string"),
            (6, "/j", "json"),
            (7, "/r", "raw"),
        ]);

        assert_eq!(parse_payload(&mut parser, 1, &[1]), DataPayload::Boolean(true));
        assert_eq!(
            parse_payload(&mut parser, 2, &(-42i64).to_le_bytes()),
            DataPayload::Int64(-42)
        );
        assert_eq!(
            parse_payload(&mut parser, 3, &1.5f32.to_le_bytes()),
            DataPayload::Float(1.5)
        );
        assert_eq!(
            parse_payload(&mut parser, 4, &3.25f64.to_le_bytes()),
            DataPayload::Double(3.25)
        );
        assert_eq!(
            parse_payload(&mut parser, 5, b"hello"),
            DataPayload::String("hello".to_string())
        );
        assert_eq!(
            parse_payload(&mut parser, 6, b"{\"a\":1}"),
            DataPayload::String("{\"a\":1}".to_string())
        );
        assert_eq!(
            parse_payload(&mut parser, 7, &[0xde, 0xad]),
            DataPayload::Raw(vec![0xde, 0xad])
        );
    }

    #[test]
    fn test_arrays() {
        let mut parser = parser_with(&[
            (1, "/b", "boolean[]"),
            (2, "/i", "int64[]"),
            (3, "/d", "double[]"),
            (4, "/s", "string[]"),
        ]);

        assert_eq!(
            parse_payload(&mut parser, 1, &[1, 0, 1]),
            DataPayload::BooleanArray(vec![true, false, true])
        );

        let mut ints = Vec::new();
        ints.extend_from_slice(&1i64.to_le_bytes());
        ints.extend_from_slice(&(-2i64).to_le_bytes());
        assert_eq!(
            parse_payload(&mut parser, 2, &ints),
            DataPayload::Int64Array(vec![1, -2])
        );

        assert_eq!(
            parse_payload(&mut parser, 3, &[]),
            DataPayload::DoubleArray(vec![])
        );

        let mut strings = Vec::new();
        strings.extend_from_slice(&2u32.to_le_bytes());
        strings.extend_from_slice(&2u32.to_le_bytes());
        strings.extend_from_slice(b"ab");
        strings.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            parse_payload(&mut parser, 4, &strings),
            DataPayload::StringArray(vec!["ab".to_string(), String::new()])
        );
    }

    #[test]
    fn test_msgpack() {
        let mut parser = parser_with(&[(1, "/m", "msgpack")]);
        // fixmap {"a": 1}
        let payload = [0x81, 0xa1, b'a', 0x01];
        match parse_payload(&mut parser, 1, &payload) {
            DataPayload::MsgPack(value) => {
                let map = value.as_map().unwrap();
                assert_eq!(map[0].0.as_str(), Some("a"));
                assert_eq!(map[0].1.as_i64(), Some(1));
            }
            other => panic!("Expected MsgPack, got {:?}", other),
        }
    }

    #[test]
    fn test_size_mismatch() {
        let mut parser = parser_with(&[(1, "/d", "double"), (2, "/i", "int64[]")]);
        assert!(matches!(
            parser.parse(raw(1, 0, &[0; 4])),
            Err(WpilogError::ParseError(_))
        ));
        assert!(matches!(
            parser.parse(raw(2, 0, &[0; 12])),
            Err(WpilogError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_boolean_byte() {
        let mut parser = parser_with(&[(1, "/b", "boolean"), (2, "/ba", "boolean[]")]);
        assert!(matches!(
            parser.parse(raw(1, 0, &[2])),
            Err(WpilogError::InvalidFormat(_))
        ));
        assert!(matches!(
            parser.parse(raw(2, 0, &[0, 7])),
            Err(WpilogError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unregistered_entry() {
        let mut parser = parser_with(&[(1, "/a", "double")]);
        assert!(matches!(
            parser.parse(raw(9, 0, &[0; 8])),
            Err(WpilogError::UnregisteredEntry(9))
        ));

        parser.apply_control(&ControlPayload::Finish { entry_id: 1 }).unwrap();
        assert!(matches!(
            parser.parse(raw(1, 0, &[0; 8])),
            Err(WpilogError::UnregisteredEntry(1))
        ));
    }

    #[test]
    fn test_start_on_entry_zero_rejected() {
        let mut parser = PayloadParser::new();
        assert!(matches!(
            parser.register_entry(&start(0, "/bad", "double")),
            Err(WpilogError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_set_metadata_applies_forward() {
        let mut parser = parser_with(&[(1, "/a", "int64")]);
        parser
            .apply_control(&ControlPayload::SetMetadata(MetadataRecordData {
                entry_id: 1,
                metadata: "{\"source\":\"NT\"}".to_string(),
            }))
            .unwrap();

        match parser.parse(raw(1, 5, &7i64.to_le_bytes())).unwrap() {
            DecodeStatus::Decoded(WpilogRecord::Data(data)) => {
                assert_eq!(data.metadata, "{\"source\":\"NT\"}");
                assert_eq!(data.timestamp, 5);
                assert_eq!(data.name, "/a");
            }
            other => panic!("Expected data record, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(schema_struct_name("/.schema/struct:Pose2d"), "Pose2d");
        assert_eq!(schema_struct_name("struct:Pose2d"), "Pose2d");
        assert_eq!(schema_struct_name("Pose2d"), "Pose2d");
    }

    #[test]
    fn test_struct_record_waits_for_schema() {
        let mut parser = parser_with(&[
            (1, "/pose", "struct:Translation2d"),
            (2, "/.schema/struct:Translation2d", "structschema"),
        ]);

        let mut payload = Vec::new();
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        payload.extend_from_slice(&2.0f64.to_le_bytes());

        assert_eq!(
            parser.parse(raw(1, 10, &payload)).unwrap(),
            DecodeStatus::Blocked("Translation2d".to_string())
        );
        assert!(parser.take_unblocked().unwrap().is_empty());
        assert_eq!(
            parser.pending_struct_names().collect::<Vec<_>>(),
            vec![("Translation2d", 1)]
        );

        let schema = parser
            .parse(raw(2, 20, b"double x; double y"))
            .unwrap()
            .decoded()
            .unwrap();
        assert_eq!(
            schema.as_data().map(|d| &d.payload),
            Some(&DataPayload::String("double x; double y".to_string()))
        );

        let released = parser.take_unblocked().unwrap();
        assert_eq!(released.len(), 1);
        let data = released[0].as_data().unwrap();
        assert_eq!(data.timestamp, 10);
        match &data.payload {
            DataPayload::Struct { struct_name, value } => {
                assert_eq!(struct_name, "Translation2d");
                assert_eq!(value.get("y"), Some(&FieldValue::Float64(2.0)));
            }
            other => panic!("Expected Struct, got {:?}", other),
        }
        assert_eq!(parser.pending_struct_names().count(), 0);
    }

    #[test]
    fn test_released_records_keep_arrival_order() {
        let mut parser = parser_with(&[
            (1, "/a", "struct:A"),
            (2, "/b", "struct:B[]"),
            (3, "/.schema/struct:A", "structschema"),
            (4, "/.schema/struct:B", "structschema"),
            (5, "/.schema/struct:C", "structschema"),
        ]);

        parser.parse(raw(1, 1, &[1])).unwrap();
        parser.parse(raw(2, 2, &[2, 3])).unwrap();
        parser.parse(raw(1, 3, &[4])).unwrap();

        parser.parse(raw(3, 4, b"C c")).unwrap();
        parser.parse(raw(4, 5, b"C c")).unwrap();
        assert!(parser.take_unblocked().unwrap().is_empty());

        parser.parse(raw(5, 6, b"uint8 v")).unwrap();
        let timestamps: Vec<u64> = parser
            .take_unblocked()
            .unwrap()
            .iter()
            .map(WpilogRecord::timestamp)
            .collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
    }

    #[test]
    fn test_struct_array_entry() {
        let mut parser = parser_with(&[
            (1, "/.schema/struct:Point", "structschema"),
            (2, "/points", "struct:Point[]"),
        ]);
        parser.parse(raw(1, 0, b"int8 x; int8 y")).unwrap();

        match parse_payload(&mut parser, 2, &[1, 2, 3, 4]) {
            DataPayload::StructArray { values, .. } => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[1].get("x"), Some(&FieldValue::Int8(3)));
            }
            other => panic!("Expected StructArray, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_trailing_bytes_rejected() {
        let mut parser = parser_with(&[
            (1, "/.schema/struct:Flag", "structschema"),
            (2, "/flag", "struct:Flag"),
        ]);
        parser.parse(raw(1, 0, b"bool value")).unwrap();

        assert!(matches!(
            parser.parse(raw(2, 0, &[1, 0])),
            Err(WpilogError::ParseError(_))
        ));
    }

    #[test]
    fn test_finished_entry_still_flushes() {
        let mut parser = parser_with(&[
            (1, "/flag", "struct:Flag"),
            (2, "/.schema/struct:Flag", "structschema"),
        ]);
        parser.parse(raw(1, 0, &[1])).unwrap();
        parser.unregister_entry(1);
        parser.parse(raw(2, 1, b"bool value")).unwrap();

        let released = parser.take_unblocked().unwrap();
        assert_eq!(released[0].as_data().unwrap().name, "/flag");
    }
}
