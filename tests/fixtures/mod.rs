//! Test fixtures for integration tests
//!
//! Builds WPILog byte streams record by record, and locates optional
//! real-world logs placed under `testlog/`.

#![allow(dead_code)]

use std::path::PathBuf;
use wpilog_decoder::datalog::RecordHeader;
use wpilog_decoder::{ControlPayload, MetadataRecordData, StartRecordData};

/// Assembles a WPILog file in memory.
pub struct LogBuilder {
    data: Vec<u8>,
}

impl LogBuilder {
    /// Starts a version 1.0 log with the given extra header.
    pub fn new(extra_header: &str) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(b"WPILOG");
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(&(extra_header.len() as u32).to_le_bytes());
        data.extend_from_slice(extra_header.as_bytes());
        Self { data }
    }

    /// Appends a record using the narrowest field widths.
    pub fn record(mut self, entry_id: u32, timestamp: u64, payload: &[u8]) -> Self {
        let header = RecordHeader::minimal(entry_id, payload.len() as u32, timestamp);
        self.record_with(header, entry_id, timestamp, payload);
        self
    }

    /// Appends a record with explicit field widths.
    pub fn record_with(
        &mut self,
        header: RecordHeader,
        entry_id: u32,
        timestamp: u64,
        payload: &[u8],
    ) {
        header
            .encode(entry_id, payload.len() as u32, timestamp, &mut self.data)
            .unwrap();
        self.data.extend_from_slice(payload);
    }

    pub fn start(self, entry_id: u32, timestamp: u64, name: &str, type_name: &str) -> Self {
        let payload = ControlPayload::Start(StartRecordData {
            entry_id,
            name: name.to_string(),
            type_name: type_name.to_string(),
            metadata: String::new(),
        })
        .encode();
        self.record(0, timestamp, &payload)
    }

    pub fn finish(self, entry_id: u32, timestamp: u64) -> Self {
        let payload = ControlPayload::Finish { entry_id }.encode();
        self.record(0, timestamp, &payload)
    }

    pub fn set_metadata(self, entry_id: u32, timestamp: u64, metadata: &str) -> Self {
        let payload = ControlPayload::SetMetadata(MetadataRecordData {
            entry_id,
            metadata: metadata.to_string(),
        })
        .encode();
        self.record(0, timestamp, &payload)
    }

    /// Publishes a struct schema the way WPILib does: a `structschema` entry
    /// named `/.schema/struct:<name>` carrying the declaration text.
    pub fn struct_schema(self, entry_id: u32, timestamp: u64, name: &str, text: &str) -> Self {
        self.start(
            entry_id,
            timestamp,
            &format!("/.schema/struct:{}", name),
            "structschema",
        )
        .record(entry_id, timestamp, text.as_bytes())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// A real-world log that is not checked in; tests using it skip when absent.
#[derive(Debug)]
pub struct TestFileMetadata {
    pub filename: &'static str,
    pub description: &'static str,
    pub min_records: usize,
}

impl TestFileMetadata {
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from("testlog").join(self.filename)
    }

    /// Skip test with message if file doesn't exist
    pub fn skip_if_missing(&self) -> bool {
        if !self.exists() {
            println!("Skipping test - file not found: testlog/{}", self.filename);
            return true;
        }
        false
    }
}

/// Known test files
pub mod test_files {
    use super::TestFileMetadata;

    /// Large real-world robotics log with struct arrays
    pub const AKIT_LOG: TestFileMetadata = TestFileMetadata {
        filename: "akit_25-03-21_17-17-36_txfor_q43.wpilog",
        description:
            "Real robotics log from FRC team with struct arrays, nested structs, and sparse data",
        min_records: 17000,
    };
}
