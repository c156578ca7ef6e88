//! Streaming WPILOG reader.
//!
//! The reader pulls bytes through an [`InputStream`], frames records, routes
//! control records to the entry table and decodes data records. Struct records
//! that arrive before their schema are held back and emitted right after the
//! record that completes the schema.

use crate::datalog::{parse_header_prefix, RawRecord, RecordHeader, WpilogHeader, HEADER_PREFIX_LEN};
use crate::error::{Result, WpilogError};
use crate::input::{InputStream, DEFAULT_CHUNK_SIZE};
use crate::payload::PayloadParser;
use crate::struct_support::{DecodeStatus, StructDeclaration};
use crate::types::{ControlPayload, WpilogRecord};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

const DEFAULT_SOURCE_NAME: &str = "input";

/// Where a reader is in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingHeader,
    Streaming,
    Finished,
}

/// Turns framed records into decoded ones, buffering any that become ready
/// together.
#[derive(Debug, Default)]
pub(crate) struct RecordDispatcher {
    parser: PayloadParser,
    ready: VecDeque<WpilogRecord>,
}

impl RecordDispatcher {
    pub(crate) fn dispatch(&mut self, raw: RawRecord) -> Result<()> {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "record entry={} ts={} len={} payload={}",
                raw.entry_id,
                raw.timestamp,
                raw.payload.len(),
                hex::encode(&raw.payload)
            );
        }

        if raw.is_control() {
            let control = ControlPayload::decode(&raw.payload)?;
            self.parser.apply_control(&control)?;
            self.ready.push_back(WpilogRecord::Control {
                timestamp: raw.timestamp,
                payload: control,
            });
            return Ok(());
        }

        if let DecodeStatus::Decoded(record) = self.parser.parse(raw)? {
            self.ready.push_back(record);
        }
        self.ready.extend(self.parser.take_unblocked()?);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<WpilogRecord> {
        self.ready.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.ready.clear();
    }

    /// Reports struct records that never became decodable.
    pub(crate) fn finish(&self, source_name: &str) {
        for (struct_name, count) in self.parser.pending_struct_names() {
            log::warn!(
                "{}: {} record(s) never decoded; struct {} is incomplete",
                source_name,
                count,
                struct_name
            );
        }
    }

    pub(crate) fn parser(&self) -> &PayloadParser {
        &self.parser
    }
}

pub(crate) fn not_a_wpilog(source_name: &str) -> WpilogError {
    WpilogError::InvalidFormat(format!("{} is not a WPILOG file", source_name))
}

/// Reads decoded records from a WPILOG byte source.
///
/// # Example
///
/// ```no_run
/// use wpilog_decoder::WpilogReader;
///
/// let mut reader = WpilogReader::from_file("robot.wpilog")?;
/// println!("version {:?}", reader.header()?.version);
///
/// for record in reader {
///     let record = record?;
///     if let Some(data) = record.as_data() {
///         println!("{} @ {}: {:?}", data.name, data.timestamp, data.payload);
///     }
/// }
/// # Ok::<(), wpilog_decoder::WpilogError>(())
/// ```
pub struct WpilogReader<R> {
    input: InputStream<R>,
    state: ReaderState,
    header: Option<WpilogHeader>,
    source_name: String,
    dispatcher: RecordDispatcher,
}

impl<R: Read> WpilogReader<R> {
    /// Creates a reader with default options.
    pub fn new(source: R) -> Self {
        WpilogReaderBuilder::new().build(source)
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The file header, read from the source on first use.
    pub fn header(&mut self) -> Result<&WpilogHeader> {
        if self.header.is_none() {
            if self.state != ReaderState::AwaitingHeader {
                return Err(not_a_wpilog(&self.source_name));
            }
            match self.read_header() {
                Ok(header) => {
                    log::debug!(
                        "{}: WPILOG {}.{}, extra header '{}'",
                        self.source_name,
                        header.version.major,
                        header.version.minor,
                        header.extra_header
                    );
                    self.header = Some(header);
                    self.state = ReaderState::Streaming;
                }
                Err(e) => {
                    self.state = ReaderState::Finished;
                    return Err(e);
                }
            }
        }

        self.header
            .as_ref()
            .ok_or_else(|| not_a_wpilog(&self.source_name))
    }

    /// Returns the next record, or `None` once the stream has ended cleanly.
    ///
    /// After an error the reader is finished and returns `Ok(None)`.
    pub fn next_record(&mut self) -> Result<Option<WpilogRecord>> {
        match self.advance() {
            Ok(record) => Ok(record),
            Err(e) => {
                self.state = ReaderState::Finished;
                self.dispatcher.clear();
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<WpilogRecord>> {
        loop {
            if let Some(record) = self.dispatcher.pop() {
                return Ok(Some(record));
            }

            match self.state {
                ReaderState::Finished => return Ok(None),
                ReaderState::AwaitingHeader => {
                    self.header()?;
                }
                ReaderState::Streaming => match self.read_raw_record()? {
                    Some(raw) => self.dispatcher.dispatch(raw)?,
                    None => {
                        self.state = ReaderState::Finished;
                        self.dispatcher.finish(&self.source_name);
                    }
                },
            }
        }
    }

    fn read_header(&mut self) -> Result<WpilogHeader> {
        let prefix = self
            .input
            .read_exactly(HEADER_PREFIX_LEN)
            .map_err(|e| match e {
                WpilogError::StreamExhausted { .. } => not_a_wpilog(&self.source_name),
                other => other,
            })?;
        let (version, extra_len) = parse_header_prefix(&prefix, &self.source_name)?;

        let extra = self
            .input
            .read_exactly(extra_len)
            .map_err(|e| e.truncated("extra header"))?;

        Ok(WpilogHeader {
            version,
            extra_header: String::from_utf8_lossy(&extra).into_owned(),
        })
    }

    /// Frames the next record. `None` means the source ended on a record boundary.
    fn read_raw_record(&mut self) -> Result<Option<RawRecord>> {
        let bitfield = match self.input.read_exactly(1) {
            Ok(bytes) => bytes[0],
            Err(WpilogError::StreamExhausted { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let header = RecordHeader::from_bitfield(bitfield);
        let fields = self
            .input
            .read_exactly(header.fields_len())
            .map_err(|e| e.truncated("record header"))?;
        let (entry_id, payload_size, timestamp) = header.decode_fields(&fields)?;

        let payload = self
            .input
            .read_exactly(payload_size as usize)
            .map_err(|e| e.truncated(&format!("payload for entry {}", entry_id)))?;

        Ok(Some(RawRecord {
            entry_id,
            timestamp,
            payload,
        }))
    }
}

impl<R> WpilogReader<R> {
    /// Looks up a registered struct schema.
    pub fn struct_definition(&self, name: &str) -> Option<&[StructDeclaration]> {
        self.dispatcher.parser().structs().definition(name)
    }

    /// Like [`WpilogReader::struct_definition`], but a miss is an error.
    pub fn get_definition(&self, name: &str) -> Result<&[StructDeclaration]> {
        self.dispatcher.parser().structs().get_definition(name)
    }

    /// The entry table and struct registry as of the last record read.
    pub fn payload_parser(&self) -> &PayloadParser {
        self.dispatcher.parser()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

impl WpilogReader<Cursor<Vec<u8>>> {
    /// Reads a log already held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        WpilogReaderBuilder::new().from_bytes(data)
    }
}

impl WpilogReader<Cursor<memmap2::Mmap>> {
    /// Reads a log file through a memory map.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        WpilogReaderBuilder::new().from_file(path)
    }
}

impl<R: Read> Iterator for WpilogReader<R> {
    type Item = Result<WpilogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Builder for configuring a [`WpilogReader`].
///
/// # Example
///
/// ```no_run
/// use wpilog_decoder::WpilogReaderBuilder;
///
/// let reader = WpilogReaderBuilder::new()
///     .chunk_size(4096)
///     .source_name("match-12")
///     .from_file("robot.wpilog")?;
/// # Ok::<(), wpilog_decoder::WpilogError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WpilogReaderBuilder {
    chunk_size: usize,
    source_name: Option<String>,
}

impl WpilogReaderBuilder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            source_name: None,
        }
    }

    /// Bytes pulled from the source per refill. Default is 64 KiB; values
    /// below 1 are raised to 1.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Name used for the source in error and log messages.
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub(crate) fn configured_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn configured_source_name(&self) -> String {
        self.source_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string())
    }

    /// Builds a reader over any byte source.
    pub fn build<R: Read>(self, source: R) -> WpilogReader<R> {
        WpilogReader {
            input: InputStream::with_chunk_size(source, self.chunk_size),
            state: ReaderState::AwaitingHeader,
            header: None,
            source_name: self.configured_source_name(),
            dispatcher: RecordDispatcher::default(),
        }
    }

    pub fn from_bytes(self, data: Vec<u8>) -> WpilogReader<Cursor<Vec<u8>>> {
        self.build(Cursor::new(data))
    }

    /// Memory-maps `path` and builds a reader over it. The source name
    /// defaults to the path.
    pub fn from_file<P: AsRef<Path>>(mut self, path: P) -> Result<WpilogReader<Cursor<memmap2::Mmap>>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is read-only; the file must not be truncated while the reader lives
        let mmap = unsafe { memmap2::Mmap::map(&file)? };

        if self.source_name.is_none() {
            self.source_name = Some(path.display().to_string());
        }
        Ok(self.build(Cursor::new(mmap)))
    }
}

impl Default for WpilogReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
