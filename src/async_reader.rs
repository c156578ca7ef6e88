//! Async WPILOG reader over a tokio byte source.
//!
//! Mirrors [`crate::reader::WpilogReader`]: the same framing and record
//! dispatch, but each refill of the input buffer awaits the source.

use crate::datalog::{parse_header_prefix, RawRecord, RecordHeader, WpilogHeader, HEADER_PREFIX_LEN};
use crate::error::{Result, WpilogError};
use crate::input::ChunkBuffer;
use crate::reader::{not_a_wpilog, ReaderState, RecordDispatcher, WpilogReaderBuilder};
use crate::struct_support::StructDeclaration;
use crate::types::WpilogRecord;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Buffered exact-size reads over an [`AsyncRead`] source.
pub struct AsyncInputStream<R> {
    source: R,
    chunks: ChunkBuffer,
}

impl<R: AsyncRead + Unpin> AsyncInputStream<R> {
    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunks: ChunkBuffer::new(chunk_size),
        }
    }

    /// Returns exactly `len` bytes or [`WpilogError::StreamExhausted`] without
    /// consuming anything.
    pub async fn read_exactly(&mut self, len: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(bytes) = self.chunks.take(len)? {
                return Ok(bytes);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let read = match self.source.read(self.chunks.spare()).await {
            Ok(n) => n,
            Err(e) => {
                self.chunks.discard();
                return Err(e.into());
            }
        };
        self.chunks.commit(read);
        Ok(())
    }
}

/// Async counterpart of [`crate::reader::WpilogReader`].
///
/// ```no_run
/// # async fn run() -> wpilog_decoder::Result<()> {
/// use wpilog_decoder::AsyncWpilogReader;
///
/// let file = tokio::fs::File::open("robot.wpilog").await?;
/// let mut reader = AsyncWpilogReader::new(file);
/// while let Some(record) = reader.next_record().await? {
///     println!("{:?}", record);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AsyncWpilogReader<R> {
    input: AsyncInputStream<R>,
    state: ReaderState,
    header: Option<WpilogHeader>,
    source_name: String,
    dispatcher: RecordDispatcher,
}

impl<R: AsyncRead + Unpin> AsyncWpilogReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_builder(WpilogReaderBuilder::new(), source)
    }

    /// Builds an async reader using the options of a sync reader builder.
    pub fn with_builder(builder: WpilogReaderBuilder, source: R) -> Self {
        Self {
            input: AsyncInputStream::with_chunk_size(source, builder.configured_chunk_size()),
            state: ReaderState::AwaitingHeader,
            header: None,
            source_name: builder.configured_source_name(),
            dispatcher: RecordDispatcher::default(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub async fn header(&mut self) -> Result<&WpilogHeader> {
        if self.header.is_none() {
            if self.state != ReaderState::AwaitingHeader {
                return Err(not_a_wpilog(&self.source_name));
            }
            match self.read_header().await {
                Ok(header) => {
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

    /// Returns the next record, or `None` once the stream has ended. After an
    /// error the reader is finished.
    pub async fn next_record(&mut self) -> Result<Option<WpilogRecord>> {
        match self.advance().await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.state = ReaderState::Finished;
                self.dispatcher.clear();
                Err(e)
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<WpilogRecord>> {
        loop {
            if let Some(record) = self.dispatcher.pop() {
                return Ok(Some(record));
            }

            match self.state {
                ReaderState::Finished => return Ok(None),
                ReaderState::AwaitingHeader => {
                    self.header().await?;
                }
                ReaderState::Streaming => match self.read_raw_record().await? {
                    Some(raw) => self.dispatcher.dispatch(raw)?,
                    None => {
                        self.state = ReaderState::Finished;
                        self.dispatcher.finish(&self.source_name);
                    }
                },
            }
        }
    }

    async fn read_header(&mut self) -> Result<WpilogHeader> {
        let prefix = match self.input.read_exactly(HEADER_PREFIX_LEN).await {
            Ok(prefix) => prefix,
            Err(WpilogError::StreamExhausted { .. }) => return Err(not_a_wpilog(&self.source_name)),
            Err(e) => return Err(e),
        };
        let (version, extra_len) = parse_header_prefix(&prefix, &self.source_name)?;

        let extra = self
            .input
            .read_exactly(extra_len)
            .await
            .map_err(|e| e.truncated("extra header"))?;

        Ok(WpilogHeader {
            version,
            extra_header: String::from_utf8_lossy(&extra).into_owned(),
        })
    }

    async fn read_raw_record(&mut self) -> Result<Option<RawRecord>> {
        let bitfield = match self.input.read_exactly(1).await {
            Ok(bytes) => bytes[0],
            Err(WpilogError::StreamExhausted { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let header = RecordHeader::from_bitfield(bitfield);
        let fields = self
            .input
            .read_exactly(header.fields_len())
            .await
            .map_err(|e| e.truncated("record header"))?;
        let (entry_id, payload_size, timestamp) = header.decode_fields(&fields)?;

        let payload = self
            .input
            .read_exactly(payload_size as usize)
            .await
            .map_err(|e| e.truncated(&format!("payload for entry {}", entry_id)))?;

        Ok(Some(RawRecord {
            entry_id,
            timestamp,
            payload,
        }))
    }

    pub fn struct_definition(&self, name: &str) -> Option<&[StructDeclaration]> {
        self.dispatcher.parser().structs().definition(name)
    }

    pub fn get_definition(&self, name: &str) -> Result<&[StructDeclaration]> {
        self.dispatcher.parser().structs().get_definition(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ControlPayload, DataPayload, StartRecordData};

    fn log_bytes() -> Vec<u8> {
        let mut data = b"WPILOG\x00\x01\x02\x00\x00\x00hi".to_vec();
        let start = ControlPayload::Start(StartRecordData {
            entry_id: 3,
            name: "/flag".to_string(),
            type_name: "boolean".to_string(),
            metadata: String::new(),
        })
        .encode();
        for (entry_id, timestamp, payload) in [(0u32, 1u64, start), (3, 2, vec![1])] {
            RecordHeader::minimal(entry_id, payload.len() as u32, timestamp)
                .encode(entry_id, payload.len() as u32, timestamp, &mut data)
                .unwrap();
            data.extend_from_slice(&payload);
        }
        data
    }

    #[tokio::test]
    async fn test_async_reader() {
        let data = log_bytes();
        let mut reader =
            AsyncWpilogReader::with_builder(WpilogReaderBuilder::new().chunk_size(2), &data[..]);

        assert_eq!(reader.header().await.unwrap().extra_header, "hi");
        assert!(reader.next_record().await.unwrap().unwrap().is_control());
        let record = reader.next_record().await.unwrap().unwrap();
        assert_eq!(record.as_data().unwrap().payload, DataPayload::Boolean(true));
        assert!(reader.next_record().await.unwrap().is_none());
        assert_eq!(reader.state(), ReaderState::Finished);
    }

    #[tokio::test]
    async fn test_async_truncation() {
        let mut data = log_bytes();
        data.pop();
        let mut reader = AsyncWpilogReader::new(&data[..]);

        assert!(reader.next_record().await.unwrap().is_some());
        assert!(matches!(
            reader.next_record().await,
            Err(WpilogError::InvalidFormat(_))
        ));
        assert!(reader.next_record().await.unwrap().is_none());
    }
}
