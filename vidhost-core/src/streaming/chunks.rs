//! Lazily read, block-sized body chunks over one open file.
//!
//! The stream owns the file handle. Whether the body is read to the end,
//! fails mid-read, or is dropped because the client went away, the handle
//! is closed exactly once when the owning [`ChunkReader`] is dropped.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{trace, warn};

use super::stats::StreamStats;

/// Body of a [`StreamDescriptor`](super::StreamDescriptor).
pub type ChunkStream = BoxStream<'static, io::Result<Bytes>>;

/// Lifecycle of a single body stream once its file is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamState {
    /// File open and positioned, nothing read yet
    Opened,
    /// At least one chunk produced
    Streaming,
    /// All declared bytes produced, or the file ended early
    Completed,
    /// Dropped before completion or failed mid-read
    Aborted,
}

/// Open file plus the window still to be produced.
struct ChunkReader {
    file: File,
    remaining: u64,
    block_size: usize,
    state: StreamState,
    stats: Arc<StreamStats>,
}

impl ChunkReader {
    fn new(file: File, length: u64, block_size: usize, stats: Arc<StreamStats>) -> Self {
        stats.record_open();
        Self {
            file,
            remaining: length,
            block_size: block_size.max(1),
            state: StreamState::Opened,
            stats,
        }
    }

    /// Reads the next block, or `None` once the window is exhausted.
    ///
    /// A zero-byte read before the window is exhausted ends the stream
    /// without an error; the short body is logged and counted.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.remaining == 0 {
            self.state = StreamState::Completed;
            return Ok(None);
        }

        let want = self.remaining.min(self.block_size as u64) as usize;
        let mut buffer = BytesMut::zeroed(want);
        let mut read = 0;
        while read < want {
            match self.file.read(&mut buffer[read..]).await {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = StreamState::Aborted;
                    return Err(e);
                }
            }
        }

        if read == 0 {
            warn!(
                missing_bytes = self.remaining,
                "File ended before the declared content length was produced"
            );
            self.stats.record_premature_eof();
            self.state = StreamState::Completed;
            return Ok(None);
        }

        buffer.truncate(read);
        self.remaining -= read as u64;
        // HTTP bodies stop being polled once Content-Length bytes are written.
        self.state = if self.remaining == 0 {
            StreamState::Completed
        } else {
            StreamState::Streaming
        };
        self.stats.record_bytes(read as u64);
        trace!(read, remaining = self.remaining, "Produced chunk");

        Ok(Some(buffer.freeze()))
    }
}

impl Drop for ChunkReader {
    fn drop(&mut self) {
        let completed = self.state == StreamState::Completed;
        if !completed {
            self.state = StreamState::Aborted;
        }
        trace!(state = ?self.state, "Releasing stream file handle");
        self.stats.record_release(completed);
    }
}

/// Builds a stream producing `length` bytes from the file's current position.
///
/// The file must already be positioned at the window start.
pub(crate) fn chunk_stream(
    file: File,
    length: u64,
    block_size: usize,
    stats: Arc<StreamStats>,
) -> ChunkStream {
    let reader = ChunkReader::new(file, length, block_size, stats);

    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        match reader.next_chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use futures::TryStreamExt;

    use super::*;

    fn sample_file(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        (file, data)
    }

    #[tokio::test]
    async fn test_chunks_respect_block_size() {
        let (temp, data) = sample_file(10_000);
        let stats = Arc::new(StreamStats::new());
        let file = File::open(temp.path()).await.unwrap();

        let chunks: Vec<Bytes> = chunk_stream(file, 10_000, 4096, stats.clone())
            .try_collect()
            .await
            .unwrap();

        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(chunks.concat(), data);
        assert_eq!(stats.snapshot().streams_completed, 1);
        assert_eq!(stats.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_zero_length_window_completes_immediately() {
        let (temp, _) = sample_file(100);
        let stats = Arc::new(StreamStats::new());
        let file = File::open(temp.path()).await.unwrap();

        let chunks: Vec<Bytes> = chunk_stream(file, 0, 8192, stats.clone())
            .try_collect()
            .await
            .unwrap();

        assert!(chunks.is_empty());
        assert_eq!(stats.snapshot().streams_completed, 1);
    }

    #[tokio::test]
    async fn test_window_longer_than_file_ends_short() {
        let (temp, data) = sample_file(1000);
        let stats = Arc::new(StreamStats::new());
        let file = File::open(temp.path()).await.unwrap();

        let chunks: Vec<Bytes> = chunk_stream(file, 5000, 512, stats.clone())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), data);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.premature_eofs, 1);
        assert_eq!(snapshot.streams_completed, 1);
        assert_eq!(snapshot.bytes_served, 1000);
        assert_eq!(snapshot.open_handles, 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_handle() {
        let (temp, _) = sample_file(50_000);
        let stats = Arc::new(StreamStats::new());
        let file = File::open(temp.path()).await.unwrap();

        let mut stream = chunk_stream(file, 50_000, 1024, stats.clone());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1024);
        assert_eq!(stats.open_handles(), 1);

        drop(stream);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.open_handles, 0);
        assert_eq!(snapshot.streams_aborted, 1);
        assert_eq!(snapshot.streams_completed, 0);
    }

    #[tokio::test]
    async fn test_stream_dropped_after_last_byte_counts_as_completed() {
        let (temp, data) = sample_file(3000);
        let stats = Arc::new(StreamStats::new());
        let file = File::open(temp.path()).await.unwrap();

        // Consume exactly the declared bytes, never polling for end of stream.
        let mut stream = chunk_stream(file, 3000, 1024, stats.clone());
        let mut produced = Vec::new();
        while produced.len() < data.len() {
            produced.extend_from_slice(&stream.next().await.unwrap().unwrap());
        }
        drop(stream);

        assert_eq!(produced, data);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.streams_completed, 1);
        assert_eq!(snapshot.streams_aborted, 0);
        assert_eq!(snapshot.open_handles, 0);
    }
}
