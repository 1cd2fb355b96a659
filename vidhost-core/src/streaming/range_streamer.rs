//! Opens stored media files for ranged HTTP delivery.
//!
//! [`RangeStreamer::open`] decides the byte window from the inbound `Range`
//! header, positions the file, and hands back a [`StreamDescriptor`] carrying
//! the status, exact content length, headers and a lazily read body.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tracing::{debug, info};

use super::chunks::{ChunkStream, chunk_stream};
use super::range::{ByteRange, RangeDecision, RangeMode, resolve_range};
use super::stats::{StreamStats, StreamStatsSnapshot};
use super::{StreamingError, StreamingResult};
use crate::config::StreamingConfig;

/// Everything the HTTP layer needs to answer one streaming request.
///
/// Consumed exactly once: either through [`Self::into_body`] or
/// [`Self::into_response`]. Dropping it unconsumed releases the file.
pub struct StreamDescriptor {
    range: Option<ByteRange>,
    total_size: u64,
    headers: HeaderMap,
    body: ChunkStream,
}

impl StreamDescriptor {
    fn new(range: Option<ByteRange>, total_size: u64, body: ChunkStream) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Some(range) = range {
            headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&range.content_range(total_size))
                    .unwrap_or_else(|_| HeaderValue::from_static("bytes */0")),
            );
        }

        Self {
            range,
            total_size,
            headers,
            body,
        }
    }

    /// 206 for an honored range, 200 otherwise.
    pub fn status(&self) -> StatusCode {
        if self.range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        }
    }

    /// Exact number of bytes the body will produce.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.total_size, |range| range.length())
    }

    /// Honored byte window, `None` for a full read.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Size of the whole file at open time.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// `Accept-Ranges` always, `Content-Range` when partial.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Takes the body stream.
    pub fn into_body(self) -> ChunkStream {
        self.body
    }

    /// Builds a streaming HTTP response with the descriptor's status and headers.
    pub fn into_response(self, content_type: &str) -> Response {
        let status = self.status();
        let content_length = self.content_length();

        let mut response = Response::new(Body::from_stream(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.extend(self.headers);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));

        response
    }
}

impl std::fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("status", &self.status())
            .field("range", &self.range)
            .field("total_size", &self.total_size)
            .field("content_length", &self.content_length())
            .finish_non_exhaustive()
    }
}

/// Opens media files as ranged, lazily read HTTP bodies.
///
/// Holds no per-request state; one instance is shared by all handlers and
/// every call to [`Self::open`] owns its own file handle.
#[derive(Debug, Clone)]
pub struct RangeStreamer {
    block_size: usize,
    range_mode: RangeMode,
    stats: Arc<StreamStats>,
}

impl Default for RangeStreamer {
    fn default() -> Self {
        Self::new(&StreamingConfig::default())
    }
}

impl RangeStreamer {
    /// Creates a streamer with fresh statistics.
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            block_size: config.block_size.max(1),
            range_mode: config.range_mode,
            stats: Arc::new(StreamStats::new()),
        }
    }

    /// Range interpretation in effect.
    pub fn range_mode(&self) -> RangeMode {
        self.range_mode
    }

    /// Shared counters for every stream this streamer opened.
    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    /// Point-in-time copy of the stream counters.
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }

    /// Opens `path` for the window selected by `range_header`.
    ///
    /// Without a header the whole file is served with 200. Malformed headers
    /// are treated as absent. The file is positioned before returning so the
    /// body starts producing from the first requested byte.
    ///
    /// # Errors
    ///
    /// - `StreamingError::FileNotFound` - Path no longer exists
    /// - `StreamingError::FileUnreadable` - Cannot open, stat, or not a regular file
    /// - `StreamingError::RangeNotSatisfiable` - Strict mode and no requested byte exists
    /// - `StreamingError::Io` - Seeking to the window start failed
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
        range_header: Option<&str>,
    ) -> StreamingResult<StreamDescriptor> {
        let path = path.as_ref();

        let mut file = File::open(path)
            .await
            .map_err(|e| StreamingError::from_open(path, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|source| StreamingError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(StreamingError::FileUnreadable {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a regular file",
                ),
            });
        }
        let total_size = metadata.len();

        let decision = range_header.map_or(RangeDecision::Full, |header| {
            resolve_range(header, total_size, self.range_mode)
        });
        let range = match decision {
            RangeDecision::Full => None,
            RangeDecision::Partial(range) => Some(range),
            RangeDecision::Unsatisfiable => {
                debug!(path = %path.display(), total_size, "Range not satisfiable");
                return Err(StreamingError::RangeNotSatisfiable { total_size });
            }
        };

        let (start, length) = range.map_or((0, total_size), |r| (r.start, r.length()));
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        info!(
            path = %path.display(),
            total_size,
            start,
            length,
            partial = range.is_some(),
            "Opened media stream"
        );

        let body = chunk_stream(file, length, self.block_size, self.stats.clone());
        Ok(StreamDescriptor::new(range, total_size, body))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::body::to_bytes;
    use bytes::Bytes;
    use futures::{StreamExt, TryStreamExt};
    use proptest::prelude::*;

    use super::*;

    const FILE_SIZE: usize = 1000;

    fn sample_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn sample_file(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
        let data = sample_data(len);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        (file, data)
    }

    fn strict_streamer() -> RangeStreamer {
        RangeStreamer::new(&StreamingConfig {
            range_mode: RangeMode::Strict,
            ..StreamingConfig::default()
        })
    }

    async fn read_all(descriptor: StreamDescriptor) -> Vec<u8> {
        let chunks: Vec<Bytes> = descriptor.into_body().try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_no_range_serves_whole_file() {
        let (temp, data) = sample_file(FILE_SIZE);
        let streamer = RangeStreamer::default();

        let descriptor = streamer.open(temp.path(), None).await.unwrap();

        assert_eq!(descriptor.status(), StatusCode::OK);
        assert_eq!(descriptor.content_length(), 1000);
        assert_eq!(descriptor.headers().get(header::ACCEPT_RANGES).unwrap(), "bytes");
        assert!(descriptor.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(read_all(descriptor).await, data);
    }

    #[tokio::test]
    async fn test_leading_range() {
        let (temp, data) = sample_file(FILE_SIZE);
        let streamer = RangeStreamer::default();

        let descriptor = streamer
            .open(temp.path(), Some("bytes=0-99"))
            .await
            .unwrap();

        assert_eq!(descriptor.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(descriptor.content_length(), 100);
        assert_eq!(
            descriptor.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 0-99/1000"
        );
        assert_eq!(read_all(descriptor).await, &data[..100]);
    }

    #[tokio::test]
    async fn test_open_ended_range() {
        let (temp, data) = sample_file(FILE_SIZE);
        let streamer = RangeStreamer::default();

        let descriptor = streamer
            .open(temp.path(), Some("bytes=500-"))
            .await
            .unwrap();

        assert_eq!(descriptor.range(), Some(ByteRange { start: 500, end: 999 }));
        assert_eq!(descriptor.content_length(), 500);
        assert_eq!(read_all(descriptor).await, &data[500..]);
    }

    #[tokio::test]
    async fn test_suffix_range_modes() {
        let (temp, data) = sample_file(FILE_SIZE);

        let permissive = RangeStreamer::default()
            .open(temp.path(), Some("bytes=-100"))
            .await
            .unwrap();
        assert_eq!(permissive.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            permissive.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 0-999/1000"
        );
        assert_eq!(read_all(permissive).await, data);

        let strict = strict_streamer()
            .open(temp.path(), Some("bytes=-100"))
            .await
            .unwrap();
        assert_eq!(
            strict.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 900-999/1000"
        );
        assert_eq!(read_all(strict).await, &data[900..]);
    }

    #[tokio::test]
    async fn test_malformed_range_serves_whole_file() {
        let (temp, data) = sample_file(FILE_SIZE);
        let streamer = RangeStreamer::default();

        let descriptor = streamer
            .open(temp.path(), Some("bytes=abc-def"))
            .await
            .unwrap();

        assert_eq!(descriptor.status(), StatusCode::OK);
        assert_eq!(descriptor.content_length(), 1000);
        assert_eq!(read_all(descriptor).await, data);
    }

    #[tokio::test]
    async fn test_strict_unsatisfiable_range() {
        let (temp, _) = sample_file(FILE_SIZE);

        let result = strict_streamer()
            .open(temp.path(), Some("bytes=2000-"))
            .await;

        match result {
            Err(StreamingError::RangeNotSatisfiable { total_size }) => {
                assert_eq!(total_size, 1000)
            }
            other => panic!("expected RangeNotSatisfiable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let streamer = RangeStreamer::default();

        let err = streamer
            .open(dir.path().join("deleted.mp4"), Some("bytes=0-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamingError::FileNotFound { .. }));
        assert!(err.is_gone());
        assert_eq!(streamer.snapshot().streams_opened, 0);
    }

    #[tokio::test]
    async fn test_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();

        let err = RangeStreamer::default()
            .open(dir.path(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, StreamingError::FileUnreadable { .. }));
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn test_empty_file() {
        let (temp, _) = sample_file(0);
        let streamer = RangeStreamer::default();

        let descriptor = streamer
            .open(temp.path(), Some("bytes=0-10"))
            .await
            .unwrap();

        assert_eq!(descriptor.status(), StatusCode::OK);
        assert_eq!(descriptor.content_length(), 0);
        assert!(read_all(descriptor).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_streams_do_not_interfere() {
        let (temp, data) = sample_file(64 * 1024);
        let streamer = RangeStreamer::new(&StreamingConfig {
            block_size: 1000,
            ..StreamingConfig::default()
        });

        let first = streamer
            .open(temp.path(), Some("bytes=0-30000"))
            .await
            .unwrap();
        let second = streamer
            .open(temp.path(), Some("bytes=20000-"))
            .await
            .unwrap();
        assert_eq!(streamer.stats().open_handles(), 2);

        let (first, second) = tokio::join!(read_all(first), read_all(second));

        assert_eq!(first, &data[..=30000]);
        assert_eq!(second, &data[20000..]);
        assert_eq!(streamer.stats().open_handles(), 0);
    }

    #[tokio::test]
    async fn test_aborted_streams_release_handles() {
        let (temp, _) = sample_file(100_000);
        let streamer = RangeStreamer::new(&StreamingConfig {
            block_size: 512,
            ..StreamingConfig::default()
        });

        for _ in 0..25 {
            let descriptor = streamer.open(temp.path(), None).await.unwrap();
            let mut body = descriptor.into_body();
            assert!(body.next().await.is_some());
        }
        // Never polled at all
        drop(streamer.open(temp.path(), Some("bytes=10-")).await.unwrap());

        let snapshot = streamer.snapshot();
        assert_eq!(snapshot.streams_opened, 26);
        assert_eq!(snapshot.streams_aborted, 26);
        assert_eq!(snapshot.open_handles, 0);
    }

    #[tokio::test]
    async fn test_file_truncated_mid_stream_ends_short() {
        let (temp, data) = sample_file(FILE_SIZE);
        let streamer = RangeStreamer::new(&StreamingConfig {
            block_size: 100,
            ..StreamingConfig::default()
        });

        let descriptor = streamer.open(temp.path(), None).await.unwrap();
        assert_eq!(descriptor.content_length(), 1000);
        temp.as_file().set_len(250).unwrap();

        let produced = read_all(descriptor).await;

        assert_eq!(produced, &data[..250]);
        assert_eq!(streamer.snapshot().premature_eofs, 1);
        assert_eq!(streamer.snapshot().open_handles, 0);
    }

    #[tokio::test]
    async fn test_into_response_headers() {
        let (temp, data) = sample_file(FILE_SIZE);

        let response = RangeStreamer::default()
            .open(temp.path(), Some("bytes=10-19"))
            .await
            .unwrap()
            .into_response("video/mp4");

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "10");
        assert_eq!(headers.get(header::CONTENT_RANGE).unwrap(), "bytes 10-19/1000");
        assert_eq!(headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), &data[10..20]);
    }

    proptest! {
        #[test]
        fn prop_range_matches_source_slice(
            start in 0usize..FILE_SIZE,
            span in 0usize..FILE_SIZE,
            block_size in 1usize..300,
        ) {
            let end = (start + span).min(FILE_SIZE - 1);
            let (temp, data) = sample_file(FILE_SIZE);
            let streamer = RangeStreamer::new(&StreamingConfig {
                block_size,
                ..StreamingConfig::default()
            });
            let header = format!("bytes={start}-{end}");

            let (length, produced) = tokio_test::block_on(async {
                let descriptor = streamer.open(temp.path(), Some(&header)).await.unwrap();
                let length = descriptor.content_length();
                (length, read_all(descriptor).await)
            });

            prop_assert_eq!(length, (end - start + 1) as u64);
            prop_assert_eq!(produced.as_slice(), &data[start..=end]);
        }
    }
}
