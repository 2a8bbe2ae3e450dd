//! Splitting payloads into multipart upload parts.
//!
//! Two views of the same rule: every part has exactly `part_size` bytes
//! except the last, which holds the remainder. An empty payload is still one
//! (empty) part so the store always sees at least one part.
//!
//! - `plan_parts` / `expected_part_count` - pure planning for a known size
//! - `Chunker` - lazy chunking of an `AsyncRead` of unknown length

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Byte range of one part within a payload of known size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Zero-based chunk index.
    pub index: usize,
    /// Byte offset within the payload.
    pub offset: u64,
    /// Length of this chunk in bytes.
    pub length: u64,
}

/// Plan the parts of a payload of `size` bytes.
///
/// # Arguments
/// * `size` - Total payload size in bytes
/// * `part_size` - Size of each part
///
/// # Returns
/// One `ChunkInfo` per part. A zero-length payload (or `part_size` of 0)
/// yields a single chunk covering the whole payload.
pub fn plan_parts(size: u64, part_size: u64) -> Vec<ChunkInfo> {
    if part_size == 0 || size == 0 {
        return vec![ChunkInfo {
            index: 0,
            offset: 0,
            length: size,
        }];
    }

    let mut chunks = Vec::new();
    let mut offset = 0u64;
    let mut index = 0usize;

    while offset < size {
        let length = std::cmp::min(part_size, size - offset);
        chunks.push(ChunkInfo {
            index,
            offset,
            length,
        });
        offset += length;
        index += 1;
    }

    chunks
}

/// Calculate the number of parts a payload of `size` bytes produces.
pub fn expected_part_count(size: u64, part_size: u64) -> usize {
    if part_size == 0 || size == 0 {
        return 1;
    }
    size.div_ceil(part_size) as usize
}

/// One chunk produced by a `Chunker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the payload.
    pub index: usize,
    /// Chunk payload.
    pub data: Bytes,
    /// True for the last chunk of the payload, and only for it.
    pub is_final: bool,
}

impl Chunk {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy, finite chunker over a byte stream of unknown length.
///
/// Reads one chunk ahead so the final chunk is flagged as soon as it is
/// produced. The source is drained exactly once; the chunker cannot restart.
pub struct Chunker<R> {
    reader: R,
    part_size: usize,
    lookahead: Option<Bytes>,
    next_index: usize,
    started: bool,
    finished: bool,
}

impl<R: AsyncRead + Unpin> Chunker<R> {
    /// Create a chunker.
    ///
    /// # Arguments
    /// * `reader` - Source stream
    /// * `part_size` - Size of every chunk but the last (values below 1 are treated as 1)
    pub fn new(reader: R, part_size: usize) -> Self {
        Self {
            reader,
            part_size: part_size.max(1),
            lookahead: None,
            next_index: 0,
            started: false,
            finished: false,
        }
    }

    /// Produce the next chunk.
    ///
    /// # Returns
    /// `Ok(None)` once the final chunk has been returned. An I/O error ends
    /// chunk production; the partially read chunk is discarded.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }

        let current: Bytes = match self.lookahead.take() {
            Some(buf) => buf,
            None if !self.started => {
                self.started = true;
                self.fill().await.inspect_err(|_| self.finished = true)?
            }
            None => return Ok(None),
        };

        // A short read means the source is exhausted.
        let next: Bytes = if current.len() < self.part_size {
            Bytes::new()
        } else {
            self.fill().await.inspect_err(|_| self.finished = true)?
        };

        let is_final: bool = next.is_empty();
        if is_final {
            self.finished = true;
        } else {
            self.lookahead = Some(next);
        }

        let chunk = Chunk {
            index: self.next_index,
            data: current,
            is_final,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }

    /// Turn the chunker into a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Chunk>> {
        stream::try_unfold(self, |mut chunker| async move {
            let chunk: Option<Chunk> = chunker.next_chunk().await?;
            Ok::<_, std::io::Error>(chunk.map(|c| (c, chunker)))
        })
    }

    /// Read until `part_size` bytes are buffered or the source ends.
    async fn fill(&mut self) -> std::io::Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.part_size);
        let mut filled: usize = 0;

        while filled < self.part_size {
            let read: usize = self.reader.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        buf.truncate(filled);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    const MB: usize = 1024 * 1024;

    async fn chunk_sizes(data: &[u8], part_size: usize) -> Vec<(usize, bool)> {
        let chunks: Vec<Chunk> = Chunker::new(data, part_size)
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        chunks.iter().map(|c| (c.len(), c.is_final)).collect()
    }

    #[test]
    fn test_plan_parts_with_remainder() {
        let chunks = plan_parts(250, 100);
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0], ChunkInfo { index: 0, offset: 0, length: 100 });
        assert_eq!(chunks[1], ChunkInfo { index: 1, offset: 100, length: 100 });
        assert_eq!(chunks[2], ChunkInfo { index: 2, offset: 200, length: 50 });
    }

    #[test]
    fn test_plan_parts_empty_payload() {
        let chunks = plan_parts(0, 100);
        assert_eq!(chunks, vec![ChunkInfo { index: 0, offset: 0, length: 0 }]);
    }

    #[test]
    fn test_expected_part_count() {
        assert_eq!(expected_part_count(0, 100), 1);
        assert_eq!(expected_part_count(100, 100), 1);
        assert_eq!(expected_part_count(101, 100), 2);
        assert_eq!(expected_part_count(22 * MB as u64, 10 * MB as u64), 3);
    }

    #[tokio::test]
    async fn test_chunker_22mb_into_10mb_parts() {
        let data: Vec<u8> = vec![7u8; 22 * MB];
        let sizes = chunk_sizes(&data, 10 * MB).await;
        assert_eq!(sizes, vec![(10 * MB, false), (10 * MB, false), (2 * MB, true)]);
    }

    #[tokio::test]
    async fn test_chunker_exact_multiple() {
        let data: Vec<u8> = vec![1u8; 300];
        let sizes = chunk_sizes(&data, 100).await;
        assert_eq!(sizes, vec![(100, false), (100, false), (100, true)]);
    }

    #[tokio::test]
    async fn test_chunker_empty_stream_yields_one_empty_final_chunk() {
        let sizes = chunk_sizes(&[], 100).await;
        assert_eq!(sizes, vec![(0, true)]);
    }

    #[tokio::test]
    async fn test_chunker_matches_plan() {
        for size in [1usize, 99, 100, 101, 999, 1000, 1001] {
            let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
            let chunks: Vec<Chunk> = Chunker::new(data.as_slice(), 100)
                .into_stream()
                .try_collect()
                .await
                .unwrap();
            let plan = plan_parts(size as u64, 100);

            assert_eq!(chunks.len(), plan.len());
            for (chunk, info) in chunks.iter().zip(plan.iter()) {
                assert_eq!(chunk.index, info.index);
                let start = info.offset as usize;
                let end = start + info.length as usize;
                assert_eq!(&chunk.data[..], &data[start..end]);
            }
            assert_eq!(chunks.iter().filter(|c| c.is_final).count(), 1);
            assert!(chunks.last().unwrap().is_final);
        }
    }

    #[tokio::test]
    async fn test_chunker_returns_none_after_final() {
        let data: Vec<u8> = vec![0u8; 10];
        let mut chunker = Chunker::new(data.as_slice(), 4);
        let mut count = 0;
        while let Some(_chunk) = chunker.next_chunk().await.unwrap() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(chunker.next_chunk().await.unwrap().is_none());
    }

    /// Reader that hands out a few bytes per call, then fails.
    struct FlakyReader {
        remaining_ok: usize,
    }

    impl AsyncRead for FlakyReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.remaining_ok == 0 {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "source went away",
                )));
            }
            let n = std::cmp::min(3, std::cmp::min(self.remaining_ok, buf.remaining()));
            buf.put_slice(&vec![9u8; n]);
            self.remaining_ok -= n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_chunker_short_reads_fill_whole_chunks() {
        struct Trickle<'a>(&'a [u8]);
        impl AsyncRead for Trickle<'_> {
            fn poll_read(
                mut self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                let rest: &[u8] = self.0;
                let n = std::cmp::min(3, std::cmp::min(rest.len(), buf.remaining()));
                buf.put_slice(&rest[..n]);
                self.0 = &rest[n..];
                Poll::Ready(Ok(()))
            }
        }

        let data: Vec<u8> = vec![5u8; 25];
        let chunks: Vec<Chunk> = Chunker::new(Trickle(&data), 10)
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_chunker_io_error_surfaces_without_partial_chunk() {
        let mut chunker = Chunker::new(FlakyReader { remaining_ok: 15 }, 10);

        // First chunk is full; reading its lookahead hits the fault.
        let err = chunker.next_chunk().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
        assert!(chunker.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunker_reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        tokio::fs::write(&path, vec![3u8; 1234]).await.unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let chunks: Vec<Chunk> = Chunker::new(file, 500)
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![500, 500, 234]);
    }
}
