//! Byte-ceiling wrapper around fetched payloads.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Largest payload read from a single fetch: 512 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 1024 * 1024 * 512;

/// Type-erased payload source, independent of the transport that produced it.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Stream handed back to callers of a fetch.
pub type FetchStream = SizeLimitedStream<BoxedReader>;

/// Reader that yields at most `limit` bytes of the wrapped resource and then
/// reports end-of-stream.
///
/// Truncation is silent: hitting the ceiling looks exactly like the source
/// ending. Closing releases the wrapped resource; it is released once, either
/// by [`SizeLimitedStream::close`] or on drop.
pub struct SizeLimitedStream<R> {
    inner: Option<Take<R>>,
}

impl<R> SizeLimitedStream<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap `inner`, allowing at most `limit` bytes through.
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner: Some(inner.take(limit)),
        }
    }

    /// Wrap `inner` with the 512 MiB default ceiling.
    pub fn with_default_limit(inner: R) -> Self {
        Self::new(inner, DEFAULT_SIZE_LIMIT)
    }

    /// Bytes that may still be read before the ceiling is reached.
    pub fn remaining(&self) -> u64 {
        self.inner.as_ref().map_or(0, Take::limit)
    }

    /// Whether the underlying resource has been released.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the underlying resource. Later calls are no-ops.
    pub fn close(&mut self) {
        self.inner = None;
    }
}

impl<R> fmt::Debug for SizeLimitedStream<R>
where
    R: AsyncRead + Unpin,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeLimitedStream")
            .field("remaining", &self.remaining())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<R> AsyncRead for SizeLimitedStream<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "read from a closed stream",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        data: io::Cursor<Vec<u8>>,
        closed: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingSource {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.data).poll_read(cx, buf)
        }
    }

    impl Drop for CountingSource {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source(len: usize) -> (CountingSource, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let data = (0..len).map(|i| (i % 251) as u8).collect();
        (
            CountingSource {
                data: io::Cursor::new(data),
                closed: closed.clone(),
            },
            closed,
        )
    }

    #[tokio::test]
    async fn truncates_at_ceiling_without_error() {
        let (src, _) = source(1000 + 37);
        let mut stream = SizeLimitedStream::new(src, 1000);

        let mut out = Vec::new();
        let read = stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(read, 1000);
        assert_eq!(out.len(), 1000);
        assert_eq!(stream.remaining(), 0);

        // Further reads keep reporting end-of-stream.
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_source_passes_through() {
        let (src, _) = source(10);
        let mut stream = SizeLimitedStream::new(src, 1000);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, (0..10u8).collect::<Vec<_>>());
        assert_eq!(stream.remaining(), 990);
    }

    #[test]
    fn close_releases_source_once() {
        let (src, closed) = source(4);
        let mut stream = SizeLimitedStream::new(src, 2);

        stream.close();
        stream.close();
        assert!(stream.is_closed());
        drop(stream);

        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_source() {
        let (src, closed) = source(4);
        drop(SizeLimitedStream::with_default_limit(src));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_after_close_fails() {
        let (src, _) = source(4);
        let mut stream = SizeLimitedStream::new(src, 4);
        stream.close();

        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn default_ceiling_is_512_mib() {
        assert_eq!(DEFAULT_SIZE_LIMIT, 536_870_912);
        let (src, _) = source(0);
        assert_eq!(
            SizeLimitedStream::with_default_limit(src).remaining(),
            DEFAULT_SIZE_LIMIT
        );
    }
}
