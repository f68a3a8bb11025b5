//! Content-type sniffing with prefix re-injection
//!
//! The first [`SNIFF_LEN`] bytes of a part are read into memory, inspected,
//! and then replayed in front of the rest of the stream so nothing is lost on
//! the way to disk.

use bytes::Bytes;
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Number of leading bytes used for sniffing
pub const SNIFF_LEN: usize = 512;

/// Fallback for content without a known signature that looks like text
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Fallback for unrecognized binary content
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect a MIME type from the leading bytes of a file.
///
/// Magic signatures are matched with `infer`. Without a match, data free of
/// binary control bytes is reported as UTF-8 text (an empty prefix included).
pub fn detect_content_type(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }

    if prefix.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM.to_string()
    } else {
        TEXT_PLAIN.to_string()
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// A reader whose first bytes have been peeked
pub struct Sniffed<R> {
    prefix: Bytes,
    reader: R,
}

impl<R> Sniffed<R>
where
    R: AsyncRead + Unpin,
{
    /// Read up to [`SNIFF_LEN`] bytes from `reader`.
    ///
    /// A short prefix means the stream ended early.
    pub async fn peek(mut reader: R) -> io::Result<Self> {
        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        (&mut reader)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut prefix)
            .await?;

        Ok(Self {
            prefix: Bytes::from(prefix),
            reader,
        })
    }

    /// The peeked bytes
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Sniffed MIME type of the prefix
    pub fn content_type(&self) -> String {
        detect_content_type(&self.prefix)
    }

    /// Turn into a single-pass source: the prefix, then at most
    /// `max_size + 1 - prefix_len` further bytes of the underlying reader.
    ///
    /// With a full prefix the remainder budget is `max_size - 511`, so the
    /// whole source never yields more than `max_size + 1` bytes and an
    /// oversized upload shows up as `written > max_size`.
    pub fn into_source(self, max_size: u64) -> ReplayReader<R> {
        let budget = max_size
            .saturating_add(1)
            .saturating_sub(self.prefix.len() as u64);

        ReplayReader {
            prefix: self.prefix,
            rest: self.reader.take(budget),
        }
    }
}

pin_project! {
    /// Yields a buffered prefix, then continues from the bounded remainder
    pub struct ReplayReader<R> {
        prefix: Bytes,
        #[pin]
        rest: Take<R>,
    }
}

impl<R: AsyncRead> AsyncRead for ReplayReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();

        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix.split_to(n));
            return Poll::Ready(Ok(()));
        }

        this.rest.poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"), "application/pdf");
    }

    #[test]
    fn test_detect_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        assert_eq!(detect_content_type(&png), "image/png");
    }

    #[test]
    fn test_detect_text_and_empty() {
        assert_eq!(detect_content_type(b"hello, world\n"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b""), TEXT_PLAIN);
    }

    #[test]
    fn test_detect_unknown_binary() {
        assert_eq!(detect_content_type(&[0x00, 0x01, 0x02, 0xFF]), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_peek_short_stream_keeps_all_bytes() {
        let data = b"tiny".to_vec();
        let sniffed = Sniffed::peek(&data[..]).await.unwrap();
        assert_eq!(sniffed.prefix(), b"tiny");

        let mut source = sniffed.into_source(1024);
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_replay_reinjects_prefix() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let sniffed = Sniffed::peek(&data[..]).await.unwrap();
        assert_eq!(sniffed.prefix().len(), SNIFF_LEN);

        let mut source = sniffed.into_source(data.len() as u64);
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_source_stops_one_byte_past_limit() {
        let data = vec![b'a'; 2000];
        let sniffed = Sniffed::peek(&data[..]).await.unwrap();

        let mut source = sniffed.into_source(1000);
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 1001);
    }

    #[tokio::test]
    async fn test_limit_smaller_than_prefix() {
        let data = vec![b'a'; 600];
        let sniffed = Sniffed::peek(&data[..]).await.unwrap();

        let mut source = sniffed.into_source(100);
        let mut out = Vec::new();
        source.read_to_end(&mut out).await.unwrap();
        // The prefix is always replayed; nothing beyond it is read
        assert_eq!(out.len(), SNIFF_LEN);
    }
}
