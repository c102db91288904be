use bytes::{Bytes, BytesMut};

use super::{Chunks, ChunksError};

/// A type for reading newline-delimited records from a chunk stream.
///
/// Records are buffered as raw bytes until the terminating line feed
/// arrives, so neither a record nor a UTF-8 sequence is ever split at a
/// chunk boundary. Blank lines are skipped and a trailing carriage return
/// is stripped.
pub struct Lines {
    buf: BytesMut,
    // Bytes of `buf` that are known to contain no line feed.
    scanned: usize,
    eof: bool,
    chunks: Chunks,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            eof: false,
            chunks,
        }
    }

    /// Returns the next non-blank line, or `None` once the stream ended.
    ///
    /// When the stream ends without a final line feed, the remaining
    /// bytes are returned as the last line.
    pub async fn next_line(&mut self) -> Result<Option<Bytes>, ChunksError> {
        loop {
            while let Some(line) = self.try_split_line() {
                if !line.trim_ascii().is_empty() {
                    return Ok(Some(line));
                }
            }

            if self.eof {
                let rest = self.buf.split().freeze();
                self.scanned = 0;
                if rest.trim_ascii().is_empty() {
                    return Ok(None);
                }
                trace!("flushing unterminated line ({} bytes)", rest.len());
                return Ok(Some(trim_eol(rest)));
            }

            match self.chunks.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn try_split_line(&mut self) -> Option<Bytes> {
        let Some(pos) = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
        else {
            self.scanned = self.buf.len();
            return None;
        };
        let line = self.buf.split_to(self.scanned + pos + 1).freeze();
        self.scanned = 0;
        Some(trim_eol(line))
    }
}

#[inline]
fn trim_eol(mut line: Bytes) -> Bytes {
    while let Some(&last) = line.last() {
        if last != b'\n' && last != b'\r' {
            break;
        }
        line.truncate(line.len() - 1);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(chunks: &[&'static [u8]]) -> Lines {
        let chunks = chunks.iter().map(|&c| Bytes::from_static(c)).collect();
        Lines::new(Chunks::from_vec_deque(chunks))
    }

    #[tokio::test]
    async fn test_normal_lines() {
        let mut lines = lines_of(&[b"{\"a\":1}\n{\"b\":2}\n"]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let mut lines = lines_of(&[b"{\"text\":", b"\"hel", b"lo\"}\n{\"x\"", b":1}\n"]);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"text\":\"hello\"}"
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"x\":1}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        // "é" is 0xC3 0xA9.
        let mut lines = lines_of(&[b"caf\xC3", b"\xA9\n"]);
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&line).unwrap(), "café");
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf() {
        let mut lines = lines_of(&[b"\n\r\none\r\n\n  \ntwo\n"]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "one");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "two");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unterminated_last_line() {
        let mut lines = lines_of(&[b"first\nsec", b"ond"]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "first");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "second");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_chunk_error() {
        let chunks = Chunks::failing_after(
            vec![Bytes::from_static(b"ok\npartial")].into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "ok");
        assert!(lines.next_line().await.is_err());
    }
}
