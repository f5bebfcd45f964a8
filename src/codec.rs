//! JSON-RPC framing codec for LSP communication.
//!
//! LSP uses `Content-Length: N\r\n\r\n{json}` framing over stdin/stdout.
//! This module provides [`FrameReader`] and [`FrameWriter`] for async
//! reading and writing of framed message bodies. Bodies are carried as raw
//! bytes; parsing them as JSON is the session's concern, so that a garbage
//! body surfaces as a protocol fault rather than a framing one.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::FramingError;

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Reads framed message bodies from an async reader.
///
/// Parses `Content-Length` headers and reads exactly that many bytes.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next frame body.
    ///
    /// Returns `Ok(None)` on EOF at a frame boundary (clean shutdown).
    /// Returns `Err` on malformed headers, oversized frames, or EOF partway
    /// through a frame.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        let content_length = match self.read_headers().await? {
            Some(len) => len,
            None => return Ok(None), // EOF
        };

        if content_length > MAX_FRAME_BYTES {
            return Err(FramingError::Oversized {
                length: content_length,
                max: MAX_FRAME_BYTES,
            });
        }

        let mut body = vec![0u8; content_length];
        let mut read = 0;
        while read < content_length {
            let n = self.reader.read(&mut body[read..]).await?;
            if n == 0 {
                return Err(FramingError::TruncatedBody {
                    expected: content_length,
                    read,
                });
            }
            read += n;
        }

        Ok(Some(body))
    }

    /// Parse headers until the empty line separator.
    ///
    /// Returns the `Content-Length` value, or `None` on EOF.
    async fn read_headers(&mut self) -> Result<Option<usize>, FramingError> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_any_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                // EOF — only valid if we haven't started reading headers at all.
                //
                // Note: `content_length == None` doesn't imply "no headers read"
                // (e.g. EOF after reading only Content-Type should be an error).
                if !saw_any_header_bytes {
                    return Ok(None);
                }
                return Err(FramingError::TruncatedHeader);
            }
            saw_any_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                // Empty line = end of headers
                break;
            }

            // LSP spec uses "Content-Length" but parse case-insensitively for robustness.
            if let Some(colon_pos) = trimmed.find(':') {
                let key = &trimmed[..colon_pos];
                if key.eq_ignore_ascii_case("Content-Length") {
                    let value = trimmed[colon_pos + 1..].trim();
                    let len: usize =
                        value
                            .parse()
                            .map_err(|_| FramingError::InvalidContentLength {
                                value: value.to_string(),
                            })?;
                    content_length = Some(len);
                }
            }
            // Ignore other headers (e.g. Content-Type)
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => Err(FramingError::MissingContentLength),
        }
    }
}

/// Writes JSON-RPC frames to an async writer.
///
/// Serializes JSON and prepends the `Content-Length` header. Header and body
/// go out as one buffer so a frame is never interleaved with a partial write.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a JSON-RPC frame with `Content-Length` header.
    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<(), FramingError> {
        let body = msg.to_string();
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(body.as_bytes());

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;

        Ok(())
    }
}
