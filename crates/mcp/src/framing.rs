//! `Content-Length` framing for the stdio transport.
//!
//! Each message is a header block terminated by `\r\n\r\n` followed by exactly
//! `Content-Length` bytes of JSON. The decoder is an explicit two-state machine
//! over the read buffer, so it works with any byte source and handles messages
//! split across reads or packed several to a read.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitingHeader,
    AwaitingBody(usize),
}

/// Codec producing one raw JSON body per frame
#[derive(Debug)]
pub struct ContentLengthCodec {
    state: DecodeState,
}

impl ContentLengthCodec {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
        }
    }
}

impl Default for ContentLengthCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ContentLengthCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        loop {
            match self.state {
                DecodeState::AwaitingHeader => {
                    let Some(end) = find(src, HEADER_TERMINATOR) else {
                        return Ok(None);
                    };
                    let header = src.split_to(end + HEADER_TERMINATOR.len());
                    match content_length(&header[..end]) {
                        Some(len) => self.state = DecodeState::AwaitingBody(len),
                        None => {
                            tracing::warn!(
                                "Discarding header block without Content-Length: {:?}",
                                String::from_utf8_lossy(&header[..end])
                            );
                        }
                    }
                }
                DecodeState::AwaitingBody(len) => {
                    if src.len() < len {
                        return Ok(None);
                    }
                    self.state = DecodeState::AwaitingHeader;
                    return Ok(Some(src.split_to(len).freeze()));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            tracing::debug!(bytes = src.len(), "Dropping incomplete message at end of input");
            src.clear();
        }
        self.state = DecodeState::AwaitingHeader;
        Ok(None)
    }
}

impl<T: Serialize> Encoder<T> for ContentLengthCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), io::Error> {
        let body = serde_json::to_vec(&item)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        dst.reserve(header.len() + body.len());
        dst.extend_from_slice(header.as_bytes());
        dst.extend_from_slice(&body);
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Value of the `Content-Length` header, if present and numeric
fn content_length(header: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(header).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
