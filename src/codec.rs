use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Frames a byte stream into `\n` terminated lines. The delimiter is dropped,
/// everything else (including a `\r`) stays in the line. No UTF-8 validation.
pub struct LineCodec {
    // bytes before this offset are known to contain no newline
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        LineCodec { next_index: 0 }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        let newline_offset = buf[self.next_index..].iter().position(|b| *b == b'\n');

        match newline_offset {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                let mut line = buf.split_to(newline_index + 1);
                line.truncate(newline_index);
                Ok(Some(line.freeze()))
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        Ok(match self.decode(buf)? {
            Some(frame) => Some(frame),
            None => {
                // No terminating newline - return remaining data, if any
                self.next_index = 0;
                if buf.is_empty() {
                    None
                } else {
                    Some(buf.split().freeze())
                }
            }
        })
    }
}
