use std::io::BufRead;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::LineCodec;
use crate::error::Result;

/// Initial line buffer size, also used for the input `BufReader`.
pub const READ_CAPACITY: usize = 8192 * 16;

/// Pulls batches of at most `batch_size` lines from a buffered source.
pub struct BatchReader<R> {
    input: R,
    codec: LineCodec,
    buffer: BytesMut,
    batch_size: usize,
    eof: bool,
}

impl<R: BufRead> BatchReader<R> {
    pub fn new(input: R, batch_size: usize) -> Self {
        BatchReader {
            input,
            codec: LineCodec::new(),
            buffer: BytesMut::with_capacity(READ_CAPACITY),
            batch_size: batch_size.max(1),
            eof: false,
        }
    }

    /// Returns the next batch in source order. The batch is shorter than
    /// `batch_size` only at the end of input and empty only once it is exhausted.
    pub fn next_batch(&mut self) -> Result<Vec<Bytes>> {
        let mut batch = Vec::with_capacity(self.batch_size.min(READ_CAPACITY));
        while batch.len() < self.batch_size {
            if let Some(line) = self.codec.decode(&mut self.buffer)? {
                batch.push(line);
                continue;
            }
            if self.eof {
                if let Some(line) = self.codec.decode_eof(&mut self.buffer)? {
                    batch.push(line);
                }
                break;
            }
            self.fill()?;
        }
        Ok(batch)
    }

    fn fill(&mut self) -> Result<()> {
        let raw_buffer = self.input.fill_buf()?;
        let amount = raw_buffer.len();
        if amount == 0 {
            self.eof = true;
            return Ok(());
        }
        self.buffer.extend_from_slice(raw_buffer);
        self.input.consume(amount);
        Ok(())
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<Vec<Bytes>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(batch) if batch.is_empty() => None,
            other => Some(other),
        }
    }
}
