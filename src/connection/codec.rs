// src/connection/codec.rs

//! The wire codec: splits the inbound byte stream into UTF-8 commands and encodes
//! acknowledgements.

use crate::config::Framing;
use crate::core::NexronError;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Decodes commands according to the configured `Framing`.
///
/// Under `Framing::Chunk` every decode call yields whatever is buffered (up to
/// `max_length` bytes), which makes one socket read one command. Under
/// `Framing::Line` commands end at `\n` and an optional trailing `\r` is dropped.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    framing: Framing,
    max_length: usize,
    /// Where the newline search resumes under line framing.
    next_index: usize,
}

impl CommandCodec {
    pub fn new(framing: Framing, max_length: usize) -> Self {
        Self {
            framing,
            max_length,
            next_index: 0,
        }
    }

    fn decode_chunk(&mut self, src: &mut BytesMut) -> Result<Option<String>, NexronError> {
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len().min(self.max_length);
        match std::str::from_utf8(&src[..len]) {
            Ok(_) => Ok(Some(into_string(src.split_to(len)))),
            // A multi-byte character cut at the end of the chunk: emit the complete
            // prefix now and keep the partial character for the next read.
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                if valid == 0 {
                    Ok(None)
                } else {
                    Ok(Some(into_string(src.split_to(valid))))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn decode_line(&mut self, src: &mut BytesMut) -> Result<Option<String>, NexronError> {
        let read_to = src.len().min(self.max_length + 1);
        let newline = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                let mut line = src.split_to(newline_index + 1);
                line.truncate(newline_index);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                std::str::from_utf8(&line)?;
                Ok(Some(into_string(line)))
            }
            None if src.len() > self.max_length => Err(NexronError::CommandTooLong(self.max_length)),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }
}

/// Converts bytes already validated as UTF-8 into a `String`.
fn into_string(bytes: BytesMut) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

impl Decoder for CommandCodec {
    type Item = String;
    type Error = NexronError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framing {
            Framing::Chunk => self.decode_chunk(src),
            Framing::Line => self.decode_line(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // An unterminated final line, or a truncated character at end of stream.
        self.next_index = 0;
        let rest = src.split();
        std::str::from_utf8(&rest)?;
        Ok(Some(into_string(rest)))
    }
}

impl Encoder<String> for CommandCodec {
    type Error = NexronError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        if self.framing == Framing::Line {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}
