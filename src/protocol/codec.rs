//! ASCII codec for Tokio.
//!
//! An `Encoder`/`Decoder` pair with an internal decode-state enum so a
//! connection can resume mid-frame across partial reads: one state
//! waits for a command line, the other waits for a storage command's
//! fixed-length data block.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::command::{parse_line, Command, ParsedLine, PendingStorage};
use super::error::ProtocolError;
use super::response::Response;

/// Lines longer than this without a terminator are treated as a
/// protocol violation rather than buffered forever.
const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Line,
    Data(PendingStorage),
}

#[derive(Debug, Default)]
pub struct AsciiCodec {
    state: DecodeState,
}

impl AsciiCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_line(src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if let Some(pos) = src.windows(2).position(|w| w == b"\r\n") {
            let line = src.split_to(pos).freeze();
            src.advance(2); // the \r\n
            return Ok(Some(line));
        }
        if src.len() > MAX_LINE_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "command line too long"));
        }
        Ok(None)
    }
}

impl Decoder for AsciiCodec {
    type Item = Result<Command, ProtocolError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match &self.state {
                DecodeState::Line => {
                    let Some(line) = Self::take_line(src)? else {
                        return Ok(None);
                    };
                    let text = match std::str::from_utf8(&line) {
                        Ok(text) => text,
                        Err(_) => return Ok(Some(Err(ProtocolError::MalformedLine))),
                    };
                    match parse_line(text) {
                        Ok(ParsedLine::Complete(command)) => return Ok(Some(Ok(command))),
                        Ok(ParsedLine::NeedsData(pending)) => {
                            self.state = DecodeState::Data(pending);
                            // loop again: the data block may already be buffered
                        }
                        Err(err) => return Ok(Some(Err(err))),
                    }
                }
                DecodeState::Data(pending) => {
                    let need = pending.bytes as usize + 2;
                    if src.len() < need {
                        return Ok(None);
                    }
                    let chunk = src.split_to(need);
                    let bytes = pending.bytes as usize;
                    let malformed = &chunk[bytes..] != b"\r\n";
                    let data = Bytes::copy_from_slice(&chunk[..bytes]);
                    let pending = match std::mem::take(&mut self.state) {
                        DecodeState::Data(pending) => pending,
                        DecodeState::Line => unreachable!("state checked above"),
                    };
                    self.state = DecodeState::Line;
                    if malformed {
                        return Ok(Some(Err(ProtocolError::BadDataChunk)));
                    }
                    return Ok(Some(Ok(pending.into_command(data))));
                }
            }
        }
    }
}

impl Encoder<Response> for AsciiCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}
