//! Incremental (push-style) chunked-transfer-encoding decoder.
//!
//! The reference crate's `ChunkedReader` pulled bytes through a blocking
//! `BufRead`; this core's connection runtime is non-blocking (epoll-driven),
//! so bytes arrive a read() at a time and may split a chunk-size line or a
//! chunk body anywhere. `ChunkedDecoder` keeps the same state machine
//! (`ReadSize` / `ReadData` / `ReadCrlfAfterChunk` / `Done`) but is fed via
//! `feed`, buffering only the undigested tail between calls.

use std::io;

enum ChunkState {
    ReadSize,
    ReadData { remaining: u64 },
    ReadCrlfAfterChunk,
    Trailers,
    Done,
}

pub struct ChunkedDecoder {
    state: ChunkState,
    carry: Vec<u8>,
}

pub enum Decoded {
    /// Not enough buffered bytes to make progress; call `feed` again.
    NeedMore,
    /// A slice of decoded chunk payload, plus how many of this call's
    /// input bytes were consumed producing it.
    Data(Vec<u8>),
    /// The terminating `0\r\n` chunk and any trailers have been consumed.
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: ChunkState::ReadSize,
            carry: Vec::new(),
        }
    }

    /// Feeds newly-read bytes in. May be called repeatedly with
    /// incomplete chunk framing; leftover bytes are retained internally.
    /// Returns `(Decoded, consumed)` where `consumed` is always
    /// `bytes.len()` once merged into `carry` — callers should loop until
    /// `NeedMore` before reading more off the socket.
    pub fn feed(&mut self, bytes: &[u8]) -> io::Result<Decoded> {
        self.carry.extend_from_slice(bytes);
        self.step()
    }

    fn step(&mut self) -> io::Result<Decoded> {
        loop {
            match &mut self.state {
                ChunkState::ReadSize => {
                    let Some(nl) = find_crlf(&self.carry) else {
                        return Ok(Decoded::NeedMore);
                    };
                    let line = &self.carry[..nl];
                    let hex = std::str::from_utf8(line)
                        .ok()
                        .and_then(|s| s.split(';').next())
                        .ok_or_else(|| bad_chunk("non-utf8 chunk size line"))?;
                    let size = u64::from_str_radix(hex.trim(), 16)
                        .map_err(|_| bad_chunk("invalid chunk size"))?;
                    self.carry.drain(..nl + 2);
                    self.state = if size == 0 {
                        ChunkState::Trailers
                    } else {
                        ChunkState::ReadData { remaining: size }
                    };
                }
                ChunkState::ReadData { remaining } => {
                    if *remaining == 0 {
                        self.state = ChunkState::ReadCrlfAfterChunk;
                        continue;
                    }
                    if self.carry.is_empty() {
                        return Ok(Decoded::NeedMore);
                    }
                    let take = (*remaining as usize).min(self.carry.len());
                    let data: Vec<u8> = self.carry.drain(..take).collect();
                    *remaining -= take as u64;
                    return Ok(Decoded::Data(data));
                }
                ChunkState::ReadCrlfAfterChunk => {
                    if self.carry.len() < 2 {
                        return Ok(Decoded::NeedMore);
                    }
                    if &self.carry[..2] != b"\r\n" {
                        return Err(bad_chunk("missing CRLF after chunk data"));
                    }
                    self.carry.drain(..2);
                    self.state = ChunkState::ReadSize;
                }
                ChunkState::Trailers => {
                    let Some(nl) = find_crlf(&self.carry) else {
                        return Ok(Decoded::NeedMore);
                    };
                    let blank = nl == 0;
                    self.carry.drain(..nl + 2);
                    if blank {
                        self.state = ChunkState::Done;
                        return Ok(Decoded::Done);
                    }
                }
                ChunkState::Done => return Ok(Decoded::Done),
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn bad_chunk(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_chunk_fed_whole() {
        let mut d = ChunkedDecoder::new();
        let msg = b"5\r\nhello\r\n0\r\n\r\n";
        let mut collected = Vec::new();
        let mut rest: &[u8] = msg;
        loop {
            match d.feed(rest).unwrap() {
                Decoded::Data(data) => {
                    collected.extend_from_slice(&data);
                    rest = &[];
                }
                Decoded::Done => break,
                Decoded::NeedMore => break,
            }
        }
        assert_eq!(collected, b"hello");
    }

    #[test]
    fn decodes_chunk_split_across_feeds() {
        let mut d = ChunkedDecoder::new();
        assert!(matches!(d.feed(b"5\r\nhel").unwrap(), Decoded::Data(ref v) if v == b"hel"));
        assert!(matches!(d.feed(b"lo\r\n").unwrap(), Decoded::Data(ref v) if v == b"lo"));
        assert!(matches!(d.feed(b"0\r\n\r\n").unwrap(), Decoded::Done));
    }

    #[test]
    fn rejects_missing_crlf_after_chunk() {
        let mut d = ChunkedDecoder::new();
        assert!(matches!(d.feed(b"3\r\nabcXX").unwrap(), Decoded::Data(ref v) if v == b"abc"));
        assert!(d.feed(b"").is_err());
    }
}
