//! Request body ingestion: size-capped buffering by default, or
//! registered streaming with pause/resume backpressure (`spec.md` §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::body_reader::{ChunkedDecoder, Decoded};
use crate::parser::HttpParsingError;

/// Shared pause flag the connection runtime checks before re-arming
/// epoll read-interest for this connection. Cloning it into a handler's
/// closure lets the handler pause ingestion from inside an `on_data`
/// callback and resume it later (e.g. once a downstream write buffer
/// drains) without reaching back into connection internals.
#[derive(Clone)]
pub struct BodyControl {
    paused: Arc<AtomicBool>,
}

impl BodyControl {
    fn new() -> Self {
        BodyControl {
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

pub type OnDataFn = Box<dyn FnMut(&[u8], &BodyControl) + Send>;
pub type OnEndFn = Box<dyn FnOnce(&BodyControl) + Send>;

enum Framing {
    Fixed { remaining: u64 },
    Chunked(ChunkedDecoder),
    None,
}

enum Sink {
    /// No streaming consumer registered: bytes accumulate here, capped at
    /// `limit`, and are handed to the handler as `&[u8]` once complete.
    Buffered(Vec<u8>),
    /// A consumer registered via `Req::on_body_data` before the body
    /// started arriving; bytes are pushed as they're decoded instead of
    /// buffered.
    Streaming { on_data: OnDataFn, on_end: Option<OnEndFn> },
}

pub struct BodyStream {
    framing: Framing,
    sink: Sink,
    limit: u64,
    delivered: u64,
    control: BodyControl,
    done: bool,
}

#[derive(Debug)]
pub enum BodyError {
    LimitExceeded,
    Framing(std::io::Error),
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::LimitExceeded => write!(f, "body exceeds configured limit"),
            BodyError::Framing(e) => write!(f, "chunked framing error: {}", e),
        }
    }
}
impl std::error::Error for BodyError {}

impl From<BodyError> for HttpParsingError {
    fn from(_: BodyError) -> Self {
        HttpParsingError::BodyTooLarge
    }
}

impl BodyStream {
    pub fn new_fixed(len: u64, limit: u64) -> Self {
        BodyStream {
            framing: Framing::Fixed { remaining: len },
            sink: Sink::Buffered(Vec::with_capacity(len.min(limit) as usize)),
            limit,
            delivered: 0,
            control: BodyControl::new(),
            done: len == 0,
        }
    }

    pub fn new_chunked(limit: u64) -> Self {
        BodyStream {
            framing: Framing::Chunked(ChunkedDecoder::new()),
            sink: Sink::Buffered(Vec::new()),
            limit,
            delivered: 0,
            control: BodyControl::new(),
            done: false,
        }
    }

    pub fn new_empty() -> Self {
        BodyStream {
            framing: Framing::None,
            sink: Sink::Buffered(Vec::new()),
            limit: 0,
            delivered: 0,
            control: BodyControl::new(),
            done: true,
        }
    }

    pub fn control(&self) -> BodyControl {
        self.control.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Switches from the default buffering sink to a streaming consumer.
    /// Per `spec.md` §4.6, registering after some bytes have already
    /// buffered synthesizes a first `on_data` call with everything
    /// buffered so far before live bytes start flowing.
    pub fn set_streaming(&mut self, mut on_data: OnDataFn, on_end: OnEndFn) {
        if let Sink::Buffered(buf) = &mut self.sink {
            if !buf.is_empty() {
                on_data(buf, &self.control);
            }
        }
        let on_end = if self.done {
            on_end(&self.control);
            None
        } else {
            Some(on_end)
        };
        self.sink = Sink::Streaming { on_data, on_end };
    }

    /// Feeds newly-read raw bytes (still chunk-framed, if applicable)
    /// through to the sink. Returns `true` once the body is fully
    /// consumed.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<bool, BodyError> {
        if self.done {
            return Ok(true);
        }
        // `deliver`/`finish` take their fields by reference rather than
        // `&mut self` so they can be called while `framing` is still
        // mutably borrowed for `remaining`/`decoder` below.
        match &mut self.framing {
            Framing::None => {
                finish(&mut self.done, &mut self.sink, &self.control);
            }
            Framing::Fixed { remaining } => {
                let take = (*remaining as usize).min(bytes.len());
                deliver(
                    &mut self.sink,
                    &mut self.delivered,
                    self.limit,
                    &self.control,
                    &bytes[..take],
                )?;
                *remaining -= take as u64;
                if *remaining == 0 {
                    finish(&mut self.done, &mut self.sink, &self.control);
                }
            }
            Framing::Chunked(decoder) => loop {
                match decoder.feed(bytes).map_err(BodyError::Framing)? {
                    Decoded::NeedMore => break,
                    Decoded::Data(data) => {
                        deliver(
                            &mut self.sink,
                            &mut self.delivered,
                            self.limit,
                            &self.control,
                            &data,
                        )?;
                    }
                    Decoded::Done => {
                        finish(&mut self.done, &mut self.sink, &self.control);
                        break;
                    }
                }
                if self.done {
                    break;
                }
            },
        }
        Ok(self.done)
    }

    /// The fully-buffered body, if no streaming consumer was registered
    /// and the body is complete.
    pub fn buffered(&self) -> Option<&[u8]> {
        match &self.sink {
            Sink::Buffered(buf) if self.done => Some(buf),
            _ => None,
        }
    }
}

fn deliver(
    sink: &mut Sink,
    delivered: &mut u64,
    limit: u64,
    control: &BodyControl,
    data: &[u8],
) -> Result<(), BodyError> {
    *delivered += data.len() as u64;
    if *delivered > limit {
        return Err(BodyError::LimitExceeded);
    }
    match sink {
        Sink::Buffered(buf) => buf.extend_from_slice(data),
        Sink::Streaming { on_data, .. } => on_data(data, control),
    }
    Ok(())
}

fn finish(done: &mut bool, sink: &mut Sink, control: &BodyControl) {
    *done = true;
    if let Sink::Streaming { on_end, .. } = sink {
        if let Some(f) = on_end.take() {
            f(control);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_body_buffers_until_done() {
        let mut b = BodyStream::new_fixed(5, 1024);
        assert!(!b.feed(b"hel").unwrap());
        assert!(b.feed(b"lo").unwrap());
        assert_eq!(b.buffered(), Some(&b"hello"[..]));
    }

    #[test]
    fn fixed_body_over_limit_errors() {
        let mut b = BodyStream::new_fixed(10, 4);
        let err = b.feed(b"hello").unwrap_err();
        assert!(matches!(err, BodyError::LimitExceeded));
    }

    #[test]
    fn chunked_body_decodes_and_completes() {
        let mut b = BodyStream::new_chunked(1024);
        assert!(b.feed(b"5\r\nhello\r\n0\r\n\r\n").unwrap());
        assert_eq!(b.buffered(), Some(&b"hello"[..]));
    }

    #[test]
    fn streaming_sink_receives_already_buffered_prefix() {
        let mut b = BodyStream::new_fixed(5, 1024);
        b.feed(b"hel").unwrap();
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let received2 = received.clone();
        b.set_streaming(
            Box::new(move |data, _ctrl| received2.lock().unwrap().extend_from_slice(data)),
            Box::new(|_ctrl| {}),
        );
        assert_eq!(&received.lock().unwrap()[..], b"hel");
        b.feed(b"lo").unwrap();
        assert_eq!(&received.lock().unwrap()[..], b"hello");
    }

    #[test]
    fn pause_flag_round_trips_through_control() {
        let b = BodyStream::new_empty();
        let ctrl = b.control();
        assert!(!ctrl.is_paused());
        ctrl.pause();
        assert!(b.is_paused());
        ctrl.resume();
        assert!(!b.is_paused());
    }
}
