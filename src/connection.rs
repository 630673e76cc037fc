//! Per-connection runtime (`spec.md` §4.9). Grounded on the reference
//! crate's `server::epoll::Connection` plus `handle_connection`/
//! `handle_one_request`: owns the accepted socket, its own `Region`, an
//! incremental parser, and drives one request to completion per call to
//! `on_readable`.
//!
//! Unlike the reference crate's `BodyReader`, which exposed an
//! in-progress body straight to the handler as a blocking `Read`, this
//! runtime buffers (or streams into a registered sink) the full body
//! before invoking the dispatcher — the worker thread that owns this
//! connection processes one message synchronously per `spec.md` §5's
//! "only one request in flight per connection" invariant, so there is
//! no benefit to calling the handler before the message is complete.

use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::body::BodyStream;
use crate::dispatcher::{self, DispatchOutcome};
use crate::http::Status;
use crate::middleware::{MiddlewareInfo, SpawnPool};
use crate::parser::{Head, HttpParsingError, ParseOutcome, ParserContext, ParserLimits};
use crate::region::Region;
use crate::response::Res;
use crate::router::Router;

const READ_CHUNK: usize = 64 * 1024;

pub struct ConnectionMeta {
    index: usize,
    conn_start: Instant,
}

impl ConnectionMeta {
    pub fn new() -> Self {
        ConnectionMeta {
            index: 0,
            conn_start: Instant::now(),
        }
    }

    pub fn increment(&mut self) {
        self.index = self.index.wrapping_add(1);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn conn_start(&self) -> Instant {
        self.conn_start
    }
}

impl Default for ConnectionMeta {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Connection {
    stream: TcpStream,
    region: Region,
    parser: ParserContext,
    limits: ParserLimits,
    head: Option<Head>,
    body: Option<BodyStream>,
    meta: ConnectionMeta,
    /// Seconds since the Unix epoch, updated on every read. An `AtomicU64`
    /// rather than a plain `Instant` so the epoll idle reaper (running on
    /// its own thread) can read it without racing the worker that owns
    /// this connection while a request is in flight.
    last_activity: AtomicU64,
}

impl Connection {
    pub fn new(stream: TcpStream, region: Region, limits: ParserLimits) -> Self {
        Connection {
            stream,
            region,
            parser: ParserContext::new(limits.clone()),
            limits,
            head: None,
            body: None,
            meta: ConnectionMeta::new(),
            last_activity: AtomicU64::new(now_epoch_secs()),
        }
    }

    /// Seconds since the Unix epoch at which this connection last read
    /// any bytes.
    pub fn last_activity_secs(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.last_activity.store(now_epoch_secs(), Ordering::Relaxed);
    }

    pub fn meta(&self) -> &ConnectionMeta {
        &self.meta
    }

    pub fn into_region(self) -> Region {
        self.region
    }

    /// Reads whatever is currently available and drives it through the
    /// parser, dispatching a complete message if one results. `Ok(true)`
    /// keeps the connection open for the next request (or more of this
    /// one); `Ok(false)` means the caller should close it.
    pub fn on_readable(
        &mut self,
        router: &Router<MiddlewareInfo>,
        spawn_pool: &Arc<SpawnPool>,
    ) -> io::Result<bool> {
        let mut buf = [0u8; READ_CHUNK];
        let n = match self.stream.read(&mut buf) {
            Ok(0) => return Ok(false),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
            // A blocking accept-loop connection (`server::serve`) sets a
            // read timeout as its idle-cleanup mechanism; epoll sockets
            // never set one; both treat a stall as an orderly close.
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(false),
            Err(e) => return Err(e),
        };
        self.touch();

        match self.parser.feed(&buf[..n]) {
            Ok(ParseOutcome::NeedMore) => Ok(true),
            Ok(ParseOutcome::HeadComplete { head, body_prefix }) => {
                let mut body = new_body_stream(&head, self.limits.max_body_len);
                let done = body.feed(&body_prefix).map_err(to_io_error)?;
                self.meta.increment();
                self.head = Some(head);
                self.body = Some(body);
                if done {
                    self.parser.mark_body_complete();
                    self.finish_message(router, spawn_pool)
                } else {
                    Ok(true)
                }
            }
            Ok(ParseOutcome::BodyChunk(chunk)) => {
                let mut body = self.body.take().expect("body chunk delivered without a head");
                let done = body.feed(&chunk).map_err(to_io_error)?;
                if done {
                    self.parser.mark_body_complete();
                    self.body = Some(body);
                    self.finish_message(router, spawn_pool)
                } else {
                    self.body = Some(body);
                    Ok(true)
                }
            }
            Ok(ParseOutcome::MessageComplete) => self.finish_message(router, spawn_pool),
            Err(e) => {
                self.write_error_and_close(status_for_parse_error(&e));
                Ok(false)
            }
        }
    }

    fn finish_message(
        &mut self,
        router: &Router<MiddlewareInfo>,
        spawn_pool: &Arc<SpawnPool>,
    ) -> io::Result<bool> {
        let head = self
            .head
            .take()
            .expect("finish_message called without a parsed head");
        let body = self.body.take().unwrap_or_else(BodyStream::new_empty);

        let outcome = dispatcher::dispatch(
            router,
            &head,
            &self.region,
            &mut self.stream,
            body,
            spawn_pool.clone(),
        );

        self.parser.reset();
        self.region.reset();

        match outcome {
            DispatchOutcome::KeepAlive => Ok(true),
            DispatchOutcome::Close => Ok(false),
        }
    }

    fn write_error_and_close(&mut self, status: Status) {
        let mut res = Res::new(&mut self.stream);
        res.headers_mut().set_connection_close();
        let _ = res.send(status, io::empty());
    }
}

/// Writes a best-effort 500 response and lets the stream drop, for when
/// the region pool is exhausted before a `Connection` (which owns a
/// `Region`) can even be built (`spec.md` §4.2, §4.7 step 1).
pub(crate) fn respond_pool_exhausted(stream: &mut TcpStream) {
    let mut res = Res::new(stream);
    res.headers_mut().set_connection_close();
    let _ = res.send(Status::of(500), io::empty());
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn new_body_stream(head: &Head, limit: u64) -> BodyStream {
    if head.chunked {
        BodyStream::new_chunked(limit)
    } else if let Some(n) = head.content_length.filter(|&n| n > 0) {
        BodyStream::new_fixed(n, limit)
    } else {
        BodyStream::new_empty()
    }
}

fn to_io_error(e: crate::body::BodyError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

fn status_for_parse_error(e: &HttpParsingError) -> Status {
    match e {
        // Only an oversized body gets 413; URL/header size limits (and
        // every other malformed-head case) are 400 per `spec.md` §7.
        HttpParsingError::BodyTooLarge => Status::of(413),
        _ => Status::of(400),
    }
}
