//! Per-request response handle (`spec.md` §4.8). Grounded on the
//! reference crate's `server::ResponseHandle`: owns the connection's
//! socket for the duration of the request and writes through
//! `HttpPrinter`, but accumulates headers first so middleware can add to
//! them before the terminal handler decides on a status and body.

use std::io::{self, Read};
use std::net::TcpStream;

use crate::http::{Headers, Status};
use crate::printer::{HttpPrinter, PrintError};

pub struct Res<'r> {
    printer: HttpPrinter<&'r mut TcpStream>,
    headers: Headers<'r>,
    keep_alive: bool,
}

impl<'r> Res<'r> {
    pub fn new(stream: &'r mut TcpStream) -> Self {
        Res {
            printer: HttpPrinter::new(stream),
            headers: Headers::new(),
            keep_alive: true,
        }
    }

    pub fn set_header<N, V>(&mut self, name: N, value: V) -> &mut Self
    where
        N: Into<std::borrow::Cow<'r, str>>,
        V: Into<std::borrow::Cow<'r, [u8]>>,
    {
        self.headers.add(name, value);
        self
    }

    pub fn headers_mut(&mut self) -> &mut Headers<'r> {
        &mut self.headers
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn ok(&mut self, body: impl Read) -> io::Result<()> {
        self.send(Status::of(200), body)
    }

    /// Sets `Location` and writes the status's own reason phrase as the
    /// body. `spec.md` §4.8 requires CR/LF in `url` to be rejected; the
    /// header writer already does this for every header value, failing
    /// the request with 500 instead of letting it through.
    pub fn redirect<V>(&mut self, status: Status, url: V) -> io::Result<()>
    where
        V: Into<std::borrow::Cow<'r, [u8]>>,
    {
        self.headers.add("location", url);
        let body = status.reason.to_string();
        self.send(status, body.as_bytes())
    }

    /// Sets `Content-Type` and writes `body`; every content-typed helper
    /// below funnels through this one path (`spec.md` §6).
    pub fn reply(
        &mut self,
        status: Status,
        content_type: &'static str,
        body: impl Read,
    ) -> io::Result<()> {
        self.headers.add(Headers::CONTENT_TYPE, content_type.as_bytes());
        self.send(status, body)
    }

    pub fn text(&mut self, status: Status, body: impl Read) -> io::Result<()> {
        self.reply(status, "text/plain; charset=utf-8", body)
    }

    pub fn html(&mut self, status: Status, body: impl Read) -> io::Result<()> {
        self.reply(status, "text/html; charset=utf-8", body)
    }

    pub fn json(&mut self, status: Status, body: impl Read) -> io::Result<()> {
        self.reply(status, "application/json", body)
    }

    pub fn cbor(&mut self, status: Status, body: impl Read) -> io::Result<()> {
        self.reply(status, "application/cbor", body)
    }

    pub fn send(&mut self, status: Status, body: impl Read) -> io::Result<()> {
        let headers = std::mem::replace(&mut self.headers, Headers::new());
        if headers.is_connection_close() {
            self.keep_alive = false;
        }
        match self.printer.write_response(&status, headers, body) {
            Ok(()) => Ok(()),
            Err(PrintError::Io(e)) => Err(e),
            // A handler-supplied header contained a control character.
            // Nothing reached the wire yet, so fail the request with a
            // clean 500 instead of the original response (`spec.md` §4.8).
            Err(PrintError::InvalidHeader) => {
                self.keep_alive = false;
                match self
                    .printer
                    .write_response(&Status::of(500), Headers::new_nodate(), io::empty())
                {
                    Ok(()) => Ok(()),
                    Err(PrintError::Io(e)) => Err(e),
                    Err(PrintError::InvalidHeader) => {
                        unreachable!("fallback 500 response carries no handler headers")
                    }
                }
            }
        }
    }

    pub fn send_100_continue(&mut self) -> io::Result<()> {
        self.printer.write_100_continue()
    }

    pub fn get_stream_mut(&mut self) -> &mut TcpStream {
        self.printer.stream_mut()
    }
}
