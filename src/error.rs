//! Shared error types (`spec.md` §7). Plain enums with hand-rolled
//! `Display`/`Error` impls, matching the reference crate's
//! `HttpParsingError` texture rather than pulling in `thiserror`.

use std::fmt;
use std::io;

use crate::body::BodyError;
use crate::parser::HttpParsingError;

#[derive(Debug)]
pub enum DispatchError {
    Parsing(HttpParsingError),
    Body(BodyError),
    HandlerIo(io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Parsing(e) => write!(f, "parse error: {}", e),
            DispatchError::Body(e) => write!(f, "body error: {}", e),
            DispatchError::HandlerIo(e) => write!(f, "handler io error: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<HttpParsingError> for DispatchError {
    fn from(e: HttpParsingError) -> Self {
        DispatchError::Parsing(e)
    }
}

impl From<BodyError> for DispatchError {
    fn from(e: BodyError) -> Self {
        DispatchError::Body(e)
    }
}

impl From<io::Error> for DispatchError {
    fn from(e: io::Error) -> Self {
        DispatchError::HandlerIo(e)
    }
}

#[derive(Debug)]
pub enum ServerError {
    Bind(io::Error),
    Epoll(io::Error),
    Io(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind(e) => write!(f, "failed to bind listener: {}", e),
            ServerError::Epoll(e) => write!(f, "epoll setup failed: {}", e),
            ServerError::Io(e) => write!(f, "server io error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

#[derive(Debug)]
pub enum ClusterError {
    Fork(io::Error),
    Exec(io::Error),
    InvalidWorkerCount(String),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::Fork(e) => write!(f, "fork failed: {}", e),
            ClusterError::Exec(e) => write!(f, "exec failed: {}", e),
            ClusterError::InvalidWorkerCount(s) => write!(f, "invalid worker count: {}", s),
        }
    }
}

impl std::error::Error for ClusterError {}
