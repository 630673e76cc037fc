//! emberhttp: a small, dependency-light HTTP/1.1 server toolkit built
//! around a bump-allocated per-request arena, an incremental parser, and
//! an epoll-driven connection runtime on Linux (with a blocking
//! thread-per-connection fallback everywhere else).

mod body;
mod body_reader;
#[cfg(feature = "cluster")]
mod cluster;
mod config;
mod connection;
mod context;
mod date;
mod dispatcher;
mod error;
mod http;
mod middleware;
mod parser;
mod printer;
mod region;
mod region_pool;
mod request;
mod response;
mod router;
mod server;
mod threadpool;

pub use body::{BodyControl, BodyError, BodyStream};
pub use context::Context;
pub use error::{ClusterError, DispatchError, ServerError};
pub use http::{Headers, Method, RequestUri, Status};
pub use middleware::{Chain, MiddlewareFn, MiddlewareInfo, RouteFn};
pub use parser::{HttpParsingError, ParserLimits};
pub use region_pool::{RegionPoolConfig, RegionPoolStats};
pub use request::{Req, RouteParam};
pub use response::Res;
pub use router::{Lookup, Router};
pub use server::{
    ConnectionMeta, Server, ServerBuilder, StreamSetupAction, StreamSetupFn,
};

#[cfg(feature = "cluster")]
pub use cluster::{
    cpu_count, is_master, is_worker, run_master, signal_workers, wait_workers, worker_count,
    worker_id, worker_identity, ClusterConfig,
};
