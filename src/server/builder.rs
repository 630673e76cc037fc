use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::http::Method;
use crate::middleware::{MiddlewareFn, MiddlewareInfo, RouteFn, SpawnPool};
use crate::parser::ParserLimits;
use crate::region_pool::{RegionPool, RegionPoolConfig};
use crate::router::Router;

use super::{Server, Shared, StreamSetupAction, StreamSetupFn};

const DEFAULT_THREAD_COUNT: usize = 20;
const DEFAULT_MAX_REQUEST_HEAD: usize = 8192;
const DEFAULT_EPOLL_QUEUE_MAXEVENTS: usize = 1024;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SPAWN_POOL_SIZE: usize = 8;

pub struct ServerBuilder {
    bind_addrs: Vec<SocketAddr>,
    router: Router<MiddlewareInfo>,
    stream_setup_hook: Option<Box<StreamSetupFn>>,
    thread_count: Option<usize>,
    max_request_url_size: Option<usize>,
    max_request_header_count: Option<usize>,
    max_request_body_size: Option<u64>,
    epoll_queue_max_events: usize,
    idle_timeout: Duration,
    spawn_pool_size: usize,
    region_pool: RegionPoolConfig,
}

impl ServerBuilder {
    pub fn new<A: ToSocketAddrs>(addr: A) -> io::Result<ServerBuilder> {
        let bind_addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();

        if bind_addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid address",
            ));
        }

        Ok(ServerBuilder {
            bind_addrs,
            router: Router::new(),
            stream_setup_hook: None,
            thread_count: None,
            max_request_url_size: None,
            max_request_header_count: None,
            max_request_body_size: None,
            epoll_queue_max_events: DEFAULT_EPOLL_QUEUE_MAXEVENTS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            spawn_pool_size: DEFAULT_SPAWN_POOL_SIZE,
            region_pool: RegionPoolConfig {
                preallocate: crate::config::region_prealloc(),
                low_watermark: crate::config::region_low_watermark(),
                high_watermark: crate::config::region_high_watermark(),
                grow_batch: crate::config::region_grow_batch(),
                max_pool_size: crate::config::region_max_pool_size(),
                ..RegionPoolConfig::default()
            },
        })
    }

    /// Registers a route with no middleware of its own.
    pub fn route<F>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: for<'r> Fn(&mut crate::request::Req<'r>, &mut crate::response::Res<'r>)
            + Send
            + Sync
            + 'static,
    {
        self.route_with(method, path, Vec::new(), handler)
    }

    /// Registers a route with a middleware stack that runs (in order)
    /// before `handler`, which becomes the chain's terminal link.
    pub fn route_with<F>(
        &mut self,
        method: Method,
        path: &str,
        middlewares: Vec<Box<MiddlewareFn>>,
        handler: F,
    ) -> &mut Self
    where
        F: for<'r> Fn(&mut crate::request::Req<'r>, &mut crate::response::Res<'r>)
            + Send
            + Sync
            + 'static,
    {
        let terminal: Arc<RouteFn> = Arc::new(handler);
        let info = if middlewares.is_empty() {
            MiddlewareInfo::terminal_only(terminal)
        } else {
            MiddlewareInfo::new(middlewares, terminal)
        };
        if self.router.add(&method, path, Arc::new(info)).is_err() {
            log::warn!("route {} {} uses an unsupported method, ignoring", method, path);
        }
        self
    }

    pub fn thread_count(&mut self, thread_count: usize) -> &mut Self {
        self.thread_count = Some(thread_count);
        self
    }

    pub fn stream_setup_hook<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(io::Result<TcpStream>) -> StreamSetupAction + Send + Sync + 'static,
    {
        self.stream_setup_hook = Some(Box::new(f));
        self
    }

    pub fn max_request_url_size(&mut self, value: Option<usize>) -> &mut Self {
        self.max_request_url_size = value;
        self
    }

    pub fn max_request_header_count(&mut self, value: Option<usize>) -> &mut Self {
        self.max_request_header_count = value;
        self
    }

    pub fn max_request_body_size(&mut self, value: Option<u64>) -> &mut Self {
        self.max_request_body_size = value;
        self
    }

    pub fn epoll_queue_max_events(&mut self, value: usize) -> &mut Self {
        self.epoll_queue_max_events = value;
        self
    }

    pub fn idle_timeout(&mut self, value: Duration) -> &mut Self {
        self.idle_timeout = value;
        self
    }

    pub fn spawn_pool_size(&mut self, value: usize) -> &mut Self {
        self.spawn_pool_size = value;
        self
    }

    pub fn region_pool(&mut self, config: RegionPoolConfig) -> &mut Self {
        self.region_pool = config;
        self
    }

    pub fn build(self) -> Server {
        let default_limits = ParserLimits::default();
        let limits = ParserLimits {
            max_url_len: self
                .max_request_url_size
                .unwrap_or(default_limits.max_url_len),
            max_header_count: self
                .max_request_header_count
                .unwrap_or(default_limits.max_header_count),
            max_body_len: self
                .max_request_body_size
                .unwrap_or(default_limits.max_body_len),
            ..default_limits
        };

        Server {
            bind_addrs: self.bind_addrs,
            thread_count: self.thread_count.unwrap_or(DEFAULT_THREAD_COUNT),
            stream_setup_hook: self.stream_setup_hook,
            shared: Arc::new(Shared {
                router: self.router,
                region_pool: RegionPool::new(self.region_pool),
                spawn_pool: Arc::new(SpawnPool::new(self.spawn_pool_size)),
                limits,
            }),
            epoll_queue_max_events: self.epoll_queue_max_events,
            idle_timeout: self.idle_timeout,
        }
    }
}
