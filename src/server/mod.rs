//! Server runtime and shared configuration (`spec.md` §4.9-4.10).
//! Grounded on the reference crate's `server::{Server, handle_connection}`
//! blocking accept loop; the epoll-based loop lives in `epoll.rs` and the
//! builder in `builder.rs`.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{respond_pool_exhausted, Connection};
use crate::middleware::{MiddlewareInfo, SpawnPool};
use crate::parser::ParserLimits;
use crate::region_pool::RegionPool;
use crate::router::Router;
use crate::threadpool::{Task, ThreadPool};

mod builder;
#[cfg(feature = "epoll")]
mod epoll;

pub use builder::ServerBuilder;
pub use crate::connection::ConnectionMeta;

pub type StreamSetupFn = dyn Fn(io::Result<TcpStream>) -> StreamSetupAction + Send + Sync;

pub enum StreamSetupAction {
    Proceed(TcpStream),
    Drop,
    StopAccepting,
}

/// Everything a connection needs to dispatch a request, shared across
/// every connection the server accepts.
struct Shared {
    router: Router<MiddlewareInfo>,
    region_pool: RegionPool,
    spawn_pool: Arc<SpawnPool>,
    limits: ParserLimits,
}

pub struct Server {
    bind_addrs: Vec<SocketAddr>,
    thread_count: usize,
    stream_setup_hook: Option<Box<StreamSetupFn>>,
    shared: Arc<Shared>,
    epoll_queue_max_events: usize,
    idle_timeout: Duration,
}

impl Server {
    pub fn builder<A: ToSocketAddrs>(addr: A) -> io::Result<ServerBuilder> {
        ServerBuilder::new(addr)
    }

    pub fn bind_addrs(&self) -> &Vec<SocketAddr> {
        &self.bind_addrs
    }

    /// Runs a blocking accept loop: one worker-pool job per accepted
    /// connection, looping `Connection::on_readable` until the peer
    /// closes or the idle read timeout fires. Used on non-Linux targets
    /// and whenever the `epoll` feature is disabled.
    pub fn serve(self) -> io::Result<()> {
        let listener = TcpListener::bind(&*self.bind_addrs)?;
        let pool: ThreadPool<ConnJob> = ThreadPool::new(self.thread_count);

        for stream in listener.incoming() {
            let stream = match &self.stream_setup_hook {
                Some(hook) => match (hook)(stream) {
                    StreamSetupAction::Proceed(s) => s,
                    StreamSetupAction::Drop => continue,
                    StreamSetupAction::StopAccepting => break,
                },
                None => match stream {
                    Ok(s) => s,
                    Err(_) => continue,
                },
            };
            let _ = stream.set_nodelay(true);
            let _ = stream.set_read_timeout(Some(self.idle_timeout));

            pool.execute(ConnJob {
                stream,
                shared: self.shared.clone(),
            });
        }
        Ok(())
    }

    #[cfg(feature = "epoll")]
    pub fn serve_epoll(self) -> io::Result<()> {
        epoll::run(self)
    }
}

struct ConnJob {
    stream: TcpStream,
    shared: Arc<Shared>,
}

impl Task for ConnJob {
    fn run(self) {
        let ConnJob { mut stream, shared } = self;
        let region = match shared.region_pool.acquire() {
            Some(region) => region,
            None => {
                respond_pool_exhausted(&mut stream);
                return;
            }
        };
        let mut conn = Connection::new(stream, region, shared.limits);
        loop {
            match conn.on_readable(&shared.router, &shared.spawn_pool) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => break,
            }
        }
        shared.region_pool.release(conn.into_region());
    }
}
