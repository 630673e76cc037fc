//! Middleware chain and the background-work rendezvous primitive
//! (`spec.md` §4.5).
//!
//! A `Chain` is built once per route at registration time and walked by
//! cursor per request rather than folded into nested closures, so a
//! middleware can defer calling `next` until a background task
//! completes without needing to recreate the remaining chain.

use std::sync::Arc;

use crate::request::Req;
use crate::response::Res;
use crate::threadpool::{Task, ThreadPool};

pub type RouteFn = dyn for<'r> Fn(&mut Req<'r>, &mut Res<'r>) + Send + Sync;
pub type MiddlewareFn = dyn for<'r> Fn(&mut Req<'r>, &mut Res<'r>, &Chain<'_>) + Send + Sync;

/// The composed middleware stack for one route, shared (via `Arc`)
/// across every request that matches it.
pub struct MiddlewareInfo {
    middlewares: Arc<[Box<MiddlewareFn>]>,
    terminal: Arc<RouteFn>,
}

impl MiddlewareInfo {
    pub fn new(middlewares: Vec<Box<MiddlewareFn>>, terminal: Arc<RouteFn>) -> Self {
        MiddlewareInfo {
            middlewares: middlewares.into(),
            terminal,
        }
    }

    pub fn terminal_only(terminal: Arc<RouteFn>) -> Self {
        MiddlewareInfo {
            middlewares: Arc::from(Vec::new().into_boxed_slice()),
            terminal,
        }
    }

    /// Runs the chain from the start. Resets the request's cursor, so a
    /// `MiddlewareInfo` is safe to reuse (it is shared by every request
    /// matching this route).
    pub fn dispatch<'r>(&self, req: &mut Req<'r>, res: &mut Res<'r>) {
        req.reset_chain_cursor();
        Chain { info: self }.next(req, res);
    }
}

/// Handle a middleware uses to invoke the rest of the chain. Does not
/// call the next link itself; a middleware that never calls `next`
/// short-circuits the chain (e.g. to reject a request outright).
pub struct Chain<'a> {
    info: &'a MiddlewareInfo,
}

impl<'a> Chain<'a> {
    pub fn next<'r>(&self, req: &mut Req<'r>, res: &mut Res<'r>) {
        let idx = req.take_chain_cursor();
        match self.info.middlewares.get(idx) {
            Some(mw) => mw(req, res, self),
            None => (self.info.terminal)(req, res),
        }
    }
}

/// One queued unit of `spawn()`-submitted background work: an erased
/// closure plus the oneshot sender its result is delivered through.
struct SpawnJob {
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task for SpawnJob {
    fn run(self) {
        (self.work)()
    }
}

/// Background pool `Req::spawn` submits work to, deliberately separate
/// from the per-connection I/O worker pool: a handler blocking its own
/// connection thread on `spawn` must not also be the thread that would
/// need to pick the spawned job back up, or every worker could end up
/// parked waiting on itself.
pub struct SpawnPool {
    pool: ThreadPool<SpawnJob>,
}

impl SpawnPool {
    pub fn new(size: usize) -> Self {
        SpawnPool {
            pool: ThreadPool::new(size),
        }
    }

    /// Submits `work` to the pool and blocks the calling thread until a
    /// result comes back. This is the rendezvous `spec.md` §4.5
    /// describes: the connection-owning thread parks here, so `Req`/
    /// `Res` never need to cross an unsynchronized thread boundary.
    pub fn run<T, F>(&self, work: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        self.pool.execute(SpawnJob {
            work: Box::new(move || {
                let _ = tx.send(work());
            }),
        });
        rx.recv()
            .expect("spawn pool worker dropped without sending a result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_pool_runs_work_and_returns_result() {
        let pool = SpawnPool::new(2);
        let result = pool.run(|| 2 + 2);
        assert_eq!(result, 4);
    }

    #[test]
    fn spawn_pool_serializes_many_calls() {
        let pool = SpawnPool::new(4);
        let sum: i32 = (0..50).map(|i| pool.run(move || i * 2)).sum();
        assert_eq!(sum, (0..50).map(|i| i * 2).sum());
    }
}
