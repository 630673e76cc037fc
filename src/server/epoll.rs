#![cfg(feature = "epoll")]
#[cfg(all(
    feature = "epoll",
    not(all(target_os = "linux", target_pointer_width = "64"))
))]
compile_error!("feature `epoll` requires Linux on a 64-bit target.");

use super::{Server, Shared, StreamSetupAction};
use crate::connection::{respond_pool_exhausted, Connection};
use crate::threadpool::{Task, ThreadPool};

use libc::{
    epoll_create1, epoll_ctl, epoll_event, epoll_wait, eventfd, write, EFD_CLOEXEC, EFD_NONBLOCK,
    EPOLLET, EPOLLIN, EPOLLRDHUP, EPOLL_CTL_ADD, EPOLL_CTL_DEL,
};
use std::mem::size_of;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{io, mem, thread};

#[repr(u8)]
#[derive(Copy, Clone, PartialEq)]
enum ConnState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

#[inline]
fn load_state(a: &AtomicU8, order: Ordering) -> ConnState {
    match a.load(order) {
        0 => ConnState::Open,
        1 => ConnState::Closing,
        _ => ConnState::Closed,
    }
}

#[inline]
fn store_state(a: &AtomicU8, s: ConnState, order: Ordering) {
    a.store(s as u8, order);
}

#[repr(align(64))]
struct Handle {
    in_flight: AtomicBool, // ensure only one worker processes this connection at a time
    state: AtomicU8,       // ConnState
    ptr: *mut Connection,
    fd: RawFd,
}

type CloseQueue = Mutex<Vec<u64>>;
/// Handles of every connection currently registered with epoll, scanned
/// by the idle reaper thread. Entries are removed once `finalize_pending`
/// actually frees the handle.
type LiveSet = Mutex<Vec<u64>>;

struct EpollJob {
    handle_ptr: u64,       // *mut Handle as u64
    shared_ptr_u64: u64,   // *const Shared as u64
    closeq_ptr_u64: u64,   // *const CloseQueue as u64
    efd: RawFd,
}

impl Task for EpollJob {
    #[inline(always)]
    fn run(self) {
        unsafe {
            let handle = &*(self.handle_ptr as *mut Handle);
            let shared = &*(self.shared_ptr_u64 as *const Shared);
            let closeq = &*(self.closeq_ptr_u64 as *const CloseQueue);
            let conn = &mut *handle.ptr;

            let keep_alive = conn
                .on_readable(&shared.router, &shared.spawn_pool)
                .unwrap_or(false);

            if keep_alive {
                handle.in_flight.store(false, Ordering::Release);
            } else {
                store_state(&handle.state, ConnState::Closing, Ordering::Release);
                {
                    let mut q = closeq.lock().unwrap();
                    q.push(self.handle_ptr);
                }
                let _ = write(self.efd, (&1u64 as *const u64).cast(), size_of::<u64>());
                handle.in_flight.store(false, Ordering::Release);
            }
        }
    }
}

pub(super) fn run(server: Server) -> io::Result<()> {
    // Tokens used in epoll_event.u64 (never equal to real heap addresses)
    const LISTENER_TOKEN: u64 = 1;
    const EVENTFD_TOKEN: u64 = 2;

    let (listener, epfd) = create_listener(&server)?;
    let efd = create_eventfd(EVENTFD_TOKEN, epfd)?;
    let worker_pool: ThreadPool<EpollJob> = ThreadPool::new(server.thread_count);
    let mut pending_free: Vec<u64> = Vec::new();

    let closeq: Arc<CloseQueue> = Arc::new(Mutex::new(Vec::new()));
    let closeq_ptr_u64 = Arc::as_ptr(&closeq) as u64;
    let live: Arc<LiveSet> = Arc::new(Mutex::new(Vec::new()));
    let shared_ptr_u64 = Arc::as_ptr(&server.shared) as u64;

    spawn_idle_reaper(
        Arc::clone(&live),
        Arc::clone(&closeq),
        efd,
        server.idle_timeout,
    );

    let max_events = server.epoll_queue_max_events as i32;
    let mut events = vec![epoll_event { events: 0, u64: 0 }; max_events as usize];

    loop {
        let n = unsafe { epoll_wait(epfd, events.as_mut_ptr(), max_events, -1) };
        if n == -1 {
            match io::Error::last_os_error() {
                e if e.kind() == io::ErrorKind::Interrupted => continue,
                e => return Err(e), // any other `epoll_wait` error is fatal
            }
        }

        for ev in &events[..n as usize] {
            let token = ev.u64;

            if token == LISTENER_TOKEN {
                // Edge-triggered accept: drain until WouldBlock
                while let Ok((mut stream, _peer)) = listener.accept() {
                    if let Some(hook) = &server.stream_setup_hook {
                        stream = match (hook)(Ok(stream)) {
                            StreamSetupAction::Proceed(s) => s,
                            StreamSetupAction::Drop => continue,
                            StreamSetupAction::StopAccepting => return Ok(()),
                        }
                    }

                    let _ = stream.set_nodelay(true);
                    let _ = stream.set_nonblocking(true);

                    let region = match server.shared.region_pool.acquire() {
                        Some(region) => region,
                        None => {
                            respond_pool_exhausted(&mut stream);
                            continue;
                        }
                    };
                    let fd = stream.as_raw_fd();

                    let conn = Box::new(Connection::new(stream, region, server.shared.limits));
                    let conn_ptr = Box::into_raw(conn);

                    let handle = Box::new(Handle {
                        in_flight: AtomicBool::new(false),
                        state: AtomicU8::new(ConnState::Open as u8),
                        ptr: conn_ptr,
                        fd,
                    });
                    let handle_ptr = Box::into_raw(handle) as u64;

                    let mut cev = epoll_event {
                        events: (EPOLLIN | EPOLLRDHUP) as u32,
                        u64: handle_ptr,
                    };
                    if unsafe { epoll_ctl(epfd, EPOLL_CTL_ADD, fd, &mut cev) } == -1 {
                        unsafe {
                            drop(Box::from_raw(conn_ptr));
                            drop(Box::from_raw(handle_ptr as *mut Handle));
                        }
                        continue;
                    }
                    live.lock().unwrap().push(handle_ptr);
                }
            } else if token == EVENTFD_TOKEN {
                drain_eventfd(efd, &mut pending_free, &closeq);
            } else {
                let handle = unsafe { &*(token as *mut Handle) };

                if load_state(&handle.state, Ordering::Relaxed) != ConnState::Open {
                    continue;
                }

                if !handle.in_flight.swap(true, Ordering::AcqRel) {
                    worker_pool.execute(EpollJob {
                        handle_ptr: token,
                        shared_ptr_u64,
                        closeq_ptr_u64,
                        efd,
                    });
                }
            }
        }

        if !pending_free.is_empty() {
            finalize_pending(epfd, &mut pending_free, &live, &server.shared);
        }
    }
}

/// Periodically walks `live`, claiming (via the same `in_flight` flag
/// requests use) and closing any connection that hasn't read in
/// `idle_timeout`, by pushing it onto the same close queue a finished
/// request uses and waking the poller through the shared eventfd.
fn spawn_idle_reaper(
    live: Arc<LiveSet>,
    closeq: Arc<CloseQueue>,
    efd: RawFd,
    idle_timeout: Duration,
) {
    let sweep_interval = (idle_timeout / 2).max(Duration::from_secs(1));
    thread::spawn(move || loop {
        thread::sleep(sweep_interval);
        let now = now_epoch_secs();
        let idle_secs = idle_timeout.as_secs();
        let mut closed_any = false;

        let handles: Vec<u64> = live.lock().unwrap().clone();
        for handle_ptr in handles {
            let handle = unsafe { &*(handle_ptr as *mut Handle) };
            if load_state(&handle.state, Ordering::Acquire) != ConnState::Open {
                continue;
            }
            let conn = unsafe { &*handle.ptr };
            if now.saturating_sub(conn.last_activity_secs()) < idle_secs {
                continue;
            }
            // Claim the connection the same way a readiness event would,
            // so an idle-sweep close can never race an in-progress request.
            if handle.in_flight.swap(true, Ordering::AcqRel) {
                continue;
            }
            store_state(&handle.state, ConnState::Closing, Ordering::Release);
            closeq.lock().unwrap().push(handle_ptr);
            handle.in_flight.store(false, Ordering::Release);
            closed_any = true;
        }

        if closed_any {
            let _ = unsafe { write(efd, (&1u64 as *const u64).cast(), size_of::<u64>()) };
        }
    });
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn finalize_pending(
    epfd: RawFd,
    pending_free: &mut Vec<u64>,
    live: &LiveSet,
    shared: &Shared,
) {
    let mut i = 0;
    while i < pending_free.len() {
        let handle_ptr_u64 = pending_free[i];
        let handle = unsafe { &*(handle_ptr_u64 as *mut Handle) };

        // if still in-flight, defer
        if handle.in_flight.load(Ordering::Acquire) {
            i += 1;
            continue;
        }

        // best-effort
        let _ = unsafe { epoll_ctl(epfd, EPOLL_CTL_DEL, handle.fd, std::ptr::null_mut()) };

        // free up resources
        let prev = load_state(&handle.state, Ordering::Acquire);
        if prev != ConnState::Closed {
            store_state(&handle.state, ConnState::Closed, Ordering::Release);
            unsafe {
                let conn = *Box::from_raw(handle.ptr);
                shared.region_pool.release(conn.into_region());
                drop(Box::from_raw(handle_ptr_u64 as *mut Handle));
            }
            live.lock().unwrap().retain(|&p| p != handle_ptr_u64);
        }

        pending_free.swap_remove(i); // i now points to next element
    }
}

fn drain_eventfd(efd: i32, pending: &mut Vec<u64>, close_queue: &CloseQueue) {
    let mut z: u64 = 0;
    loop {
        let n = unsafe { libc::read(efd, (&mut z as *mut u64).cast(), mem::size_of::<u64>()) };
        if n == -1 && io::Error::last_os_error().raw_os_error().unwrap_or(0) == libc::EINTR {
            continue;
        }
        break;
    }
    let batch = {
        let mut q = close_queue.lock().unwrap();
        mem::take(&mut *q)
    };
    pending.extend(batch);
}

fn create_listener(server: &Server) -> io::Result<(TcpListener, i32)> {
    const LISTENER_TOKEN: u64 = 1;
    let listener = bind_with_reuseport(&server.bind_addrs)?;
    listener.set_nonblocking(true)?;

    let epfd = unsafe { epoll_create1(0) };
    if epfd == -1 {
        return Err(io::Error::last_os_error());
    }
    let mut lev = epoll_event {
        events: (EPOLLIN | EPOLLET) as u32,
        u64: LISTENER_TOKEN,
    };
    if unsafe { epoll_ctl(epfd, EPOLL_CTL_ADD, listener.as_raw_fd(), &mut lev) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok((listener, epfd))
}

/// Binds the listener, setting `SO_REUSEPORT` first when running as a
/// cluster worker so every worker process can share the same port
/// (`spec.md` §4.10/§4.11).
fn bind_with_reuseport(bind_addrs: &[std::net::SocketAddr]) -> io::Result<TcpListener> {
    use std::os::unix::io::FromRawFd;

    #[cfg(feature = "cluster")]
    let is_cluster_worker = crate::cluster::is_worker();
    #[cfg(not(feature = "cluster"))]
    let is_cluster_worker = false;

    if !is_cluster_worker {
        return TcpListener::bind(bind_addrs);
    }

    let addr = *bind_addrs
        .first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no bind address"))?;
    let domain = if addr.is_ipv4() {
        libc::AF_INET
    } else {
        libc::AF_INET6
    };
    unsafe {
        let fd = libc::socket(domain, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let one: libc::c_int = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            (&one as *const libc::c_int).cast(),
            size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const libc::c_int).cast(),
            size_of::<libc::c_int>() as libc::socklen_t,
        );

        let stream = TcpStream::from_raw_fd(fd);
        let std_listener = socket2_bind_listen(stream, addr)?;
        Ok(std_listener)
    }
}

/// Binds and listens on a raw fd wrapped as a `TcpStream`, then hands
/// back a `TcpListener` owning the same fd. No `socket2` dependency: a
/// few direct libc calls do the same job this crate already does
/// elsewhere (`region.rs`, `cluster.rs`) for raw syscalls.
fn socket2_bind_listen(stream: TcpStream, addr: std::net::SocketAddr) -> io::Result<TcpListener> {
    use std::os::unix::io::IntoRawFd;

    let fd = stream.into_raw_fd();
    let (sockaddr, len) = sockaddr_from(addr);
    let bind_res = unsafe { libc::bind(fd, sockaddr.as_ptr().cast(), len) };
    if bind_res != 0 {
        return Err(io::Error::last_os_error());
    }
    let listen_res = unsafe { libc::listen(fd, 1024) };
    if listen_res != 0 {
        return Err(io::Error::last_os_error());
    }
    unsafe {
        use std::os::unix::io::FromRawFd;
        Ok(TcpListener::from_raw_fd(fd))
    }
}

fn sockaddr_from(addr: std::net::SocketAddr) -> (Vec<u8>, libc::socklen_t) {
    match addr {
        std::net::SocketAddr::V4(a) => {
            let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = a.port().to_be();
            sin.sin_addr.s_addr = u32::from_ne_bytes(a.ip().octets());
            let len = size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let bytes = unsafe {
                std::slice::from_raw_parts((&sin as *const libc::sockaddr_in).cast(), len as usize)
            }
            .to_vec();
            (bytes, len)
        }
        std::net::SocketAddr::V6(a) => {
            let mut sin6: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = a.port().to_be();
            sin6.sin6_addr.s6_addr = a.ip().octets();
            let len = size_of::<libc::sockaddr_in6>() as libc::socklen_t;
            let bytes = unsafe {
                std::slice::from_raw_parts(
                    (&sin6 as *const libc::sockaddr_in6).cast(),
                    len as usize,
                )
            }
            .to_vec();
            (bytes, len)
        }
    }
}

fn create_eventfd(event_fd_token: u64, epfd: i32) -> io::Result<i32> {
    let efd = unsafe { eventfd(0, EFD_NONBLOCK | EFD_CLOEXEC) };
    if efd < 0 {
        return Err(io::Error::last_os_error());
    }
    let mut eev = epoll_event {
        events: (EPOLLIN | EPOLLET) as u32,
        u64: event_fd_token,
    };
    if unsafe { epoll_ctl(epfd, EPOLL_CTL_ADD, efd, &mut eev) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(efd)
}
