//! Multi-process fan-out supervisor (`spec.md` §4.11), optional behind
//! the `cluster` feature. Grounded on `original_source`'s `ecewo`
//! `Cluster` struct shape (worker count, respawn flag, start/exit
//! lifecycle callbacks) and argv-rewriting scheme (`--cluster-worker
//! <id> <port>`), reimplemented with `std::process::Command` instead of
//! raw `fork`/`exec` — each worker is a fresh child process of the same
//! binary rather than a forked copy of the running one, which is the
//! idiomatic Rust analogue given `std::process` has no `fork` primitive.
#![cfg(feature = "cluster")]

use std::collections::VecDeque;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config;
use crate::error::ClusterError;

const RESPAWN_THROTTLE_COUNT: usize = 5;
const RESPAWN_THROTTLE_WINDOW: Duration = Duration::from_secs(10);

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static RESTART_REQUESTED: AtomicBool = AtomicBool::new(false);
/// Configured worker count, set once `run_master` starts. Zero in a
/// worker process or before the master has spawned anyone.
static WORKER_COUNT: AtomicU8 = AtomicU8::new(0);
/// PIDs of the currently live workers, kept in sync by `run_master` so
/// `signal_workers`/`wait_workers` can act on them from any thread.
static WORKER_PIDS: Mutex<Vec<i32>> = Mutex::new(Vec::new());

/// Worker lifecycle callbacks and fan-out policy, named after
/// `original_source`'s `Cluster` struct.
pub struct ClusterConfig {
    pub workers: u8,
    pub respawn: bool,
    pub on_worker_start: Option<Box<dyn Fn(u8) + Send + Sync>>,
    pub on_worker_exit: Option<Box<dyn Fn(u8, Option<i32>) + Send + Sync>>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            workers: config::cluster_workers().min(u8::MAX as usize) as u8,
            respawn: config::cluster_respawn(),
            on_worker_start: None,
            on_worker_exit: None,
        }
    }
}

/// Whether the current process was launched by a cluster master, per
/// the `EMBERHTTP_CLUSTER_WORKER_MARKER` env var set in the child's
/// environment (`spec.md` §6).
pub fn is_worker() -> bool {
    std::env::var_os(config::CLUSTER_WORKER_MARKER).is_some()
}

/// This worker's id and assigned port, parsed from `--cluster-worker
/// <id> <port>` in `argv`. Only meaningful when [`is_worker`] is true.
pub fn worker_identity() -> Option<(u8, u16)> {
    let args: Vec<String> = std::env::args().collect();
    let idx = args.iter().position(|a| a == "--cluster-worker")?;
    let id: u8 = args.get(idx + 1)?.parse().ok()?;
    let port: u16 = args.get(idx + 2)?.parse().ok()?;
    Some((id, port))
}

/// The complement of [`is_worker`]: true in the process that calls
/// [`run_master`].
pub fn is_master() -> bool {
    !is_worker()
}

/// This worker's id, or `None` outside a worker process.
pub fn worker_id() -> Option<u8> {
    worker_identity().map(|(id, _)| id)
}

/// The master's configured worker count. Zero before [`run_master`] has
/// started or when called from a worker process.
pub fn worker_count() -> usize {
    WORKER_COUNT.load(Ordering::Relaxed) as usize
}

/// Number of logical CPUs, mirroring `config::cluster_workers`'s own
/// default so callers can size a worker count without duplicating the
/// `available_parallelism` call themselves.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Sends `signum` to every currently live worker process. A no-op if
/// called before `run_master` has spawned anyone, or from a worker.
#[cfg(unix)]
pub fn signal_workers(signum: i32) {
    let pids = WORKER_PIDS.lock().unwrap();
    for &pid in pids.iter() {
        unsafe {
            libc::kill(pid, signum);
        }
    }
}

#[cfg(not(unix))]
pub fn signal_workers(_signum: i32) {}

/// Blocks the calling thread until every currently tracked worker
/// process has exited.
pub fn wait_workers() {
    loop {
        let pids: Vec<i32> = WORKER_PIDS.lock().unwrap().clone();
        if pids.is_empty() {
            return;
        }
        #[cfg(unix)]
        let all_exited = pids.iter().all(|&pid| unsafe { libc::kill(pid, 0) == -1 });
        #[cfg(not(unix))]
        let all_exited = true;
        if all_exited {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Replaces the tracked PID set with the current worker slots', called
/// whenever the master spawns, respawns, or shuts down workers.
fn sync_worker_pids(workers: &[WorkerSlot]) {
    let mut pids = WORKER_PIDS.lock().unwrap();
    pids.clear();
    pids.extend(workers.iter().map(|slot| slot.child.id() as i32));
}

struct WorkerSlot {
    id: u8,
    port: u16,
    child: Child,
    restart_times: VecDeque<Instant>,
    respawn_disabled: bool,
}

/// Runs the master loop: spawns `config.workers` children bound to
/// consecutive ports starting at `base_port`, restarting any that exit
/// (unless respawn is disabled or the worker is throttled), until
/// SIGTERM/SIGINT arrives. Intended to be called only when [`is_worker`]
/// is false.
pub fn run_master(config: ClusterConfig, base_port: u16) -> Result<(), ClusterError> {
    if config.workers < 1 {
        return Err(ClusterError::InvalidWorkerCount(
            "cluster worker count must be at least 1".to_string(),
        ));
    }

    install_shutdown_signal();
    WORKER_COUNT.store(config.workers, Ordering::SeqCst);
    let exe = std::env::current_exe().map_err(ClusterError::Exec)?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut workers = Vec::with_capacity(config.workers as usize);
    for id in 0..config.workers {
        // Unix workers all bind the same port via SO_REUSEPORT (set on
        // the listening socket in server::epoll when running as a
        // cluster worker); platforms without SO_REUSEPORT fall back to
        // one port per worker.
        let port = worker_port(base_port, id);
        workers.push(spawn_worker(&exe, &args, id, port)?);
        if let Some(cb) = &config.on_worker_start {
            cb(id);
        }
    }
    sync_worker_pids(&workers);

    while !SHUTDOWN_REQUESTED.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));

        if RESTART_REQUESTED.swap(false, Ordering::SeqCst) {
            log::info!("cluster received SIGUSR2, restarting all workers");
            for slot in &mut workers {
                let _ = slot.child.kill();
                let _ = slot.child.wait();
                match spawn_worker(&exe, &args, slot.id, slot.port) {
                    Ok(new_slot) => *slot = new_slot,
                    Err(e) => log::warn!("failed to restart worker {}: {}", slot.id, e),
                }
            }
            sync_worker_pids(&workers);
        }

        let mut respawned = false;
        for slot in &mut workers {
            let status = match slot.child.try_wait() {
                Ok(Some(status)) => status,
                Ok(None) => continue,
                Err(_) => continue,
            };
            if let Some(cb) = &config.on_worker_exit {
                cb(slot.id, status.code());
            }
            if !config.respawn || slot.respawn_disabled || SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
            {
                continue;
            }
            if throttled(&mut slot.restart_times) {
                log::warn!(
                    "cluster worker {} respawned too often, disabling further restarts",
                    slot.id
                );
                slot.respawn_disabled = true;
                continue;
            }
            log::warn!("cluster worker {} exited, respawning", slot.id);
            match spawn_worker(&exe, &args, slot.id, slot.port) {
                Ok(new_slot) => *slot = new_slot,
                Err(e) => log::warn!("failed to respawn worker {}: {}", slot.id, e),
            }
            respawned = true;
        }
        if respawned {
            sync_worker_pids(&workers);
        }
    }

    for slot in &mut workers {
        let _ = slot.child.kill();
        let _ = slot.child.wait();
    }
    WORKER_PIDS.lock().unwrap().clear();
    WORKER_COUNT.store(0, Ordering::SeqCst);
    Ok(())
}

#[cfg(unix)]
fn worker_port(base_port: u16, _id: u8) -> u16 {
    base_port
}

#[cfg(not(unix))]
fn worker_port(base_port: u16, id: u8) -> u16 {
    base_port + id as u16
}

fn spawn_worker(
    exe: &std::path::Path,
    base_args: &[String],
    id: u8,
    port: u16,
) -> Result<WorkerSlot, ClusterError> {
    let child = Command::new(exe)
        .args(base_args)
        .arg("--cluster-worker")
        .arg(id.to_string())
        .arg(port.to_string())
        .env(config::CLUSTER_WORKER_MARKER, "1")
        .spawn()
        .map_err(ClusterError::Fork)?;

    Ok(WorkerSlot {
        id,
        port,
        child,
        restart_times: VecDeque::with_capacity(RESPAWN_THROTTLE_COUNT),
        respawn_disabled: false,
    })
}

fn throttled(restart_times: &mut VecDeque<Instant>) -> bool {
    let now = Instant::now();
    restart_times.push_back(now);
    while let Some(&front) = restart_times.front() {
        if now.duration_since(front) > RESPAWN_THROTTLE_WINDOW {
            restart_times.pop_front();
        } else {
            break;
        }
    }
    restart_times.len() > RESPAWN_THROTTLE_COUNT
}

extern "C" fn handle_shutdown_signal(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_restart_signal(_: libc::c_int) {
    RESTART_REQUESTED.store(true, Ordering::SeqCst);
}

/// SIGCHLD needs an explicit handler only so its disposition is never
/// inherited as `SIG_IGN` from a parent shell; `Child::try_wait`'s
/// polling in `run_master` still does the actual reaping.
extern "C" fn handle_sigchld(_: libc::c_int) {}

#[cfg(unix)]
fn install_shutdown_signal() {
    unsafe {
        libc::signal(libc::SIGTERM, handle_shutdown_signal as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_shutdown_signal as libc::sighandler_t);
        libc::signal(libc::SIGUSR2, handle_restart_signal as libc::sighandler_t);
        libc::signal(libc::SIGCHLD, handle_sigchld as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_shutdown_signal() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_counts_within_window() {
        let mut times = VecDeque::new();
        for _ in 0..RESPAWN_THROTTLE_COUNT {
            assert!(!throttled(&mut times));
        }
        assert!(throttled(&mut times));
    }

    #[test]
    fn non_worker_process_has_no_identity() {
        std::env::remove_var(config::CLUSTER_WORKER_MARKER);
        assert!(!is_worker());
    }

    #[test]
    fn non_worker_process_is_master() {
        std::env::remove_var(config::CLUSTER_WORKER_MARKER);
        assert!(is_master());
        assert!(worker_id().is_none());
    }

    #[test]
    fn cpu_count_is_at_least_one() {
        assert!(cpu_count() >= 1);
    }

    #[test]
    fn wait_workers_returns_immediately_with_none_tracked() {
        WORKER_PIDS.lock().unwrap().clear();
        wait_workers();
    }
}
