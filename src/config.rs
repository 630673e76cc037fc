//! Environment-variable configuration knobs (`spec.md` §6). Every getter
//! falls back silently (after logging a warning) to the compiled default
//! on a missing or unparsable value — never panics.

use std::str::FromStr;

fn env_or_default<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("{key}={raw:?} is not valid, falling back to default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_or_default_checked<T: FromStr + PartialOrd + Copy + std::fmt::Debug>(
    key: &str,
    default: T,
    max: T,
) -> T {
    let v = env_or_default(key, default);
    if v > max {
        log::warn!("{key}={v:?} exceeds the hard cap, falling back to default");
        default
    } else {
        v
    }
}

pub fn region_prealloc() -> usize {
    env_or_default_checked("EMBERHTTP_REGION_PREALLOC", 16, 4096)
}

pub fn region_low_watermark() -> usize {
    env_or_default("EMBERHTTP_REGION_LOW_WATERMARK", 8)
}

pub fn region_high_watermark() -> usize {
    env_or_default("EMBERHTTP_REGION_HIGH_WATERMARK", 64)
}

pub fn region_grow_batch() -> usize {
    env_or_default("EMBERHTTP_REGION_GROW_BATCH", 8)
}

pub fn region_max_pool_size() -> usize {
    env_or_default_checked("EMBERHTTP_REGION_MAX_POOL_SIZE", 4096, 65536)
}

pub fn cluster_workers() -> usize {
    env_or_default("EMBERHTTP_CLUSTER_WORKERS", default_worker_count())
}

pub fn cluster_respawn() -> bool {
    env_or_default("EMBERHTTP_CLUSTER_RESPAWN", true)
}

pub const CLUSTER_WORKER_MARKER: &str = "EMBERHTTP_CLUSTER_WORKER_MARKER";

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_uses_default() {
        std::env::remove_var("EMBERHTTP_REGION_LOW_WATERMARK_TEST_UNSET");
        assert_eq!(env_or_default("EMBERHTTP_REGION_LOW_WATERMARK_TEST_UNSET", 8usize), 8);
    }

    #[test]
    fn malformed_env_var_falls_back() {
        std::env::set_var("EMBERHTTP_TEST_MALFORMED", "not-a-number");
        assert_eq!(env_or_default("EMBERHTTP_TEST_MALFORMED", 16usize), 16);
        std::env::remove_var("EMBERHTTP_TEST_MALFORMED");
    }

    #[test]
    fn value_above_cap_falls_back() {
        std::env::set_var("EMBERHTTP_TEST_TOO_BIG", "99999");
        assert_eq!(env_or_default_checked("EMBERHTTP_TEST_TOO_BIG", 16usize, 4096), 16);
        std::env::remove_var("EMBERHTTP_TEST_TOO_BIG");
    }
}
