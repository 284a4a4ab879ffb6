//! Process-wide runtime switches.
//!
//! Each flag is seeded from its environment variable on first read and can
//! be overridden at runtime.
//!
//! | variable             | effect                                               |
//! |----------------------|------------------------------------------------------|
//! | `KORE_CHECK_NAN_INF` | scan float outputs for NaN/Inf after every kernel    |
//! | `KORE_BENCHMARK`     | wait for the device context after every kernel       |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

pub const CHECK_NAN_INF_ENV: &str = "KORE_CHECK_NAN_INF";
pub const BENCHMARK_ENV: &str = "KORE_BENCHMARK";

static CHECK_NAN_INF: OnceLock<AtomicBool> = OnceLock::new();
static BENCHMARK: OnceLock<AtomicBool> = OnceLock::new();

fn env_bool(name: &str) -> bool {
    let Ok(value) = std::env::var(name) else {
        return false;
    };
    parse_bool(&value)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn flag(cell: &'static OnceLock<AtomicBool>, env: &str) -> &'static AtomicBool {
    cell.get_or_init(|| AtomicBool::new(env_bool(env)))
}

pub fn check_nan_inf() -> bool {
    flag(&CHECK_NAN_INF, CHECK_NAN_INF_ENV).load(Ordering::Relaxed)
}

pub fn set_check_nan_inf(enabled: bool) {
    flag(&CHECK_NAN_INF, CHECK_NAN_INF_ENV).store(enabled, Ordering::Relaxed);
}

pub fn benchmark() -> bool {
    flag(&BENCHMARK, BENCHMARK_ENV).load(Ordering::Relaxed)
}

pub fn set_benchmark(enabled: bool) {
    flag(&BENCHMARK, BENCHMARK_ENV).store(enabled, Ordering::Relaxed);
}
