use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub const VERBOSE_ENV: &str = "PINUP_VERBOSE";

/// Turn on `[VERBOSE]` diagnostics for the rest of the process.
pub fn enable() {
    VERBOSE.store(true, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    VERBOSE.load(Ordering::Relaxed) || std::env::var_os(VERBOSE_ENV).is_some()
}

/// Print a `[VERBOSE]` line on stderr when verbose output is on.
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::utils::verbose::enabled() {
            eprintln!("[VERBOSE] {}", format_args!($($arg)*));
        }
    };
}

pub(crate) use verbose;
