//! SIGINT Wiring
//!
//! The first Ctrl-C sets the shared cancellation token: in-flight children
//! are killed, completed samples are kept, and the partial record is still
//! persisted. The handler then restores the default disposition so a
//! second Ctrl-C terminates the process outright.

use parabench_core::CancelToken;
use std::sync::OnceLock;

static INSTALLED_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Route SIGINT to the given cancellation token. Only the first
/// installation wins; later calls are ignored.
pub fn install(token: &CancelToken) {
    if INSTALLED_TOKEN.set(token.clone()).is_err() {
        return;
    }
    let handler = handle_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler performs an atomic store and a signal(2) call,
    // both async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

extern "C" fn handle_sigint(_signal: libc::c_int) {
    if let Some(token) = INSTALLED_TOKEN.get() {
        token.cancel();
    }
    // SAFETY: restoring the default disposition from a handler is allowed.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}
