//! Signal-guarded critical sections (§5).
//!
//! The rewrite of one directory must not be torn by an asynchronous signal.
//! On Unix this blocks every deliverable signal for the duration of the
//! closure via `sigprocmask`, mirroring the source's `start_critical_section`
//! / `end_critical_section` pair exactly; signals are unblocked again whether
//! the closure returns `Ok` or `Err`. On non-Unix targets there is no
//! equivalent primitive, so the critical section degrades to a plain call
//! and a one-time warning is logged.

#[cfg(unix)]
mod unix {
    use std::mem::MaybeUninit;

    pub fn run<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        unsafe {
            let mut blocked = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigfillset(blocked.as_mut_ptr());
            let blocked = blocked.assume_init();
            libc::sigprocmask(libc::SIG_BLOCK, &blocked, std::ptr::null_mut());

            let result = f();

            libc::sigprocmask(libc::SIG_UNBLOCK, &blocked, std::ptr::null_mut());
            result
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::sync::Once;

    static WARN_ONCE: Once = Once::new();

    pub fn run<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        WARN_ONCE.call_once(|| {
            log::warn!(
                "signal-guarded critical sections are not implemented on this platform; \
                 an interrupt mid-rewrite may leave a directory half-written"
            );
        });
        f()
    }
}

/// Runs `f` with all deliverable signals blocked, unblocking them again
/// before returning regardless of outcome.
pub fn critical_section<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    #[cfg(unix)]
    {
        unix::run(f)
    }
    #[cfg(not(unix))]
    {
        fallback::run(f)
    }
}
