//! Private helpers for tests and examples in this workspace.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test body on a helper thread and fails the test if it does not finish
/// within a generous timeout.
///
/// Lock-free code that regresses tends to hang rather than crash, which would
/// otherwise stall the whole test run. The timeout is long enough that a healthy
/// test never comes close to it, and longer still under Miri, where everything
/// runs orders of magnitude slower.
///
/// # Panics
///
/// Panics if the body takes longer than the timeout. A panic inside the body is
/// resumed on the calling thread, so `#[should_panic]` tests work unchanged.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let result = with_watchdog(|| 2 + 2);
/// assert_eq!(result, 4);
/// ```
pub fn with_watchdog<F, R>(body: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (result_tx, result_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        // A send failure means the watchdog already gave up on us; the panic
        // from the timeout arm is the interesting one in that case.
        drop(result_tx.send(body()));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(30)
    };

    match result_rx.recv_timeout(timeout) {
        Ok(result) => {
            worker
                .join()
                .expect("worker cannot panic after it has already sent its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test body did not finish within the watchdog timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match worker.join() {
            Ok(()) => panic!("test body vanished without reporting a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}
