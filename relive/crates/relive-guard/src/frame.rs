//! Guard frames and the guarded-call entry point.
//!
//! Every active guarded call owns a [`GuardFrame`] on its stack. Frames of
//! one thread form a chain through `previous`, innermost first, so nested
//! guarded calls behave like a stack: a trap is delivered to the innermost
//! frame and the enclosing ones keep guarding after it returns.

use std::any::Any;
use std::cell::Cell;
use std::ffi::{c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::error::{GuardError, Result};
use crate::fault::{FaultInfo, FaultKind};
use crate::platform::HandlerRegistration;

/// What the trap handler saw. Plain data so it can be written from inside a
/// signal handler.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trap {
    pub kind: FaultKind,
    pub address: usize,
    pub code: i64,
}

struct GuardFrame {
    /// Jump buffer inside the C trampoline; null while no work is running.
    jump: Cell<*mut c_void>,
    trap: Cell<Option<Trap>>,
    previous: *const GuardFrame,
}

thread_local! {
    static INNERMOST: Cell<*const GuardFrame> = const { Cell::new(ptr::null()) };
}

extern "C" {
    fn relive_guard_enter(
        body: extern "C" fn(*mut c_void),
        data: *mut c_void,
        jump_slot: *mut *mut c_void,
    ) -> c_int;

    fn relive_guard_leave(jump: *mut c_void) -> !;
}

struct Call<F, R> {
    work: Option<F>,
    outcome: Option<std::thread::Result<R>>,
}

extern "C" fn call_body<F, R>(data: *mut c_void)
where
    F: FnOnce() -> R,
{
    // SAFETY: `data` is the `Call<F, R>` that `run` passed to the trampoline
    // and it outlives the trampoline call.
    let call = unsafe { &mut *data.cast::<Call<F, R>>() };
    if let Some(work) = call.work.take() {
        call.outcome = Some(panic::catch_unwind(AssertUnwindSafe(work)));
    }
}

/// Run `work` under the fault guard.
///
/// # Returns
/// `Ok` with the work's value, or [`GuardError::Faulted`] when the work
/// raised a hardware trap or panicked.
///
/// # Examples
/// ```rust
/// let doubled = relive_guard::run(|| 21 * 2).unwrap();
/// assert_eq!(doubled, 42);
/// ```
pub fn run<R, F>(work: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    let _handlers = HandlerRegistration::acquire()?;

    let frame = GuardFrame {
        jump: Cell::new(ptr::null_mut()),
        trap: Cell::new(None),
        previous: INNERMOST.with(Cell::get),
    };
    let mut call: Call<F, R> = Call {
        work: Some(work),
        outcome: None,
    };

    INNERMOST.with(|innermost| innermost.set(&frame));
    // SAFETY: the trampoline only calls `call_body` with the pointer given
    // here and writes the jump buffer address into `frame.jump`.
    let trapped = unsafe {
        relive_guard_enter(
            call_body::<F, R>,
            ptr::addr_of_mut!(call).cast(),
            frame.jump.as_ptr(),
        )
    };
    frame.jump.set(ptr::null_mut());
    INNERMOST.with(|innermost| innermost.set(frame.previous));

    if trapped != 0 {
        let fault = match frame.trap.get() {
            Some(trap) => FaultInfo::trap(trap.kind, trap.address, trap.code),
            None => FaultInfo::unknown(),
        };
        log::warn!("guarded call trapped: {}", fault);
        return Err(GuardError::Faulted(fault));
    }

    match call.outcome.take() {
        Some(Ok(value)) => Ok(value),
        Some(Err(payload)) => {
            let fault = FaultInfo::panic(panic_message(payload.as_ref()));
            log::warn!("guarded call panicked: {}", fault);
            Err(GuardError::Faulted(fault))
        },
        None => Err(GuardError::Faulted(FaultInfo::unknown())),
    }
}

/// Whether the current thread is inside a guarded call.
pub fn is_guarding() -> bool {
    INNERMOST.with(|innermost| !innermost.get().is_null())
}

/// Number of nested guarded calls active on the current thread.
pub fn depth() -> usize {
    let mut depth = 0;
    let mut frame = INNERMOST.with(Cell::get);
    while !frame.is_null() {
        depth += 1;
        // SAFETY: frames in the chain are alive until they unlink themselves.
        frame = unsafe { (*frame).previous };
    }
    depth
}

/// Hand a trap to the innermost guard of the current thread.
///
/// Does not return when a guard is active. Returns `false` when the thread
/// has no guard, in which case the caller forwards the trap.
///
/// # Safety
/// Must only be called from the platform trap handler, on the thread that
/// raised the trap.
pub(crate) unsafe fn deliver(trap: Trap) -> bool {
    let frame = INNERMOST.try_with(Cell::get).unwrap_or(ptr::null());
    if frame.is_null() {
        return false;
    }

    let frame = &*frame;
    let jump = frame.jump.get();
    if jump.is_null() {
        return false;
    }

    frame.trap.set(Some(trap));
    relive_guard_leave(jump)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
