//! Synchronous-signal trap handling for unix targets.
//!
//! ```text
//! SIGSEGV / SIGBUS ──► AccessViolation (read/write when the CPU reports it)
//! SIGILL           ──► InvalidInstruction
//! SIGFPE           ──► Unknown
//! ```
//!
//! Signals raised on a thread without an active guard are forwarded to the
//! handler that was installed before ours (for example the runtime's stack
//! overflow reporter), or to the default disposition.

use std::cell::UnsafeCell;
use std::ffi::{c_int, c_void};
use std::mem::MaybeUninit;
use std::ptr;

use crate::error::{GuardError, Result};
use crate::fault::{Access, FaultKind};
use crate::frame::{self, Trap};

const SIGNAL_COUNT: usize = 4;
const TRAPPED_SIGNALS: [c_int; SIGNAL_COUNT] = [libc::SIGSEGV, libc::SIGBUS, libc::SIGILL, libc::SIGFPE];

/// Handlers that were installed before ours, one per entry of
/// `TRAPPED_SIGNALS`. Written only by `install` under the registration lock,
/// read by the signal handler.
struct PreviousActions(UnsafeCell<[MaybeUninit<libc::sigaction>; SIGNAL_COUNT]>);

// SAFETY: see the access discipline above.
unsafe impl Sync for PreviousActions {}

static PREVIOUS: PreviousActions = PreviousActions(UnsafeCell::new(
    [const { MaybeUninit::uninit() }; SIGNAL_COUNT],
));

pub(super) unsafe fn install() -> Result<()> {
    let previous = &mut *PREVIOUS.0.get();
    let handler: unsafe extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void) = trap_handler;

    for (index, &signum) in TRAPPED_SIGNALS.iter().enumerate() {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
        libc::sigemptyset(&mut action.sa_mask);

        if libc::sigaction(signum, &action, previous[index].as_mut_ptr()) != 0 {
            let error = std::io::Error::last_os_error();
            for (installed, &signum) in TRAPPED_SIGNALS.iter().enumerate().take(index) {
                libc::sigaction(signum, previous[installed].as_ptr(), ptr::null_mut());
            }
            return Err(GuardError::HandlerInstall(format!(
                "sigaction({}) failed: {}",
                signum, error
            )));
        }
    }

    Ok(())
}

pub(super) unsafe fn restore() {
    let previous = &*PREVIOUS.0.get();
    for (index, &signum) in TRAPPED_SIGNALS.iter().enumerate() {
        libc::sigaction(signum, previous[index].as_ptr(), ptr::null_mut());
    }
}

unsafe extern "C" fn trap_handler(signum: c_int, info: *mut libc::siginfo_t, context: *mut c_void) {
    let trap = Trap {
        kind: classify(signum, context),
        address: fault_address(info),
        code: i64::from(signum),
    };

    // Does not return when the thread is guarded.
    if frame::deliver(trap) {
        return;
    }

    forward(signum, info, context);
}

fn classify(signum: c_int, context: *mut c_void) -> FaultKind {
    match signum {
        libc::SIGSEGV | libc::SIGBUS => FaultKind::AccessViolation(access_direction(context)),
        libc::SIGILL => FaultKind::InvalidInstruction,
        _ => FaultKind::Unknown,
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu"))]
fn access_direction(context: *mut c_void) -> Access {
    if context.is_null() {
        return Access::Unknown;
    }
    // SAFETY: the kernel passes a ucontext_t as the third handler argument.
    let context = unsafe { &*context.cast::<libc::ucontext_t>() };
    // Page-fault error code, bit 1 set for writes.
    if context.uc_mcontext.gregs[libc::REG_ERR as usize] & 0x2 != 0 {
        Access::Write
    } else {
        Access::Read
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu")))]
fn access_direction(_context: *mut c_void) -> Access {
    Access::Unknown
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_address(info: *mut libc::siginfo_t) -> usize {
    if info.is_null() {
        0
    } else {
        (*info).si_addr() as usize
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_address(info: *mut libc::siginfo_t) -> usize {
    if info.is_null() {
        0
    } else {
        (*info).si_addr as usize
    }
}

unsafe fn forward(signum: c_int, info: *mut libc::siginfo_t, context: *mut c_void) {
    let Some(index) = TRAPPED_SIGNALS.iter().position(|&trapped| trapped == signum) else {
        return;
    };
    let previous = (*PREVIOUS.0.get())[index].assume_init_ref();
    let handler = previous.sa_sigaction;

    if handler == libc::SIG_DFL || handler == libc::SIG_IGN {
        // Default disposition terminates; the signal stays blocked until the
        // handler returns, so the re-raise is delivered right after.
        libc::signal(signum, libc::SIG_DFL);
        libc::raise(signum);
        return;
    }

    if previous.sa_flags & libc::SA_SIGINFO != 0 {
        let action: extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void) =
            std::mem::transmute(handler);
        action(signum, info, context);
    } else {
        let action: extern "C" fn(c_int) = std::mem::transmute(handler);
        action(signum);
    }
}
