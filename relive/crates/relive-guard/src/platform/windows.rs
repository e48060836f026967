//! Hardware-exception trap handling for windows targets.
//!
//! A first-chance vectored handler sees access violations and illegal
//! instructions before any structured handler does. Exceptions raised on a
//! thread without an active guard, and exception codes we do not classify,
//! continue the normal search.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use windows_sys::Win32::Foundation::{
    EXCEPTION_ACCESS_VIOLATION, EXCEPTION_ILLEGAL_INSTRUCTION, EXCEPTION_INT_DIVIDE_BY_ZERO,
    EXCEPTION_IN_PAGE_ERROR, EXCEPTION_PRIV_INSTRUCTION,
};
use windows_sys::Win32::System::Diagnostics::Debug::{
    AddVectoredExceptionHandler, RemoveVectoredExceptionHandler, EXCEPTION_POINTERS,
    EXCEPTION_RECORD,
};

use crate::error::{GuardError, Result};
use crate::fault::{Access, FaultKind};
use crate::frame::{self, Trap};

const EXCEPTION_CONTINUE_SEARCH: i32 = 0;

static HANDLER: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

pub(super) unsafe fn install() -> Result<()> {
    let handle = AddVectoredExceptionHandler(1, Some(vectored_handler));
    if handle.is_null() {
        return Err(GuardError::HandlerInstall(format!(
            "AddVectoredExceptionHandler failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    HANDLER.store(handle, Ordering::SeqCst);
    Ok(())
}

pub(super) unsafe fn restore() {
    let handle = HANDLER.swap(ptr::null_mut(), Ordering::SeqCst);
    if !handle.is_null() {
        RemoveVectoredExceptionHandler(handle);
    }
}

unsafe extern "system" fn vectored_handler(pointers: *mut EXCEPTION_POINTERS) -> i32 {
    if pointers.is_null() || (*pointers).ExceptionRecord.is_null() {
        return EXCEPTION_CONTINUE_SEARCH;
    }
    let record = &*(*pointers).ExceptionRecord;

    let kind = match record.ExceptionCode {
        EXCEPTION_ACCESS_VIOLATION | EXCEPTION_IN_PAGE_ERROR => {
            FaultKind::AccessViolation(access_direction(record))
        },
        EXCEPTION_ILLEGAL_INSTRUCTION | EXCEPTION_PRIV_INSTRUCTION => FaultKind::InvalidInstruction,
        EXCEPTION_INT_DIVIDE_BY_ZERO => FaultKind::Unknown,
        _ => return EXCEPTION_CONTINUE_SEARCH,
    };

    let address = match kind {
        FaultKind::AccessViolation(_) if record.NumberParameters >= 2 => {
            record.ExceptionInformation[1]
        },
        _ => record.ExceptionAddress as usize,
    };

    let trap = Trap {
        kind,
        address,
        code: i64::from(record.ExceptionCode),
    };

    // Does not return when the thread is guarded.
    frame::deliver(trap);
    EXCEPTION_CONTINUE_SEARCH
}

fn access_direction(record: &EXCEPTION_RECORD) -> Access {
    if record.NumberParameters < 1 {
        return Access::Unknown;
    }
    match record.ExceptionInformation[0] {
        0 => Access::Read,
        1 => Access::Write,
        _ => Access::Unknown,
    }
}
