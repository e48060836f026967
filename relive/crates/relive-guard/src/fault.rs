//! Fault descriptions produced by guarded calls.

use std::fmt;

/// Direction of a faulting memory access, when the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Unknown,
    Read,
    Write,
}

/// Class of fault that ended a guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A trap the handler does not classify further (e.g. SIGFPE).
    Unknown,
    /// Invalid memory access (SIGSEGV, SIGBUS, EXCEPTION_ACCESS_VIOLATION).
    AccessViolation(Access),
    /// Illegal or privileged instruction.
    InvalidInstruction,
    /// A Rust panic escaped the guarded work.
    Panic,
}

impl FaultKind {
    /// Short lowercase label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            FaultKind::Unknown => "unknown fault",
            FaultKind::AccessViolation(Access::Read) => "access violation (read)",
            FaultKind::AccessViolation(Access::Write) => "access violation (write)",
            FaultKind::AccessViolation(Access::Unknown) => "access violation",
            FaultKind::InvalidInstruction => "invalid instruction",
            FaultKind::Panic => "panic",
        }
    }

    /// Whether this fault came from a hardware trap rather than a panic.
    pub fn is_trap(self) -> bool {
        !matches!(self, FaultKind::Panic)
    }
}

/// Everything recorded about one fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInfo {
    /// Fault class
    pub kind: FaultKind,
    /// Faulting data address for access violations, instruction address
    /// otherwise. `None` for panics.
    pub address: Option<usize>,
    /// Raw platform code: signal number on unix, exception code on windows.
    pub code: Option<i64>,
    /// Panic payload, when the fault is a panic.
    pub message: Option<String>,
}

impl FaultInfo {
    pub(crate) fn trap(kind: FaultKind, address: usize, code: i64) -> Self {
        Self {
            kind,
            address: Some(address),
            code: Some(code),
            message: None,
        }
    }

    pub(crate) fn panic(message: String) -> Self {
        Self {
            kind: FaultKind::Panic,
            address: None,
            code: None,
            message: Some(message),
        }
    }

    /// A fault with no recorded details.
    pub fn unknown() -> Self {
        Self {
            kind: FaultKind::Unknown,
            address: None,
            code: None,
            message: None,
        }
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.label())?;
        if let Some(address) = self.address {
            write!(f, " at {:#x}", address)?;
        }
        if let Some(code) = self.code {
            write!(f, " (code {})", code)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}
